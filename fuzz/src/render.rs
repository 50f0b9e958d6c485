#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mealdrive::{Context, DocumentId, Engine};

#[derive(Debug, Arbitrary)]
enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl From<Value> for mealdrive::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::None => Self::None,
            Value::Bool(b) => Self::Bool(b),
            Value::Integer(i) => Self::Integer(i),
            Value::Float(f) => Self::Float(f),
            Value::String(s) => Self::String(s),
            Value::List(list) => list.into_iter().collect(),
        }
    }
}

fuzz_target!(|data: (&str, Vec<(String, Value)>)| {
    let (source, bindings) = data;
    let template = match Engine::new().parse(source, DocumentId::new("fuzz")) {
        Ok(template) => template,
        Err(_) => return,
    };
    let ctx: Context = bindings.into_iter().collect();
    let _ = template.render(&ctx);
});
