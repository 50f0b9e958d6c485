#![no_main]

use libfuzzer_sys::fuzz_target;
use mealdrive::{ControlBlock, DocumentId, Engine, Listener, Mode};

fuzz_target!(|data: &str| {
    let _ = Engine::new().parse(data, DocumentId::new("fuzz"));

    let engine = Engine::with_mode(Mode::Accumulate);
    let mut listener = Listener::new(DocumentId::new("fuzz"));
    let _ = engine.parse_with(data, &mut listener);
    let _ = listener.raise_if_errors_present();

    let _ = ControlBlock::parse(data, DocumentId::new("fuzz"));
});
