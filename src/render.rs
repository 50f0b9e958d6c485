//! The renderer: flattens a [`Resolved`] template into text.

use std::fmt::{self, Write};
use std::io;

use crate::eval::{self, Piece, Resolved};
use crate::{Context, Error, ErrorKind, Result, Value};

/// Adapts an [`io::Write`] to [`fmt::Write`], keeping the I/O error so it
/// can be surfaced instead of the opaque [`fmt::Error`].
pub(crate) struct Writer<W> {
    writer: W,
    err: Option<io::Error>,
}

impl<'template, 'source> Resolved<'template, 'source> {
    /// Renders to a string, substituting every variable from `ctx`.
    pub fn render(&self, ctx: &Context) -> Result<String> {
        let mut buf = String::with_capacity(self.template.source.len());
        self.render_to(&mut buf, ctx)?;
        Ok(buf)
    }

    /// Renders to an [`io::Write`].
    pub fn render_to_writer<W>(&self, writer: W, ctx: &Context) -> Result<()>
    where
        W: io::Write,
    {
        let mut w = Writer::new(writer);
        self.render_to(&mut w, ctx).map_err(|err| match w.take_err() {
            Some(io) => Error::from(io),
            None => err,
        })
    }

    fn render_to(&self, f: &mut dyn Write, ctx: &Context) -> Result<()> {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => f.write_str(text).map_err(|_| err_write())?,
                Piece::Var(var) => {
                    let value = eval::lookup(self.template, var, ctx)?;
                    format_value(f, value).map_err(|e| match e {
                        FormatError::Map => eval::err_at(
                            self.template,
                            var,
                            ErrorKind::Render,
                            format!("`{}` is a map and cannot be rendered", var.name()),
                        ),
                        FormatError::Write => err_write(),
                    })?;
                    tracing::trace!(var = var.name(), "substituted variable");
                }
            }
        }
        Ok(())
    }
}

enum FormatError {
    Map,
    Write,
}

impl From<fmt::Error> for FormatError {
    fn from(_: fmt::Error) -> Self {
        Self::Write
    }
}

/// Writes a value the way it appears in rendered output.
///
/// Lists render their items joined with `", "`.
fn format_value(f: &mut dyn Write, value: &Value) -> std::result::Result<(), FormatError> {
    match value {
        Value::None => {}
        Value::Bool(b) => write!(f, "{b}")?,
        Value::Integer(n) => write!(f, "{n}")?,
        Value::Float(n) => write!(f, "{n}")?,
        Value::String(s) => f.write_str(s)?,
        Value::List(list) => {
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                format_value(f, item)?;
            }
        }
        Value::Map(_) => return Err(FormatError::Map),
    }
    Ok(())
}

/// For a [`Writer`] the stored I/O error replaces this one.
fn err_write() -> Error {
    Error::new(ErrorKind::Io, "failed to write output")
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer, err: None }
    }

    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

impl<W> fmt::Write for Writer<W>
where
    W: io::Write,
{
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.writer.write_all(s.as_bytes()).map_err(|e| {
            self.err = Some(e);
            fmt::Error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(value: Value) -> String {
        let mut s = String::new();
        assert!(format_value(&mut s, &value).is_ok());
        s
    }

    #[test]
    fn format_value_scalars() {
        assert_eq!(render(Value::None), "");
        assert_eq!(render(Value::from(true)), "true");
        assert_eq!(render(Value::from(42)), "42");
        assert_eq!(render(Value::from(1.5)), "1.5");
        assert_eq!(render(Value::from("555-0100")), "555-0100");
    }

    #[test]
    fn format_value_list() {
        assert_eq!(render(Value::from(vec!["Alice", "Bob"])), "Alice, Bob");
        assert_eq!(render(Value::List(Vec::new())), "");
    }

    #[test]
    fn format_value_map_fails() {
        let mut s = String::new();
        let value = Value::Map(Default::default());
        assert!(matches!(format_value(&mut s, &value), Err(FormatError::Map)));
    }
}
