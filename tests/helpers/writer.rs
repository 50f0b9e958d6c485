#![allow(dead_code)]

use std::io;

/// An in-memory writer that starts failing after a number of writes.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
    writes: usize,
    max_writes: Option<usize>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(max_writes: usize) -> Self {
        Self {
            max_writes: Some(max_writes),
            ..Self::default()
        }
    }

    #[track_caller]
    pub fn into_string(self) -> String {
        String::from_utf8(self.buf).unwrap()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        if matches!(self.max_writes, Some(max) if self.writes > max) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
