//! Newline-delimited JSON on any writer, normally stdout.

use super::{Transport, TransportError};
use std::io::{self, Write};

pub struct WriterTransport<W: Write> {
    writer: W,
    name: String,
}

impl WriterTransport<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), "stdout")
    }
}

impl<W: Write> WriterTransport<W> {
    pub fn new(writer: W, name: impl Into<String>) -> Self {
        Self {
            writer,
            name: name.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for WriterTransport<W> {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(payload)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.name.clone()
    }
}
