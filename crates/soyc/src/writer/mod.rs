//! Streaming output for report documents
//!
//! Documents are assembled in a bounded string buffer that is handed to the
//! underlying sink whenever it grows past a threshold, so no document is ever
//! held in memory as a whole.

mod artifact;
mod xml;

use std::{
    fmt,
    io::{self, Write},
};

pub use artifact::{ReportKind, ReportSink, open_report};
pub use xml::{escape_attr, escape_text};

/// Default number of buffered bytes before a flush, 64 KiB
pub const DEFAULT_FLUSH_THRESHOLD: usize = 64 * 1024;

/// Batches logical writes and forwards them to `W` in threshold-sized chunks
#[derive(Debug)]
pub struct FlushingWriter<W: Write> {
    inner: W,
    buffer: String,
    threshold: usize,
}

impl<W: Write> FlushingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_threshold(inner, DEFAULT_FLUSH_THRESHOLD)
    }

    pub fn with_threshold(inner: W, threshold: usize) -> Self {
        Self {
            inner,
            buffer: String::with_capacity(threshold.min(DEFAULT_FLUSH_THRESHOLD)),
            threshold: threshold.max(1),
        }
    }

    pub fn push_str(&mut self, text: &str) -> io::Result<()> {
        self.buffer.push_str(text);
        self.flush_if_full()
    }

    /// Formatted write, so `write!` works directly on the writer
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        fmt::Write::write_fmt(&mut self.buffer, args)
            .map_err(|_| io::Error::other("formatting a report entry failed"))?;
        self.flush_if_full()
    }

    /// Bytes currently held back
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Hand everything buffered so far to the inner writer
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.inner.write_all(self.buffer.as_bytes())?;
            self.buffer.clear();
        }
        self.inner.flush()
    }

    /// Flush the remainder and give back the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn flush_if_full(&mut self) -> io::Result<()> {
        if self.buffer.len() >= self.threshold {
            self.inner.write_all(self.buffer.as_bytes())?;
            self.buffer.clear();
        }
        Ok(())
    }
}
