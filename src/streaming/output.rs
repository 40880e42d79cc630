//! Buffered record output for streaming operations.
//!
//! Uses itoa for integer formatting to avoid allocation in the hot path.
//! Every line ends in `\n` regardless of platform.

use crate::error::{EngineError, Result};
use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use crate::streaming::io::OutputSink;
use std::io::{BufWriter, Write};

/// Line-oriented writer wrapping any output with a large buffer.
pub struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
    name: String,
    itoa_buf: itoa::Buffer,
    lines_written: usize,
}

impl<W: Write> RecordWriter<W> {
    /// Create a new RecordWriter with the default 2MB buffer.
    pub fn new(output: W, name: impl Into<String>) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output, name)
    }

    /// Create a new RecordWriter with specified buffer size.
    pub fn with_capacity(capacity: usize, output: W, name: impl Into<String>) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            name: name.into(),
            itoa_buf: itoa::Buffer::new(),
            lines_written: 0,
        }
    }

    /// Write a full line followed by newline.
    #[inline]
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_bytes(line.as_bytes())?;
        self.write_newline()
    }

    /// Write raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| EngineError::io(&self.name, e))
    }

    /// Write an integer using itoa.
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        let formatted = self.itoa_buf.format(n);
        self.writer
            .write_all(formatted.as_bytes())
            .map_err(|e| EngineError::io(&self.name, e))
    }

    /// Terminate the current line.
    #[inline]
    pub fn write_newline(&mut self) -> Result<()> {
        self.lines_written += 1;
        self.write_bytes(b"\n")
    }

    /// Number of complete lines written.
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Flush the output buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| EngineError::io(&self.name, e))
    }

    /// Flush and hand back the wrapped output.
    pub fn into_inner(self) -> Result<W> {
        let name = self.name;
        self.writer
            .into_inner()
            .map_err(|e| EngineError::io(&name, e.into_error()))
    }
}

impl RecordWriter<OutputSink> {
    /// Flush the buffer and finalize the sink (gzip trailer, close).
    pub fn finish(self) -> Result<()> {
        let name = self.name.clone();
        self.into_inner()?
            .finish()
            .map_err(|e| EngineError::io(&name, e))
    }
}
