//! Transparent gzip sources and sinks.
//!
//! Compression is chosen from the file name alone: a `.gz`, `.gzip` or
//! `.bgz` suffix means gzip, anything else is plain text. `-` stands for
//! stdin/stdout.

use crate::error::{EngineError, Result};
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

const COMPRESSED_SUFFIXES: [&str; 3] = ["gz", "gzip", "bgz"];

/// Boxed input stream returned by [`open_input`].
pub type InputStream = Box<dyn BufRead>;

/// Whether the path names a gzip file by convention.
pub fn is_compressed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            COMPRESSED_SUFFIXES
                .iter()
                .any(|suffix| ext.eq_ignore_ascii_case(suffix))
        })
        .unwrap_or(false)
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Label used in diagnostics for a path.
pub fn source_name(path: &Path) -> String {
    if is_stdio(path) {
        "<stdio>".to_string()
    } else {
        path.display().to_string()
    }
}

/// Open a path for sequential reading, decompressing when the suffix says so.
pub fn open_input(path: &Path) -> Result<InputStream> {
    if is_stdio(path) {
        return Ok(Box::new(BufReader::with_capacity(
            DEFAULT_INPUT_BUFFER,
            io::stdin(),
        )));
    }

    let file = File::open(path).map_err(|e| EngineError::open(path, e))?;
    if is_compressed(path) {
        Ok(Box::new(BufReader::with_capacity(
            DEFAULT_INPUT_BUFFER,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(DEFAULT_INPUT_BUFFER, file)))
    }
}

/// Open a path for writing, compressing when the suffix says so.
pub fn open_output(path: &Path) -> Result<OutputSink> {
    if is_stdio(path) {
        return Ok(OutputSink::Stdout(io::stdout()));
    }

    let file = File::create(path).map_err(|e| EngineError::create(path, e))?;
    if is_compressed(path) {
        Ok(OutputSink::Gzip(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(OutputSink::Plain(file))
    }
}

/// A file (or stdout) opened for writing.
///
/// Callers buffer in front of the sink. [`OutputSink::finish`] must be
/// called to write the gzip trailer; dropping the sink still closes the
/// handle.
pub enum OutputSink {
    Plain(File),
    Gzip(GzEncoder<File>),
    Stdout(io::Stdout),
}

impl OutputSink {
    /// Flush and finalize the sink, closing the underlying file.
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputSink::Plain(mut file) => file.flush(),
            OutputSink::Gzip(encoder) => encoder.finish().map(|_| ()),
            OutputSink::Stdout(mut stdout) => stdout.flush(),
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Plain(file) => file.write(buf),
            OutputSink::Gzip(encoder) => encoder.write(buf),
            OutputSink::Stdout(stdout) => stdout.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(file) => file.flush(),
            OutputSink::Gzip(encoder) => encoder.flush(),
            OutputSink::Stdout(stdout) => stdout.flush(),
        }
    }
}

/// Line-at-a-time reader that tracks the physical line number.
///
/// Line terminators (`\n` or `\r\n`) are stripped from returned lines.
/// A line that is not valid UTF-8 is a format error on that line.
pub struct LineSource<R: BufRead> {
    reader: R,
    name: String,
    line_number: usize,
    buffer: Vec<u8>,
}

impl LineSource<InputStream> {
    /// Open a path through [`open_input`].
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(open_input(path)?, source_name(path)))
    }
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_number: 0,
            buffer: Vec::with_capacity(DEFAULT_LINE_BUFFER),
        }
    }

    /// Read the next line, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<&str>> {
        self.buffer.clear();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|e| EngineError::io(&self.name, e))?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let mut end = self.buffer.len();
        if self.buffer[..end].ends_with(b"\n") {
            end -= 1;
            if self.buffer[..end].ends_with(b"\r") {
                end -= 1;
            }
        }
        match std::str::from_utf8(&self.buffer[..end]) {
            Ok(line) => Ok(Some(line)),
            Err(e) => Err(EngineError::format(
                &self.name,
                self.line_number,
                format!("line is not valid UTF-8 at byte {}", e.valid_up_to()),
            )),
        }
    }

    /// Number of physical lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Diagnostic label of this source.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;

    #[test]
    fn test_suffix_detection() {
        assert!(is_compressed(Path::new("annotation.csv.gz")));
        assert!(is_compressed(Path::new("reads.fasta.GZ")));
        assert!(is_compressed(Path::new("x.bgz")));
        assert!(!is_compressed(Path::new("annotation.csv")));
        assert!(!is_compressed(Path::new("gz")));
    }

    #[test]
    fn test_line_source_strips_terminators() {
        let mut source = LineSource::new("a\r\nb\n\nc".as_bytes(), "mem");
        assert_eq!(source.next_line().unwrap(), Some("a"));
        assert_eq!(source.next_line().unwrap(), Some("b"));
        assert_eq!(source.next_line().unwrap(), Some(""));
        assert_eq!(source.next_line().unwrap(), Some("c"));
        assert_eq!(source.line_number(), 4);
        assert_eq!(source.next_line().unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let mut source = LineSource::new(&b"ok\ncaf\xe9\n"[..], "mem");
        assert_eq!(source.next_line().unwrap(), Some("ok"));
        match source.next_line() {
            Err(EngineError::Format {
                source_name,
                record,
                message,
            }) => {
                assert_eq!(source_name, "mem");
                assert_eq!(record, 2);
                assert!(message.contains("byte 3"), "{}", message);
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_gzip_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt.gz");

        let mut sink = open_output(&path).unwrap();
        sink.write_all(b"line one\nline two\n").unwrap();
        sink.finish().unwrap();

        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let mut source = LineSource::from_path(&path).unwrap();
        assert_eq!(source.next_line().unwrap(), Some("line one"));
        assert_eq!(source.next_line().unwrap(), Some("line two"));
        assert_eq!(source.next_line().unwrap(), None);
    }

    #[test]
    fn test_missing_input_is_path_error() {
        let path = PathBuf::from("/definitely/not/here.fasta");
        match open_input(&path) {
            Err(EngineError::Path { path: p, .. }) => assert_eq!(p, path),
            Err(other) => panic!("expected path error, got {other}"),
            Ok(_) => panic!("expected path error"),
        }
    }

    #[test]
    fn test_unwritable_output_is_path_error() {
        let path = PathBuf::from("/definitely/not/here/out.csv");
        assert!(matches!(
            open_output(&path),
            Err(EngineError::Path { .. })
        ));
    }
}
