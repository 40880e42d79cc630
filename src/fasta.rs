//! Streaming FASTA reader and writer.
//!
//! The sequence payload is opaque: body lines are carried through
//! unchanged and only buffered until the record is forwarded or dropped.

use crate::error::{EngineError, Result};
use crate::streaming::{InputStream, LineSource, RecordWriter};
use std::io::{BufRead, Write};
use std::path::Path;

/// A FASTA record: identifier, header tail, body lines.
///
/// `header_tail` is the header text after the identifier exactly as read,
/// separator included, so rewriting a record only ever touches the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub seq_id: String,
    pub header_tail: String,
    pub body: Vec<String>,
}

impl SequenceRecord {
    pub fn new(seq_id: impl Into<String>, body: Vec<String>) -> Self {
        Self {
            seq_id: seq_id.into(),
            header_tail: String::new(),
            body,
        }
    }

    /// Free-text description following the identifier.
    pub fn description(&self) -> &str {
        self.header_tail.trim()
    }

    /// Header line including the leading `>`.
    pub fn header_line(&self) -> String {
        format!(">{}{}", self.seq_id, self.header_tail)
    }

    /// A copy of this record under another identifier.
    pub fn with_id(&self, seq_id: &str) -> Self {
        Self {
            seq_id: seq_id.to_string(),
            header_tail: self.header_tail.clone(),
            body: self.body.clone(),
        }
    }

    /// Write the header and body lines.
    pub fn write_to<W: Write>(&self, writer: &mut RecordWriter<W>) -> Result<()> {
        writer.write_line(&self.header_line())?;
        for line in &self.body {
            writer.write_line(line)?;
        }
        Ok(())
    }
}

/// A streaming FASTA reader.
pub struct FastaReader<R: BufRead> {
    source: LineSource<R>,
    pending_header: Option<String>,
    record_count: usize,
}

impl FastaReader<InputStream> {
    /// Open a FASTA file (gzip by suffix).
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::from_source(LineSource::from_path(path)?))
    }
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self::from_source(LineSource::new(reader, "<memory>"))
    }

    fn from_source(source: LineSource<R>) -> Self {
        Self {
            source,
            pending_header: None,
            record_count: 0,
        }
    }

    /// Read the next record, or `None` at end of stream.
    ///
    /// A stream whose first non-empty line is not a `>` header is a
    /// format error. Every line after the first header up to the next one,
    /// blank lines included, belongs to the body.
    pub fn read_record(&mut self) -> Result<Option<SequenceRecord>> {
        let header = match self.pending_header.take() {
            Some(header) => header,
            None => match self.first_header()? {
                Some(header) => header,
                None => return Ok(None),
            },
        };
        self.record_count += 1;
        let (seq_id, header_tail) = self.parse_header(&header)?;

        let ordinal = self.record_count;
        let mut body = Vec::new();
        while let Some(line) = self
            .source
            .next_line()
            .map_err(|e| e.at_record(ordinal))?
        {
            if line.starts_with('>') {
                self.pending_header = Some(line.to_string());
                break;
            }
            body.push(line.to_string());
        }

        Ok(Some(SequenceRecord {
            seq_id,
            header_tail,
            body,
        }))
    }

    fn first_header(&mut self) -> Result<Option<String>> {
        let ordinal = self.record_count + 1;
        while let Some(line) = self
            .source
            .next_line()
            .map_err(|e| e.at_record(ordinal))?
        {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('>') {
                return Ok(Some(line.to_string()));
            }
            let found: String = line.chars().take(20).collect();
            return Err(EngineError::format(
                self.source.name(),
                ordinal,
                format!("expected a '>' header line, found '{}'", found),
            ));
        }
        Ok(None)
    }

    fn parse_header(&self, header: &str) -> Result<(String, String)> {
        let text = header[1..].trim_start();
        let (id, tail) = match text.find(char::is_whitespace) {
            Some(idx) => text.split_at(idx),
            None => (text, ""),
        };
        if id.is_empty() {
            return Err(EngineError::format(
                self.source.name(),
                self.record_count,
                "header line has no identifier",
            ));
        }
        Ok((id.to_string(), tail.to_string()))
    }

    /// Number of records decoded so far.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Get an iterator over all records.
    pub fn records(self) -> FastaRecordIter<R> {
        FastaRecordIter { reader: self }
    }
}

/// Iterator over FASTA records.
pub struct FastaRecordIter<R: BufRead> {
    reader: FastaReader<R>,
}

impl<R: BufRead> Iterator for FastaRecordIter<R> {
    type Item = Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Parse FASTA records from a string (useful for testing).
pub fn parse_sequences(content: &str) -> Result<Vec<SequenceRecord>> {
    FastaReader::new(content.as_bytes()).records().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiline_records() {
        let content = "\n>seq1 kinase domain\nACGT\nACGT\n\n>seq2\nTTTT\n>seq3\n";
        let records = parse_sequences(content).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].seq_id, "seq1");
        assert_eq!(records[0].description(), "kinase domain");
        assert_eq!(records[0].body, vec!["ACGT", "ACGT", ""]);
        assert_eq!(records[1].header_line(), ">seq2");
        assert!(records[2].body.is_empty());
    }

    #[test]
    fn test_missing_leading_header() {
        let err = parse_sequences("ACGT\n>seq1\nACGT\n").unwrap_err();
        assert!(matches!(err, EngineError::Format { record: 1, .. }));
    }

    #[test]
    fn test_empty_identifier() {
        assert!(parse_sequences(">\nACGT\n").is_err());
    }

    #[test]
    fn test_write_round_trip() {
        let content = ">seq1 desc\nAC\nGT\n>seq2\nTT\n";
        let records = parse_sequences(content).unwrap();

        let mut writer = RecordWriter::new(Vec::new(), "mem");
        for record in &records {
            record.write_to(&mut writer).unwrap();
        }
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(output, content);
    }

    #[test]
    fn test_write_is_byte_exact() {
        let content = ">s1\tdesc  x \nAC\n\nGT\n>s2\n\n";
        let records = parse_sequences(content).unwrap();
        assert_eq!(records[0].seq_id, "s1");
        assert_eq!(records[0].header_tail, "\tdesc  x ");
        assert_eq!(records[0].body, vec!["AC", "", "GT"]);
        assert_eq!(records[1].body, vec![""]);

        let mut writer = RecordWriter::new(Vec::new(), "mem");
        for record in &records {
            record.with_id(&record.seq_id).write_to(&mut writer).unwrap();
        }
        assert_eq!(writer.into_inner().unwrap(), content.as_bytes());
    }

    #[test]
    fn test_invalid_utf8_in_body_names_record() {
        let content = b">s1\nAC\n>s2\nG\xffT\n";
        let err = FastaReader::new(&content[..]).records().nth(1).unwrap().unwrap_err();
        assert!(matches!(err, EngineError::Format { record: 2, .. }));
    }

    #[test]
    fn test_with_id_keeps_description() {
        let records = parse_sequences(">old_1 some protein\nMK\n").unwrap();
        let renamed = records[0].with_id("new_1");
        assert_eq!(renamed.header_line(), ">new_1 some protein");
        assert_eq!(renamed.body, records[0].body);
    }
}
