//! Streaming annotation file reader.

use crate::error::Result;
use crate::schema::SchemaType;
use crate::streaming::{InputStream, LineSource};
use std::io::BufRead;
use std::path::Path;

/// One decoded annotation line.
///
/// Records are immutable; translation builds a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    schema: SchemaType,
    values: Vec<String>,
    raw: String,
}

impl AnnotationRecord {
    /// Build a record from field values, encoding its text form.
    pub fn from_values(schema: SchemaType, values: Vec<String>) -> Result<Self> {
        let raw = schema.encode(&values)?;
        Ok(Self {
            schema,
            values,
            raw,
        })
    }

    pub fn schema(&self) -> SchemaType {
        self.schema
    }

    /// Ordering and grouping key (the first field).
    pub fn key(&self) -> &str {
        &self.values[0]
    }

    /// The line this record was decoded from (or encoded to).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Look up a field value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.schema
            .field_index(name)
            .map(|idx| self.values[idx].as_str())
    }

    /// A copy of this record carrying a different key.
    pub fn with_key(&self, key: &str) -> Result<Self> {
        let mut values = self.values.clone();
        values[0] = key.to_string();
        Self::from_values(self.schema, values)
    }
}

/// A streaming reader of one annotation schema.
///
/// A first line equal to the schema header is consumed silently; blank
/// lines are skipped.
pub struct AnnotationReader<R: BufRead> {
    source: LineSource<R>,
    schema: SchemaType,
    record_count: usize,
    header_checked: bool,
    had_header: bool,
}

impl AnnotationReader<InputStream> {
    /// Open an annotation file (gzip by suffix).
    pub fn from_path(path: &Path, schema: SchemaType) -> Result<Self> {
        Ok(Self::from_source(LineSource::from_path(path)?, schema))
    }
}

impl<R: BufRead> AnnotationReader<R> {
    /// Create a reader from any buffered source.
    pub fn new(reader: R, schema: SchemaType) -> Self {
        Self::from_source(LineSource::new(reader, "<memory>"), schema)
    }

    fn from_source(source: LineSource<R>, schema: SchemaType) -> Self {
        Self {
            source,
            schema,
            record_count: 0,
            header_checked: false,
            had_header: false,
        }
    }

    /// Read the next record, or `None` at end of stream.
    pub fn read_record(&mut self) -> Result<Option<AnnotationRecord>> {
        loop {
            let ordinal = self.record_count + 1;
            let line = match self
                .source
                .next_line()
                .map_err(|e| e.at_record(ordinal))?
            {
                Some(line) => line,
                None => return Ok(None),
            };
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            if !self.header_checked {
                self.header_checked = true;
                if line == self.schema.header_line() {
                    self.had_header = true;
                    continue;
                }
            }

            let raw = line.to_string();
            self.record_count += 1;
            let values = self
                .schema
                .decode(&raw, self.source.name(), self.record_count)?;
            return Ok(Some(AnnotationRecord {
                schema: self.schema,
                values,
                raw,
            }));
        }
    }

    pub fn schema(&self) -> SchemaType {
        self.schema
    }

    /// Whether the stream opened with the schema header.
    ///
    /// Only meaningful once the first record has been read.
    pub fn had_header(&self) -> bool {
        self.had_header
    }

    /// Number of data records decoded so far.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Diagnostic label of the underlying source.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Get an iterator over all records.
    pub fn records(self) -> AnnotationRecordIter<R> {
        AnnotationRecordIter { reader: self }
    }
}

/// Iterator over annotation records.
pub struct AnnotationRecordIter<R: BufRead> {
    reader: AnnotationReader<R>,
}

impl<R: BufRead> Iterator for AnnotationRecordIter<R> {
    type Item = Result<AnnotationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Parse annotation records from a string (useful for testing).
pub fn parse_records(content: &str, schema: SchemaType) -> Result<Vec<AnnotationRecord>> {
    AnnotationReader::new(content.as_bytes(), schema)
        .records()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    const INTERPRO_ROW: &str = "\"t1\";\"t1\";\"p1\";\"GO:0005524\";\"\";\"\";\"\"";

    #[test]
    fn test_header_skipped() {
        let content = format!(
            "{}\n{}\n\n{}\n",
            SchemaType::Interpro.header_line(),
            INTERPRO_ROW,
            INTERPRO_ROW.replace("t1", "t2")
        );
        let mut reader = AnnotationReader::new(content.as_bytes(), SchemaType::Interpro);
        let first = reader.read_record().unwrap().unwrap();
        assert!(reader.had_header());
        assert_eq!(first.key(), "t1");
        assert_eq!(first.get("interpro_goterms"), Some("GO:0005524"));
        assert_eq!(first.raw(), INTERPRO_ROW);
        let second = reader.read_record().unwrap().unwrap();
        assert_eq!(second.key(), "t2");
        assert!(reader.read_record().unwrap().is_none());
        assert_eq!(reader.record_count(), 2);
    }

    #[test]
    fn test_headerless_stream() {
        let records = parse_records(INTERPRO_ROW, SchemaType::Interpro).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_bad_line_reports_ordinal() {
        let content = format!("{}\n\"t2\";\"broken\"\n", INTERPRO_ROW);
        let err = parse_records(&content, SchemaType::Interpro).unwrap_err();
        assert!(matches!(err, EngineError::Format { record: 2, .. }));
    }

    #[test]
    fn test_invalid_utf8_reports_ordinal() {
        let mut content = format!("{}\n{}\n", SchemaType::Interpro.header_line(), INTERPRO_ROW)
            .into_bytes();
        content.extend_from_slice(b"\"t2\";\"caf\xe9\";\"\";\"\";\"\";\"\";\"\"\n");

        let mut reader = AnnotationReader::new(content.as_slice(), SchemaType::Interpro);
        assert_eq!(reader.read_record().unwrap().unwrap().key(), "t1");
        let err = reader.read_record().unwrap_err();
        assert_eq!(err.kind(), "FormatError");
        assert!(matches!(err, EngineError::Format { record: 2, .. }));
    }

    #[test]
    fn test_with_key_reencodes() {
        let records = parse_records(INTERPRO_ROW, SchemaType::Interpro).unwrap();
        let renamed = records[0].with_key("contig_9").unwrap();
        assert_eq!(renamed.key(), "contig_9");
        assert!(renamed.raw().starts_with("\"contig_9\";\"t1\";"));
        assert_eq!(records[0].key(), "t1");
    }
}
