//! Membership extraction of annotation records.
//!
//! Keeps the records whose normalized key is in an identifier set and
//! counts, per identifier, how many records were kept.
//!
//! # Memory Complexity
//!
//! O(|ids|) - the identifier set and its counters. Records stream through.

use crate::annotation::AnnotationReader;
use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::ids::{IdentifierSet, KeyNormalizer};
use crate::schema::SchemaType;
use crate::streaming::{open_output, source_name, RecordWriter};
use rustc_hash::FxHashMap;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, trace};

/// Extraction command configuration.
#[derive(Debug, Clone)]
pub struct ExtractCommand {
    pub schema: SchemaType,
    pub normalizer: KeyNormalizer,
    /// Emit the schema header at the start of the output.
    pub write_header: bool,
}

impl ExtractCommand {
    pub fn new(schema: SchemaType) -> Self {
        Self {
            schema,
            normalizer: KeyNormalizer::default(),
            write_header: true,
        }
    }

    pub fn with_normalizer(mut self, normalizer: KeyNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    /// Filter `input_path` against `ids` into `output_path`.
    ///
    /// When `report_path` is given the per-identifier counts are written
    /// there.
    pub fn run(
        &self,
        input_path: &Path,
        ids: &IdentifierSet,
        output_path: &Path,
        report_path: Option<&Path>,
        config: &RunConfig,
    ) -> Result<ExtractStats> {
        let reader = AnnotationReader::from_path(input_path, self.schema)?;
        let mut writer = RecordWriter::new(open_output(output_path)?, source_name(output_path));

        let stats = self.run_streaming(reader, ids, &mut writer, config)?;
        writer.finish()?;

        if let Some(report_path) = report_path {
            let mut report =
                RecordWriter::new(open_output(report_path)?, source_name(report_path));
            stats.write_report(&mut report)?;
            report.finish()?;
        }

        info!(
            "extracted from {}: {}",
            input_path.display(),
            stats
        );
        Ok(stats)
    }

    /// Core one-pass filter.
    pub fn run_streaming<R: BufRead, W: Write>(
        &self,
        mut reader: AnnotationReader<R>,
        ids: &IdentifierSet,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<ExtractStats> {
        if reader.schema() != self.schema {
            return Err(EngineError::Argument(format!(
                "reader decodes {} records but extraction was configured for {}",
                reader.schema(),
                self.schema
            )));
        }

        let mut counts: FxHashMap<String, u64> =
            ids.iter().map(|id| (id.to_string(), 0)).collect();
        let mut stats = ExtractStats::default();

        if self.write_header {
            writer.write_line(&self.schema.header_line())?;
        }

        while let Some(record) = reader.read_record()? {
            stats.records_read += 1;
            let key = self.normalizer.normalize(record.key());
            if let Some(count) = counts.get_mut(key) {
                *count += 1;
                writer.write_line(record.raw())?;
                stats.records_written += 1;
                if config.trace {
                    trace!(key = record.key(), normalized = key, "kept");
                }
            }
        }
        writer.flush()?;

        let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
        counts.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        stats.counts = counts;

        if config.verbose {
            let matched = stats.counts.iter().filter(|(_, n)| *n > 0).count();
            debug!(
                "{} of {} identifiers matched at least one record",
                matched,
                stats.counts.len()
            );
        }
        Ok(stats)
    }
}

/// Statistics from an extraction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    /// Records read from the input
    pub records_read: usize,
    /// Records kept
    pub records_written: usize,
    /// Records kept per identifier, sorted by identifier. Identifiers
    /// never seen carry 0.
    pub counts: Vec<(String, u64)>,
}

impl ExtractStats {
    /// Count for one identifier, if it was in the set.
    pub fn count(&self, id: &str) -> Option<u64> {
        self.counts
            .binary_search_by(|(k, _)| k.as_str().cmp(id))
            .ok()
            .map(|idx| self.counts[idx].1)
    }

    /// Serialize the per-identifier counts as a `;`-separated report.
    pub fn write_report<W: Write>(&self, writer: &mut RecordWriter<W>) -> Result<()> {
        writer.write_line("\"seq_id\";\"record_count\"")?;
        for (id, count) in &self.counts {
            writer.write_bytes(b"\"")?;
            writer.write_bytes(id.as_bytes())?;
            writer.write_bytes(b"\";")?;
            writer.write_int(*count)?;
            writer.write_newline()?;
        }
        writer.flush()
    }
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Written: {}, Identifiers: {}",
            self.records_read,
            self.records_written,
            self.counts.len()
        )
    }
}
