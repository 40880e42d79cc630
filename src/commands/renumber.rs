//! Re-identification of a FASTA stream.
//!
//! Every record gets a new sequential identifier (`SEQ000000001`, ...)
//! and the `"new_id";"old_id"` pair is written to a relationship file, so
//! the original identifiers can be restored after downstream tools have
//! run on the short, uniform ids.

use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::fasta::{FastaReader, SequenceRecord};
use crate::ids::RelationshipWriter;
use crate::streaming::{open_output, source_name, RecordWriter};
use rustc_hash::FxHashSet;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, trace};

/// Renumbering command configuration.
#[derive(Debug, Clone)]
pub struct RenumberCommand {
    pub prefix: String,
    /// Zero-padded width of the counter.
    pub width: usize,
}

impl Default for RenumberCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl RenumberCommand {
    pub fn new() -> Self {
        Self {
            prefix: "SEQ".to_string(),
            width: 9,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    fn new_id(&self, number: usize) -> String {
        format!("{}{:0width$}", self.prefix, number, width = self.width)
    }

    /// Renumber `input_path` into `output_path`, writing the pairs to
    /// `relationship_path`.
    ///
    /// Neither output is created until the first input record decodes.
    pub fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        relationship_path: &Path,
        config: &RunConfig,
    ) -> Result<RenumberStats> {
        let mut reader = FastaReader::from_path(input_path)?;
        let first = reader.read_record()?;

        let mut writer = RecordWriter::new(open_output(output_path)?, source_name(output_path));
        let mut relationships = RelationshipWriter::new(
            open_output(relationship_path)?,
            source_name(relationship_path),
        )?;

        let stats = self.drain(first, reader, &mut writer, &mut relationships, config)?;
        writer.finish()?;
        relationships.finish()?;

        info!(
            "renumbered {} into {} ({}): {}",
            input_path.display(),
            output_path.display(),
            relationship_path.display(),
            stats
        );
        Ok(stats)
    }

    /// Core renumbering pass.
    ///
    /// Duplicate identifiers in the input are rejected: they would make the
    /// relationship map ambiguous.
    pub fn run_streaming<R: BufRead, W: Write, M: Write>(
        &self,
        mut reader: FastaReader<R>,
        writer: &mut RecordWriter<W>,
        relationships: &mut RelationshipWriter<M>,
        config: &RunConfig,
    ) -> Result<RenumberStats> {
        let first = reader.read_record()?;
        self.drain(first, reader, writer, relationships, config)
    }

    fn drain<R: BufRead, W: Write, M: Write>(
        &self,
        first: Option<SequenceRecord>,
        mut reader: FastaReader<R>,
        writer: &mut RecordWriter<W>,
        relationships: &mut RelationshipWriter<M>,
        config: &RunConfig,
    ) -> Result<RenumberStats> {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut stats = RenumberStats::default();

        let mut next = first;
        while let Some(record) = next {
            stats.records += 1;
            if !seen.insert(record.seq_id.clone()) {
                return Err(EngineError::format(
                    reader.source_name(),
                    reader.record_count(),
                    format!("duplicate identifier '{}'", record.seq_id),
                ));
            }

            let new_id = self.new_id(stats.records);
            if config.trace {
                trace!(old = %record.seq_id, new = %new_id, "renumber");
            }
            record.with_id(&new_id).write_to(writer)?;
            relationships.write_pair(&new_id, &record.seq_id)?;
            next = reader.read_record()?;
        }

        writer.flush()?;
        Ok(stats)
    }
}

/// Statistics from a renumbering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenumberStats {
    /// Records renumbered
    pub records: usize,
}

impl std::fmt::Display for RenumberStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Renumbered: {}", self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdRelationshipMap;

    fn renumber(cmd: &RenumberCommand, content: &str) -> Result<(String, Vec<u8>)> {
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        let mut relationships = RelationshipWriter::new(Vec::new(), "mem")?;
        cmd.run_streaming(
            FastaReader::new(content.as_bytes()),
            &mut writer,
            &mut relationships,
            &RunConfig::new(),
        )?;
        Ok((
            String::from_utf8(writer.into_inner()?).unwrap(),
            relationships.into_inner()?,
        ))
    }

    #[test]
    fn test_sequential_ids() {
        let cmd = RenumberCommand::new().with_prefix("T").with_width(3);
        let (fasta, rel) = renumber(&cmd, ">contig_a len=10\nAC\n>contig_b\nGT\n").unwrap();

        assert_eq!(fasta, ">T001 len=10\nAC\n>T002\nGT\n");
        let map = IdRelationshipMap::from_reader(rel.as_slice()).unwrap();
        assert_eq!(map.old_id("T001"), Some("contig_a"));
        assert_eq!(map.old_id("T002"), Some("contig_b"));
    }

    #[test]
    fn test_default_id_format() {
        assert_eq!(RenumberCommand::new().new_id(12), "SEQ000000012");
    }

    #[test]
    fn test_blank_lines_and_tabs_survive() {
        let cmd = RenumberCommand::new().with_prefix("T").with_width(1);
        let (fasta, _) = renumber(&cmd, ">a\tx  y\nAC\n\nGT\n").unwrap();
        assert_eq!(fasta, ">T1\tx  y\nAC\n\nGT\n");
    }

    #[test]
    fn test_headerless_input_creates_no_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fa");
        let output = dir.path().join("out.fa");
        let rel = dir.path().join("rel.csv");
        std::fs::write(&input, "ACGT\n>a\nAC\n").unwrap();

        let err = RenumberCommand::new()
            .run(&input, &output, &rel, &RunConfig::new())
            .unwrap_err();
        assert_eq!(err.kind(), "FormatError");
        assert!(!output.exists());
        assert!(!rel.exists());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = renumber(&RenumberCommand::new(), ">a\nA\n>a\nC\n").unwrap_err();
        assert!(matches!(err, EngineError::Format { record: 2, .. }));
    }
}
