//! Identifier restoration through a relationship map.
//!
//! Rewrites every identifier of a FASTA or annotation stream from its new
//! (internal) form back to the original, using the pairs a renumbering
//! emitted. Record order and all other content are unchanged.

use crate::annotation::{AnnotationReader, AnnotationRecord};
use crate::config::RunConfig;
use crate::error::Result;
use crate::fasta::{FastaReader, SequenceRecord};
use crate::ids::IdRelationshipMap;
use crate::schema::SchemaType;
use crate::streaming::{open_output, source_name, RecordWriter};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, trace};

/// Kind of stream whose identifiers are restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreTarget {
    Fasta,
    Annotation(SchemaType),
}

/// Restore command configuration.
#[derive(Debug, Clone)]
pub struct RestoreCommand {
    pub target: RestoreTarget,
}

impl RestoreCommand {
    pub fn new(target: RestoreTarget) -> Self {
        Self { target }
    }

    /// Restore the identifiers of `input_path` into `output_path`.
    ///
    /// The output is created only after the first input record decodes.
    pub fn run(
        &self,
        input_path: &Path,
        relationships: &IdRelationshipMap,
        output_path: &Path,
        config: &RunConfig,
    ) -> Result<RestoreStats> {
        let stats = match self.target {
            RestoreTarget::Fasta => {
                let mut reader = FastaReader::from_path(input_path)?;
                let first = reader.read_record()?;
                let mut writer =
                    RecordWriter::new(open_output(output_path)?, source_name(output_path));
                let stats = self.fasta_from(first, reader, relationships, &mut writer, config)?;
                writer.finish()?;
                stats
            }
            RestoreTarget::Annotation(schema) => {
                let mut reader = AnnotationReader::from_path(input_path, schema)?;
                let first = reader.read_record()?;
                let mut writer =
                    RecordWriter::new(open_output(output_path)?, source_name(output_path));
                let stats =
                    self.annotation_from(first, reader, relationships, &mut writer, config)?;
                writer.finish()?;
                stats
            }
        };

        info!(
            "restored identifiers of {} into {}: {}",
            input_path.display(),
            output_path.display(),
            stats
        );
        Ok(stats)
    }

    /// Restore the header identifier of every FASTA record.
    pub fn restore_fasta<R: BufRead, W: Write>(
        &self,
        mut reader: FastaReader<R>,
        relationships: &IdRelationshipMap,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<RestoreStats> {
        let first = reader.read_record()?;
        self.fasta_from(first, reader, relationships, writer, config)
    }

    fn fasta_from<R: BufRead, W: Write>(
        &self,
        first: Option<SequenceRecord>,
        mut reader: FastaReader<R>,
        relationships: &IdRelationshipMap,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<RestoreStats> {
        let mut stats = RestoreStats::default();
        let mut next = first;
        while let Some(record) = next {
            let old_id = relationships.restore(&record.seq_id)?;
            if config.trace {
                trace!(new = %record.seq_id, old = old_id, "restore");
            }
            record.with_id(old_id).write_to(writer)?;
            stats.records += 1;
            next = reader.read_record()?;
        }
        writer.flush()?;
        Ok(stats)
    }

    /// Restore the key of every annotation record.
    ///
    /// The header line is kept when the input had one, even with no
    /// data rows after it.
    pub fn restore_annotation<R: BufRead, W: Write>(
        &self,
        mut reader: AnnotationReader<R>,
        relationships: &IdRelationshipMap,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<RestoreStats> {
        let first = reader.read_record()?;
        self.annotation_from(first, reader, relationships, writer, config)
    }

    fn annotation_from<R: BufRead, W: Write>(
        &self,
        first: Option<AnnotationRecord>,
        mut reader: AnnotationReader<R>,
        relationships: &IdRelationshipMap,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<RestoreStats> {
        if reader.had_header() {
            writer.write_line(&reader.schema().header_line())?;
        }

        let mut stats = RestoreStats::default();
        let mut next = first;
        while let Some(record) = next {
            let old_id = relationships.restore(record.key())?;
            if config.trace {
                trace!(new = record.key(), old = old_id, "restore");
            }
            writer.write_line(record.with_key(old_id)?.raw())?;
            stats.records += 1;
            next = reader.read_record()?;
        }
        writer.flush()?;
        Ok(stats)
    }
}

/// Statistics from an identifier restoration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreStats {
    /// Records rewritten
    pub records: usize,
}

impl std::fmt::Display for RestoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Restored: {}", self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn map() -> IdRelationshipMap {
        let content = "\"new_id\";\"old_id\"\n\"SEQ1\";\"contig_a\"\n\"SEQ2\";\"contig_b\"\n";
        IdRelationshipMap::from_reader(content.as_bytes()).unwrap()
    }

    #[test]
    fn test_restore_fasta() {
        let cmd = RestoreCommand::new(RestoreTarget::Fasta);
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        let stats = cmd
            .restore_fasta(
                FastaReader::new(">SEQ2 x\nAC\n>SEQ1\nGT\n".as_bytes()),
                &map(),
                &mut writer,
                &RunConfig::new(),
            )
            .unwrap();
        assert_eq!(stats.records, 2);
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, ">contig_b x\nAC\n>contig_a\nGT\n");
    }

    #[test]
    fn test_restore_annotation_keeps_header() {
        let schema = SchemaType::Interpro;
        let content = format!(
            "{}\n{}\n",
            schema.header_line(),
            schema
                .encode(&["SEQ1", "SEQ1", "", "GO:1", "", "", ""])
                .unwrap()
        );
        let cmd = RestoreCommand::new(RestoreTarget::Annotation(schema));
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        cmd.restore_annotation(
            AnnotationReader::new(content.as_bytes(), schema),
            &map(),
            &mut writer,
            &RunConfig::new(),
        )
        .unwrap();

        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], schema.header_line());
        assert!(lines[1].starts_with("\"contig_a\";\"SEQ1\";"));
    }

    #[test]
    fn test_header_only_annotation_keeps_header() {
        let schema = SchemaType::Interpro;
        let content = format!("{}\n", schema.header_line());
        let cmd = RestoreCommand::new(RestoreTarget::Annotation(schema));
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        let stats = cmd
            .restore_annotation(
                AnnotationReader::new(content.as_bytes(), schema),
                &map(),
                &mut writer,
                &RunConfig::new(),
            )
            .unwrap();

        assert_eq!(stats.records, 0);
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, content);
    }

    #[test]
    fn test_restore_fasta_is_byte_exact() {
        let cmd = RestoreCommand::new(RestoreTarget::Fasta);
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        cmd.restore_fasta(
            FastaReader::new(">SEQ1\tdesc  x\nAC\n\nGT\n".as_bytes()),
            &map(),
            &mut writer,
            &RunConfig::new(),
        )
        .unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(out, ">contig_a\tdesc  x\nAC\n\nGT\n");
    }

    #[test]
    fn test_headerless_fasta_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fa");
        let output = dir.path().join("out.fa");
        std::fs::write(&input, "ACGT\n").unwrap();

        let err = RestoreCommand::new(RestoreTarget::Fasta)
            .run(&input, &map(), &output, &RunConfig::new())
            .unwrap_err();
        assert_eq!(err.kind(), "FormatError");
        assert!(!output.exists());
    }

    #[test]
    fn test_unknown_id_is_lookup_error() {
        let cmd = RestoreCommand::new(RestoreTarget::Fasta);
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        let err = cmd
            .restore_fasta(
                FastaReader::new(">SEQ9\nAC\n".as_bytes()),
                &map(),
                &mut writer,
                &RunConfig::new(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Lookup { ref id, .. } if id == "SEQ9"));
    }
}
