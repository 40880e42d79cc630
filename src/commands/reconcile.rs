//! Identifier-keyed set operations over two FASTA streams.
//!
//! The identifiers of stream B are loaded into memory first; stream A is
//! then read once and each record kept or dropped by membership. Kept
//! records keep A's order and may have their identifier restored through
//! a relationship map.
//!
//! # Memory Complexity
//!
//! O(|ids in B|) plus the body of the current A record.

use crate::config::RunConfig;
use crate::error::Result;
use crate::fasta::{FastaReader, SequenceRecord};
use crate::ids::{IdRelationshipMap, IdentifierSet};
use crate::streaming::{open_output, source_name, RecordWriter};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, trace};

/// Which side of the membership test is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Records of A whose id is in B.
    Intersect,
    /// Records of A whose id is not in B.
    Difference,
}

impl ReconcileMode {
    #[inline]
    fn keeps(&self, is_member: bool) -> bool {
        match self {
            ReconcileMode::Intersect => is_member,
            ReconcileMode::Difference => !is_member,
        }
    }
}

impl std::fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileMode::Intersect => write!(f, "intersect"),
            ReconcileMode::Difference => write!(f, "difference"),
        }
    }
}

/// Sequence reconciliation command configuration.
#[derive(Debug, Clone)]
pub struct ReconcileCommand {
    pub mode: ReconcileMode,
}

impl ReconcileCommand {
    pub fn new(mode: ReconcileMode) -> Self {
        Self { mode }
    }

    /// Reconcile FASTA file A against the identifiers of FASTA file B.
    ///
    /// The first record of A is decoded before the output is created, so a
    /// malformed A never leaves an output file behind.
    pub fn run(
        &self,
        a_path: &Path,
        b_path: &Path,
        relationships: Option<&IdRelationshipMap>,
        output_path: &Path,
        config: &RunConfig,
    ) -> Result<ReconcileStats> {
        let ids = IdentifierSet::from_fasta(FastaReader::from_path(b_path)?)?;
        if config.verbose {
            debug!("loaded {} identifiers from {}", ids.len(), b_path.display());
        }

        let mut reader = FastaReader::from_path(a_path)?;
        let first = reader.read_record()?;

        let mut writer = RecordWriter::new(open_output(output_path)?, source_name(output_path));
        let mut stats = ReconcileStats::default();
        if let Some(record) = first {
            self.process(record, &ids, relationships, &mut writer, &mut stats, config)?;
        }
        self.drain(reader, &ids, relationships, &mut writer, &mut stats, config)?;
        writer.finish()?;

        info!(
            "{} of {} against {}: {}",
            self.mode,
            a_path.display(),
            b_path.display(),
            stats
        );
        Ok(stats)
    }

    /// Core pass over A with a prebuilt identifier set.
    pub fn run_streaming<R: BufRead, W: Write>(
        &self,
        reader: FastaReader<R>,
        ids: &IdentifierSet,
        relationships: Option<&IdRelationshipMap>,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        self.drain(reader, ids, relationships, writer, &mut stats, config)?;
        Ok(stats)
    }

    fn drain<R: BufRead, W: Write>(
        &self,
        mut reader: FastaReader<R>,
        ids: &IdentifierSet,
        relationships: Option<&IdRelationshipMap>,
        writer: &mut RecordWriter<W>,
        stats: &mut ReconcileStats,
        config: &RunConfig,
    ) -> Result<()> {
        while let Some(record) = reader.read_record()? {
            self.process(record, ids, relationships, writer, stats, config)?;
        }
        writer.flush()
    }

    fn process<W: Write>(
        &self,
        record: SequenceRecord,
        ids: &IdentifierSet,
        relationships: Option<&IdRelationshipMap>,
        writer: &mut RecordWriter<W>,
        stats: &mut ReconcileStats,
        config: &RunConfig,
    ) -> Result<()> {
        stats.records_read += 1;
        let is_member = ids.contains(&record.seq_id);
        if config.trace {
            trace!(seq_id = %record.seq_id, is_member, "reconcile");
        }
        if !self.mode.keeps(is_member) {
            return Ok(());
        }

        match relationships {
            Some(map) if !map.is_empty() => {
                let old_id = map.restore(&record.seq_id)?;
                record.with_id(old_id).write_to(writer)?;
            }
            _ => record.write_to(writer)?,
        }
        stats.records_written += 1;
        Ok(())
    }
}

/// Statistics from a reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Records read from A
    pub records_read: usize,
    /// Records written
    pub records_written: usize,
}

impl std::fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Written: {}",
            self.records_read, self.records_written
        )
    }
}
