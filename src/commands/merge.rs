//! Sorted-stream merge-join of two annotation files.
//!
//! # Algorithm
//!
//! Classic two-way merge:
//! 1. Hold one current record per input
//! 2. Emit whichever has the smaller key; on equal keys emit A first
//! 3. Advance that input; when one side ends, copy the other
//!
//! Records sharing a key are not deduplicated across inputs: both are
//! written, A's group before B's.
//!
//! # Memory Complexity
//!
//! O(1) - one buffered record per input.
//!
//! # Requirements
//!
//! Both inputs MUST be sorted by key (byte-wise lexicographic). The
//! command does not sort; out-of-order input is rejected unless
//! `assume_sorted` is set.

use crate::annotation::{AnnotationReader, AnnotationRecord};
use crate::config::RunConfig;
use crate::error::Result;
use crate::schema::SchemaType;
use crate::streaming::{open_output, source_name, KeyOrderValidator, RecordWriter};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info, trace};

/// Merge-join command configuration.
#[derive(Debug, Clone)]
pub struct MergeCommand {
    pub schema: SchemaType,
    /// Emit the schema header once at the start of the output.
    pub write_header: bool,
    /// Skip inline key-order validation.
    pub assume_sorted: bool,
}

impl MergeCommand {
    pub fn new(schema: SchemaType) -> Self {
        Self {
            schema,
            write_header: true,
            assume_sorted: false,
        }
    }

    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    pub fn with_assume_sorted(mut self, assume_sorted: bool) -> Self {
        self.assume_sorted = assume_sorted;
        self
    }

    /// Merge two annotation files into `output_path`.
    pub fn run(
        &self,
        a_path: &Path,
        b_path: &Path,
        output_path: &Path,
        config: &RunConfig,
    ) -> Result<MergeStats> {
        let reader_a = AnnotationReader::from_path(a_path, self.schema)?;
        let reader_b = AnnotationReader::from_path(b_path, self.schema)?;
        let sink = open_output(output_path)?;
        let mut writer = RecordWriter::new(sink, source_name(output_path));

        let stats = self.run_streaming(reader_a, reader_b, &mut writer, config)?;

        writer.finish()?;
        info!(
            "merged {} and {} into {}: {}",
            a_path.display(),
            b_path.display(),
            output_path.display(),
            stats
        );
        Ok(stats)
    }

    /// Core merge-join over two readers.
    ///
    /// Holds only the current record of each input.
    pub fn run_streaming<RA: BufRead, RB: BufRead, W: Write>(
        &self,
        mut reader_a: AnnotationReader<RA>,
        mut reader_b: AnnotationReader<RB>,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        let mut side_a = MergeSide::new(&mut reader_a, self.assume_sorted);
        let mut side_b = MergeSide::new(&mut reader_b, self.assume_sorted);

        if self.write_header {
            writer.write_line(&self.schema.header_line())?;
        }

        let mut current_a = side_a.advance()?;
        let mut current_b = side_b.advance()?;

        loop {
            let take_a = match (&current_a, &current_b) {
                (Some(a), Some(b)) => a.key() <= b.key(),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            let record = if take_a {
                std::mem::replace(&mut current_a, side_a.advance()?)
            } else {
                std::mem::replace(&mut current_b, side_b.advance()?)
            };
            if let Some(record) = record {
                if config.trace {
                    let side = if take_a { "A" } else { "B" };
                    trace!(key = record.key(), side, "merge");
                }
                writer.write_line(record.raw())?;
                stats.records_written += 1;
            }
        }

        writer.flush()?;
        stats.records_read_a = side_a.records_read;
        stats.records_read_b = side_b.records_read;
        if config.verbose {
            debug!(
                "merge inputs: A had header: {}, B had header: {}",
                reader_a.had_header(),
                reader_b.had_header()
            );
        }
        Ok(stats)
    }
}

/// One input of the merge with its order validator.
struct MergeSide<'a, R: BufRead> {
    reader: &'a mut AnnotationReader<R>,
    validator: Option<KeyOrderValidator>,
    records_read: usize,
}

impl<'a, R: BufRead> MergeSide<'a, R> {
    fn new(reader: &'a mut AnnotationReader<R>, assume_sorted: bool) -> Self {
        Self {
            reader,
            validator: (!assume_sorted).then(KeyOrderValidator::new),
            records_read: 0,
        }
    }

    fn advance(&mut self) -> Result<Option<AnnotationRecord>> {
        let record = self.reader.read_record()?;
        if let Some(ref rec) = record {
            self.records_read += 1;
            if let Some(ref mut validator) = self.validator {
                validator.validate(rec.key(), self.reader.source_name())?;
            }
        }
        Ok(record)
    }
}

/// Statistics from a merge-join.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Records read from the first input
    pub records_read_a: usize,
    /// Records read from the second input
    pub records_read_b: usize,
    /// Records written to the output
    pub records_written: usize,
}

impl std::fmt::Display for MergeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read A: {}, Read B: {}, Written: {}",
            self.records_read_a, self.records_read_b, self.records_written
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blast_row(key: &str, hit: &str) -> String {
        SchemaType::Blast
            .encode(&[
                key, key, "", "1", "1", "1", hit, "desc", hit, "1e-10", "95.0", "90", "0", "100",
            ])
            .unwrap()
    }

    fn make_content(rows: &[(&str, &str)]) -> String {
        rows.iter()
            .map(|(k, h)| blast_row(k, h))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn run_merge(cmd: &MergeCommand, a: &str, b: &str) -> Result<(Vec<String>, MergeStats)> {
        let reader_a = AnnotationReader::new(a.as_bytes(), cmd.schema);
        let reader_b = AnnotationReader::new(b.as_bytes(), cmd.schema);
        let mut writer = RecordWriter::new(Vec::new(), "mem");
        let stats = cmd.run_streaming(reader_a, reader_b, &mut writer, &RunConfig::new())?;
        let output = String::from_utf8(writer.into_inner()?).unwrap();
        Ok((output.lines().map(str::to_string).collect(), stats))
    }

    fn keys(lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.split(';').next().unwrap().trim_matches('"').to_string())
            .collect()
    }

    #[test]
    fn test_basic_merge() {
        let a = make_content(&[("g1", "h1"), ("g3", "h3")]);
        let b = make_content(&[("g2", "h2"), ("g3", "h4")]);
        let cmd = MergeCommand::new(SchemaType::Blast).with_header(false);

        let (lines, stats) = run_merge(&cmd, &a, &b).unwrap();

        assert_eq!(keys(&lines), vec!["g1", "g2", "g3", "g3"]);
        assert_eq!(stats.records_read_a, 2);
        assert_eq!(stats.records_read_b, 2);
        assert_eq!(stats.records_written, 4);
    }

    #[test]
    fn test_tie_prefers_a() {
        let a = make_content(&[("x", "a1")]);
        let b = make_content(&[("x", "b1")]);
        let cmd = MergeCommand::new(SchemaType::Blast).with_header(false);

        let (lines, _) = run_merge(&cmd, &a, &b).unwrap();

        assert_eq!(lines, vec![blast_row("x", "a1"), blast_row("x", "b1")]);
    }

    #[test]
    fn test_tie_drains_whole_group_of_a() {
        let a = make_content(&[("x", "a1"), ("x", "a2"), ("y", "a3")]);
        let b = make_content(&[("x", "b1"), ("y", "b2")]);
        let cmd = MergeCommand::new(SchemaType::Blast).with_header(false);

        let (lines, _) = run_merge(&cmd, &a, &b).unwrap();

        let hits: Vec<_> = lines.iter().map(|l| l.split(';').nth(6).unwrap()).collect();
        assert_eq!(hits, vec!["\"a1\"", "\"a2\"", "\"b1\"", "\"a3\"", "\"b2\""]);
    }

    #[test]
    fn test_header_written_once() {
        let header = SchemaType::Blast.header_line();
        let a = format!("{}\n{}", header, make_content(&[("g1", "h1")]));
        let b = format!("{}\n{}", header, make_content(&[("g2", "h2")]));
        let cmd = MergeCommand::new(SchemaType::Blast);

        let (lines, stats) = run_merge(&cmd, &a, &b).unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header);
        assert_eq!(stats.records_written, 2);
    }

    #[test]
    fn test_empty_side_copies_other() {
        let a = make_content(&[("g1", "h1"), ("g2", "h2")]);
        let cmd = MergeCommand::new(SchemaType::Blast).with_header(false);

        let (lines, stats) = run_merge(&cmd, "", &a).unwrap();
        assert_eq!(keys(&lines), vec!["g1", "g2"]);
        assert_eq!(stats.records_read_a, 0);

        let (lines, _) = run_merge(&cmd, &a, "").unwrap();
        assert_eq!(keys(&lines), vec!["g1", "g2"]);

        let (lines, stats) = run_merge(&cmd, "", "").unwrap();
        assert!(lines.is_empty());
        assert_eq!(stats.records_written, 0);
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let a = make_content(&[("g3", "h1"), ("g1", "h2")]);
        let cmd = MergeCommand::new(SchemaType::Blast);
        assert!(run_merge(&cmd, &a, "").is_err());

        let lenient = cmd.with_assume_sorted(true).with_header(false);
        let (lines, _) = run_merge(&lenient, &a, "").unwrap();
        assert_eq!(keys(&lines), vec!["g3", "g1"]);
    }
}
