//! Structural merge of BLAST XML documents.
//!
//! Several BLAST XML reports, each a run of `<Iteration>` blocks inside
//! the same framing, become one report:
//! - framing before the first iteration comes from the first document only
//! - closing framing comes from the last document only
//! - `<Iteration_iter-num>` counters are offset by `index * stride`
//! - query definitions get their leading identifier restored through the
//!   relationship map
//! - `<Iteration_query-ID>` echoes of the counter are dropped
//!
//! Matching is by line prefix after trimming whitespace; documents are not
//! parsed as XML. Documents are processed strictly in the given order.

use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::ids::IdRelationshipMap;
use crate::streaming::{open_output, source_name, LineSource, RecordWriter};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

/// Counter offset reserved for each input document.
pub const DEFAULT_ITERATION_STRIDE: u64 = 1_000_000;

const ITERATION_OPEN: &str = "<Iteration>";
const ITERATION_NUM: &str = "<Iteration_iter-num>";
const ITERATION_QUERY_ID: &str = "<Iteration_query-ID>";
const ITERATION_QUERY_DEF: &str = "<Iteration_query-def>";
const OUTPUT_QUERY_DEF: &str = "<BlastOutput_query-def>";
const CLOSING_FRAMES: [&str; 2] = ["</BlastOutput_iterations>", "</BlastOutput>"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentState {
    BeforeFirstIteration,
    InIteration,
}

/// Position of the document being merged within the input list.
#[derive(Debug, Clone, Copy)]
struct DocumentSlot {
    index: usize,
    is_first: bool,
    is_last: bool,
}

/// XML merge command configuration.
#[derive(Debug, Clone)]
pub struct XmlMergeCommand {
    pub stride: u64,
}

impl Default for XmlMergeCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlMergeCommand {
    pub fn new() -> Self {
        Self {
            stride: DEFAULT_ITERATION_STRIDE,
        }
    }

    pub fn with_stride(mut self, stride: u64) -> Result<Self> {
        if stride == 0 {
            return Err(EngineError::Argument(
                "iteration stride must be at least 1".to_string(),
            ));
        }
        self.stride = stride;
        Ok(self)
    }

    /// Merge the documents at `inputs` into `output_path`.
    ///
    /// Inputs are opened one at a time, in order.
    pub fn run(
        &self,
        inputs: &[PathBuf],
        relationships: &IdRelationshipMap,
        output_path: &std::path::Path,
        config: &RunConfig,
    ) -> Result<XmlMergeStats> {
        if inputs.is_empty() {
            return Err(EngineError::Argument(
                "at least one XML document is required".to_string(),
            ));
        }

        let mut writer = RecordWriter::new(open_output(output_path)?, source_name(output_path));
        let mut stats = XmlMergeStats::default();
        for (index, path) in inputs.iter().enumerate() {
            let mut source = LineSource::from_path(path)?;
            let slot = DocumentSlot {
                index,
                is_first: index == 0,
                is_last: index + 1 == inputs.len(),
            };
            self.merge_document(&mut source, slot, relationships, &mut writer, &mut stats, config)?;
        }
        writer.finish()?;

        info!(
            "merged {} XML documents into {}: {}",
            inputs.len(),
            output_path.display(),
            stats
        );
        Ok(stats)
    }

    /// Merge already opened documents, in order.
    pub fn run_streaming<R: BufRead, W: Write>(
        &self,
        sources: Vec<LineSource<R>>,
        relationships: &IdRelationshipMap,
        writer: &mut RecordWriter<W>,
        config: &RunConfig,
    ) -> Result<XmlMergeStats> {
        let count = sources.len();
        let mut stats = XmlMergeStats::default();
        for (index, mut source) in sources.into_iter().enumerate() {
            let slot = DocumentSlot {
                index,
                is_first: index == 0,
                is_last: index + 1 == count,
            };
            self.merge_document(&mut source, slot, relationships, writer, &mut stats, config)?;
        }
        writer.flush()?;
        Ok(stats)
    }

    fn merge_document<R: BufRead, W: Write>(
        &self,
        source: &mut LineSource<R>,
        slot: DocumentSlot,
        relationships: &IdRelationshipMap,
        writer: &mut RecordWriter<W>,
        stats: &mut XmlMergeStats,
        config: &RunConfig,
    ) -> Result<()> {
        let offset = (slot.index as u64).checked_mul(self.stride).ok_or_else(|| {
            EngineError::Argument(format!(
                "iteration offset overflows for document {} with stride {}",
                slot.index + 1,
                self.stride
            ))
        })?;
        let mut state = DocumentState::BeforeFirstIteration;
        let mut iterations = 0usize;

        while let Some(line) = source.next_line()?.map(str::to_owned) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if CLOSING_FRAMES.iter().any(|m| trimmed.starts_with(m)) {
                if slot.is_last {
                    writer.write_line(&line)?;
                }
                continue;
            }

            if state == DocumentState::BeforeFirstIteration {
                if !trimmed.starts_with(ITERATION_OPEN) {
                    if slot.is_first {
                        if trimmed.starts_with(OUTPUT_QUERY_DEF) {
                            let rewritten = restore_query_def(
                                &line,
                                OUTPUT_QUERY_DEF,
                                relationships,
                                source,
                            )?;
                            writer.write_line(&rewritten)?;
                        } else {
                            writer.write_line(&line)?;
                        }
                    }
                    continue;
                }
                state = DocumentState::InIteration;
            }

            if trimmed.starts_with(ITERATION_NUM) {
                let local = element_value(&line, ITERATION_NUM, source)?;
                let local: u64 = local.trim().parse().map_err(|_| {
                    EngineError::format(
                        source.name(),
                        source.line_number(),
                        format!("iteration counter is not a number: '{}'", local),
                    )
                })?;
                if local > self.stride {
                    return Err(EngineError::format(
                        source.name(),
                        source.line_number(),
                        format!(
                            "iteration counter {} exceeds the per-document stride {}",
                            local, self.stride
                        ),
                    ));
                }
                let global = offset + local;
                if config.trace {
                    trace!(document = slot.index, local, global, "iteration");
                }
                writer.write_line(&format!(
                    "{}{}{}</{}",
                    indent_of(&line),
                    ITERATION_NUM,
                    global,
                    &ITERATION_NUM[1..]
                ))?;
                iterations += 1;
            } else if trimmed.starts_with(ITERATION_QUERY_ID) {
                stats.echoes_dropped += 1;
            } else if trimmed.starts_with(ITERATION_QUERY_DEF) {
                let rewritten =
                    restore_query_def(&line, ITERATION_QUERY_DEF, relationships, source)?;
                writer.write_line(&rewritten)?;
            } else {
                writer.write_line(&line)?;
            }
        }

        if state == DocumentState::BeforeFirstIteration {
            warn!("{} contains no iterations", source.name());
        }
        if config.verbose {
            debug!(
                "{}: {} iterations, counter offset {}",
                source.name(),
                iterations,
                offset
            );
        }
        stats.documents += 1;
        stats.iterations += iterations;
        Ok(())
    }
}

fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Text between `<tag>` and the following `</` on one line.
fn element_value<'a, R: BufRead>(
    line: &'a str,
    open_tag: &str,
    source: &LineSource<R>,
) -> Result<&'a str> {
    line.trim_start()
        .strip_prefix(open_tag)
        .and_then(|rest| rest.find("</").map(|end| &rest[..end]))
        .ok_or_else(|| {
            EngineError::format(
                source.name(),
                source.line_number(),
                format!("expected {} with its closing tag on one line", open_tag),
            )
        })
}

/// Rewrite the leading identifier of a query definition element.
fn restore_query_def<R: BufRead>(
    line: &str,
    open_tag: &str,
    relationships: &IdRelationshipMap,
    source: &LineSource<R>,
) -> Result<String> {
    let value = element_value(line, open_tag, source)?;
    let (id, rest) = match value.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, Some(rest)),
        None => (value, None),
    };
    let restored = relationships.restore(id)?;
    let mut out = String::with_capacity(line.len() + restored.len());
    out.push_str(indent_of(line));
    out.push_str(open_tag);
    out.push_str(restored);
    if let Some(rest) = rest {
        out.push(' ');
        out.push_str(rest);
    }
    out.push_str("</");
    out.push_str(&open_tag[1..]);
    Ok(out)
}

/// Statistics from an XML merge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct XmlMergeStats {
    /// Documents merged
    pub documents: usize,
    /// Iterations written
    pub iterations: usize,
    /// `<Iteration_query-ID>` elements dropped
    pub echoes_dropped: usize,
}

impl std::fmt::Display for XmlMergeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Documents: {}, Iterations: {}, Echoes dropped: {}",
            self.documents, self.iterations, self.echoes_dropped
        )
    }
}
