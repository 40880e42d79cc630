//! Group-bounded splitting of a key-ordered annotation stream.
//!
//! # Algorithm
//!
//! 1. Write records into the current output file
//! 2. Only when a new key group begins, compare the running count of the
//!    current file with the threshold; at or above it, finalize the file
//!    and open the next one
//! 3. A group is never split, so a file may exceed the threshold when a
//!    single key has more records than it
//!
//! # Memory Complexity
//!
//! O(1) - one record and the current key.

use crate::annotation::AnnotationReader;
use crate::config::RunConfig;
use crate::error::{EngineError, Result};
use crate::schema::SchemaType;
use crate::streaming::{open_output, source_name, KeyOrderValidator, OutputSink, RecordWriter};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Split command configuration.
#[derive(Debug, Clone)]
pub struct SplitCommand {
    pub schema: SchemaType,
    pub max_records_per_file: usize,
    /// Skip inline key-order validation.
    pub assume_sorted: bool,
}

impl SplitCommand {
    pub fn new(schema: SchemaType, max_records_per_file: usize) -> Result<Self> {
        if max_records_per_file == 0 {
            return Err(EngineError::Argument(
                "maximum records per file must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            schema,
            max_records_per_file,
            assume_sorted: false,
        })
    }

    pub fn with_assume_sorted(mut self, assume_sorted: bool) -> Self {
        self.assume_sorted = assume_sorted;
        self
    }

    /// Split `input_path` into files named after `output_template`.
    pub fn run(
        &self,
        input_path: &Path,
        output_template: &Path,
        config: &RunConfig,
    ) -> Result<SplitStats> {
        let reader = AnnotationReader::from_path(input_path, self.schema)?;
        let stats = self.run_streaming(reader, output_template, config)?;
        info!(
            "split {} into {} files: {}",
            input_path.display(),
            stats.files.len(),
            stats
        );
        Ok(stats)
    }

    /// Core splitting loop over a reader.
    pub fn run_streaming<R: BufRead>(
        &self,
        mut reader: AnnotationReader<R>,
        output_template: &Path,
        config: &RunConfig,
    ) -> Result<SplitStats> {
        let naming = SeriesNaming::from_template(output_template)?;
        let mut validator = (!self.assume_sorted).then(KeyOrderValidator::new);
        let mut stats = SplitStats::default();

        let mut current: Option<RecordWriter<OutputSink>> = None;
        let mut current_key: Option<String> = None;
        let mut file_count = 0usize;

        while let Some(record) = reader.read_record()? {
            stats.records_read += 1;
            if let Some(ref mut validator) = validator {
                validator.validate(record.key(), reader.source_name())?;
            }

            let new_group = current_key.as_deref() != Some(record.key());
            if new_group {
                let rotate = match current {
                    None => true,
                    Some(_) => file_count >= self.max_records_per_file,
                };
                if rotate {
                    if let Some(writer) = current.take() {
                        writer.finish()?;
                    }
                    let path = naming.path(stats.files.len() + 1);
                    if config.verbose {
                        debug!("opening {}", path.display());
                    }
                    let mut writer = RecordWriter::new(open_output(&path)?, source_name(&path));
                    if reader.had_header() {
                        writer.write_line(&self.schema.header_line())?;
                    }
                    stats.files.push(path);
                    current = Some(writer);
                    file_count = 0;
                }
                current_key = Some(record.key().to_string());
                stats.groups += 1;
            }

            if let Some(ref mut writer) = current {
                writer.write_line(record.raw())?;
            }
            file_count += 1;
            stats.records_written += 1;
            if config.trace {
                trace!(key = record.key(), file = stats.files.len(), "split");
            }
        }

        if let Some(writer) = current.take() {
            writer.finish()?;
        }
        Ok(stats)
    }
}

/// `dir/stem.suffix` -> `dir/stem-001.suffix`, `dir/stem-002.suffix`, ...
///
/// The suffix is everything after the first `.` of the file name, so
/// `annotation.csv.gz` keeps `.csv.gz` and stays compressed.
#[derive(Debug, Clone)]
struct SeriesNaming {
    dir: PathBuf,
    stem: String,
    suffix: String,
}

impl SeriesNaming {
    fn from_template(template: &Path) -> Result<Self> {
        let file_name = template
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty() && *n != "-")
            .ok_or_else(|| {
                EngineError::Argument(format!(
                    "output template '{}' must name a file",
                    template.display()
                ))
            })?;
        let (stem, suffix) = match file_name.find('.') {
            Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx..]),
            _ => (file_name, ""),
        };
        Ok(Self {
            dir: template.parent().map(Path::to_path_buf).unwrap_or_default(),
            stem: stem.to_string(),
            suffix: suffix.to_string(),
        })
    }

    fn path(&self, number: usize) -> PathBuf {
        let mut buf = itoa::Buffer::new();
        let digits = buf.format(number);
        let padding = "0".repeat(3usize.saturating_sub(digits.len()));
        self.dir
            .join(format!("{}-{}{}{}", self.stem, padding, digits, self.suffix))
    }
}

/// Statistics from a split, including the written file series.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitStats {
    /// Records read from the input
    pub records_read: usize,
    /// Records written across all files
    pub records_written: usize,
    /// Key groups seen
    pub groups: usize,
    /// Output files in the order they were written
    pub files: Vec<PathBuf>,
}

impl std::fmt::Display for SplitStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Written: {}, Groups: {}, Files: {}",
            self.records_read,
            self.records_written,
            self.groups,
            self.files.len()
        )
    }
}
