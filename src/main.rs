//! annorecon: streaming annotation and sequence reconciliation
//!
//! Usage: annorecon <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use annorecon::commands::{
    ExtractCommand, MergeCommand, ReconcileCommand, ReconcileMode, RenumberCommand,
    RestoreCommand, RestoreTarget, SplitCommand, XmlMergeCommand, DEFAULT_ITERATION_STRIDE,
};
use annorecon::fasta::FastaReader;
use annorecon::ids::{IdRelationshipMap, IdentifierSet, KeyNormalizer, NormalizationRule};
use annorecon::{EngineError, RunConfig, SchemaType};

#[derive(Parser)]
#[command(name = "annorecon")]
#[command(version)]
#[command(about = "Streaming merge, filter, split and reconciliation of annotation tables and sequence sets", long_about = None)]
struct Cli {
    /// Log progress details
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Log every record decision (very noisy)
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two key-sorted annotation tables
    Merge {
        /// Record schema (BLAST, MERGER, INTERPRO, EMAPPER)
        #[arg(short = 't', long = "type")]
        schema: SchemaType,

        /// First sorted input; wins ties
        #[arg(short = 'a', long)]
        file_a: PathBuf,

        /// Second sorted input
        #[arg(short = 'b', long)]
        file_b: PathBuf,

        /// Output file (use - for stdout, .gz to compress)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Do not write the column header
        #[arg(long)]
        no_header: bool,

        /// Skip key order validation
        #[arg(long)]
        assume_sorted: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Keep annotation records whose key is in an identifier list
    Extract {
        /// Record schema (BLAST, MERGER, INTERPRO, EMAPPER)
        #[arg(short = 't', long = "type")]
        schema: SchemaType,

        /// Input annotation table (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Identifier list, one id per line
        #[arg(long)]
        ids: PathBuf,

        /// Read the identifiers from FASTA headers instead of a list
        #[arg(long)]
        ids_fasta: bool,

        /// Output file (use - for stdout, .gz to compress)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Write per-identifier record counts to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Compare keys exactly, without normalization
        #[arg(long, conflicts_with = "rule")]
        raw_keys: bool,

        /// Key normalization rule PREFIX=keep|first:C|nth:C:N (repeatable, first match wins)
        #[arg(long)]
        rule: Vec<String>,

        /// Do not write the column header
        #[arg(long)]
        no_header: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Split a key-sorted annotation table without breaking key groups
    Split {
        /// Record schema (BLAST, MERGER, INTERPRO, EMAPPER)
        #[arg(short = 't', long = "type")]
        schema: SchemaType,

        /// Input annotation table (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output name template; file n is written as STEM-00n.SUFFIX
        #[arg(short, long)]
        output: PathBuf,

        /// Records per file before a new file is started at the next key group
        #[arg(short = 'n', long)]
        max_records: usize,

        /// Skip key order validation
        #[arg(long)]
        assume_sorted: bool,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Intersect or subtract two FASTA files by identifier
    Reconcile {
        /// FASTA file whose records are filtered
        #[arg(short = 'a', long)]
        file_a: PathBuf,

        /// FASTA file providing the identifier set
        #[arg(short = 'b', long)]
        file_b: PathBuf,

        /// Keep members of B (intersect) or non-members (difference)
        #[arg(short, long, value_enum, default_value = "intersect")]
        mode: ModeArg,

        /// Relationship file used to restore original identifiers
        #[arg(short = 'r', long)]
        relationships: Option<PathBuf>,

        /// Output file (use - for stdout, .gz to compress)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Rewrite identifiers back to their original form
    #[command(name = "restore-ids")]
    RestoreIds {
        /// Annotation schema of the input; FASTA when omitted
        #[arg(short = 't', long = "type")]
        schema: Option<SchemaType>,

        /// Input file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Relationship file written by renumber
        #[arg(short = 'r', long)]
        relationships: PathBuf,

        /// Output file (use - for stdout, .gz to compress)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Give every FASTA record a sequential identifier
    Renumber {
        /// Input FASTA file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output FASTA file (use - for stdout, .gz to compress)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Where to write the "new_id";"old_id" pairs
        #[arg(short = 'r', long)]
        relationships: PathBuf,

        /// Identifier prefix
        #[arg(long, default_value = "SEQ")]
        prefix: String,

        /// Zero-padded counter width
        #[arg(long, default_value = "9")]
        width: usize,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Merge BLAST XML reports into one document
    #[command(name = "merge-xml")]
    MergeXml {
        /// Input XML documents, in merge order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Relationship file used to restore query identifiers
        #[arg(short = 'r', long)]
        relationships: Option<PathBuf>,

        /// Output file (use - for stdout, .gz to compress)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Iteration counter offset per input document
        #[arg(long, default_value_t = DEFAULT_ITERATION_STRIDE)]
        stride: u64,

        /// Print statistics to stderr
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Intersect,
    Difference,
}

impl From<ModeArg> for ReconcileMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Intersect => ReconcileMode::Intersect,
            ModeArg::Difference => ReconcileMode::Difference,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = RunConfig::new()
        .with_verbose(cli.verbose)
        .with_trace(cli.trace);
    init_logging(&config);

    let result = match cli.command {
        Commands::Merge {
            schema,
            file_a,
            file_b,
            output,
            no_header,
            assume_sorted,
            stats,
        } => run_merge(
            schema,
            file_a,
            file_b,
            output,
            no_header,
            assume_sorted,
            stats,
            &config,
        ),

        Commands::Extract {
            schema,
            input,
            ids,
            ids_fasta,
            output,
            report,
            raw_keys,
            rule,
            no_header,
            stats,
        } => run_extract(
            schema, input, ids, ids_fasta, output, report, raw_keys, rule, no_header, stats,
            &config,
        ),

        Commands::Split {
            schema,
            input,
            output,
            max_records,
            assume_sorted,
            stats,
        } => run_split(
            schema,
            input,
            output,
            max_records,
            assume_sorted,
            stats,
            &config,
        ),

        Commands::Reconcile {
            file_a,
            file_b,
            mode,
            relationships,
            output,
            stats,
        } => run_reconcile(
            file_a,
            file_b,
            mode.into(),
            relationships,
            output,
            stats,
            &config,
        ),

        Commands::RestoreIds {
            schema,
            input,
            relationships,
            output,
            stats,
        } => run_restore(schema, input, relationships, output, stats, &config),

        Commands::Renumber {
            input,
            output,
            relationships,
            prefix,
            width,
            stats,
        } => run_renumber(input, output, relationships, prefix, width, stats, &config),

        Commands::MergeXml {
            inputs,
            relationships,
            output,
            stride,
            stats,
        } => run_merge_xml(inputs, relationships, output, stride, stats, &config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}: {}", e.kind(), e);
        process::exit(1);
    }
}

/// Logs go to stderr; `ANNORECON_LOG` overrides the flag-derived level.
fn init_logging(config: &RunConfig) {
    let filter = EnvFilter::try_from_env("ANNORECON_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_relationships(path: Option<PathBuf>) -> Result<IdRelationshipMap, EngineError> {
    match path {
        Some(path) => IdRelationshipMap::from_file(&path),
        None => Ok(IdRelationshipMap::new()),
    }
}

fn run_merge(
    schema: SchemaType,
    file_a: PathBuf,
    file_b: PathBuf,
    output: PathBuf,
    no_header: bool,
    assume_sorted: bool,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let cmd = MergeCommand::new(schema)
        .with_header(!no_header)
        .with_assume_sorted(assume_sorted);
    let result = cmd.run(&file_a, &file_b, &output, config)?;
    if stats {
        eprintln!("Merge stats: {}", result);
    }
    Ok(())
}

fn run_extract(
    schema: SchemaType,
    input: PathBuf,
    ids_path: PathBuf,
    ids_fasta: bool,
    output: PathBuf,
    report: Option<PathBuf>,
    raw_keys: bool,
    rules: Vec<String>,
    no_header: bool,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let ids = if ids_fasta {
        IdentifierSet::from_fasta(FastaReader::from_path(&ids_path)?)?
    } else {
        IdentifierSet::from_list_file(&ids_path)?
    };

    let normalizer = if raw_keys {
        KeyNormalizer::identity()
    } else if rules.is_empty() {
        KeyNormalizer::default()
    } else {
        let rules = rules
            .iter()
            .map(|r| NormalizationRule::parse(r))
            .collect::<Result<Vec<_>, _>>()?;
        KeyNormalizer::new(rules)
    };

    let cmd = ExtractCommand::new(schema)
        .with_normalizer(normalizer)
        .with_header(!no_header);
    let result = cmd.run(&input, &ids, &output, report.as_deref(), config)?;
    if stats {
        eprintln!("Extract stats: {}", result);
    }
    Ok(())
}

fn run_split(
    schema: SchemaType,
    input: PathBuf,
    template: PathBuf,
    max_records: usize,
    assume_sorted: bool,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let cmd = SplitCommand::new(schema, max_records)?.with_assume_sorted(assume_sorted);
    let result = cmd.run(&input, &template, config)?;
    if stats {
        eprintln!("Split stats: {}", result);
        for file in &result.files {
            eprintln!("  {}", file.display());
        }
    }
    Ok(())
}

fn run_reconcile(
    file_a: PathBuf,
    file_b: PathBuf,
    mode: ReconcileMode,
    relationships: Option<PathBuf>,
    output: PathBuf,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let map = match relationships {
        Some(path) => Some(IdRelationshipMap::from_file(&path)?),
        None => None,
    };
    let cmd = ReconcileCommand::new(mode);
    let result = cmd.run(&file_a, &file_b, map.as_ref(), &output, config)?;
    if stats {
        eprintln!("Reconcile stats: {}", result);
    }
    Ok(())
}

fn run_restore(
    schema: Option<SchemaType>,
    input: PathBuf,
    relationships: PathBuf,
    output: PathBuf,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let map = IdRelationshipMap::from_file(&relationships)?;
    let target = match schema {
        Some(schema) => RestoreTarget::Annotation(schema),
        None => RestoreTarget::Fasta,
    };
    let result = RestoreCommand::new(target).run(&input, &map, &output, config)?;
    if stats {
        eprintln!("Restore stats: {}", result);
    }
    Ok(())
}

fn run_renumber(
    input: PathBuf,
    output: PathBuf,
    relationships: PathBuf,
    prefix: String,
    width: usize,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let cmd = RenumberCommand::new()
        .with_prefix(prefix)
        .with_width(width);
    let result = cmd.run(&input, &output, &relationships, config)?;
    if stats {
        eprintln!("Renumber stats: {}", result);
    }
    Ok(())
}

fn run_merge_xml(
    inputs: Vec<PathBuf>,
    relationships: Option<PathBuf>,
    output: PathBuf,
    stride: u64,
    stats: bool,
    config: &RunConfig,
) -> Result<(), EngineError> {
    let map = load_relationships(relationships)?;
    let cmd = XmlMergeCommand::new().with_stride(stride)?;
    let result = cmd.run(&inputs, &map, &output, config)?;
    if stats {
        eprintln!("XML merge stats: {}", result);
    }
    Ok(())
}
