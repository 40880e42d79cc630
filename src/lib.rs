// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::should_implement_trait)]

//! annorecon: streaming reconciliation of annotation tables and sequence sets
//!
//! This library merges, filters and partitions key-sorted annotation
//! tables, reconciles FASTA files by identifier, and stitches BLAST XML
//! reports back together after a split run.
//!
//! # Features
//!
//! - **Streaming I/O**: one pass over each input, bounded memory
//! - **Transparent compression**: `.gz` inputs and outputs by file name
//! - **Identifier round trips**: renumber sequences and restore the
//!   original ids in any downstream output
//!
//! # Example
//!
//! ```rust,no_run
//! use annorecon::{commands::MergeCommand, RunConfig, SchemaType};
//! use std::path::Path;
//!
//! let cmd = MergeCommand::new(SchemaType::Blast);
//! let stats = cmd
//!     .run(
//!         Path::new("a.csv"),
//!         Path::new("b.csv"),
//!         Path::new("merged.csv.gz"),
//!         &RunConfig::new(),
//!     )
//!     .unwrap();
//! println!("{}", stats);
//! ```

pub mod annotation;
pub mod commands;
pub mod config;
pub mod error;
pub mod fasta;
pub mod ids;
pub mod schema;
pub mod streaming;

// Re-export commonly used types
pub use annotation::{parse_records, AnnotationReader, AnnotationRecord};
pub use config::RunConfig;
pub use error::{EngineError, Result};
pub use fasta::{parse_sequences, FastaReader, SequenceRecord};
pub use ids::{IdRelationshipMap, IdentifierSet, KeyNormalizer};
pub use schema::SchemaType;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::annotation::{AnnotationReader, AnnotationRecord};
    pub use crate::commands::{
        ExtractCommand, MergeCommand, ReconcileCommand, ReconcileMode, RenumberCommand,
        RestoreCommand, RestoreTarget, SplitCommand, XmlMergeCommand,
    };
    pub use crate::config::RunConfig;
    pub use crate::error::{EngineError, Result};
    pub use crate::fasta::{FastaReader, SequenceRecord};
    pub use crate::ids::{IdRelationshipMap, IdentifierSet, KeyNormalizer};
    pub use crate::schema::SchemaType;
    pub use crate::streaming::RecordWriter;
}
