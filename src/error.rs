//! Error taxonomy shared by every engine operation.
//!
//! All errors are fatal to the running operation. Outputs written before
//! the error surfaced must be treated as invalid.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What the engine was trying to do with a path when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathAction {
    Open,
    Create,
}

impl fmt::Display for PathAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathAction::Open => write!(f, "open input"),
            PathAction::Create => write!(f, "create output"),
        }
    }
}

/// Errors raised by the reconciliation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("path error: cannot {action} '{}': {source}", path.display())]
    Path {
        path: PathBuf,
        action: PathAction,
        #[source]
        source: io::Error,
    },

    #[error("format error in {source_name} at record {record}: {message}")]
    Format {
        source_name: String,
        record: usize,
        message: String,
    },

    #[error("lookup error: identifier '{id}' not found in {context}")]
    Lookup { id: String, context: String },

    #[error("argument error: {0}")]
    Argument(String),

    #[error("I/O error on {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn open(path: &Path, source: io::Error) -> Self {
        EngineError::Path {
            path: path.to_path_buf(),
            action: PathAction::Open,
            source,
        }
    }

    pub fn create(path: &Path, source: io::Error) -> Self {
        EngineError::Path {
            path: path.to_path_buf(),
            action: PathAction::Create,
            source,
        }
    }

    pub fn format(source_name: &str, record: usize, message: impl Into<String>) -> Self {
        EngineError::Format {
            source_name: source_name.to_string(),
            record,
            message: message.into(),
        }
    }

    pub fn io(source_name: &str, source: io::Error) -> Self {
        EngineError::Io {
            source_name: source_name.to_string(),
            source,
        }
    }

    /// Re-anchor a format error on another record ordinal.
    pub(crate) fn at_record(self, record: usize) -> Self {
        match self {
            EngineError::Format {
                source_name,
                message,
                ..
            } => EngineError::Format {
                source_name,
                record,
                message,
            },
            other => other,
        }
    }

    /// Short name of the error kind, used in CLI diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Path { .. } => "PathError",
            EngineError::Format { .. } => "FormatError",
            EngineError::Lookup { .. } => "LookupError",
            EngineError::Argument(_) => "ArgumentError",
            EngineError::Io { .. } => "IoError",
        }
    }
}
