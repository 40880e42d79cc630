//! Centralized streaming utilities shared by every engine command.
//!
//! This module provides:
//! - Suffix-driven transparent gzip input and output
//! - Line-at-a-time reading with record ordinals for diagnostics
//! - Buffered record output with a fixed `\n` terminator
//! - Inline key-order validation for keyed streams
//!
//! Nothing here seeks or rewinds: every stream is consumed in one pass.

pub mod buffers;
pub mod io;
pub mod output;
pub mod validation;

pub use io::{
    is_compressed, open_input, open_output, source_name, InputStream, LineSource, OutputSink,
};
pub use output::RecordWriter;
pub use validation::KeyOrderValidator;
