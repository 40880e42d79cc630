//! Runtime configuration threaded through every engine call.
//!
//! There is no ambient state: the CLI builds one `RunConfig` and hands it
//! to each command, which decides how much detail to log from it.

/// Logging detail requested by the caller.
///
/// `verbose` enables per-operation detail (`debug!`), `trace` enables
/// per-record events (`trace!`). The subscriber filter is derived from the
/// same value, see [`RunConfig::log_level`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    pub verbose: bool,
    pub trace: bool,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Default `tracing` filter directive for this configuration.
    ///
    /// Trace implies verbose.
    pub fn log_level(&self) -> &'static str {
        if self.trace {
            "trace"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
