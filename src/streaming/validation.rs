//! Key-order validation for keyed streams.
//!
//! Merge-join and splitting require input that is non-decreasing by key
//! under byte-wise lexicographic comparison. The engine never sorts; it
//! only checks, inline, as records go by.

use crate::error::{EngineError, Result};

/// Inline key-order validator for use within streaming loops.
///
/// This avoids reading a file twice (once for validation, once for
/// processing) by validating order as records are processed.
#[derive(Debug, Default)]
pub struct KeyOrderValidator {
    prev_key: Option<String>,
    record_count: usize,
}

impl KeyOrderValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that `key` does not sort before the previous key.
    ///
    /// `source_name` names the stream in the error message.
    #[inline]
    pub fn validate(&mut self, key: &str, source_name: &str) -> Result<()> {
        self.record_count += 1;

        if let Some(prev) = self.prev_key.as_deref() {
            if key < prev {
                return Err(EngineError::format(
                    source_name,
                    self.record_count,
                    format!("stream not sorted by key: '{}' comes after '{}'", key, prev),
                ));
            }
            if key == prev {
                return Ok(());
            }
        }

        self.prev_key = Some(key.to_string());
        Ok(())
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_decreasing_accepted() {
        let mut validator = KeyOrderValidator::new();
        for key in ["g1", "g1", "g10", "g2", "g3"] {
            // byte-wise: "g10" < "g2"
            validator.validate(key, "mem").unwrap();
        }
        assert_eq!(validator.record_count(), 5);
    }

    #[test]
    fn test_decreasing_rejected() {
        let mut validator = KeyOrderValidator::new();
        validator.validate("g2", "a.csv").unwrap();
        let err = validator.validate("g1", "a.csv").unwrap_err();
        match err {
            EngineError::Format { record, .. } => assert_eq!(record, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
