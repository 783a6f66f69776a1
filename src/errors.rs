//! Typed errors for the analysis pipeline.
//!
//! Only structural preconditions are fatal: unresolved revisions, oversized
//! diffs, unwritable output directories. Heuristic scanning stages never fail
//! on malformed content in a human-authored corpus; they skip and continue.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A revision reference did not resolve in the repository.
    #[error("revision '{reference}' not found in repository")]
    RefNotFound { reference: String },

    /// The diff for the range exceeds the configured line ceiling.
    /// Raised instead of truncating silently.
    #[error("diff has {lines} lines, exceeding the limit of {limit}")]
    DiffTooLarge { lines: usize, limit: usize },

    /// Bad input that is not worth a more specific variant.
    #[error("{0}")]
    Validation(String),

    /// The output directory could not be created or written.
    #[error("output directory {path} is not writable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_not_found_names_the_reference() {
        let err = PipelineError::RefNotFound {
            reference: "v9.9.9".to_string(),
        };
        assert!(err.to_string().contains("v9.9.9"));
    }

    #[test]
    fn diff_too_large_reports_both_numbers() {
        let err = PipelineError::DiffTooLarge {
            lines: 500_000,
            limit: 200_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("500000"));
        assert!(msg.contains("200000"));
    }
}
