//! Error types for policy loading and gate evaluation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the comparison pipeline.
#[derive(Error, Debug)]
pub enum ParityError {
    #[error("failed to read policy {path}: {source}")]
    PolicyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy {path}: {source}")]
    PolicyParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("baseline parser '{0}' is not among the enabled oracles")]
    UnknownBaseline(String),

    #[error("unknown severity: {0}")]
    UnknownSeverity(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ParityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_baseline_display() {
        let err = ParityError::UnknownBaseline("msg-viewer".to_string());
        assert!(err.to_string().contains("msg-viewer"));
        assert!(err.to_string().contains("baseline"));
    }

    #[test]
    fn test_policy_read_names_path() {
        let err = ParityError::PolicyRead {
            path: PathBuf::from("/etc/policy.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/policy.json"));
        assert!(msg.contains("gone"));
    }
}
