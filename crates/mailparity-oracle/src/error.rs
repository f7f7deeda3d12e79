//! Error types for oracle invocation

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while running an external oracle. Any of these aborts the
/// whole batch for that oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Oracle configured without an executable
    #[error("oracle {0} has empty command")]
    EmptyCommand(String),

    /// Executable could not be started
    #[error("failed to spawn oracle {oracle}: {source}")]
    Spawn {
        oracle: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited non-zero; stderr is kept verbatim
    #[error("oracle {oracle} failed (exit code {}):\n{stderr}", exit_label(.exit_code))]
    Failed {
        oracle: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("oracle {oracle} timed out after {secs} seconds")]
    TimedOut { oracle: String, secs: u64 },

    /// Installation root does not exist
    #[error("oracle {oracle} root not found: {}", .root.display())]
    RootMissing { oracle: String, root: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Result type for oracle operations
pub type Result<T> = std::result::Result<T, OracleError>;
