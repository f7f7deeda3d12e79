//! Oracle process execution.

use std::io::Write;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::catalog::OracleConfig;
use crate::error::{OracleError, Result};

/// Captured output of one successful oracle batch.
#[derive(Debug, Clone)]
pub struct OracleOutput {
    /// Oracle name.
    pub oracle: String,

    /// Captured stdout (the row protocol).
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

/// Runs an oracle once over a whole batch of files.
pub struct OracleRunner;

impl OracleRunner {
    /// Invoke `config` with `files` appended to its command.
    ///
    /// Non-zero exit fails the batch with the captured stderr. When
    /// `timeout_secs > 0` a hung process is killed and reported as
    /// [`OracleError::TimedOut`].
    pub async fn invoke(config: &OracleConfig, files: &[String]) -> Result<OracleOutput> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            return Err(OracleError::EmptyCommand(config.name.clone()));
        };

        if let Some(cwd) = &config.cwd {
            if !cwd.is_dir() {
                return Err(OracleError::RootMissing {
                    oracle: config.name.clone(),
                    root: cwd.clone(),
                });
            }
        }

        // Held until the process exits; dropping it removes the file.
        let staged = match &config.staged_script {
            Some(script) => {
                let dir = config.cwd.clone().unwrap_or_else(std::env::temp_dir);
                let mut file = tempfile::Builder::new()
                    .prefix(".mailparity-")
                    .suffix(&script.suffix)
                    .tempfile_in(dir)?;
                file.write_all(script.contents.as_bytes())?;
                file.flush()?;
                Some(file)
            }
            None => None,
        };

        let mut command = Command::new(exe);
        command.args(args);
        if let Some(file) = &staged {
            command.arg(file.path());
        }
        command
            .args(files)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| OracleError::Spawn {
            oracle: config.name.clone(),
            source,
        })?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| OracleError::TimedOut {
                oracle: config.name.clone(),
                secs: config.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(OracleError::Failed {
                oracle: config.name.clone(),
                exit_code: output.status.code(),
                stderr,
            });
        }

        Ok(OracleOutput {
            oracle: config.name.clone(),
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
