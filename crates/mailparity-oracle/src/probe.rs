//! Optional `readpst` corroboration for archive probes.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use mailparity_core::{OracleResultSet, Outcome, ReadpstCounts};

use crate::error::Result;

pub const READPST: &str = "readpst";

/// Count extracted `.eml` files and directories under `dir`.
pub fn count_extracted(dir: &Path) -> Result<ReadpstCounts> {
    let mut counts = ReadpstCounts::default();
    count_recursive(dir, &mut counts)?;
    Ok(counts)
}

fn count_recursive(dir: &Path, counts: &mut ReadpstCounts) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            counts.folder_dirs += 1;
            count_recursive(&path, counts)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        {
            counts.eml_count += 1;
        }
    }
    Ok(())
}

/// Extract each archive into a scratch directory and count the output.
///
/// Returns `Ok(None)` when `readpst` is not installed. Per-file failures are
/// recorded as error outcomes and do not stop the probe.
pub async fn probe_readpst(files: &[String]) -> Result<Option<OracleResultSet<ReadpstCounts>>> {
    probe_with(READPST, files).await
}

async fn probe_with(
    program: &str,
    files: &[String],
) -> Result<Option<OracleResultSet<ReadpstCounts>>> {
    let mut records = BTreeMap::new();

    for file in files {
        let scratch = tempfile::tempdir()?;
        let output = Command::new(program)
            .args(["-D", "-M", "-q", "-o"])
            .arg(scratch.path())
            .arg(file)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let outcome = match output {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(program, "readpst not installed");
                return Ok(None);
            }
            Err(e) => Outcome::failed(format!("spawn failed: {e}")),
            Ok(out) if !out.status.success() => Outcome::failed(format!(
                "exit {}: {}",
                out.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&out.stderr).trim()
            )),
            Ok(_) => match count_extracted(scratch.path()) {
                Ok(counts) => Outcome::Parsed(counts),
                Err(e) => Outcome::failed(e.to_string()),
            },
        };
        records.insert(file.clone(), outcome);
    }

    Ok(Some(OracleResultSet::new(READPST, records)))
}
