//! Human and JSON renderings of gate runs and differential reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::deviation::{BaselineDiff, FileMismatches};
use crate::error::Result;
use crate::policy::{basename, or_none};
use crate::record::{OracleResultSet, Outcome, PstProbe, ReadpstCounts};

pub const SCHEMA_VERSION: &str = "1.0";

/// SHA-256 over the ordered oracle names and files, NUL-separated.
///
/// Two runs over the same oracles and corpus share a digest regardless of
/// when they ran.
pub fn compute_run_digest(oracles: &[String], files: &[String]) -> String {
    let mut hasher = Sha256::new();
    for oracle in oracles {
        hasher.update(oracle.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(b"\x1e");
    for file in files {
        hasher.update(file.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

/// Envelope for every `--json` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payload<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub run_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    pub report: T,
}

impl<T: Serialize> Payload<T> {
    pub fn new(command: &str, oracles: &[String], files: &[String], report: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            command: command.to_string(),
            run_digest: compute_run_digest(oracles, files),
            passed: None,
            report,
        }
    }

    pub fn with_passed(mut self, passed: bool) -> Self {
        self.passed = Some(passed);
        self
    }

    /// Pretty-printed JSON, as printed by `--json`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-file deviation listing against the baseline.
pub fn render_baseline_diff(diff: &BaselineDiff) -> String {
    let mut out = String::new();
    for file in &diff.files {
        out.push_str(&format!(
            "\n=== {} (baseline: {}) ===\n",
            basename(&file.file),
            diff.baseline
        ));
        if file.issue_count() == 0 {
            out.push_str("No material deviations from baseline.\n");
            continue;
        }
        for deviations in file.oracles.iter().filter(|d| !d.issues.is_empty()) {
            out.push_str(&format!("- {}\n", deviations.oracle));
            for issue in &deviations.issues {
                out.push_str(&format!(
                    "  [{}] {} baseline={} actual={}\n",
                    issue.severity,
                    issue.field,
                    or_none(&issue.baseline),
                    or_none(&issue.actual)
                ));
            }
        }
    }
    out
}

/// Per-file listing of the fields the oracles disagree on.
pub fn render_mismatches(view: &[FileMismatches]) -> String {
    let mut out = String::new();
    for file in view {
        out.push_str(&format!("\n=== {} ===\n", basename(&file.file)));
        if !file.errors.is_empty() {
            out.push_str("- error\n");
            for (oracle, error) in &file.errors {
                out.push_str(&format!("  {oracle}: {error}\n"));
            }
        }
        if file.mismatches.is_empty() {
            if file.errors.is_empty() {
                out.push_str("No semantic mismatches across enabled parsers.\n");
            }
            continue;
        }
        for mismatch in &file.mismatches {
            out.push_str(&format!("- {}\n", mismatch.field));
            for (oracle, value) in &mismatch.values {
                out.push_str(&format!("  {oracle}: {}\n", or_none(value)));
            }
        }
    }
    out
}

/// One archive's structural counts, with `readpst` corroboration when available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeEntry {
    pub file: String,
    pub probe: Option<Outcome<PstProbe>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readpst: Option<Outcome<ReadpstCounts>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub readpst_installed: bool,
    pub entries: Vec<ProbeEntry>,
}

impl ProbeReport {
    pub fn build(
        files: &[String],
        probes: &OracleResultSet<PstProbe>,
        readpst: Option<&OracleResultSet<ReadpstCounts>>,
    ) -> Self {
        let entries = files
            .iter()
            .map(|file| ProbeEntry {
                file: file.clone(),
                probe: probes.get(file).cloned(),
                readpst: readpst.and_then(|set| set.get(file).cloned()),
            })
            .collect();
        Self {
            readpst_installed: readpst.is_some(),
            entries,
        }
    }

    pub fn render(&self, probe_oracle: &str) -> String {
        fn describe<R: Serialize>(outcome: Option<&Outcome<R>>) -> String {
            outcome.map_or_else(|| "no data".to_string(), Outcome::summary)
        }

        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("\n=== {} ===\n", basename(&entry.file)));
            out.push_str(&format!(
                "{probe_oracle}: {}\n",
                describe(entry.probe.as_ref())
            ));
            if self.readpst_installed {
                out.push_str(&format!("readpst: {}\n", describe(entry.readpst.as_ref())));
            } else {
                out.push_str("readpst: not installed\n");
            }
        }
        out
    }
}
