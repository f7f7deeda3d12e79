//! Deviation gate policy: severity threshold followed by ordered allow-rules.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::compare::{Issue, Severity};
use crate::deviation::BaselineDiff;
use crate::error::{ParityError, Result};
use crate::gate::GateVerdict;

/// Absent and empty-string constraints both deserialize to `None` (wildcard).
fn non_empty<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Suppresses matching issues. Every present constraint must equal the
/// issue's attribute; an absent constraint matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowRule {
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl AllowRule {
    /// Whether this rule suppresses `issue` raised by `oracle`.
    pub fn matches(&self, oracle: &str, issue: &Issue) -> bool {
        self.parser.as_deref().map_or(true, |p| p == oracle)
            && self.field.as_deref().map_or(true, |f| f == issue.field.as_str())
            && self.severity.map_or(true, |s| s == issue.severity)
    }
}

fn default_baseline() -> String {
    "ruby-msg".to_string()
}

fn default_fail_on() -> BTreeSet<Severity> {
    BTreeSet::from([Severity::High])
}

/// Declarative configuration of the deviation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationPolicy {
    #[serde(default = "default_baseline")]
    pub baseline_parser: String,
    #[serde(default = "default_fail_on")]
    pub fail_on_severity: BTreeSet<Severity>,
    #[serde(default)]
    pub allow_rules: Vec<AllowRule>,
}

impl Default for DeviationPolicy {
    fn default() -> Self {
        Self {
            baseline_parser: default_baseline(),
            fail_on_severity: default_fail_on(),
            allow_rules: Vec::new(),
        }
    }
}

impl DeviationPolicy {
    /// Every issue of every severity fails; nothing is allow-listed.
    pub fn strict(baseline: impl Into<String>) -> Self {
        Self {
            baseline_parser: baseline.into(),
            fail_on_severity: Severity::ALL.into_iter().collect(),
            allow_rules: Vec::new(),
        }
    }

    /// Parse a policy; absent keys take their defaults.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read and parse a policy file, naming the file on failure.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ParityError::PolicyRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ParityError::PolicyParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Index of the first allow-rule matching the issue.
    pub fn allowed_by(&self, oracle: &str, issue: &Issue) -> Option<usize> {
        self.allow_rules.iter().position(|r| r.matches(oracle, issue))
    }

    /// Severity gate, then allow-list. Surviving issues are violations.
    pub fn evaluate(&self, diff: &BaselineDiff) -> GateVerdict<DeviationViolation> {
        let mut violations = Vec::new();
        for file in &diff.files {
            for deviations in &file.oracles {
                for issue in &deviations.issues {
                    if !self.fail_on_severity.contains(&issue.severity) {
                        continue;
                    }
                    if let Some(rule) = self.allowed_by(&deviations.oracle, issue) {
                        debug!(
                            file = %file.file,
                            oracle = %deviations.oracle,
                            field = %issue.field,
                            rule,
                            "issue allow-listed"
                        );
                        continue;
                    }
                    violations.push(DeviationViolation {
                        file: file.file.clone(),
                        oracle: deviations.oracle.clone(),
                        issue: issue.clone(),
                    });
                }
            }
        }
        GateVerdict::from_violations(violations)
    }
}

/// An issue that survived both policy filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationViolation {
    pub file: String,
    pub oracle: String,
    pub issue: Issue,
}

pub(crate) fn basename(file: &str) -> &str {
    Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file)
}

pub(crate) fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

impl fmt::Display for DeviationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] {} baseline={} actual={}",
            basename(&self.file),
            self.oracle,
            self.issue.severity,
            self.issue.field,
            or_none(&self.issue.baseline),
            or_none(&self.issue.actual),
        )
    }
}
