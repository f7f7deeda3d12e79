//! Warning policy gate over report-mode diagnostics.
//!
//! The four checks are independent: one warning can produce several
//! violations, and the per-file count check does not stop the others.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ParityError, Result};
use crate::gate::GateVerdict;

/// Code given to a synthesised warning for a record-level parse failure.
pub const PARSE_ERROR_CODE: &str = "parse_error";

/// One structured diagnostic from the implementation under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    /// Stable machine code, e.g. `truncated_stream`.
    pub code: String,
    /// Free-form severity as emitted (`info`, `warn`, `error`, ...).
    pub severity: String,
    /// Whether parsing continued past the problem.
    pub recoverable: bool,
    /// Where in the container the problem was found.
    pub context: String,
    pub message: String,
}

impl WarningRecord {
    /// A file that could not be opened at all is reported as a
    /// non-recoverable `error`-severity warning.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: PARSE_ERROR_CODE.to_string(),
            severity: "error".to_string(),
            recoverable: false,
            context: String::new(),
            message: message.into(),
        }
    }
}

/// Warnings keyed by file path. A file present with an empty list opened cleanly.
pub type WarningsByFile = BTreeMap<String, Vec<WarningRecord>>;

fn default_fail_on() -> BTreeSet<String> {
    BTreeSet::from(["error".to_string()])
}

fn default_true() -> bool {
    true
}

fn default_max() -> usize {
    50
}

/// Declarative configuration of the warning gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningPolicy {
    /// Severities that fail the gate on their own.
    #[serde(default = "default_fail_on")]
    pub fail_on_severity: BTreeSet<String>,
    /// Fail on any warning with `recoverable = false`.
    #[serde(default = "default_true")]
    pub fail_on_non_recoverable: bool,
    /// Upper bound on warnings for a single file.
    #[serde(default = "default_max")]
    pub max_warnings_per_file: usize,
    /// When non-empty, the exhaustive set of permitted codes.
    #[serde(default)]
    pub allow_codes: BTreeSet<String>,
}

impl Default for WarningPolicy {
    fn default() -> Self {
        Self {
            fail_on_severity: default_fail_on(),
            fail_on_non_recoverable: true,
            max_warnings_per_file: default_max(),
            allow_codes: BTreeSet::new(),
        }
    }
}

impl WarningPolicy {
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
}

/// A single warning-gate failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningViolation {
    /// The file exceeded `max_warnings_per_file`.
    TooManyWarnings {
        file: String,
        count: usize,
        max: usize,
    },
    /// A code outside a non-empty `allow_codes`.
    CodeNotAllowlisted {
        file: String,
        code: String,
    },
    /// A warning whose severity is in `fail_on_severity`.
    DisallowedSeverity {
        file: String,
        severity: String,
        code: String,
        message: String,
    },
    /// A non-recoverable warning while `fail_on_non_recoverable` is set.
    NonRecoverable {
        file: String,
        code: String,
        message: String,
    },
}

impl fmt::Display for WarningViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningViolation::TooManyWarnings { file, count, max } => {
                write!(f, "{file}: too many warnings ({count} > {max})")
            }
            WarningViolation::CodeNotAllowlisted { file, code } => {
                write!(f, "{file}: warning code not allowlisted: {code}")
            }
            WarningViolation::DisallowedSeverity {
                file,
                severity,
                code,
                message,
            } => write!(
                f,
                "{file}: disallowed severity {severity} code={code} message={message}"
            ),
            WarningViolation::NonRecoverable {
                file,
                code,
                message,
            } => write!(f, "{file}: non-recoverable warning code={code} message={message}"),
        }
    }
}

/// Evaluate every requested file. A file with no entry in `warnings` counts
/// as having produced no warnings.
pub fn evaluate_warnings(
    policy: &WarningPolicy,
    files: &[String],
    warnings: &WarningsByFile,
) -> GateVerdict<WarningViolation> {
    let mut violations = Vec::new();

    for file in files {
        let rows = warnings.get(file).map(Vec::as_slice).unwrap_or_default();

        if rows.len() > policy.max_warnings_per_file {
            violations.push(WarningViolation::TooManyWarnings {
                file: file.clone(),
                count: rows.len(),
                max: policy.max_warnings_per_file,
            });
        }

        for w in rows {
            if !policy.allow_codes.is_empty() && !policy.allow_codes.contains(&w.code) {
                violations.push(WarningViolation::CodeNotAllowlisted {
                    file: file.clone(),
                    code: w.code.clone(),
                });
            }
            if policy.fail_on_severity.contains(&w.severity) {
                violations.push(WarningViolation::DisallowedSeverity {
                    file: file.clone(),
                    severity: w.severity.clone(),
                    code: w.code.clone(),
                    message: w.message.clone(),
                });
            }
            if policy.fail_on_non_recoverable && !w.recoverable {
                violations.push(WarningViolation::NonRecoverable {
                    file: file.clone(),
                    code: w.code.clone(),
                    message: w.message.clone(),
                });
            }
        }
    }

    GateVerdict::from_violations(violations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(code: &str, severity: &str, recoverable: bool) -> WarningRecord {
        WarningRecord {
            code: code.to_string(),
            severity: severity.to_string(),
            recoverable,
            context: String::new(),
            message: "m".to_string(),
        }
    }

    fn one_file(rows: Vec<WarningRecord>) -> (Vec<String>, WarningsByFile) {
        let file = "/x/a.msg".to_string();
        let mut map = WarningsByFile::new();
        map.insert(file.clone(), rows);
        (vec![file], map)
    }

    #[test]
    fn test_policy_defaults() {
        let policy = WarningPolicy::from_json("{}").expect("parse");
        assert_eq!(policy, WarningPolicy::default());
        assert!(policy.fail_on_non_recoverable);
        assert_eq!(policy.max_warnings_per_file, 50);
        assert!(policy.fail_on_severity.contains("error"));
        assert!(policy.allow_codes.is_empty());
    }

    #[test]
    fn test_clean_file_passes() {
        let (files, map) = one_file(vec![]);
        assert!(evaluate_warnings(&WarningPolicy::default(), &files, &map).passed());
        assert!(evaluate_warnings(&WarningPolicy::default(), &files, &WarningsByFile::new()).passed());
    }

    #[test]
    fn test_recoverable_warn_passes_default_policy() {
        let (files, map) = one_file(vec![warning("attachment_name_fallback", "warn", true)]);
        assert!(evaluate_warnings(&WarningPolicy::default(), &files, &map).passed());
    }

    #[test]
    fn test_code_outside_allow_list_fails_regardless_of_severity() {
        let policy = WarningPolicy {
            allow_codes: BTreeSet::from(["known_quirk".to_string()]),
            ..Default::default()
        };
        let (files, map) = one_file(vec![warning("other_code", "info", true)]);
        let verdict = evaluate_warnings(&policy, &files, &map);
        assert_eq!(
            verdict.violations,
            vec![WarningViolation::CodeNotAllowlisted {
                file: "/x/a.msg".to_string(),
                code: "other_code".to_string(),
            }]
        );
    }

    #[test]
    fn test_checks_are_additive() {
        let policy = WarningPolicy {
            allow_codes: BTreeSet::from(["known_quirk".to_string()]),
            max_warnings_per_file: 0,
            ..Default::default()
        };
        let (files, map) = one_file(vec![warning("boom", "error", false)]);
        let verdict = evaluate_warnings(&policy, &files, &map);
        assert_eq!(verdict.len(), 4);
        assert!(matches!(
            verdict.violations[0],
            WarningViolation::TooManyWarnings { count: 1, max: 0, .. }
        ));
    }

    #[test]
    fn test_non_recoverable_fails_independent_of_severity() {
        let (files, map) = one_file(vec![warning("pst_index_parse_failed", "warn", false)]);
        let verdict = evaluate_warnings(&WarningPolicy::default(), &files, &map);
        assert_eq!(verdict.len(), 1);
        assert_eq!(
            verdict.violations[0].to_string(),
            "/x/a.msg: non-recoverable warning code=pst_index_parse_failed message=m"
        );

        let lenient = WarningPolicy {
            fail_on_non_recoverable: false,
            ..Default::default()
        };
        assert!(evaluate_warnings(&lenient, &files, &map).passed());
    }

    #[test]
    fn test_parse_error_caught_by_severity_and_recoverability() {
        let (files, map) = one_file(vec![WarningRecord::parse_error(":invalid_header")]);
        let verdict = evaluate_warnings(&WarningPolicy::default(), &files, &map);
        assert_eq!(verdict.len(), 2);
        assert_eq!(
            verdict.violations[0].to_string(),
            "/x/a.msg: disallowed severity error code=parse_error message=:invalid_header"
        );
    }
}
