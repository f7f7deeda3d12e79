//! Corruption-class assertions for the mailbox-archive fixture corpus.
//!
//! Expectations are keyed by fixture file name. Files not in [`FIXTURES`]
//! only need to open and stay under [`MAX_DISTINCT_CODES`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gate::GateVerdict;
use crate::policy::basename;
use crate::record::{Outcome, OracleResultSet, PstReport};

/// Upper bound on distinct diagnostic codes for fixtures without an entry.
pub const MAX_DISTINCT_CODES: usize = 20;

/// What a fixture's diagnostic-code set must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureExpectation {
    /// No codes at all.
    Clean,
    /// At least one of these codes.
    AnyOf(&'static [&'static str]),
    /// This code must be present.
    Requires(&'static str),
    /// At most this many distinct codes.
    Bounded(usize),
}

/// A named fixture and the code set it must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixture {
    /// File name, matched against the basename of each input.
    pub name: &'static str,
    pub expect: FixtureExpectation,
}

/// Known structural states of the archive fixture corpus.
pub const FIXTURES: &[Fixture] = &[
    Fixture {
        name: "minimal_pst97.pst",
        expect: FixtureExpectation::Clean,
    },
    Fixture {
        name: "corrupt_offsets_pst97.pst",
        expect: FixtureExpectation::AnyOf(&["pst_index_parse_failed", "pst_descriptor_parse_failed"]),
    },
    Fixture {
        name: "loop_branch_index_pst97.pst",
        expect: FixtureExpectation::Requires("pst_branch_loop_detected"),
    },
];

/// Expectation for a fixture by file name (not path).
pub fn expectation_for(name: &str) -> FixtureExpectation {
    FIXTURES
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.expect)
        .unwrap_or(FixtureExpectation::Bounded(MAX_DISTINCT_CODES))
}

fn code_list<'a>(codes: impl IntoIterator<Item = &'a str>) -> String {
    format!("[{}]", codes.into_iter().collect::<Vec<_>>().join(", "))
}

/// `None` when `codes` satisfies the expectation, else the failure reason.
pub fn check_fixture(expect: FixtureExpectation, codes: &BTreeSet<String>) -> Option<String> {
    let got = || code_list(codes.iter().map(String::as_str));
    match expect {
        FixtureExpectation::Clean if !codes.is_empty() => {
            Some(format!("expected clean parse, got warning codes {}", got()))
        }
        FixtureExpectation::AnyOf(required) if !required.iter().any(|c| codes.contains(*c)) => {
            Some(format!(
                "expected one of {}, got {}",
                code_list(required.iter().copied()),
                got()
            ))
        }
        FixtureExpectation::Requires(code) if !codes.contains(code) => {
            Some(format!("expected {code}, got {}", got()))
        }
        FixtureExpectation::Bounded(max) if codes.len() > max => {
            Some(format!("excessive warning cardinality ({})", codes.len()))
        }
        _ => None,
    }
}

/// A fixture whose report did not meet its expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureViolation {
    pub file: String,
    pub reason: String,
}

impl fmt::Display for FixtureViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.reason)
    }
}

/// Check every requested file against its fixture expectation. A missing row
/// or an error row is a violation on its own.
pub fn evaluate_fixtures(
    files: &[String],
    reports: &OracleResultSet<PstReport>,
) -> GateVerdict<FixtureViolation> {
    let violations = files
        .iter()
        .filter_map(|file| {
            let reason = match reports.get(file) {
                None => Some("missing output row".to_string()),
                Some(Outcome::Failed { error }) => Some(format!("parser returned error {error}")),
                Some(Outcome::Parsed(report)) => {
                    check_fixture(expectation_for(basename(file)), &report.codes)
                }
            };
            reason.map(|reason| FixtureViolation {
                file: file.clone(),
                reason,
            })
        })
        .collect();
    GateVerdict::from_violations(violations)
}
