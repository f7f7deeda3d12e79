//! Gate verdicts and the per-gate identity (banner, pass line, exit status).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The outcome of one gate run. Passes iff there are no violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict<V> {
    pub violations: Vec<V>,
}

impl<V> GateVerdict<V> {
    pub fn from_violations(violations: Vec<V>) -> Self {
        Self { violations }
    }

    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl<V: fmt::Display> GateVerdict<V> {
    /// Human report: banner plus `- ` items on failure, pass line otherwise.
    pub fn render(&self, kind: GateKind) -> String {
        if self.passed() {
            return format!("{}\n", kind.pass_line());
        }
        let mut out = format!("{}\n", kind.banner());
        for v in &self.violations {
            out.push_str(&format!("- {v}\n"));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Gate identity
// ---------------------------------------------------------------------------

/// Which gate produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Baseline,
    Semantic,
    Eml,
    Warning,
    Pst,
}

impl GateKind {
    pub fn name(&self) -> &'static str {
        match self {
            GateKind::Baseline => "baseline",
            GateKind::Semantic => "semantic",
            GateKind::Eml => "eml",
            GateKind::Warning => "warning",
            GateKind::Pst => "pst",
        }
    }

    pub fn banner(&self) -> &'static str {
        match self {
            GateKind::Baseline => "BASELINE POLICY GATE FAILED",
            GateKind::Semantic => "SEMANTIC GATE FAILED",
            GateKind::Eml => "EML SEMANTIC GATE FAILED",
            GateKind::Warning => "WARNING POLICY GATE FAILED",
            GateKind::Pst => "PST SEMANTIC GATE FAILED",
        }
    }

    pub fn pass_line(&self) -> &'static str {
        match self {
            GateKind::Baseline => "Baseline policy gate passed.",
            GateKind::Semantic => "Semantic gate passed for all files.",
            GateKind::Eml => "EML semantic gate passed.",
            GateKind::Warning => "Warning policy gate passed.",
            GateKind::Pst => "PST semantic gate passed.",
        }
    }

    /// Process exit status when the gate fails.
    pub fn failure_code(&self) -> u8 {
        match self {
            GateKind::Baseline | GateKind::Semantic => 1,
            GateKind::Eml | GateKind::Warning | GateKind::Pst => 2,
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
