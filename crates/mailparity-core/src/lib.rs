//! mailparity-core - differential comparison of mail parser outputs
//!
//! Takes per-file, per-oracle result records and decides, field by field,
//! whether a difference is material:
//! - Normalises free text and address lists
//! - Compares fields exactly or within length tolerance bands
//! - Builds ordered deviation sets against a baseline oracle
//! - Evaluates deviation, warning and fixture gates

pub mod compare;
pub mod deviation;
pub mod error;
pub mod fixture;
pub mod gate;
pub mod normalize;
pub mod obs;
pub mod policy;
pub mod record;
pub mod report;
pub mod telemetry;
pub mod warning_gate;

// Re-export key types
pub use compare::{compare_field, FieldRule, Issue, LengthBand, Severity};
pub use deviation::{
    baseline_diff, build_deviations, cross_compare, BaselineDiff, ComparisonProfile,
    FileDeviations, FileMismatches,
};
pub use error::{ParityError, Result};
pub use fixture::{check_fixture, evaluate_fixtures, FixtureExpectation, FixtureViolation};
pub use gate::{GateKind, GateVerdict};
pub use normalize::{normalize_address_list, normalize_text, parse_address_list, preview};
pub use policy::{AllowRule, DeviationPolicy, DeviationViolation};
pub use record::{
    EmlRecord, Field, FieldSource, FieldValue, MsgRecord, OracleResultSet, Outcome, PstProbe,
    PstReport, ReadpstCounts,
};
pub use report::{Payload, ProbeReport};
pub use telemetry::init_tracing;
pub use warning_gate::{evaluate_warnings, WarningPolicy, WarningRecord, WarningViolation, WarningsByFile};
