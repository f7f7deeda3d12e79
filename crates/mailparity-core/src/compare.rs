//! Per-field comparison.
//!
//! Decides whether one field of one file differs materially between the
//! baseline oracle and a candidate, and attaches the field's fixed severity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParityError;
use crate::normalize::{normalize_address_list, normalize_text};
use crate::record::{Field, FieldValue};

/// Issue severity. A static property of the field, never of the magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(ParityError::UnknownSeverity(other.to_string())),
        }
    }
}

impl Field {
    /// Fixed severity of a deviation in this field.
    pub fn severity(&self) -> Severity {
        match self {
            Field::Subject
            | Field::RecipientCount
            | Field::AttachmentCount
            | Field::FirstRecipientEmail
            | Field::Parser => Severity::High,
            Field::From | Field::To | Field::BodyLen | Field::HtmlLen => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// Allowed drift for a length field: `max(floor, ratio * baseline)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthBand {
    pub floor: u64,
    pub ratio: f64,
}

impl LengthBand {
    /// Plain body of a compound object; pipelines agree closely here.
    pub const MSG_BODY: LengthBand = LengthBand {
        floor: 128,
        ratio: 0.02,
    };
    /// Plain-text mail body; preview-grade extraction is accepted.
    pub const EML_BODY: LengthBand = LengthBand {
        floor: 64,
        ratio: 0.20,
    };
    /// HTML serialisation differs more between engines.
    pub const HTML: LengthBand = LengthBand {
        floor: 4096,
        ratio: 0.05,
    };

    pub fn tolerance(&self, baseline: u64) -> u64 {
        self.floor.max((baseline as f64 * self.ratio) as u64)
    }

    pub fn within(&self, baseline: u64, actual: u64) -> bool {
        baseline.abs_diff(actual) <= self.tolerance(baseline)
    }
}

/// How two values of a field are compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    /// Equal after text normalisation; counts and flags compare as-is.
    Exact,
    /// Equal after address-list normalisation.
    AddressList,
    /// Only the primary `type/subtype` token, case-insensitively.
    MediaType,
    /// Numeric drift within a tolerance band.
    Length(LengthBand),
}

/// One field-level or record-level deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub field: Field,
    pub severity: Severity,
    pub baseline: Option<String>,
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Issue {
    pub fn field(field: Field, baseline: Option<String>, actual: Option<String>) -> Self {
        Self {
            field,
            severity: field.severity(),
            baseline,
            actual,
            note: None,
        }
    }

    /// Whole-record issue raised when either side has no usable record.
    pub fn record_level(
        baseline: Option<String>,
        actual: Option<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::field(Field::Parser, baseline, actual)
        }
    }
}

/// Primary media type of a `Content-Type` value, lowercased, parameters dropped.
pub fn media_type(value: &str) -> String {
    normalize_text(value)
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn canonical(rule: FieldRule, value: &FieldValue) -> FieldValue {
    match (rule, value) {
        (FieldRule::AddressList, FieldValue::Text(s)) => {
            FieldValue::Text(normalize_address_list(s))
        }
        (FieldRule::MediaType, FieldValue::Text(s)) => FieldValue::Text(media_type(s)),
        (_, FieldValue::Text(s)) => FieldValue::Text(normalize_text(s)),
        (_, other) => other.clone(),
    }
}

/// Compare one field; `Some(issue)` when the difference is material.
///
/// A value missing on exactly one side is always a deviation.
pub fn compare_field(
    field: Field,
    rule: FieldRule,
    baseline: Option<&FieldValue>,
    actual: Option<&FieldValue>,
) -> Option<Issue> {
    let equal = match (baseline, actual) {
        (None, None) => true,
        (Some(bv), Some(rv)) => match (rule, bv.as_count(), rv.as_count()) {
            (FieldRule::Length(band), Some(b), Some(r)) => band.within(b, r),
            _ => canonical(rule, bv) == canonical(rule, rv),
        },
        _ => false,
    };

    if equal {
        None
    } else {
        Some(Issue::field(
            field,
            baseline.map(ToString::to_string),
            actual.map(ToString::to_string),
        ))
    }
}
