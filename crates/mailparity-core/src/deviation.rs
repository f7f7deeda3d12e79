//! Deviation sets: per file, per candidate oracle, the ordered list of issues
//! against the baseline oracle's record.

use serde::{Deserialize, Serialize};

use crate::compare::{compare_field, FieldRule, Issue, LengthBand};
use crate::error::{ParityError, Result};
use crate::record::{Field, FieldSource, FieldValue, Outcome, OracleResultSet};

/// Checks that need more than one field of each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossFieldCheck {
    /// Baseline has HTML and no plain body, candidate lost the HTML entirely.
    HtmlLoss,
}

/// Ordered field list plus the comparison rule for each field.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonProfile {
    /// Profile name as reported in [`BaselineDiff::profile`].
    pub name: &'static str,
    /// Compared fields, in report order.
    pub fields: Vec<(Field, FieldRule)>,
    /// Run after the per-field comparisons.
    pub checks: Vec<CrossFieldCheck>,
}

impl ComparisonProfile {
    /// Policy-driven `.msg` baseline comparison.
    pub fn msg_baseline() -> Self {
        Self {
            name: "msg-baseline",
            fields: vec![
                (Field::Subject, FieldRule::Exact),
                (Field::From, FieldRule::Exact),
                (Field::To, FieldRule::Exact),
                (Field::RecipientCount, FieldRule::Exact),
                (Field::AttachmentCount, FieldRule::Exact),
                (Field::FirstRecipientEmail, FieldRule::Exact),
                (Field::BodyLen, FieldRule::Length(LengthBand::MSG_BODY)),
                (Field::HtmlLen, FieldRule::Length(LengthBand::HTML)),
            ],
            checks: Vec::new(),
        }
    }

    /// Fields that must match between the two primary `.msg` implementations.
    pub fn msg_semantic() -> Self {
        Self {
            name: "msg-semantic",
            fields: vec![
                (Field::Subject, FieldRule::Exact),
                (Field::RecipientCount, FieldRule::Exact),
                (Field::AttachmentCount, FieldRule::Exact),
                (Field::FirstRecipientEmail, FieldRule::Exact),
                (Field::BodyLen, FieldRule::Length(LengthBand::MSG_BODY)),
                (Field::HtmlLen, FieldRule::Length(LengthBand::HTML)),
            ],
            checks: vec![CrossFieldCheck::HtmlLoss],
        }
    }

    /// Plain internet-mail comparison.
    pub fn eml() -> Self {
        Self {
            name: "eml",
            fields: vec![
                (Field::Subject, FieldRule::Exact),
                (Field::From, FieldRule::AddressList),
                (Field::To, FieldRule::AddressList),
                (Field::Cc, FieldRule::AddressList),
                (Field::ContentType, FieldRule::MediaType),
                (Field::Multipart, FieldRule::Exact),
                (Field::PartsCount, FieldRule::Exact),
                (Field::BodyLen, FieldRule::Length(LengthBand::EML_BODY)),
            ],
            checks: Vec::new(),
        }
    }

    /// The profile's fields without their rules, for the all-oracle view.
    pub fn field_names(&self) -> Vec<Field> {
        self.fields.iter().map(|(field, _)| *field).collect()
    }
}

/// Issues for one file against one candidate oracle.
///
/// A missing or failed record on either side yields exactly one record-level
/// issue and no field comparisons. Otherwise issues follow the profile's
/// field order, then its cross-field checks.
pub fn build_deviations<R>(
    profile: &ComparisonProfile,
    baseline: Option<&Outcome<R>>,
    candidate: Option<&Outcome<R>>,
) -> Vec<Issue>
where
    R: FieldSource + Serialize,
{
    let (base, cand) = match (baseline, candidate) {
        (None, cand) => {
            return vec![Issue::record_level(
                None,
                cand.map(Outcome::summary),
                "missing baseline row",
            )]
        }
        (Some(base), None) => {
            return vec![Issue::record_level(
                Some(base.summary()),
                None,
                "missing comparator row",
            )]
        }
        (Some(Outcome::Failed { error }), Some(cand)) => {
            return vec![Issue::record_level(
                Some(format!("error: {error}")),
                Some(cand.summary()),
                "baseline parse error",
            )]
        }
        (Some(base), Some(Outcome::Failed { error })) => {
            return vec![Issue::record_level(
                Some(base.summary()),
                Some(format!("error: {error}")),
                "comparator parse error",
            )]
        }
        (Some(Outcome::Parsed(base)), Some(Outcome::Parsed(cand))) => (base, cand),
    };

    let mut issues: Vec<Issue> = profile
        .fields
        .iter()
        .filter_map(|(field, rule)| {
            compare_field(
                *field,
                *rule,
                base.field_value(*field).as_ref(),
                cand.field_value(*field).as_ref(),
            )
        })
        .collect();

    for check in &profile.checks {
        if let Some(issue) = run_check(*check, base, cand) {
            issues.push(issue);
        }
    }
    issues
}

fn run_check<R: FieldSource>(check: CrossFieldCheck, base: &R, cand: &R) -> Option<Issue> {
    let count = |r: &R, f: Field| r.field_value(f).and_then(|v| v.as_count()).unwrap_or(0);
    match check {
        CrossFieldCheck::HtmlLoss => {
            let base_html = count(base, Field::HtmlLen);
            let lost = base_html > 0
                && count(cand, Field::HtmlLen) == 0
                && count(base, Field::BodyLen) == 0;
            lost.then(|| {
                Issue::field(
                    Field::Html,
                    Some(FieldValue::Count(base_html).to_string()),
                    Some(FieldValue::Count(0).to_string()),
                )
            })
        }
    }
}

/// Issues raised by one candidate oracle for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleDeviations {
    pub oracle: String,
    pub issues: Vec<Issue>,
}

/// All candidate oracles' issues for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDeviations {
    pub file: String,
    pub oracles: Vec<OracleDeviations>,
}

impl FileDeviations {
    /// Issues across every candidate oracle for this file.
    pub fn issue_count(&self) -> usize {
        self.oracles.iter().map(|o| o.issues.len()).sum()
    }
}

/// Deviation sets for a whole batch against one baseline oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineDiff {
    pub baseline: String,
    pub profile: String,
    pub files: Vec<FileDeviations>,
}

impl BaselineDiff {
    /// Issues across the whole batch.
    pub fn issue_count(&self) -> usize {
        self.files.iter().map(FileDeviations::issue_count).sum()
    }
}

/// Compare every non-baseline oracle against `baseline` for every file.
///
/// File order follows `files`; oracle order follows `sets`.
pub fn baseline_diff<R>(
    files: &[String],
    sets: &[OracleResultSet<R>],
    baseline: &str,
    profile: &ComparisonProfile,
) -> Result<BaselineDiff>
where
    R: FieldSource + Serialize,
{
    let base_set = sets
        .iter()
        .find(|s| s.oracle() == baseline)
        .ok_or_else(|| ParityError::UnknownBaseline(baseline.to_string()))?;

    let files = files
        .iter()
        .map(|file| FileDeviations {
            file: file.clone(),
            oracles: sets
                .iter()
                .filter(|s| s.oracle() != baseline)
                .map(|set| OracleDeviations {
                    oracle: set.oracle().to_string(),
                    issues: build_deviations(profile, base_set.get(file), set.get(file)),
                })
                .collect(),
        })
        .collect();

    Ok(BaselineDiff {
        baseline: baseline.to_string(),
        profile: profile.name.to_string(),
        files,
    })
}

/// One field on which the oracles that produced a record disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field: Field,
    /// `(oracle, value)`; `None` when that oracle reported an error.
    pub values: Vec<(String, Option<String>)>,
}

/// Cross-oracle mismatches for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMismatches {
    pub file: String,
    /// `(oracle, error)` for every oracle that returned an error row.
    pub errors: Vec<(String, String)>,
    pub mismatches: Vec<FieldMismatch>,
}

/// All-oracle view with no designated baseline: a field is a mismatch when
/// the oracles that returned a row for the file do not all agree on it.
pub fn cross_compare<R: FieldSource>(
    files: &[String],
    sets: &[OracleResultSet<R>],
    fields: &[Field],
) -> Vec<FileMismatches> {
    files
        .iter()
        .map(|file| {
            let rows: Vec<(&str, &Outcome<R>)> = sets
                .iter()
                .filter_map(|s| s.get(file).map(|o| (s.oracle(), o)))
                .collect();

            let mismatches = fields
                .iter()
                .filter_map(|field| {
                    let values: Vec<(String, Option<String>)> = rows
                        .iter()
                        .map(|(oracle, outcome)| {
                            let value = outcome
                                .parsed()
                                .and_then(|r| r.field_value(*field))
                                .map(|v| v.to_string());
                            (oracle.to_string(), value)
                        })
                        .collect();
                    let first = values.first().map(|(_, v)| v);
                    let disagree = values.iter().any(|(_, v)| Some(v) != first);
                    disagree.then_some(FieldMismatch {
                        field: *field,
                        values,
                    })
                })
                .collect();

            let errors = rows
                .iter()
                .filter_map(|(oracle, outcome)| {
                    outcome.error().map(|e| (oracle.to_string(), e.to_string()))
                })
                .collect();

            FileMismatches {
                file: file.clone(),
                errors,
                mismatches,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Severity;
    use crate::record::{EmlRecord, MsgRecord};
    use std::collections::BTreeMap;

    fn msg(subject: &str, body_len: u64, html_len: u64) -> MsgRecord {
        MsgRecord {
            subject: subject.to_string(),
            from: "Alice <a@x>".to_string(),
            to: "Bob".to_string(),
            recipient_count: 1,
            attachment_count: 0,
            first_recipient_email: "b@x".to_string(),
            body_len,
            html_len,
            ..Default::default()
        }
    }

    fn set(oracle: &str, rows: Vec<(&str, Outcome<MsgRecord>)>) -> OracleResultSet<MsgRecord> {
        let map: BTreeMap<String, Outcome<MsgRecord>> =
            rows.into_iter().map(|(f, o)| (f.to_string(), o)).collect();
        OracleResultSet::new(oracle, map)
    }

    #[test]
    fn test_identical_records_produce_no_issues() {
        let profile = ComparisonProfile::msg_baseline();
        let a = Outcome::Parsed(msg("Hello", 100, 0));
        let b = Outcome::Parsed(msg("Hello  \n", 100, 0));
        assert!(build_deviations(&profile, Some(&a), Some(&b)).is_empty());
    }

    #[test]
    fn test_missing_baseline_short_circuits() {
        let profile = ComparisonProfile::msg_baseline();
        let cand = Outcome::Parsed(msg("x", 1, 1));
        let issues = build_deviations(&profile, None, Some(&cand));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, Field::Parser);
        assert_eq!(issues[0].severity, Severity::High);
        assert!(issues[0].baseline.is_none());
        assert!(issues[0].actual.as_deref().unwrap_or("").contains("\"subject\":\"x\""));
    }

    #[test]
    fn test_missing_candidate_short_circuits() {
        let profile = ComparisonProfile::msg_baseline();
        let base = Outcome::Parsed(msg("x", 1, 1));
        let issues = build_deviations::<MsgRecord>(&profile, Some(&base), None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].note.as_deref(), Some("missing comparator row"));
        assert!(issues[0].actual.is_none());
    }

    #[test]
    fn test_error_record_is_single_record_level_issue() {
        let profile = ComparisonProfile::msg_baseline();
        let base = Outcome::Parsed(msg("x", 1, 1));
        let cand: Outcome<MsgRecord> = Outcome::failed("Ole::Storage::FormatError");
        let issues = build_deviations(&profile, Some(&base), Some(&cand));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, Field::Parser);
        assert_eq!(
            issues[0].actual.as_deref(),
            Some("error: Ole::Storage::FormatError")
        );
    }

    #[test]
    fn test_issue_order_follows_profile() {
        let profile = ComparisonProfile::msg_baseline();
        let base = Outcome::Parsed(msg("A", 10_000, 0));
        let mut other = msg("B", 9_000, 0);
        other.recipient_count = 3;
        let cand = Outcome::Parsed(other);
        let fields: Vec<Field> = build_deviations(&profile, Some(&base), Some(&cand))
            .iter()
            .map(|i| i.field)
            .collect();
        assert_eq!(
            fields,
            vec![Field::Subject, Field::RecipientCount, Field::BodyLen]
        );
    }

    #[test]
    fn test_html_loss_only_without_plain_body() {
        let profile = ComparisonProfile::msg_semantic();
        let base = Outcome::Parsed(msg("s", 0, 2_000));
        let cand = Outcome::Parsed(msg("s", 0, 0));
        let issues = build_deviations(&profile, Some(&base), Some(&cand));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, Field::Html);
        assert_eq!(issues[0].baseline.as_deref(), Some("2000"));

        let base = Outcome::Parsed(msg("s", 50, 2_000));
        let cand = Outcome::Parsed(msg("s", 50, 0));
        assert!(build_deviations(&profile, Some(&base), Some(&cand)).is_empty());
    }

    #[test]
    fn test_eml_profile_tolerates_header_reserialisation() {
        let profile = ComparisonProfile::eml();
        let base = Outcome::Parsed(EmlRecord {
            subject: "Hi".to_string(),
            from: "\"Alice\" <a@x>".to_string(),
            to: "b@x, c@x".to_string(),
            content_type: "text/plain; charset=\"utf-8\"".to_string(),
            body_len: 1000,
            ..Default::default()
        });
        let cand = Outcome::Parsed(EmlRecord {
            subject: "Hi".to_string(),
            from: "Alice <a@x>".to_string(),
            to: "b@x,  c@x".to_string(),
            content_type: "TEXT/PLAIN".to_string(),
            body_len: 1150,
            ..Default::default()
        });
        assert!(build_deviations(&profile, Some(&base), Some(&cand)).is_empty());
    }

    #[test]
    fn test_baseline_diff_skips_baseline_and_keeps_order() {
        let files = vec!["/b.msg".to_string(), "/a.msg".to_string()];
        let sets = vec![
            set(
                "ruby-msg",
                vec![
                    ("/a.msg", Outcome::Parsed(msg("A", 1, 0))),
                    ("/b.msg", Outcome::Parsed(msg("B", 1, 0))),
                ],
            ),
            set("outlook_msg", vec![("/a.msg", Outcome::Parsed(msg("A", 1, 0)))]),
            set(
                "extract-msg",
                vec![
                    ("/a.msg", Outcome::Parsed(msg("A!", 1, 0))),
                    ("/b.msg", Outcome::Parsed(msg("B", 1, 0))),
                ],
            ),
        ];
        let diff = baseline_diff(&files, &sets, "ruby-msg", &ComparisonProfile::msg_baseline())
            .expect("diff");
        assert_eq!(diff.files[0].file, "/b.msg");
        let oracles: Vec<&str> = diff.files[0].oracles.iter().map(|o| o.oracle.as_str()).collect();
        assert_eq!(oracles, vec!["outlook_msg", "extract-msg"]);
        // outlook_msg has no row for /b.msg
        assert_eq!(diff.files[0].oracles[0].issues[0].field, Field::Parser);
        assert!(diff.files[0].oracles[1].issues.is_empty());
        assert_eq!(diff.files[1].oracles[1].issues[0].field, Field::Subject);
        assert_eq!(diff.issue_count(), 2);
    }

    #[test]
    fn test_baseline_diff_unknown_baseline() {
        let sets = vec![set("outlook_msg", vec![])];
        let err = baseline_diff(&[], &sets, "ruby-msg", &ComparisonProfile::msg_baseline())
            .expect_err("unknown baseline");
        assert!(matches!(err, ParityError::UnknownBaseline(_)));
    }

    #[test]
    fn test_cross_compare_reports_disagreeing_fields() {
        let files = vec!["/a.msg".to_string()];
        let sets = vec![
            set("ruby-msg", vec![("/a.msg", Outcome::Parsed(msg("A", 5, 0)))]),
            set("outlook_msg", vec![("/a.msg", Outcome::Parsed(msg("A", 6, 0)))]),
            set("extract-msg", vec![]),
        ];
        let out = cross_compare(&files, &sets, &[Field::Subject, Field::BodyLen]);
        assert_eq!(out[0].mismatches.len(), 1);
        assert_eq!(out[0].mismatches[0].field, Field::BodyLen);
        // oracles without a row are not part of the vote
        assert_eq!(out[0].mismatches[0].values.len(), 2);
        assert!(out[0].errors.is_empty());
    }

    #[test]
    fn test_cross_compare_collects_errors() {
        let files = vec!["/a.msg".to_string()];
        let sets = vec![
            set("ruby-msg", vec![("/a.msg", Outcome::Parsed(msg("A", 5, 0)))]),
            set("outlook_msg", vec![("/a.msg", Outcome::failed(":bad_cfb"))]),
        ];
        let out = cross_compare(&files, &sets, &[Field::Subject]);
        assert_eq!(
            out[0].errors,
            vec![("outlook_msg".to_string(), ":bad_cfb".to_string())]
        );
        assert_eq!(
            out[0].mismatches[0].values,
            vec![
                ("ruby-msg".to_string(), Some("A".to_string())),
                ("outlook_msg".to_string(), None),
            ]
        );
    }
}
