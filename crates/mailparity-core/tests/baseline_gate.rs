use std::collections::BTreeMap;

use mailparity_core::{
    baseline_diff, ComparisonProfile, DeviationPolicy, Field, GateKind, MsgRecord,
    OracleResultSet, Outcome, Severity,
};

fn record(subject: &str, body_len: u64, html_len: u64) -> MsgRecord {
    MsgRecord {
        subject: subject.to_string(),
        from: "Alice <alice@example.com>".to_string(),
        to: "Bob <bob@example.com>".to_string(),
        recipient_count: 1,
        attachment_count: 1,
        first_recipient_email: "bob@example.com".to_string(),
        body_len,
        html_len,
        ..Default::default()
    }
}

fn set(oracle: &str, rows: &[(&str, Outcome<MsgRecord>)]) -> OracleResultSet<MsgRecord> {
    let rows: BTreeMap<String, Outcome<MsgRecord>> = rows
        .iter()
        .map(|(f, o)| (f.to_string(), o.clone()))
        .collect();
    OracleResultSet::new(oracle, rows)
}

fn corpus() -> (Vec<String>, Vec<OracleResultSet<MsgRecord>>) {
    let files = vec![
        "/corpus/plain.msg".to_string(),
        "/corpus/html_only.msg".to_string(),
        "/corpus/broken.msg".to_string(),
    ];
    let sets = vec![
        set(
            "ruby-msg",
            &[
                ("/corpus/plain.msg", Outcome::Parsed(record("Quarterly report", 10_000, 0))),
                ("/corpus/html_only.msg", Outcome::Parsed(record("Newsletter", 0, 50_000))),
                ("/corpus/broken.msg", Outcome::Parsed(record("Broken", 10, 0))),
            ],
        ),
        set(
            "outlook_msg",
            &[
                ("/corpus/plain.msg", Outcome::Parsed(record("Quarterly  report\n", 9_700, 0))),
                ("/corpus/html_only.msg", Outcome::Parsed(record("Newsletter", 0, 52_000))),
                ("/corpus/broken.msg", Outcome::failed("Ole::Storage header mismatch")),
            ],
        ),
        set(
            "extract-msg",
            &[
                ("/corpus/plain.msg", Outcome::Parsed(record("Quarterly report", 10_100, 0))),
                ("/corpus/html_only.msg", Outcome::Parsed(record("Newsletter!", 0, 50_000))),
            ],
        ),
    ];
    (files, sets)
}

// ---- Deviation sets ----

#[test]
fn deviation_sets_follow_file_and_oracle_order() {
    let (files, sets) = corpus();
    let diff = baseline_diff(&files, &sets, "ruby-msg", &ComparisonProfile::msg_baseline())
        .expect("diff");

    let plain = &diff.files[0];
    assert_eq!(plain.file, "/corpus/plain.msg");
    assert_eq!(plain.oracles[0].oracle, "outlook_msg");
    assert_eq!(plain.oracles[0].issues.len(), 1);
    assert_eq!(plain.oracles[0].issues[0].field, Field::BodyLen);
    assert_eq!(plain.oracles[0].issues[0].severity, Severity::Medium);
    assert!(plain.oracles[1].issues.is_empty());

    let broken = &diff.files[2];
    assert_eq!(broken.oracles[0].issues[0].field, Field::Parser);
    assert_eq!(broken.oracles[1].issues[0].field, Field::Parser);
    assert_eq!(
        broken.oracles[1].issues[0].note.as_deref(),
        Some("missing comparator row")
    );
}

// ---- Policy evaluation ----

#[test]
fn default_policy_fails_on_high_only() {
    let (files, sets) = corpus();
    let policy = DeviationPolicy::default();
    let diff = baseline_diff(&files, &sets, &policy.baseline_parser, &ComparisonProfile::msg_baseline())
        .expect("diff");
    let verdict = policy.evaluate(&diff);

    let lines: Vec<String> = verdict.violations.iter().map(ToString::to_string).collect();
    assert_eq!(lines.len(), 3, "{lines:?}");
    assert!(lines[0].starts_with("[html_only.msg] [extract-msg] [high] subject baseline=Newsletter"));
    assert!(lines[1].starts_with("[broken.msg] [outlook_msg] [high] parser baseline={"));
    assert!(lines[1].ends_with("actual=error: Ole::Storage header mismatch"));
    assert!(lines[2].ends_with("actual=None"));
}

#[test]
fn allow_rules_silence_known_divergences() {
    let (files, sets) = corpus();
    let policy = DeviationPolicy::from_json(
        r#"{
            "baseline_parser": "ruby-msg",
            "fail_on_severity": ["high", "medium"],
            "allow_rules": [
                {"parser": "extract-msg"},
                {"field": "parser", "severity": "high"},
                {"parser": "outlook_msg", "field": "body_len", "severity": ""}
            ]
        }"#,
    )
    .expect("policy");
    let diff = baseline_diff(&files, &sets, &policy.baseline_parser, &ComparisonProfile::msg_baseline())
        .expect("diff");
    let verdict = policy.evaluate(&diff);
    assert!(verdict.passed(), "{:?}", verdict.violations);
    assert_eq!(verdict.render(GateKind::Baseline), "Baseline policy gate passed.\n");
}

#[test]
fn failed_gate_report_has_banner() {
    let (files, sets) = corpus();
    let policy = DeviationPolicy::strict("ruby-msg");
    let diff = baseline_diff(&files, &sets, "ruby-msg", &ComparisonProfile::msg_baseline())
        .expect("diff");
    let text = policy.evaluate(&diff).render(GateKind::Baseline);
    assert!(text.starts_with("BASELINE POLICY GATE FAILED\n- [plain.msg] [outlook_msg] [medium] body_len baseline=10000 actual=9700\n"));
}

// ---- Semantic profile ----

#[test]
fn semantic_profile_tolerates_html_drift() {
    let (files, sets) = corpus();
    let sets: Vec<_> = sets.into_iter().take(2).collect();
    let diff = baseline_diff(&files, &sets, "ruby-msg", &ComparisonProfile::msg_semantic())
        .expect("diff");
    let verdict = DeviationPolicy::strict("ruby-msg").evaluate(&diff);
    let fields: Vec<Field> = verdict.violations.iter().map(|v| v.issue.field).collect();
    assert_eq!(fields, vec![Field::BodyLen, Field::Parser]);
}
