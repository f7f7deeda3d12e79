//! Line protocol decoders.
//!
//! Every oracle writes one `|`-separated line per input file, led by a
//! marker token. Free-text fields are base64 (standard alphabet) so pipes,
//! newlines and NUL bytes survive; counts and digests are plain.
//!
//! | family      | success row                                   | min fields |
//! |-------------|-----------------------------------------------|------------|
//! | msg         | `ROW\|file\|15 fields`                         | 17         |
//! | eml         | `ROW\|file\|9 fields`                          | 11         |
//! | warnings    | `OK\|file`, `WARN\|file\|5 b64 fields`          | 2 / 7      |
//! | pst report  | `ROW\|file\|status\|index\|descriptors\|b64 codes` | 6      |
//! | pst probe   | `ROW\|file\|items\|folders\|messages`           | 5          |
//!
//! All families accept `ERR|file|b64 message`. Lines with an unknown marker,
//! too few fields, or an undecodable field are skipped. Extra trailing fields
//! are ignored.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use mailparity_core::normalize::{normalize_text, preview};
use mailparity_core::obs;
use mailparity_core::{
    EmlRecord, MsgRecord, OracleResultSet, Outcome, PstProbe, PstReport, WarningRecord,
    WarningsByFile,
};

const MSG_FIELDS: usize = 17;
const EML_FIELDS: usize = 11;
const WARN_FIELDS: usize = 7;
const PST_REPORT_FIELDS: usize = 6;
const PST_PROBE_FIELDS: usize = 5;
const ERR_FIELDS: usize = 3;

/// Why a line was not turned into a row.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Skip {
    UnknownMarker,
    Short { got: usize, want: usize },
    Malformed(&'static str),
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::UnknownMarker => f.write_str("unknown marker"),
            Skip::Short { got, want } => write!(f, "short row ({got} < {want} fields)"),
            Skip::Malformed(field) => write!(f, "malformed {field}"),
        }
    }
}

type Step = std::result::Result<(), Skip>;

/// Feed every non-empty line, split on `|`, to `accept`; log skipped lines.
fn scan<'a>(oracle: &str, stdout: &'a str, mut accept: impl FnMut(&[&'a str]) -> Step) {
    for (idx, line) in stdout.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if let Err(skip) = accept(&parts) {
            obs::emit_line_skipped(oracle, idx + 1, &skip.to_string());
        }
    }
}

fn need(parts: &[&str], want: usize) -> Step {
    if parts.len() < want {
        Err(Skip::Short {
            got: parts.len(),
            want,
        })
    } else {
        Ok(())
    }
}

fn decode_raw(value: &str, field: &'static str) -> std::result::Result<String, Skip> {
    STANDARD
        .decode(value.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|_| Skip::Malformed(field))
}

fn decode_text(value: &str, field: &'static str) -> std::result::Result<String, Skip> {
    decode_raw(value, field).map(|s| normalize_text(&s))
}

fn decode_preview(value: &str, field: &'static str) -> std::result::Result<String, Skip> {
    decode_raw(value, field).map(|s| preview(&s))
}

fn count(value: &str, field: &'static str) -> std::result::Result<u64, Skip> {
    value.trim().parse().map_err(|_| Skip::Malformed(field))
}

/// Error payloads fall back to the raw text when not valid base64.
fn error_text(value: &str) -> String {
    decode_raw(value, "error").unwrap_or_else(|_| value.to_string())
}

/// Shared handling of `ERR|file|b64 message`.
fn accept_err<R>(parts: &[&str], records: &mut BTreeMap<String, Outcome<R>>) -> Step {
    need(parts, ERR_FIELDS)?;
    records.insert(parts[1].to_string(), Outcome::failed(error_text(parts[2])));
    Ok(())
}

/// Compound mail object rows.
pub fn decode_msg(oracle: &str, stdout: &str) -> OracleResultSet<MsgRecord> {
    let mut records = BTreeMap::new();
    scan(oracle, stdout, |parts| match parts[0] {
        "ROW" => {
            need(parts, MSG_FIELDS)?;
            let record = MsgRecord {
                subject: decode_text(parts[2], "subject")?,
                from: decode_text(parts[3], "from")?,
                to: decode_text(parts[4], "to")?,
                cc: decode_text(parts[5], "cc")?,
                bcc: decode_text(parts[6], "bcc")?,
                message_id: decode_text(parts[7], "message_id")?,
                recipient_count: count(parts[8], "recipient_count")?,
                attachment_count: count(parts[9], "attachment_count")?,
                first_recipient_email: decode_text(parts[10], "first_recipient_email")?,
                body_len: count(parts[11], "body_len")?,
                html_len: count(parts[12], "html_len")?,
                body_sha256: parts[13].trim().to_ascii_lowercase(),
                html_sha256: parts[14].trim().to_ascii_lowercase(),
                body_preview: decode_preview(parts[15], "body_preview")?,
                html_preview: decode_preview(parts[16], "html_preview")?,
            };
            records.insert(parts[1].to_string(), Outcome::Parsed(record));
            Ok(())
        }
        "ERR" => accept_err(parts, &mut records),
        _ => Err(Skip::UnknownMarker),
    });
    OracleResultSet::new(oracle, records)
}

/// Plain internet-mail rows.
pub fn decode_eml(oracle: &str, stdout: &str) -> OracleResultSet<EmlRecord> {
    let mut records = BTreeMap::new();
    scan(oracle, stdout, |parts| match parts[0] {
        "ROW" => {
            need(parts, EML_FIELDS)?;
            let multipart = match parts[7].trim() {
                "1" => true,
                "0" => false,
                _ => return Err(Skip::Malformed("multipart")),
            };
            let record = EmlRecord {
                subject: decode_text(parts[2], "subject")?,
                from: decode_text(parts[3], "from")?,
                to: decode_text(parts[4], "to")?,
                cc: decode_text(parts[5], "cc")?,
                content_type: decode_text(parts[6], "content_type")?,
                multipart,
                parts_count: count(parts[8], "parts_count")?,
                body_len: count(parts[9], "body_len")?,
                body_preview: decode_preview(parts[10], "body_preview")?,
            };
            records.insert(parts[1].to_string(), Outcome::Parsed(record));
            Ok(())
        }
        "ERR" => accept_err(parts, &mut records),
        _ => Err(Skip::UnknownMarker),
    });
    OracleResultSet::new(oracle, records)
}

/// Report-mode warning stream. `ERR` rows become a synthetic
/// `parse_error` warning.
pub fn decode_warnings(oracle: &str, stdout: &str) -> WarningsByFile {
    let mut by_file = WarningsByFile::new();
    scan(oracle, stdout, |parts| match parts[0] {
        "OK" => {
            need(parts, 2)?;
            by_file.entry(parts[1].to_string()).or_default();
            Ok(())
        }
        "WARN" => {
            need(parts, WARN_FIELDS)?;
            let warning = WarningRecord {
                code: decode_raw(parts[2], "code")?,
                severity: decode_raw(parts[3], "severity")?,
                recoverable: decode_raw(parts[4], "recoverable")? == "true",
                context: decode_raw(parts[5], "context")?,
                message: decode_raw(parts[6], "message")?,
            };
            by_file.entry(parts[1].to_string()).or_default().push(warning);
            Ok(())
        }
        "ERR" => {
            need(parts, ERR_FIELDS)?;
            by_file
                .entry(parts[1].to_string())
                .or_default()
                .push(WarningRecord::parse_error(error_text(parts[2])));
            Ok(())
        }
        _ => Err(Skip::UnknownMarker),
    });
    by_file
}

/// Report-mode archive rows for the fixture gate. `status != ok` carries
/// the error text in the payload field.
pub fn decode_pst_report(oracle: &str, stdout: &str) -> OracleResultSet<PstReport> {
    let mut records = BTreeMap::new();
    scan(oracle, stdout, |parts| match parts[0] {
        "ROW" => {
            need(parts, PST_REPORT_FIELDS)?;
            let outcome = if parts[2].trim() == "ok" {
                let codes = decode_raw(parts[5], "codes")?
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
                Outcome::Parsed(PstReport {
                    index_count: count(parts[3], "index_count")?,
                    descriptor_count: count(parts[4], "descriptor_count")?,
                    codes,
                })
            } else {
                Outcome::failed(error_text(parts[5]))
            };
            records.insert(parts[1].to_string(), outcome);
            Ok(())
        }
        "ERR" => accept_err(parts, &mut records),
        _ => Err(Skip::UnknownMarker),
    });
    OracleResultSet::new(oracle, records)
}

/// Archive structural counts.
pub fn decode_pst_probe(oracle: &str, stdout: &str) -> OracleResultSet<PstProbe> {
    let mut records = BTreeMap::new();
    scan(oracle, stdout, |parts| match parts[0] {
        "ROW" => {
            need(parts, PST_PROBE_FIELDS)?;
            let probe = PstProbe {
                item_count: count(parts[2], "item_count")?,
                folder_count: count(parts[3], "folder_count")?,
                message_count: count(parts[4], "message_count")?,
            };
            records.insert(parts[1].to_string(), Outcome::Parsed(probe));
            Ok(())
        }
        "ERR" => accept_err(parts, &mut records),
        _ => Err(Skip::UnknownMarker),
    });
    OracleResultSet::new(oracle, records)
}
