//! Per-oracle result records and the result sets that hold them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// One oracle's view of one input file: either a parsed record or the
/// oracle's failure description, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome<R> {
    Parsed(R),
    Failed { error: String },
}

impl<R> Outcome<R> {
    pub fn failed(error: impl Into<String>) -> Self {
        Outcome::Failed {
            error: error.into(),
        }
    }

    pub fn parsed(&self) -> Option<&R> {
        match self {
            Outcome::Parsed(record) => Some(record),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Parsed(_) => None,
            Outcome::Failed { error } => Some(error),
        }
    }
}

impl<R: Serialize> Outcome<R> {
    /// Compact one-line rendering used as context in record-level issues.
    pub fn summary(&self) -> String {
        match self {
            Outcome::Parsed(record) => {
                serde_json::to_string(record).unwrap_or_else(|e| format!("<unserializable: {e}>"))
            }
            Outcome::Failed { error } => format!("error: {error}"),
        }
    }
}

/// All records one oracle produced for one batch, keyed by file path as the
/// oracle echoed it. Built once per run and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleResultSet<R> {
    oracle: String,
    records: BTreeMap<String, Outcome<R>>,
}

impl<R> OracleResultSet<R> {
    pub fn new(oracle: impl Into<String>, records: BTreeMap<String, Outcome<R>>) -> Self {
        Self {
            oracle: oracle.into(),
            records,
        }
    }

    /// A set with no rows, as produced by an oracle that was skipped.
    pub fn empty(oracle: impl Into<String>) -> Self {
        Self::new(oracle, BTreeMap::new())
    }

    pub fn oracle(&self) -> &str {
        &self.oracle
    }

    pub fn get(&self, file: &str) -> Option<&Outcome<R>> {
        self.records.get(file)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Outcome<R>)> {
        self.records.iter()
    }
}

/// A comparable attribute of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Subject,
    From,
    To,
    Cc,
    Bcc,
    MessageId,
    RecipientCount,
    AttachmentCount,
    FirstRecipientEmail,
    BodyLen,
    HtmlLen,
    BodySha256,
    HtmlSha256,
    BodyPreview,
    HtmlPreview,
    ContentType,
    Multipart,
    PartsCount,
    /// Presence of an HTML body (cross-field loss check).
    Html,
    /// Record-level issue: one side has no usable record.
    Parser,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Subject => "subject",
            Field::From => "from",
            Field::To => "to",
            Field::Cc => "cc",
            Field::Bcc => "bcc",
            Field::MessageId => "message_id",
            Field::RecipientCount => "recipient_count",
            Field::AttachmentCount => "attachment_count",
            Field::FirstRecipientEmail => "first_recipient_email",
            Field::BodyLen => "body_len",
            Field::HtmlLen => "html_len",
            Field::BodySha256 => "body_sha256",
            Field::HtmlSha256 => "html_sha256",
            Field::BodyPreview => "body_preview",
            Field::HtmlPreview => "html_preview",
            Field::ContentType => "content_type",
            Field::Multipart => "multipart",
            Field::PartsCount => "parts_count",
            Field::Html => "html",
            Field::Parser => "parser",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Count(u64),
    Flag(bool),
}

impl FieldValue {
    pub fn as_count(&self) -> Option<u64> {
        match self {
            FieldValue::Count(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// Field access for a record family. Returns `None` for fields the family
/// does not carry.
pub trait FieldSource {
    fn field_value(&self, field: Field) -> Option<FieldValue>;
}

/// Compound mail object (`.msg`) record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRecord {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub message_id: String,
    pub recipient_count: u64,
    pub attachment_count: u64,
    pub first_recipient_email: String,
    pub body_len: u64,
    pub html_len: u64,
    pub body_sha256: String,
    pub html_sha256: String,
    pub body_preview: String,
    pub html_preview: String,
}

impl FieldSource for MsgRecord {
    fn field_value(&self, field: Field) -> Option<FieldValue> {
        let text = |s: &String| Some(FieldValue::Text(s.clone()));
        match field {
            Field::Subject => text(&self.subject),
            Field::From => text(&self.from),
            Field::To => text(&self.to),
            Field::Cc => text(&self.cc),
            Field::Bcc => text(&self.bcc),
            Field::MessageId => text(&self.message_id),
            Field::RecipientCount => Some(FieldValue::Count(self.recipient_count)),
            Field::AttachmentCount => Some(FieldValue::Count(self.attachment_count)),
            Field::FirstRecipientEmail => text(&self.first_recipient_email),
            Field::BodyLen => Some(FieldValue::Count(self.body_len)),
            Field::HtmlLen => Some(FieldValue::Count(self.html_len)),
            Field::BodySha256 => text(&self.body_sha256),
            Field::HtmlSha256 => text(&self.html_sha256),
            Field::BodyPreview => text(&self.body_preview),
            Field::HtmlPreview => text(&self.html_preview),
            Field::ContentType | Field::Multipart | Field::PartsCount => None,
            Field::Html | Field::Parser => None,
        }
    }
}

/// Plain internet-mail (`.eml`) record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmlRecord {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub content_type: String,
    pub multipart: bool,
    pub parts_count: u64,
    pub body_len: u64,
    pub body_preview: String,
}

impl FieldSource for EmlRecord {
    fn field_value(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Subject => Some(FieldValue::Text(self.subject.clone())),
            Field::From => Some(FieldValue::Text(self.from.clone())),
            Field::To => Some(FieldValue::Text(self.to.clone())),
            Field::Cc => Some(FieldValue::Text(self.cc.clone())),
            Field::ContentType => Some(FieldValue::Text(self.content_type.clone())),
            Field::Multipart => Some(FieldValue::Flag(self.multipart)),
            Field::PartsCount => Some(FieldValue::Count(self.parts_count)),
            Field::BodyLen => Some(FieldValue::Count(self.body_len)),
            Field::BodyPreview => Some(FieldValue::Text(self.body_preview.clone())),
            _ => None,
        }
    }
}

/// Report-mode summary of a mailbox archive (`.pst`) used by the fixture gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PstReport {
    pub index_count: u64,
    pub descriptor_count: u64,
    /// Distinct diagnostic codes raised while opening the archive.
    pub codes: BTreeSet<String>,
}

/// Structural counts of a mailbox archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PstProbe {
    pub item_count: u64,
    pub folder_count: u64,
    pub message_count: u64,
}

/// Corroborating counts from a `readpst` extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadpstCounts {
    pub eml_count: u64,
    pub folder_dirs: u64,
}
