use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

use crate::error::IngestError;
use crate::protocol::ParseError;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Tag set of a single metric. Keys are unique; later duplicates on a line win.
pub type Tags = BTreeMap<String, String>;

/// One `key=value` pair of the fields section, kept as raw bytes.
///
/// Values are not decoded into typed numbers, booleans or strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    pub value: Bytes,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A metric point produced from one line-protocol line.
///
/// Built once per successfully parsed line and owned by the caller afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub namespace: String,
    pub name: String,
    pub tags: Tags,
    #[serde(skip)]
    pub fields: Vec<Field>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Metric {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Result of parsing exactly one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A complete metric line.
    Parsed(Metric),
    /// A comment or blank line.
    Skip,
    /// A malformed line.
    Fail(ParseError),
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn metric(self) -> Option<Metric> {
        match self {
            Self::Parsed(metric) => Some(metric),
            Self::Skip | Self::Fail(_) => None,
        }
    }

    pub fn error(&self) -> Option<ParseError> {
        match self {
            Self::Fail(error) => Some(*error),
            Self::Parsed(_) | Self::Skip => None,
        }
    }
}
