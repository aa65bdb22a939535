use serde::Serialize;
use thiserror::Error;

/// Why a single line was rejected.
///
/// The set is closed: callers can match it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseError {
    /// Empty name before the first unescaped comma.
    #[error("missing_metric_name")]
    MissingMetricName,
    /// No unescaped comma at all.
    #[error("missing_comma")]
    MissingComma,
    /// No separator between the tags and fields sections.
    #[error("missing_whitespace")]
    #[serde(rename = "missing_whitespace")]
    MissingWhiteSpace,
    /// A tag pair with an empty key or value.
    #[error("bad_tags")]
    BadTags,
    /// Tag count at or above the configured ceiling.
    #[error("too_many_tags")]
    TooManyTags,
    /// Empty fields section.
    #[error("missing_fields")]
    MissingFields,
    /// Trailing timestamp is not a base-10 integer, or overflows once scaled.
    #[error("bad_timestamp")]
    BadTimestamp,
}

impl ParseError {
    pub const ALL: [ParseError; 7] = [
        ParseError::MissingMetricName,
        ParseError::MissingComma,
        ParseError::MissingWhiteSpace,
        ParseError::BadTags,
        ParseError::TooManyTags,
        ParseError::MissingFields,
        ParseError::BadTimestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingMetricName => "missing_metric_name",
            Self::MissingComma => "missing_comma",
            Self::MissingWhiteSpace => "missing_whitespace",
            Self::BadTags => "bad_tags",
            Self::TooManyTags => "too_many_tags",
            Self::MissingFields => "missing_fields",
            Self::BadTimestamp => "bad_timestamp",
        }
    }
}
