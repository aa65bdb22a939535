//! Segment boundary scans over a single line.
//!
//! A line is `name,tags fields [timestamp]`. Each scan returns the index of
//! the delimiter that ends its segment, so the next scan starts one past it.

use super::ParseError;
use super::escape::find_unescaped;

/// Returns the index of the comma that ends the metric name.
pub fn scan_name(buf: &[u8], escaped: bool) -> Result<usize, ParseError> {
    match find_unescaped(buf, b',', 0, escaped) {
        Some(0) => Err(ParseError::MissingMetricName),
        Some(end) => Ok(end),
        None => Err(ParseError::MissingComma),
    }
}

/// Returns the index of the space that ends the tags section.
///
/// The result may equal `start`; an empty tags section is valid.
pub fn scan_tags(buf: &[u8], start: usize, escaped: bool) -> Result<usize, ParseError> {
    find_unescaped(buf, b' ', start, escaped).ok_or(ParseError::MissingWhiteSpace)
}

/// Returns the end of the fields section: the next space, or the end of the
/// line when no timestamp follows.
pub fn scan_fields(buf: &[u8], start: usize, escaped: bool) -> Result<usize, ParseError> {
    match find_unescaped(buf, b' ', start, escaped) {
        Some(end) if end == start => Err(ParseError::MissingFields),
        Some(end) => Ok(end),
        None if start >= buf.len() => Err(ParseError::MissingFields),
        None => Ok(buf.len()),
    }
}
