use std::fmt;
use std::sync::Arc;

use super::escape::{find_unescaped, has_escapes};
use super::scan::{scan_fields, scan_name, scan_tags};
use super::tags::{decode_tags, lossy};
use super::timestamp::{Clock, SystemClock, normalize};
use super::ParseError;
use crate::config::DEFAULT_MAX_TAGS;
use crate::types::{Field, Metric, ParseOutcome};

/// Parses single line-protocol lines into [`Metric`]s.
///
/// The parser is stateless apart from its configuration and can be shared
/// between workers.
#[derive(Clone)]
pub struct LineParser {
    max_tags: usize,
    capture_fields: bool,
    clock: Arc<dyn Clock>,
}

impl LineParser {
    /// Creates a parser that rejects lines carrying `max_tags` or more tags.
    pub fn new(max_tags: usize) -> Self {
        Self {
            max_tags,
            capture_fields: false,
            clock: Arc::new(SystemClock),
        }
    }

    /// Keeps the raw `key=value` pairs of the fields section on each metric.
    pub fn with_field_capture(mut self, enabled: bool) -> Self {
        self.capture_fields = enabled;
        self
    }

    /// Replaces the clock used for lines without a timestamp.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    pub fn captures_fields(&self) -> bool {
        self.capture_fields
    }

    /// Parses one line (terminator excluded).
    pub fn parse_line(&self, line: &[u8], namespace: &str, multiplier: i64) -> ParseOutcome {
        if line.first() == Some(&b'#') || line.iter().all(u8::is_ascii_whitespace) {
            return ParseOutcome::Skip;
        }

        match self.parse_metric(line, namespace, multiplier) {
            Ok(metric) => ParseOutcome::Parsed(metric),
            Err(error) => ParseOutcome::Fail(error),
        }
    }

    fn parse_metric(&self, line: &[u8], namespace: &str, multiplier: i64) -> Result<Metric, ParseError> {
        let escaped = has_escapes(line);

        let name_end = scan_name(line, escaped)?;
        let tags_end = scan_tags(line, name_end + 1, escaped)?;
        let tags = decode_tags(line, name_end + 1, tags_end, escaped)?;
        if tags.len() >= self.max_tags {
            return Err(ParseError::TooManyTags);
        }

        let fields_start = tags_end + 1;
        let fields_end = scan_fields(line, fields_start, escaped)?;
        let fields = if self.capture_fields {
            split_fields(line, fields_start, fields_end, escaped)
        } else {
            Vec::new()
        };

        let timestamp = normalize(line, fields_end + 1, multiplier, self.clock.as_ref())?;

        Ok(Metric {
            namespace: namespace.to_owned(),
            name: lossy(&line[..name_end]),
            tags,
            fields,
            timestamp,
        })
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAGS)
    }
}

impl fmt::Debug for LineParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineParser")
            .field("max_tags", &self.max_tags)
            .field("capture_fields", &self.capture_fields)
            .finish_non_exhaustive()
    }
}

/// Splits `buf[start..end]` on unescaped commas into raw fields.
///
/// Pairs without an unescaped `=` are kept with an empty value.
fn split_fields(buf: &[u8], start: usize, end: usize, escaped: bool) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut from = start;
    while from < end {
        let pair_end = find_unescaped(buf, b',', from, escaped)
            .filter(|&at| at < end)
            .unwrap_or(end);
        let pair = &buf[from..pair_end];
        match find_unescaped(pair, b'=', 0, escaped) {
            Some(eq) => fields.push(Field::new(lossy(&pair[..eq]), pair[eq + 1..].to_vec())),
            None => fields.push(Field::new(lossy(pair), Vec::new())),
        }
        from = pair_end + 1;
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FixedClock;

    const NOW: i64 = 1_700_000_000_000;

    fn parser() -> LineParser {
        LineParser::new(DEFAULT_MAX_TAGS).with_clock(Arc::new(FixedClock(NOW)))
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let parser = parser();
        assert_eq!(parser.parse_line(b"# a comment", "db", 1), ParseOutcome::Skip);
        assert_eq!(parser.parse_line(b"", "db", 1), ParseOutcome::Skip);
        assert_eq!(parser.parse_line(b"  \r", "db", 1), ParseOutcome::Skip);
    }

    #[test]
    fn name_without_tags() {
        let metric = parser().parse_line(b"cpu, usage=0.5 1000", "db", 1).metric().unwrap();
        assert_eq!(metric.name, "cpu");
        assert!(metric.tags.is_empty());
        assert_eq!(metric.timestamp, 1000);
    }

    #[test]
    fn missing_timestamp_is_stamped_with_clock() {
        let metric = parser().parse_line(b"cpu,host=a usage=0.5", "db", 1).metric().unwrap();
        assert_eq!(metric.timestamp, NOW);
        assert!(metric.fields.is_empty());
    }

    #[test]
    fn captured_fields_keep_raw_values() {
        let parser = parser().with_field_capture(true);
        let metric = parser
            .parse_line(b"cpu,host=a usage=0.5,label=\"a\\,b\",ok=t 1", "db", 1)
            .metric()
            .unwrap();
        let keys: Vec<_> = metric.fields.iter().map(|field| field.key.as_str()).collect();
        assert_eq!(keys, ["usage", "label", "ok"]);
        assert_eq!(&metric.fields[1].value[..], b"\"a\\,b\"");
    }

    #[test]
    fn first_failing_stage_wins() {
        let parser = parser();
        assert_eq!(
            parser.parse_line(b"cpu,host= usage", "db", 1).error(),
            Some(ParseError::BadTags)
        );
        assert_eq!(
            parser.parse_line(b"cpu,host=a", "db", 1).error(),
            Some(ParseError::MissingWhiteSpace)
        );
        assert_eq!(
            parser.parse_line(b"cpu,host=a ", "db", 1).error(),
            Some(ParseError::MissingFields)
        );
        assert_eq!(
            parser.parse_line(b"cpu,host=a v=1 soon", "db", 1).error(),
            Some(ParseError::BadTimestamp)
        );
    }

    #[test]
    fn tag_ceiling_is_inclusive() {
        let parser = LineParser::new(2).with_clock(Arc::new(FixedClock(NOW)));
        assert!(parser.parse_line(b"cpu,a=1 v=1", "db", 1).is_parsed());
        assert_eq!(
            parser.parse_line(b"cpu,a=1,b=2 v=1", "db", 1).error(),
            Some(ParseError::TooManyTags)
        );
    }
}
