use super::ParseError;
use super::escape::find_unescaped;
use crate::types::Tags;

/// Decodes the comma-separated `key=value` pairs in `buf[start..end]`.
///
/// Keys and values keep their raw bytes, escapes included. A later pair with
/// the same key replaces an earlier one.
pub fn decode_tags(buf: &[u8], start: usize, end: usize, escaped: bool) -> Result<Tags, ParseError> {
    let mut tags = Tags::new();
    let end = end.min(buf.len());
    let mut start = start;

    loop {
        if start + 1 >= end {
            return Ok(tags);
        }

        let comma_at = find_unescaped(buf, b',', start, escaped).filter(|&at| at < end);
        let equal_at = find_unescaped(buf, b'=', start, escaped).ok_or(ParseError::BadTags)?;
        let boundary = comma_at.unwrap_or(end);
        if equal_at <= start || equal_at + 1 >= boundary {
            return Err(ParseError::BadTags);
        }

        tags.insert(
            lossy(&buf[start..equal_at]),
            lossy(&buf[equal_at + 1..boundary]),
        );

        match comma_at {
            Some(at) => start = at + 1,
            None => return Ok(tags),
        }
    }
}

#[inline]
pub(crate) fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(segment: &[u8]) -> Result<Tags, ParseError> {
        decode_tags(segment, 0, segment.len(), segment.contains(&b'\\'))
    }

    #[test]
    fn decodes_pairs() {
        let tags = decode(b"location=us-midwest,season=summer").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["location"], "us-midwest");
        assert_eq!(tags["season"], "summer");
    }

    #[test]
    fn empty_section_is_empty_map() {
        assert!(decode(b"").unwrap().is_empty());
    }

    #[test]
    fn stops_at_segment_end() {
        let line = b"cpu,host=a,dc=eu value=1,other=2";
        let tags = decode_tags(line, 4, 16, false).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["dc"], "eu");
    }

    #[test]
    fn later_duplicate_wins() {
        let tags = decode(b"host=a,host=b").unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["host"], "b");
    }

    #[test]
    fn escaped_delimiters_stay_in_values() {
        let tags = decode(b"path=a\\,b,k\\=x=v").unwrap();
        assert_eq!(tags["path"], "a\\,b");
        assert_eq!(tags["k\\=x"], "v");
    }

    #[test]
    fn malformed_pairs() {
        assert_eq!(decode(b"=a"), Err(ParseError::BadTags));
        assert_eq!(decode(b"host="), Err(ParseError::BadTags));
        assert_eq!(decode(b"host=,dc=eu"), Err(ParseError::BadTags));
        assert_eq!(decode(b"host,dc=eu"), Err(ParseError::BadTags));
        assert_eq!(decode(b"hostname"), Err(ParseError::BadTags));
    }
}
