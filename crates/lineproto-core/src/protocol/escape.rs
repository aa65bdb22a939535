use memchr::memchr;

pub(crate) const BACKSLASH: u8 = b'\\';

/// Returns true when the line contains at least one backslash.
///
/// Lines without one can skip escape accounting entirely.
#[inline]
pub fn has_escapes(buf: &[u8]) -> bool {
    memchr(BACKSLASH, buf).is_some()
}

/// Finds the first unescaped `target` at or after `start`.
///
/// A candidate is escaped when it is preceded by an odd run of backslashes.
/// The run is counted backwards but never past `start`, so a search resumed
/// from a previous hit sees the same window the caller handed in.
///
/// ```
/// use lineproto_core::protocol::find_unescaped;
///
/// assert_eq!(find_unescaped(b"abc\\,\\,,", b',', 0, true), Some(7));
/// assert_eq!(find_unescaped(b"abc\\\\,", b',', 0, true), Some(5));
/// assert_eq!(find_unescaped(b"\\\\\\,", b',', 0, true), None);
/// ```
pub fn find_unescaped(buf: &[u8], target: u8, start: usize, may_be_escaped: bool) -> Option<usize> {
    let mut from = start;
    loop {
        if from >= buf.len() {
            return None;
        }
        let at = from + memchr(target, &buf[from..])?;
        if !may_be_escaped {
            return Some(at);
        }

        let mut cursor = at;
        while cursor > start && buf[cursor - 1] == BACKSLASH {
            cursor -= 1;
        }
        if (at - cursor) & 1 == 1 {
            from = at + 1;
            continue;
        }
        return Some(at);
    }
}
