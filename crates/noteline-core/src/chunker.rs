//! Chunker
//!
//! Splits text into segments that each fit a byte budget. Cuts prefer the
//! last line break in the final fifth of a segment and otherwise fall on the
//! largest UTF-8 character boundary that fits.

use std::borrow::Cow;

use crate::constant::TRUNCATION_MARKER;

/// Chunking error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// A byte budget of zero can never make progress
    #[error("Chunk limit must be at least 1 byte")]
    ZeroLimit,
    /// A single character is wider than the budget
    #[error("Character at byte {offset} is {width} bytes, limit is {limit}")]
    CharTooWide {
        /// Byte offset of the character in the input
        offset: usize,
        /// Encoded width of the character
        width: usize,
        /// Byte budget
        limit: usize,
    },
}

/// Split `text` into ordered segments of at most `max_bytes` bytes each.
///
/// Concatenating the segments yields `text` exactly. Text that already fits
/// comes back as a single segment.
pub fn split(text: &str, max_bytes: usize) -> Result<Vec<&str>, ChunkError> {
    if max_bytes == 0 {
        return Err(ChunkError::ZeroLimit);
    }

    let mut segments = Vec::with_capacity(text.len() / max_bytes + 1);
    let mut rest = text;
    let mut offset = 0;

    while rest.len() > max_bytes {
        let cut = cut_point(rest, max_bytes).map_err(|width| ChunkError::CharTooWide {
            offset,
            width,
            limit: max_bytes,
        })?;
        let (segment, tail) = rest.split_at(cut);
        debug_assert!(!segment.is_empty() && segment.len() <= max_bytes);
        segments.push(segment);
        offset += cut;
        rest = tail;
    }
    segments.push(rest);

    debug_assert_eq!(segments.concat(), text);
    Ok(segments)
}

/// Byte offset to cut `text` at, or the width of the leading character if
/// even one character does not fit
fn cut_point(text: &str, max_bytes: usize) -> Result<usize, usize> {
    // Candidate segment lengths: every char end within reach of the budget.
    // A char is at most 4 bytes, so nothing past `max_bytes + 4` can matter.
    let ends: Vec<usize> = text
        .char_indices()
        .map(|(start, c)| start + c.len_utf8())
        .take_while(|&end| end <= max_bytes + 4)
        .collect();

    let fitting = ends.partition_point(|&end| end <= max_bytes);
    if fitting == 0 {
        return Err(ends.first().copied().unwrap_or(text.len()));
    }
    let exact = ends[fitting - 1];

    // Prefer ending on a newline inside the final fifth of the segment
    let window_start = exact - exact / 5;
    match text[..exact].rfind('\n') {
        Some(newline) if newline + 1 >= window_start => Ok(newline + 1),
        _ => Ok(exact),
    }
}

/// Largest char boundary at or below `index`
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Cut `text` so that it plus [`TRUNCATION_MARKER`] fits in `max_bytes`.
///
/// Text that already fits is returned unchanged. When the budget is smaller
/// than the marker itself the text is cut without a marker.
pub fn truncate_with_marker(text: &str, max_bytes: usize) -> Cow<'_, str> {
    if text.len() <= max_bytes {
        return Cow::Borrowed(text);
    }

    if max_bytes < TRUNCATION_MARKER.len() {
        return Cow::Borrowed(&text[..floor_char_boundary(text, max_bytes)]);
    }

    let body = floor_char_boundary(text, max_bytes - TRUNCATION_MARKER.len());
    let mut truncated = String::with_capacity(body + TRUNCATION_MARKER.len());
    truncated.push_str(&text[..body]);
    truncated.push_str(TRUNCATION_MARKER);
    Cow::Owned(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(text: &str, max_bytes: usize) -> Vec<&str> {
        let segments = split(text, max_bytes).unwrap();
        assert_eq!(segments.concat(), text);
        for segment in &segments {
            assert!(segment.len() <= max_bytes, "segment of {} bytes", segment.len());
        }
        segments
    }

    #[test]
    fn test_short_text_is_single_segment() {
        assert_eq!(split("hello", 800).unwrap(), vec!["hello"]);
        assert_eq!(split("", 800).unwrap(), vec![""]);
        assert_eq!(split("exact", 5).unwrap(), vec!["exact"]);
    }

    #[test]
    fn test_exact_cut_without_newlines() {
        let text = "a".repeat(2000);
        let segments = assert_valid(&text, 800);
        let lens: Vec<usize> = segments.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![800, 800, 400]);
    }

    #[test]
    fn test_prefers_newline_in_final_fifth() {
        // Newline at byte 90 of a 100-byte budget: inside the last 20%
        let text = format!("{}\n{}", "a".repeat(90), "b".repeat(50));
        let segments = assert_valid(&text, 100);
        assert_eq!(segments[0], format!("{}\n", "a".repeat(90)));
        assert_eq!(segments[1], "b".repeat(50));
    }

    #[test]
    fn test_ignores_early_newline() {
        // Newline at byte 10 is too early to be worth the short segment
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(150));
        let segments = assert_valid(&text, 100);
        assert_eq!(segments[0].len(), 100);
    }

    #[test]
    fn test_never_splits_code_points() {
        // 3-byte characters against a budget that is not a multiple of 3
        let text = "€".repeat(100);
        let segments = assert_valid(&text, 10);
        assert!(segments.iter().all(|s| s.len() == 9 || s.len() == 300 % 9));

        let mixed = "aé€😀".repeat(50);
        for max in 4..20 {
            assert_valid(&mixed, max);
        }
    }

    #[test]
    fn test_every_limit_round_trips() {
        let text = "line one\nline two is longer\n\nüñïçødé and emoji 😀😀\nend";
        for max in 4..=text.len() + 1 {
            assert_valid(text, max);
        }
    }

    #[test]
    fn test_zero_limit() {
        assert_eq!(split("abc", 0), Err(ChunkError::ZeroLimit));
    }

    #[test]
    fn test_char_wider_than_limit() {
        assert_eq!(
            split("ab😀", 3),
            Err(ChunkError::CharTooWide {
                offset: 2,
                width: 4,
                limit: 3
            })
        );
        // Single-byte text works with a one-byte budget
        assert_eq!(split("abc", 1).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_truncate_with_marker() {
        assert_eq!(truncate_with_marker("short", 100), "short");

        let text = "x".repeat(200);
        let truncated = truncate_with_marker(&text, 100);
        assert_eq!(truncated.len(), 100);
        assert!(truncated.ends_with(TRUNCATION_MARKER));

        let text = "€".repeat(100);
        let truncated = truncate_with_marker(&text, 50);
        assert!(truncated.len() <= 50);
        assert!(truncated.ends_with(TRUNCATION_MARKER));

        let truncated = truncate_with_marker("abcdefghijklmnop", 4);
        assert_eq!(truncated, "abcd");
    }
}
