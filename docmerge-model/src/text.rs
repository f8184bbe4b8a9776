//! Styled text runs and literal find-and-replace across them.

use crate::element::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// A span of text sharing one set of character attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl TextRun {
    /// Creates an unstyled run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: Attributes::new(),
        }
    }

    /// Creates a run with the given attributes.
    pub fn styled(text: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }
}

/// Concatenates the text of a run sequence.
pub fn concat(runs: &[TextRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// Byte ranges of the non-overlapping occurrences of `needle`, left to right.
///
/// Case-insensitive matching folds ASCII only, which keeps byte offsets of the
/// folded string identical to the original.
pub fn find_matches(haystack: &str, needle: &str, match_case: bool) -> Vec<(usize, usize)> {
    if needle.is_empty() {
        return Vec::new();
    }
    if match_case {
        haystack
            .match_indices(needle)
            .map(|(start, m)| (start, start + m.len()))
            .collect()
    } else {
        let folded = haystack.to_ascii_lowercase();
        let needle = needle.to_ascii_lowercase();
        folded
            .match_indices(&needle)
            .map(|(start, m)| (start, start + m.len()))
            .collect()
    }
}

/// Replaces every occurrence of `code` with `value` in a run sequence.
///
/// Occurrences may span run boundaries. The replacement takes the
/// attributes of the run in which the occurrence starts; the remainder of
/// the occurrence is removed from the following runs, and runs emptied that
/// way are dropped. Returns the number of occurrences replaced.
pub fn replace_in_runs(runs: &mut Vec<TextRun>, code: &str, value: &str, match_case: bool) -> usize {
    let full = concat(runs);
    let matches = find_matches(&full, code, match_case);
    if matches.is_empty() {
        return 0;
    }

    let mut pending = matches.iter().copied().peekable();
    let mut rebuilt = Vec::with_capacity(runs.len());
    let mut offset = 0;

    for run in runs.drain(..) {
        let start = offset;
        let end = start + run.text.len();
        offset = end;

        let mut text = String::with_capacity(run.text.len());
        let mut cursor = start;
        while cursor < end {
            match pending.peek().copied() {
                Some((m_start, m_end)) if m_start < end => {
                    if cursor < m_start {
                        text.push_str(&full[cursor..m_start]);
                        cursor = m_start;
                    }
                    if cursor == m_start {
                        text.push_str(value);
                    }
                    cursor = m_end.min(end);
                    if m_end <= end {
                        pending.next();
                    }
                }
                _ => {
                    text.push_str(&full[cursor..end]);
                    cursor = end;
                }
            }
        }

        if start == end || !text.is_empty() {
            rebuilt.push(TextRun {
                text,
                attributes: run.attributes,
            });
        }
    }

    *runs = rebuilt;
    matches.len()
}
