//! Name redaction collaborator.
//!
//! Feedback often names the learner. A redactor finds those mentions so a
//! host can mask them before comments leave the institution. Only the
//! contract lives here; implementations plug in from outside the crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Full name to the nicknames it also appears under
pub type NameAliases = HashMap<String, Vec<String>>;

/// A span of `text` recognised as a name.
///
/// `start` and `end` are byte offsets into the original text, end-exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSpan {
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Finds personal names in free text
pub trait Redactor: Send + Sync {
    fn redact(&self, text: &str, names: &[String], aliases: &NameAliases) -> Vec<TaggedSpan>;
}

/// Replace every span in `text` with `[label]`.
///
/// Spans are applied back to front; overlapping or out-of-range spans are
/// skipped.
pub fn mask(text: &str, spans: &[TaggedSpan]) -> String {
    let mut ordered: Vec<&TaggedSpan> = spans.iter().collect();
    ordered.sort_by_key(|span| std::cmp::Reverse(span.start));

    let mut masked = text.to_string();
    let mut limit = text.len();
    for span in ordered {
        if span.start > span.end
            || span.end > limit
            || !masked.is_char_boundary(span.start)
            || !masked.is_char_boundary(span.end)
        {
            continue;
        }
        masked.replace_range(span.start..span.end, &format!("[{}]", span.label));
        limit = span.start;
    }
    masked
}
