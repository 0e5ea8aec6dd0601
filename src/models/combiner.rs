//! Combines the three classifier outputs into a composite QuAL score

use crate::error::{Result, ScoringError};
use crate::types::{ClassifierOutput, CompositeScore, ModelSlot, RawTriple, YesNo};

/// Tag carried by every label the QuAL models emit (`LABEL_0`, `LABEL_1`, ...)
pub const LABEL_PREFIX: &str = "LABEL_";

/// Class identifier meaning "signal present" for the suggestion models
const PRESENT: &str = "0";
/// Class identifier meaning "signal absent" for the suggestion models
const ABSENT: &str = "1";

/// Extract the bare class identifier from a classifier label.
///
/// The prefix match ignores ASCII case; the remainder must be a non-empty
/// run of digits.
pub fn decode_class_id<'a>(slot: ModelSlot, label: &'a str) -> Result<&'a str> {
    let violation = || ScoringError::LabelFormat {
        model: slot.id().to_string(),
        label: label.to_string(),
    };

    let prefix = label.get(..LABEL_PREFIX.len()).ok_or_else(violation)?;
    if !prefix.eq_ignore_ascii_case(LABEL_PREFIX) {
        return Err(violation());
    }

    let id = &label[LABEL_PREFIX.len()..];
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(violation());
    }
    Ok(id)
}

fn top_class_id(slot: ModelSlot, output: &ClassifierOutput) -> Result<&str> {
    let top = output.top().ok_or_else(|| ScoringError::LabelFormat {
        model: slot.id().to_string(),
        label: String::new(),
    })?;
    decode_class_id(slot, &top.label)
}

/// Combine one comment's raw classifier outputs into its composite score.
///
/// When model 2 reports no suggestion, model 3 is forced to "not linked"
/// before anything is derived from it.
pub fn combine(raw: &RawTriple) -> Result<CompositeScore> {
    let q1 = top_class_id(ModelSlot::Q1, &raw.q1)?;
    let q2i = top_class_id(ModelSlot::Q2i, &raw.q2i)?;
    let mut q3i = top_class_id(ModelSlot::Q3i, &raw.q3i)?;

    if q2i == ABSENT {
        q3i = ABSENT;
    }

    let evidence: u8 = q1.parse().map_err(|_| ScoringError::LabelFormat {
        model: ModelSlot::Q1.id().to_string(),
        label: q1.to_string(),
    })?;

    let suggestion_given = q2i == PRESENT;
    let suggestion_linked = q3i == PRESENT;
    let qual = evidence
        .saturating_add(u8::from(suggestion_given))
        .saturating_add(u8::from(suggestion_linked));

    Ok(CompositeScore {
        qual,
        q1: q1.to_string(),
        q2i: YesNo::from_flag(suggestion_given),
        q3i: YesNo::from_flag(suggestion_linked),
    })
}
