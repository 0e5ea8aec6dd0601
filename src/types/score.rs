//! Composite QuAL score structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary answer used for the suggestion fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn from_flag(flag: bool) -> Self {
        if flag {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-comment scoring result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Overall QuAL score
    pub qual: u8,
    /// Evidence class identifier from model 1
    pub q1: String,
    /// Suggestion given
    pub q2i: YesNo,
    /// Suggestion linked to the observed behaviour
    pub q3i: YesNo,
}
