//! Type definitions for the scoring pipeline

pub mod classification;
pub mod messages;
pub mod score;

pub use classification::{ClassifierOutput, LabelScore, ModelSlot, RawTriple};
pub use messages::{HostMessage, WorkerMessage};
pub use score::{CompositeScore, YesNo};
