//! Classifier loading, inference and score combination

pub mod classifier;
pub mod combiner;
pub mod inference;
pub mod loader;
pub mod registry;

pub use classifier::{ClassifierFactory, TextClassifier};
pub use combiner::combine;
pub use inference::OnnxTextClassifier;
pub use loader::ModelLoader;
pub use registry::{ClassifierSet, ModelRegistry, OnnxClassifierFactory, RegistryState};
