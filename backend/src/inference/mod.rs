pub mod classifier;
pub mod preprocess;
pub mod uncertainty;

pub use classifier::{Classifier, Probabilities};
#[cfg(feature = "torch")]
pub use classifier::TorchClassifier;
pub use uncertainty::UncertaintyMetrics;
