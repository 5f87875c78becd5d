//! Poultry feces image screening.
//!
//! An uploaded photo goes through two gates before a diagnosis is returned:
//! a color/texture heuristic that turns away images that do not look like a
//! droppings sample, then a model gate that turns away predictions whose
//! class distribution is too uncertain to trust.

pub mod config;
pub mod error;
pub mod gate;
pub mod heuristics;
pub mod inference;
pub mod routes;

pub use config::AppConfig;
pub use error::{InferenceError, PipelineError, ValidationError};
pub use gate::{GateEngine, GateOverrides, GateThresholds, Verdict};
pub use inference::Classifier;
