pub mod engine;
pub mod thresholds;
pub mod verdict;

pub use engine::{GateEngine, HealthStatus, model_gate, should_reject};
pub use thresholds::{GateOverrides, GateThresholds};
pub use verdict::{LikenessCheck, ModelCheck, Verdict};
