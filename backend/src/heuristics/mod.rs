pub mod likeness;

pub use likeness::{LikenessScore, likeness_score};
