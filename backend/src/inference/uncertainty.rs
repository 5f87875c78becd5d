use serde::Serialize;

/// Guards `ln(0)` for classes with zero probability.
pub const ENTROPY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UncertaintyMetrics {
    /// Shannon entropy divided by `ln(K)`, in [0, 1].
    pub entropy: f32,
    /// Gap between the two largest probabilities, in [0, 1].
    pub margin: f32,
}

impl UncertaintyMetrics {
    pub fn from_probabilities(probs: &[f32]) -> Self {
        Self {
            entropy: normalized_entropy(probs),
            margin: top2_margin(probs),
        }
    }
}

pub fn normalized_entropy(probs: &[f32]) -> f32 {
    if probs.len() < 2 {
        return 0.0;
    }
    let entropy: f64 = -probs
        .iter()
        .map(|&p| p as f64 * (p as f64 + ENTROPY_EPSILON).ln())
        .sum::<f64>();
    (entropy / (probs.len() as f64).ln()).clamp(0.0, 1.0) as f32
}

/// `p1 - p2`, or `p1` alone for a single class.
pub fn top2_margin(probs: &[f32]) -> f32 {
    let (first, second) = probs
        .iter()
        .fold((f32::NEG_INFINITY, f32::NEG_INFINITY), |(a, b), &p| {
            if p > a {
                (p, a)
            } else if p > b {
                (a, p)
            } else {
                (a, b)
            }
        });
    match probs.len() {
        0 => 0.0,
        1 => first.clamp(0.0, 1.0),
        _ => (first - second).clamp(0.0, 1.0),
    }
}
