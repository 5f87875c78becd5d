use serde::{Deserialize, Serialize};

/// Accept/reject thresholds for both gates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateThresholds {
    pub likeness_min: f32,
    pub confidence_min: f32,
    pub entropy_max: f32,
    pub margin_min: f32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            likeness_min: 0.15,
            confidence_min: 0.92,
            entropy_max: 0.6,
            margin_min: 0.18,
        }
    }
}

/// Raw per-request overrides, straight from the query string.
///
/// Values stay as strings so a bad number never fails the request: it is
/// dropped in favor of the configured default when resolved.
#[derive(Debug, Clone, Default)]
pub struct GateOverrides {
    pub like_min: Option<String>,
    pub threshold: Option<String>,
    pub entropy_max: Option<String>,
    pub margin_min: Option<String>,
    pub top3: Option<String>,
    pub top_n: Option<String>,
}

/// Parsed `raw`, or `default` when it is missing, malformed or not finite.
pub fn parse_or(raw: Option<&str>, default: f32) -> f32 {
    raw.and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

impl GateThresholds {
    pub fn with_overrides(&self, overrides: &GateOverrides) -> Self {
        Self {
            likeness_min: parse_or(overrides.like_min.as_deref(), self.likeness_min),
            confidence_min: parse_or(overrides.threshold.as_deref(), self.confidence_min),
            entropy_max: parse_or(overrides.entropy_max.as_deref(), self.entropy_max),
            margin_min: parse_or(overrides.margin_min.as_deref(), self.margin_min),
        }
    }
}

impl GateOverrides {
    /// Collects overrides from decoded query pairs. The first value of a
    /// repeated key wins and unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "like_min" => &mut overrides.like_min,
                "threshold" => &mut overrides.threshold,
                "entropy_max" => &mut overrides.entropy_max,
                "margin_min" => &mut overrides.margin_min,
                "top3" => &mut overrides.top3,
                "top_n" => &mut overrides.top_n,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        overrides
    }

    /// How many ranked classes to attach on success, capped at `num_classes`.
    pub fn top_n(&self, num_classes: usize) -> Option<usize> {
        let explicit = self
            .top_n
            .as_deref()
            .and_then(|v| v.trim().parse::<usize>().ok());
        let top3 = matches!(self.top3.as_deref(), Some("1" | "true" | "True")).then_some(3);

        explicit
            .or(top3)
            .map(|n| n.min(num_classes))
            .filter(|&n| n > 0)
    }
}
