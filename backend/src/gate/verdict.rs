use shared::{ClassLabel, PredictResponse, PredictStatus, RankedClass, RejectReason};

use crate::gate::thresholds::GateThresholds;
use crate::heuristics::LikenessScore;
use crate::inference::UncertaintyMetrics;

#[derive(Debug, Clone, PartialEq)]
pub struct LikenessCheck {
    pub score: LikenessScore,
    pub min: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelCheck {
    pub label: ClassLabel,
    pub confidence: f32,
    pub uncertainty: UncertaintyMetrics,
    pub thresholds: GateThresholds,
}

/// Terminal outcome of the two gates, with every metric that led to it.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    NotFecesByLikeness {
        likeness: LikenessCheck,
    },
    NotFecesByUncertainty {
        likeness: LikenessCheck,
        model: ModelCheck,
    },
    Success {
        likeness: LikenessCheck,
        model: ModelCheck,
        top_n: Option<Vec<(ClassLabel, f32)>>,
    },
}

pub fn round3(value: f32) -> f32 {
    ((value as f64 * 1000.0).round() / 1000.0) as f32
}

impl Verdict {
    pub fn kind(&self) -> &'static str {
        match self {
            Verdict::NotFecesByLikeness { .. } => "NOT_FECES_BY_LIKENESS",
            Verdict::NotFecesByUncertainty { .. } => "NOT_FECES_BY_UNCERTAINTY",
            Verdict::Success { .. } => "SUCCESS",
        }
    }

    pub fn status(&self) -> PredictStatus {
        match self {
            Verdict::Success { .. } => PredictStatus::Success,
            _ => PredictStatus::NotFeces,
        }
    }

    pub fn label(&self) -> Option<ClassLabel> {
        match self {
            Verdict::Success { model, .. } => Some(model.label),
            _ => None,
        }
    }

    pub fn likeness(&self) -> &LikenessCheck {
        match self {
            Verdict::NotFecesByLikeness { likeness }
            | Verdict::NotFecesByUncertainty { likeness, .. }
            | Verdict::Success { likeness, .. } => likeness,
        }
    }

    pub fn model(&self) -> Option<&ModelCheck> {
        match self {
            Verdict::NotFecesByLikeness { .. } => None,
            Verdict::NotFecesByUncertainty { model, .. } | Verdict::Success { model, .. } => {
                Some(model)
            }
        }
    }

    pub fn to_response(&self) -> PredictResponse {
        let likeness = self.likeness();
        let model = self.model();
        let reason = match self {
            Verdict::NotFecesByLikeness { .. } => Some(RejectReason::Likeness),
            Verdict::NotFecesByUncertainty { .. } => Some(RejectReason::Uncertainty),
            Verdict::Success { .. } => None,
        };
        let top_n = match self {
            Verdict::Success { top_n, .. } => top_n.as_ref().map(|ranked| {
                ranked
                    .iter()
                    .map(|&(label, prob)| RankedClass {
                        label,
                        prob: round3(prob),
                    })
                    .collect()
            }),
            _ => None,
        };

        PredictResponse {
            status: self.status(),
            reason,
            label: self.label(),
            confidence: model.map(|m| round3(m.confidence)),
            threshold: model.map(|m| m.thresholds.confidence_min),
            entropy: model.map(|m| round3(m.uncertainty.entropy)),
            margin: model.map(|m| round3(m.uncertainty.margin)),
            entropy_max: model.map(|m| m.thresholds.entropy_max),
            margin_min: model.map(|m| m.thresholds.margin_min),
            like_score: round3(likeness.score.score),
            like_min: likeness.min,
            top_n,
        }
    }
}
