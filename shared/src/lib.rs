use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Classes the feces classifier was trained on, in model output order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    strum_macros::EnumCount,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClassLabel {
    Cocci,
    #[serde(rename = "healty")]
    #[strum(serialize = "healty")]
    Healthy,
    Ncd,
    Prococci,
    #[serde(rename = "pcrhealty")]
    #[strum(serialize = "pcrhealty")]
    PcrHealthy,
    PcrNcd,
    PcrSalmo,
    Salmo,
}

impl ClassLabel {
    pub const NUM_CLASSES: usize = <Self as EnumCount>::COUNT;

    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, ClassLabel::Healthy | ClassLabel::PcrHealthy)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictStatus {
    NotFeces,
    Success,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    Likeness,
    Uncertainty,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RankedClass {
    pub label: ClassLabel,
    pub prob: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PredictResponse {
    pub status: PredictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<ClassLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy_max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_min: Option<f32>,
    pub like_score: f32,
    pub like_min: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<Vec<RankedClass>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}
