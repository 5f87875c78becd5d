use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use shared::ErrorResponse;

/// Client-input failures. Reported back verbatim as a 400.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field image not found")]
    MissingField,
    #[error("Malformed upload: {0}")]
    Malformed(String),
    #[error("Empty file")]
    Empty,
    #[error("Unreadable image: {0}")]
    Unreadable(String),
    #[error("Image too small")]
    TooSmall { width: u32, height: u32, min_side: u32 },
    #[error("Blank image")]
    Blank,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Classifier backend error: {0}")]
    Backend(String),
    #[error("Classifier returned {actual} scores, expected {expected}")]
    ClassCount { expected: usize, actual: usize },
    #[error("Classifier returned non-finite scores")]
    NonFinite,
    #[error("Input tensor has shape {0:?}")]
    InputShape(Vec<usize>),
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for InferenceError {
    fn from(err: tch::TchError) -> Self {
        InferenceError::Backend(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Validation(e) => e.to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            status: "ERROR".to_string(),
            message: self.public_message(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
