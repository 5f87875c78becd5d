use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::ConfigError;
use crate::gate::thresholds::{GateThresholds, parse_or};

pub const DEFAULT_CONFIG_PATH: &str = "config/gate.yaml";
pub const DEFAULT_MODEL_PATH: &str = "best_model.pt";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gate: GateThresholds,
    pub heuristic: HeuristicConfig,
    pub preprocess: PreprocessConfig,
}

/// Constants of the color/texture likeness heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeuristicConfig {
    pub hue_min_deg: f32,
    pub hue_max_deg: f32,
    pub saturation_min: f32,
    pub value_min: f32,
    pub value_max: f32,
    /// Center window as fractions of width/height.
    pub center_start: f32,
    pub center_end: f32,
    pub brown_weight: f32,
    pub center_weight: f32,
    pub texture_weight: f32,
    pub luma_weights: [f32; 3],
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            hue_min_deg: 15.0,
            hue_max_deg: 45.0,
            saturation_min: 0.30,
            value_min: 0.15,
            value_max: 0.85,
            center_start: 0.25,
            center_end: 0.75,
            brown_weight: 0.5,
            center_weight: 0.3,
            texture_weight: 0.2,
            luma_weights: [0.299, 0.587, 0.114],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    pub min_side: u32,
    pub resize_shorter: u32,
    pub crop_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        // ImageNet statistics the classifier was trained with
        Self {
            min_side: 64,
            resize_shorter: 256,
            crop_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml(&config_str).map_err(|source| ConfigError::Yaml {
            path: display,
            source,
        })
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a map
        if config_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(config_str)
    }

    /// Reads `GATE_CONFIG` (or the default path) and applies `PREDICT_THRESHOLD`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = env::var("GATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);

        let mut config = if path.exists() {
            log::info!("Loading gate configuration from {}", path.display());
            Self::load(path)?
        } else {
            log::warn!(
                "Gate configuration {} not found, using built-in defaults",
                path.display()
            );
            Self::default()
        };

        let env_threshold = env::var("PREDICT_THRESHOLD").ok();
        config.gate.confidence_min = parse_or(env_threshold.as_deref(), config.gate.confidence_min);
        Ok(config)
    }
}

pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub model_path: String,
}

impl ServerSettings {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            model_path: env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string()),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
