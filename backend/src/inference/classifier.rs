use ndarray::Array4;
use shared::ClassLabel;

use crate::error::InferenceError;

/// Image classifier over the fixed set of [`ClassLabel`]s.
///
/// Takes a normalized `[1, 3, H, W]` batch and returns one raw (pre-softmax)
/// score per class, in [`ClassLabel`] order. Implementations must be
/// deterministic and safe to call from several workers at once.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Softmax over the class scores. Always `ClassLabel::NUM_CLASSES` long.
#[derive(Debug, Clone, PartialEq)]
pub struct Probabilities(Vec<f32>);

impl Probabilities {
    pub fn from_logits(logits: &[f32]) -> Result<Self, InferenceError> {
        if logits.len() != ClassLabel::NUM_CLASSES {
            return Err(InferenceError::ClassCount {
                expected: ClassLabel::NUM_CLASSES,
                actual: logits.len(),
            });
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite);
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        Ok(Self(exps.into_iter().map(|e| e / sum).collect()))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Highest-probability class; ties go to the lower index.
    pub fn top1(&self) -> (ClassLabel, f32) {
        let (index, prob) = self
            .0
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 { (i, p) } else { best }
            });
        (label_at(index), prob)
    }

    /// The `n` most probable classes, descending; ties keep class order.
    pub fn ranked(&self, n: usize) -> Vec<(ClassLabel, f32)> {
        let mut ranked: Vec<(usize, f32)> = self.0.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .take(n)
            .map(|(i, p)| (label_at(i), p))
            .collect()
    }
}

fn label_at(index: usize) -> ClassLabel {
    // Length is checked in `from_logits`
    ClassLabel::from_index(index).unwrap_or(ClassLabel::Cocci)
}

#[cfg(feature = "torch")]
pub use torch::TorchClassifier;

#[cfg(feature = "torch")]
mod torch {
    use ndarray::Array4;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    use super::Classifier;
    use crate::error::InferenceError;

    /// TorchScript export of the classifier.
    pub struct TorchClassifier {
        name: String,
        device: Device,
        // CModule is Send but not Sync
        model: Mutex<CModule>,
    }

    impl TorchClassifier {
        pub fn load(model_path: &str) -> Result<Self, InferenceError> {
            let device = Device::cuda_if_available();
            log::info!("Loading TorchScript model {} on {:?}", model_path, device);
            let mut model = CModule::load_on_device(model_path, device)?;
            model.set_eval();
            Ok(Self {
                name: model_path.to_string(),
                device,
                model: Mutex::new(model),
            })
        }
    }

    impl Classifier for TorchClassifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
            let data = input
                .as_slice()
                .ok_or_else(|| InferenceError::InputShape(input.shape().to_vec()))?;
            let tensor = Tensor::from_slice(data).view(shape.as_slice()).to_device(self.device);

            let model = self
                .model
                .lock()
                .map_err(|_| InferenceError::Backend("model lock poisoned".into()))?;
            let output = tch::no_grad(|| model.forward_ts(&[&tensor]))?;

            let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
            let num_elements = output_flat.size()[0] as usize;
            let mut output_vec = vec![0.0f32; num_elements];
            output_flat.copy_data(&mut output_vec, num_elements);
            Ok(output_vec)
        }
    }
}
