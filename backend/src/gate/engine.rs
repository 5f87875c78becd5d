use std::sync::Arc;

use shared::ClassLabel;

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::gate::thresholds::{GateOverrides, GateThresholds};
use crate::gate::verdict::{LikenessCheck, ModelCheck, Verdict};
use crate::heuristics::likeness_score;
use crate::inference::preprocess::{decode_image, to_tensor, validate, zero_tensor};
use crate::inference::{Classifier, Probabilities, UncertaintyMetrics};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub ready: bool,
    pub model: String,
    pub classes: usize,
}

/// Runs an uploaded image through the likeness gate and the model gate.
///
/// Holds no per-request state; the classifier is the only shared resource.
#[derive(Clone)]
pub struct GateEngine {
    classifier: Arc<dyn Classifier>,
    config: AppConfig,
}

/// Model-gate rejection rule.
///
/// Low confidence alone does not reject: it must be backed by a flat
/// distribution or a near tie between the two leading classes.
pub fn should_reject(
    confidence: f32,
    uncertainty: &UncertaintyMetrics,
    thresholds: &GateThresholds,
) -> bool {
    confidence < thresholds.confidence_min
        && (uncertainty.entropy > thresholds.entropy_max
            || uncertainty.margin < thresholds.margin_min)
}

/// Second gate, over an already computed class distribution.
pub fn model_gate(
    likeness: LikenessCheck,
    probs: &Probabilities,
    thresholds: GateThresholds,
    top_n: Option<usize>,
) -> Verdict {
    let (label, confidence) = probs.top1();
    let uncertainty = UncertaintyMetrics::from_probabilities(probs.as_slice());
    let model = ModelCheck {
        label,
        confidence,
        uncertainty,
        thresholds,
    };

    if should_reject(confidence, &uncertainty, &thresholds) {
        return Verdict::NotFecesByUncertainty { likeness, model };
    }

    Verdict::Success {
        likeness,
        model,
        top_n: top_n.map(|n| probs.ranked(n)),
    }
}

impl GateEngine {
    pub fn new(classifier: Arc<dyn Classifier>, config: AppConfig) -> Self {
        Self { classifier, config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn decide(&self, image: &[u8], overrides: &GateOverrides) -> Result<Verdict, PipelineError> {
        let img = decode_image(image)?;
        validate(&img, &self.config.preprocess)?;

        let thresholds = self.config.gate.with_overrides(overrides);
        let likeness = LikenessCheck {
            score: likeness_score(&img, &self.config.heuristic),
            min: thresholds.likeness_min,
        };
        log::debug!(
            "Likeness {:.3} (brown {:.3}, center {:.3}, texture {:.3}) vs min {}",
            likeness.score.score,
            likeness.score.brown_ratio,
            likeness.score.center_brown_ratio,
            likeness.score.texture,
            likeness.min
        );

        if likeness.score.score < likeness.min {
            return Ok(Verdict::NotFecesByLikeness { likeness });
        }

        let tensor = to_tensor(&img, &self.config.preprocess);
        let scores = self.classifier.classify(&tensor)?;
        let probs = Probabilities::from_logits(&scores)?;

        let verdict = model_gate(
            likeness,
            &probs,
            thresholds,
            overrides.top_n(ClassLabel::NUM_CLASSES),
        );
        if let Some(model) = verdict.model() {
            log::debug!(
                "Model gate: {} conf {:.3} entropy {:.3} margin {:.3} -> {}",
                model.label,
                model.confidence,
                model.uncertainty.entropy,
                model.uncertainty.margin,
                verdict.kind()
            );
        }
        Ok(verdict)
    }

    /// Forward pass on a zero tensor. Any failure reports not ready.
    pub fn health(&self) -> HealthStatus {
        let input = zero_tensor(&self.config.preprocess);
        let ready = match self.classifier.classify(&input) {
            Ok(scores) => match Probabilities::from_logits(&scores) {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Health check produced unusable scores: {}", e);
                    false
                }
            },
            Err(e) => {
                log::error!("Health check inference failed: {}", e);
                false
            }
        };

        HealthStatus {
            ready,
            model: self.classifier.name().to_string(),
            classes: ClassLabel::NUM_CLASSES,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{InferenceError, ValidationError};
    use crate::inference::preprocess::tests::encode_png;
    use image::{Rgb, RgbImage};
    use ndarray::Array4;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed distribution and counts how often it was asked.
    pub(crate) struct SpyClassifier {
        scores: Vec<f32>,
        calls: AtomicUsize,
    }

    impl SpyClassifier {
        pub(crate) fn with_probabilities(probs: &[f32]) -> Arc<Self> {
            Arc::new(Self {
                scores: probs.iter().map(|p| p.ln()).collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Classifier for SpyClassifier {
        fn name(&self) -> &str {
            "spy"
        }

        fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            assert_eq!(input.shape(), &[1, 3, 224, 224]);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken"
        }

        fn classify(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Backend("weights missing".into()))
        }
    }

    const SPREAD: [f32; 8] = [0.40, 0.15, 0.10, 0.10, 0.10, 0.05, 0.05, 0.05];
    const PEAKED: [f32; 8] = [0.97, 0.01, 0.005, 0.005, 0.003, 0.003, 0.002, 0.002];

    fn brownish_png() -> Vec<u8> {
        encode_png(&RgbImage::from_fn(120, 100, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([139, 90, 43])
            } else {
                Rgb([120, 78, 37])
            }
        }))
    }

    fn bluish_png() -> Vec<u8> {
        let mut img = RgbImage::from_pixel(120, 100, Rgb([40, 60, 200]));
        img.put_pixel(60, 50, Rgb([41, 60, 200]));
        encode_png(&img)
    }

    fn engine(classifier: Arc<dyn Classifier>) -> GateEngine {
        GateEngine::new(classifier, AppConfig::default())
    }

    fn overrides(threshold: Option<&str>) -> GateOverrides {
        GateOverrides {
            threshold: threshold.map(str::to_string),
            ..GateOverrides::default()
        }
    }

    #[test]
    fn small_images_fail_validation_before_inference() {
        let spy = SpyClassifier::with_probabilities(&PEAKED);
        let engine = engine(spy.clone());
        let png = encode_png(&RgbImage::from_fn(63, 120, |x, y| Rgb([x as u8, y as u8, 0])));

        let err = engine.decide(&png, &GateOverrides::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::TooSmall { .. })
        ));
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn blank_images_fail_validation() {
        let spy = SpyClassifier::with_probabilities(&PEAKED);
        let engine = engine(spy.clone());
        let png = encode_png(&RgbImage::from_pixel(100, 100, Rgb([128, 128, 128])));

        let err = engine.decide(&png, &GateOverrides::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::Blank)));
        assert_eq!(err.public_message(), "Blank image");
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn low_likeness_short_circuits_classifier() {
        let spy = SpyClassifier::with_probabilities(&PEAKED);
        let engine = engine(spy.clone());

        let verdict = engine.decide(&bluish_png(), &GateOverrides::default()).unwrap();
        assert!(matches!(verdict, Verdict::NotFecesByLikeness { .. }));
        assert_eq!(verdict.likeness().min, 0.15);
        assert!(verdict.likeness().score.score < 0.01);
        assert_eq!(verdict.label(), None);
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn likeness_min_override_is_echoed() {
        let spy = SpyClassifier::with_probabilities(&PEAKED);
        let engine = engine(spy.clone());
        let overrides = GateOverrides {
            like_min: Some("0.95".into()),
            ..GateOverrides::default()
        };

        let verdict = engine.decide(&brownish_png(), &overrides).unwrap();
        assert!(matches!(verdict, Verdict::NotFecesByLikeness { .. }));
        assert_eq!(verdict.to_response().like_min, 0.95);
        assert_eq!(spy.calls(), 0);
    }

    #[test]
    fn spread_distribution_is_rejected_as_uncertain() {
        let spy = SpyClassifier::with_probabilities(&SPREAD);
        let engine = engine(spy.clone());

        let verdict = engine.decide(&brownish_png(), &GateOverrides::default()).unwrap();
        assert_eq!(verdict.kind(), "NOT_FECES_BY_UNCERTAINTY");
        let response = verdict.to_response();
        assert_eq!(response.confidence, Some(0.4));
        assert_eq!(response.margin, Some(0.25));
        assert_eq!(response.entropy, Some(0.861));
        assert_eq!(response.label, None);
        assert_eq!(spy.calls(), 1);
    }

    #[test]
    fn confident_prediction_is_accepted() {
        let spy = SpyClassifier::with_probabilities(&PEAKED);
        let engine = engine(spy.clone());

        let verdict = engine.decide(&brownish_png(), &GateOverrides::default()).unwrap();
        assert_eq!(verdict.label(), Some(ClassLabel::Cocci));
        let response = verdict.to_response();
        assert_eq!(response.confidence, Some(0.97));
        assert_eq!(response.top_n, None);
    }

    #[test]
    fn low_confidence_needs_corroborating_uncertainty() {
        let likeness = LikenessCheck {
            score: likeness_score(&RgbImage::new(0, 0), &AppConfig::default().heuristic),
            min: 0.0,
        };
        // below confidence_min, but neither flat nor tied
        let probs = Probabilities::from_logits(
            &[0.85, 0.09, 0.01, 0.01, 0.01, 0.01, 0.01, 0.01].map(f32::ln),
        )
        .unwrap();
        let verdict = model_gate(likeness, &probs, GateThresholds::default(), None);
        let model = verdict.model().unwrap();
        assert!(model.uncertainty.entropy <= 0.6, "entropy {}", model.uncertainty.entropy);
        assert!(model.uncertainty.margin >= 0.18);
        assert!(matches!(verdict, Verdict::Success { .. }));
    }

    #[test]
    fn rejection_rule_shape() {
        let t = GateThresholds::default();
        let flat = UncertaintyMetrics {
            entropy: 0.9,
            margin: 0.5,
        };
        let tied = UncertaintyMetrics {
            entropy: 0.1,
            margin: 0.01,
        };
        let clear = UncertaintyMetrics {
            entropy: 0.1,
            margin: 0.5,
        };
        assert!(should_reject(0.5, &flat, &t));
        assert!(should_reject(0.5, &tied, &t));
        assert!(!should_reject(0.5, &clear, &t));
        assert!(!should_reject(0.95, &flat, &t));
        assert!(!should_reject(0.92, &tied, &t));
    }

    #[test]
    fn top_n_is_ranked_on_success() {
        let spy = SpyClassifier::with_probabilities(&PEAKED);
        let engine = engine(spy);
        let overrides = GateOverrides {
            top3: Some("1".into()),
            ..GateOverrides::default()
        };

        let verdict = engine.decide(&brownish_png(), &overrides).unwrap();
        let top: Vec<ClassLabel> = verdict
            .to_response()
            .top_n
            .unwrap()
            .into_iter()
            .map(|r| r.label)
            .collect();
        // 0.005 tie between ncd and prococci keeps class order
        assert_eq!(top, vec![ClassLabel::Cocci, ClassLabel::Healthy, ClassLabel::Ncd]);
    }

    #[test]
    fn malformed_threshold_falls_back_to_default() {
        let spy = SpyClassifier::with_probabilities(&SPREAD);
        let engine = engine(spy);

        let verdict = engine.decide(&brownish_png(), &overrides(Some("lots"))).unwrap();
        let model = verdict.model().unwrap();
        assert_eq!(model.thresholds.confidence_min, 0.92);
        assert_eq!(verdict.kind(), "NOT_FECES_BY_UNCERTAINTY");

        let verdict = engine.decide(&brownish_png(), &overrides(Some("0.3"))).unwrap();
        assert_eq!(verdict.kind(), "SUCCESS");
        assert_eq!(verdict.to_response().threshold, Some(0.3));
    }

    #[test]
    fn decide_is_idempotent() {
        let spy = SpyClassifier::with_probabilities(&SPREAD);
        let engine = engine(spy.clone());
        let png = brownish_png();
        let overrides = GateOverrides {
            top_n: Some("8".into()),
            threshold: Some("0.35".into()),
            ..GateOverrides::default()
        };

        let first = engine.decide(&png, &overrides).unwrap();
        let second = engine.decide(&png, &overrides).unwrap();
        assert_eq!(first, second);
        assert_eq!(spy.calls(), 2);
    }

    #[test]
    fn raising_confidence_min_only_moves_towards_rejection() {
        let spy = SpyClassifier::with_probabilities(&SPREAD);
        let engine = engine(spy);
        let png = brownish_png();

        let mut rejected = false;
        for step in 0..=20 {
            let threshold = format!("{}", step as f32 * 0.05);
            let verdict = engine.decide(&png, &overrides(Some(&threshold))).unwrap();
            let is_rejected = matches!(verdict, Verdict::NotFecesByUncertainty { .. });
            assert!(!(rejected && !is_rejected), "accepted again at {}", threshold);
            rejected |= is_rejected;
        }
        assert!(rejected);
    }

    #[test]
    fn classifier_failures_are_internal() {
        let engine = engine(Arc::new(BrokenClassifier));
        let err = engine
            .decide(&brownish_png(), &GateOverrides::default())
            .unwrap_err();
        assert!(!err.is_validation());
        assert_eq!(err.public_message(), "Internal error");
    }

    #[test]
    fn health_reports_ready() {
        let spy = SpyClassifier::with_probabilities(&SPREAD);
        let status = engine(spy.clone()).health();
        assert_eq!(
            status,
            HealthStatus {
                ready: true,
                model: "spy".into(),
                classes: 8
            }
        );
        assert_eq!(spy.calls(), 1);
    }

    #[test]
    fn health_fails_closed() {
        assert!(!engine(Arc::new(BrokenClassifier)).health().ready);
        let short = SpyClassifier::with_probabilities(&[0.5, 0.5]);
        assert!(!engine(short).health().ready);
    }
}
