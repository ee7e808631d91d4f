//! Reference threshold classifier.
//!
//! A small linear scorer with the same pipeline shape as a real model
//! integration: fill missing features from training-time defaults, compute a
//! weighted score, squash it to a probability, and derive a label by
//! threshold. Ships as the seeded demo model family for the `income`
//! endpoint.

use super::{Prediction, PredictionError, PredictionResult, Predictor};
use serde_json::Value;
use std::collections::HashMap;

/// Linear classifier over numeric JSON features with a probability threshold.
pub struct ThresholdClassifier {
    /// Feature weights, applied in order.
    weights: Vec<(String, f64)>,
    /// Intercept term.
    bias: f64,
    /// Training-time fill values for missing features.
    defaults: HashMap<String, f64>,
    /// Probability threshold separating the two labels.
    threshold: f64,
    /// Label below or at the threshold.
    negative_label: String,
    /// Label above the threshold.
    positive_label: String,
}

impl ThresholdClassifier {
    /// Create a classifier from weights and fill defaults.
    pub fn new(
        weights: Vec<(String, f64)>,
        bias: f64,
        defaults: HashMap<String, f64>,
        threshold: f64,
        negative_label: impl Into<String>,
        positive_label: impl Into<String>,
    ) -> Self {
        Self {
            weights,
            bias,
            defaults,
            threshold,
            negative_label: negative_label.into(),
            positive_label: positive_label.into(),
        }
    }

    /// The baseline income classifier seeded as the `production` variant.
    pub fn income_baseline() -> Self {
        Self::new(
            vec![
                ("age".to_string(), 0.04),
                ("education-num".to_string(), 0.32),
                ("hours-per-week".to_string(), 0.05),
                ("capital-gain".to_string(), 0.0004),
            ],
            -7.4,
            Self::income_defaults(),
            0.5,
            "<=50K",
            ">50K",
        )
    }

    /// The tuned income classifier seeded as the `testing` variant.
    pub fn income_tuned() -> Self {
        Self::new(
            vec![
                ("age".to_string(), 0.03),
                ("education-num".to_string(), 0.38),
                ("hours-per-week".to_string(), 0.06),
                ("capital-gain".to_string(), 0.0005),
            ],
            -8.1,
            Self::income_defaults(),
            0.5,
            "<=50K",
            ">50K",
        )
    }

    fn income_defaults() -> HashMap<String, f64> {
        HashMap::from([
            ("age".to_string(), 37.0),
            ("education-num".to_string(), 10.0),
            ("hours-per-week".to_string(), 40.0),
            ("capital-gain".to_string(), 0.0),
        ])
    }

    /// Extract the feature vector, filling missing values from defaults.
    fn preprocessing(&self, input: &Value) -> std::result::Result<Vec<f64>, PredictionError> {
        let object = input
            .as_object()
            .ok_or_else(|| PredictionError::Preprocessing("input must be a JSON object".into()))?;

        let mut features = Vec::with_capacity(self.weights.len());
        for (name, _) in &self.weights {
            let value = match object.get(name) {
                None | Some(Value::Null) => self.defaults.get(name).copied().ok_or_else(|| {
                    PredictionError::Preprocessing(format!("no fill value for feature {}", name))
                })?,
                Some(raw) => raw.as_f64().ok_or_else(|| {
                    PredictionError::Preprocessing(format!("feature {} is not numeric", name))
                })?,
            };
            features.push(value);
        }
        Ok(features)
    }

    /// Weighted score squashed to a probability.
    fn predict(&self, features: &[f64]) -> f64 {
        let score: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|((_, weight), value)| weight * value)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-score).exp())
    }

    /// Derive the label from the probability.
    fn postprocessing(&self, probability: f64) -> Prediction {
        let label = if probability > self.threshold {
            self.positive_label.clone()
        } else {
            self.negative_label.clone()
        };
        Prediction {
            label,
            probability: Some(probability),
        }
    }
}

impl Predictor for ThresholdClassifier {
    fn compute_prediction(&self, input: &Value) -> PredictionResult {
        let features = self.preprocessing(input)?;
        let probability = self.predict(&features);
        Ok(self.postprocessing(probability))
    }
}
