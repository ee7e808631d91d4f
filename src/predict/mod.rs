//! The opaque inference capability and its process-wide registry.
//!
//! A [`Predictor`] turns a raw JSON input into a [`Prediction`] or a
//! [`PredictionError`]. Failure is a value, not an unwind: the router wraps
//! either case into an [`Outcome`] envelope and logs it, because a failed
//! prediction is itself a valid, auditable outcome.
//!
//! The [`PredictorSet`] maps variant ids to their loaded predictors. It is
//! built once at process start through [`PredictorSetBuilder`] and is
//! immutable afterwards; adding or removing models requires a restart.

pub mod threshold;

pub use threshold::ThresholdClassifier;

use crate::types::{OutcomeId, VariantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A successful structured prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Short classification label.
    pub label: String,
    /// Probability of the positive class, when the model produces one.
    pub probability: Option<f64>,
}

/// A failed prediction, broken down by pipeline phase.
#[derive(Debug, Clone, Error)]
pub enum PredictionError {
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("postprocessing failed: {0}")]
    Postprocessing(String),
}

/// Result of running a predictor.
pub type PredictionResult = std::result::Result<Prediction, PredictionError>;

/// An opaque model capability: raw input in, structured outcome out.
///
/// Implementations must never panic on malformed input; every failure mode
/// is reported through [`PredictionError`].
pub trait Predictor: Send + Sync {
    /// Run the full preprocessing, inference, and postprocessing pipeline.
    fn compute_prediction(&self, input: &Value) -> PredictionResult;
}

/// The structured outcome returned to callers and persisted to the outcome
/// log. Serializes as `{"status": "ok", ...}` or `{"status": "error", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// A completed prediction.
    Ok {
        /// Short classification label.
        label: String,
        /// Probability of the positive class, when available.
        #[serde(skip_serializing_if = "Option::is_none")]
        probability: Option<f64>,
        /// Identifier of the logged outcome record, attached after the
        /// record is persisted.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<OutcomeId>,
    },
    /// A failed prediction, captured rather than propagated.
    Error {
        /// Failure description.
        message: String,
        /// Identifier of the logged outcome record.
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<OutcomeId>,
    },
}

/// Sentinel response label for failed predictions.
pub const ERROR_LABEL: &str = "error";

impl Outcome {
    /// Wrap a prediction result into an outcome envelope.
    pub fn from_result(result: PredictionResult) -> Self {
        match result {
            Ok(prediction) => Outcome::Ok {
                label: prediction.label,
                probability: prediction.probability,
                request_id: None,
            },
            Err(e) => Outcome::Error {
                message: e.to_string(),
                request_id: None,
            },
        }
    }

    /// Build an error outcome from a plain message.
    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error {
            message: message.into(),
            request_id: None,
        }
    }

    /// The short derived response label: the prediction's label when present,
    /// the [`ERROR_LABEL`] sentinel otherwise.
    pub fn label(&self) -> &str {
        match self {
            Outcome::Ok { label, .. } => label,
            Outcome::Error { .. } => ERROR_LABEL,
        }
    }

    /// Whether this outcome captures a failed prediction.
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error { .. })
    }

    /// Attach the persisted outcome record's identifier.
    pub fn set_request_id(&mut self, id: OutcomeId) {
        match self {
            Outcome::Ok { request_id, .. } | Outcome::Error { request_id, .. } => {
                *request_id = Some(id)
            }
        }
    }

    /// The attached outcome record identifier, if any.
    pub fn request_id(&self) -> Option<OutcomeId> {
        match self {
            Outcome::Ok { request_id, .. } | Outcome::Error { request_id, .. } => *request_id,
        }
    }
}

/// Immutable map from variant id to its loaded predictor.
///
/// Built once during startup and injected into the router; never mutated at
/// request time.
pub struct PredictorSet {
    predictors: HashMap<VariantId, Arc<dyn Predictor>>,
}

impl PredictorSet {
    /// The predictor loaded for a variant, if any.
    pub fn get(&self, variant: VariantId) -> Option<Arc<dyn Predictor>> {
        self.predictors.get(&variant).cloned()
    }

    /// Whether a predictor is loaded for the variant.
    pub fn contains(&self, variant: VariantId) -> bool {
        self.predictors.contains_key(&variant)
    }

    /// Number of loaded predictors.
    pub fn len(&self) -> usize {
        self.predictors.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.predictors.is_empty()
    }
}

/// Builder collecting predictors during startup registration.
#[derive(Default)]
pub struct PredictorSetBuilder {
    predictors: HashMap<VariantId, Arc<dyn Predictor>>,
}

impl PredictorSetBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a predictor with a variant id. Re-inserting the same id
    /// replaces the previous predictor (idempotent re-registration).
    pub fn insert(&mut self, variant: VariantId, predictor: Arc<dyn Predictor>) {
        self.predictors.insert(variant, predictor);
    }

    /// Freeze the set.
    pub fn build(self) -> PredictorSet {
        PredictorSet {
            predictors: self.predictors,
        }
    }
}

/// Predictor that always returns the same label. For tests and fixtures.
pub struct FixedLabelPredictor {
    label: String,
    probability: f64,
}

impl FixedLabelPredictor {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

impl Predictor for FixedLabelPredictor {
    fn compute_prediction(&self, _input: &Value) -> PredictionResult {
        Ok(Prediction {
            label: self.label.clone(),
            probability: Some(self.probability),
        })
    }
}

/// Predictor that always fails. For tests and fixtures.
pub struct FailingPredictor {
    message: String,
}

impl FailingPredictor {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Predictor for FailingPredictor {
    fn compute_prediction(&self, _input: &Value) -> PredictionResult {
        Err(PredictionError::Inference(self.message.clone()))
    }
}
