use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::dataset::Label;
use crate::errors::{ProcessingError, Result};
use crate::features::{extract_with, FeatureConfig};
use crate::model::TrainedModel;
use crate::preprocess::{
    decode, normalize_image, normalize_with, preview_image, NormalizedImage,
};
use crate::traits::{BinaryClassifier, ClassProbabilities};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    /// Probability of `label` in percent; never below 50.
    pub confidence: f64,
}

impl PredictionResult {
    pub fn from_probabilities(probabilities: &ClassProbabilities) -> Self {
        let label = probabilities.argmax();
        Self {
            label,
            confidence: 100.0 * probabilities.get(label),
        }
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2}%)", self.label, self.confidence)
    }
}

/// Prediction plus the binarized image the model actually saw.
#[derive(Debug, Clone)]
pub struct Classification {
    pub prediction: PredictionResult,
    pub preprocessed: GrayImage,
    /// 400×200 grayscale upload for side-by-side display.
    pub preview: GrayImage,
}

/// Application context for serving predictions.
///
/// Holds one immutable model behind an `Arc`; clones share it, and
/// concurrent `predict` calls need no locking.
pub struct InferenceEngine<M: BinaryClassifier = TrainedModel> {
    model: Arc<M>,
    config: FeatureConfig,
}

impl<M: BinaryClassifier> Clone for InferenceEngine<M> {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            config: self.config,
        }
    }
}

impl InferenceEngine<TrainedModel> {
    /// Load the artifact once; fails with `ModelNotFound` when it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let model = TrainedModel::load(path)?;
        let config = model.feature_config;
        Ok(Self::with_config(model, config))
    }
}

impl<M: BinaryClassifier> InferenceEngine<M> {
    pub fn new(model: M) -> Self {
        Self::with_config(model, FeatureConfig::DEFAULT)
    }

    pub fn with_config(model: M, config: FeatureConfig) -> Self {
        Self {
            model: Arc::new(model),
            config,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn predict(&self, bytes: &[u8]) -> std::result::Result<PredictionResult, ProcessingError> {
        let normalized =
            normalize_with(bytes, &self.config).ok_or(ProcessingError::CouldNotProcessImage)?;
        self.predict_normalized(&normalized)
    }

    pub fn classify(&self, bytes: &[u8]) -> std::result::Result<Classification, ProcessingError> {
        let image = decode(bytes).ok_or(ProcessingError::CouldNotProcessImage)?;
        let normalized = normalize_image(&image, &self.config);
        let prediction = self.predict_normalized(&normalized)?;
        Ok(Classification {
            prediction,
            preprocessed: normalized.into_inner(),
            preview: preview_image(&image),
        })
    }

    pub fn predict_normalized(
        &self,
        image: &NormalizedImage,
    ) -> std::result::Result<PredictionResult, ProcessingError> {
        let features = extract_with(image, &self.config);
        let probabilities = self.model.predict_proba(&features).map_err(|e| {
            tracing::error!("Classifier rejected feature vector: {}", e);
            ProcessingError::CouldNotProcessImage
        })?;
        Ok(PredictionResult::from_probabilities(&probabilities))
    }
}
