use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, SignatureError},
    features::FeatureConfig,
    svm::{CalibratedSvm, SvmParams},
    traits::{BinaryClassifier, ClassProbabilities},
};

/// Bumped whenever the artifact layout or the feature pipeline changes.
pub const FORMAT_VERSION: u32 = 1;

/// Default artifact location used by both CLI commands.
pub const DEFAULT_MODEL_PATH: &str = "signature_model.json";

/// Persisted classifier together with everything needed to reproduce its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    /// Seconds since the UNIX epoch.
    pub created_at: u64,
    pub feature_config: FeatureConfig,
    pub feature_len: usize,
    pub hyperparameters: SvmParams,
    /// Mean cross-validated accuracy of the chosen hyperparameters.
    pub cv_accuracy: f64,
    pub classifier: CalibratedSvm,
}

impl TrainedModel {
    pub fn new(feature_config: FeatureConfig, classifier: CalibratedSvm, cv_accuracy: f64) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            format_version: FORMAT_VERSION,
            created_at,
            feature_config,
            feature_len: feature_config.feature_len(),
            hyperparameters: classifier.params,
            cv_accuracy,
            classifier,
        }
    }

    /// Write the artifact, replacing any previous one at `path`.
    ///
    /// The JSON goes to a sibling temporary file first and is renamed into
    /// place, so a concurrent reader sees either the old or the new model.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SignatureError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create model directory".to_string(),
                source: e,
            })?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let file = File::create(&tmp_path).map_err(|e| SignatureError::FileSystem {
            path: tmp_path.clone(),
            operation: "create model artifact".to_string(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(|e| SignatureError::FileSystem {
            path: tmp_path.clone(),
            operation: "write model artifact".to_string(),
            source: e,
        })?;
        drop(writer);

        fs::rename(&tmp_path, path).map_err(|e| SignatureError::FileSystem {
            path: path.to_path_buf(),
            operation: "replace model artifact".to_string(),
            source: e,
        })?;
        tracing::info!("Saved model artifact to {}", path.display());
        Ok(())
    }

    /// Read and validate an artifact.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SignatureError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|e| SignatureError::FileSystem {
            path: path.to_path_buf(),
            operation: "open model artifact".to_string(),
            source: e,
        })?;
        let model: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SignatureError::model(format!("parse {}", path.display()), e))?;
        model.validate(&FeatureConfig::DEFAULT)?;
        tracing::info!(
            "Loaded model {} (C={}, gamma={}, {} support vectors)",
            path.display(),
            model.hyperparameters.c,
            model.hyperparameters.gamma,
            model.classifier.svm.n_support()
        );
        Ok(model)
    }

    /// An artifact is only usable with the exact feature pipeline it was trained on.
    pub fn validate(&self, expected: &FeatureConfig) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(SignatureError::model(
                "artifact version check",
                format!(
                    "artifact format {} is not supported (expected {})",
                    self.format_version, FORMAT_VERSION
                ),
            ));
        }
        if self.feature_config != *expected {
            return Err(SignatureError::model(
                "feature configuration check",
                "artifact was trained with a different feature configuration",
            ));
        }
        if self.feature_len != expected.feature_len()
            || self.classifier.svm.dimension() != self.feature_len
        {
            return Err(SignatureError::model(
                "feature length check",
                format!(
                    "artifact expects {} features, pipeline produces {}",
                    self.classifier.svm.dimension(),
                    expected.feature_len()
                ),
            ));
        }
        Ok(())
    }
}

impl BinaryClassifier for TrainedModel {
    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities> {
        self.classifier.predict_proba(features)
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Label;
    use ndarray::array;
    use tempfile::TempDir;

    fn tiny_model() -> Result<TrainedModel> {
        let x = array![[0.0, 0.0], [0.1, 0.2], [0.2, 0.1], [1.0, 1.0], [0.9, 1.1], [1.1, 0.9]];
        let labels = [
            Label::Forged,
            Label::Forged,
            Label::Forged,
            Label::Genuine,
            Label::Genuine,
            Label::Genuine,
        ];
        let classifier = CalibratedSvm::fit(x.view(), &labels, &SvmParams::new(10.0, 1.0), 42)?;
        let config = FeatureConfig::DEFAULT;
        Ok(TrainedModel::new(config, classifier, 1.0))
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let err = TrainedModel::load(&temp_dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, SignatureError::ModelNotFound { .. }));
    }

    #[test]
    fn test_corrupt_artifact() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("model.json");
        fs::write(&path, b"{ not json")?;
        let err = TrainedModel::load(&path).unwrap_err();
        assert!(matches!(err, SignatureError::Model { .. }));
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("model.json");
        // two-dimensional toy vectors cannot serve the real pipeline
        let model = tiny_model()?;
        model.save(&path)?;
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let err = TrainedModel::load(&path).unwrap_err();
        assert!(matches!(err, SignatureError::Model { .. }));
        Ok(())
    }

    #[test]
    fn test_version_mismatch_is_rejected() -> Result<()> {
        let mut model = tiny_model()?;
        model.format_version = FORMAT_VERSION + 1;
        assert!(model.validate(&FeatureConfig::DEFAULT).is_err());
        Ok(())
    }
}
