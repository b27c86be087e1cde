use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::errors::{Result, SignatureError};
use crate::features::FeatureConfig;
use crate::preprocess::{normalize_with, NormalizedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Forged = 0,
    Genuine = 1,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Forged, Label::Genuine];

    pub const fn as_str(self) -> &'static str {
        match self {
            Label::Forged => "forged",
            Label::Genuine => "genuine",
        }
    }

    /// SVM target: genuine is the positive class.
    pub const fn sign(self) -> f64 {
        match self {
            Label::Forged => -1.0,
            Label::Genuine => 1.0,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub image: NormalizedImage,
    pub label: Label,
}

/// How many files of one class directory were used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub loaded: usize,
    /// Files that could not be read or decoded.
    pub skipped: usize,
}

/// Reads one class directory of training images.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    config: FeatureConfig,
    show_progress: bool,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(FeatureConfig::DEFAULT)
    }
}

impl DatasetLoader {
    pub const fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            show_progress: false,
        }
    }

    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Decode and normalize every regular file directly inside `dir`.
    ///
    /// Files are decoded by content through the same path as inference, so
    /// their names do not matter. Files that fail to decode are logged and
    /// skipped. A missing directory is an error. Samples come back in
    /// file-name order.
    pub fn load(&self, dir: &Path, label: Label) -> Result<(Vec<LabeledImage>, LoadReport)> {
        if !dir.is_dir() {
            return Err(SignatureError::DatasetDirectoryMissing {
                path: dir.to_path_buf(),
            });
        }

        let files = collect_files(dir);
        let progress_bar = if self.show_progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        progress_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed}] {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .map_err(|e| SignatureError::Configuration {
                message: e.to_string(),
            })?
            .progress_chars("#>-"),
        );
        progress_bar.set_message(label.as_str());

        let samples: Vec<Option<LabeledImage>> = files
            .par_iter()
            .progress_with(progress_bar.clone())
            .map(|path| self.load_file(path, label))
            .collect();
        progress_bar.finish_and_clear();

        let loaded: Vec<LabeledImage> = samples.into_iter().flatten().collect();
        let report = LoadReport {
            loaded: loaded.len(),
            skipped: files.len() - loaded.len(),
        };
        tracing::info!(
            "Loaded {} {} images from {} ({} skipped)",
            report.loaded,
            label,
            dir.display(),
            report.skipped
        );
        Ok((loaded, report))
    }

    fn load_file(&self, path: &Path, label: Label) -> Option<LabeledImage> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping unreadable sample {}: {}", path.display(), e);
                return None;
            }
        };
        let Some(image) = normalize_with(&bytes, &self.config) else {
            tracing::warn!(
                "Skipping unreadable sample {}: not a decodable image",
                path.display()
            );
            return None;
        };
        Some(LabeledImage {
            path: path.to_path_buf(),
            image,
            label,
        })
    }
}

/// Load `dir` with the default feature geometry.
pub fn load(dir: &Path, label: Label) -> Result<(Vec<LabeledImage>, LoadReport)> {
    DatasetLoader::default().load(dir, label)
}

fn collect_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}
