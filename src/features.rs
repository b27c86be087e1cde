pub mod hog;
pub mod lbp;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::preprocess::NormalizedImage;

/// Fixed-length descriptor: HOG values followed by the LBP histogram.
pub type FeatureVector = Vec<f64>;

/// Geometry and constants of the feature pipeline.
///
/// The model artifact stores the config it was trained with; inference refuses
/// an artifact whose config differs from the one compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub image_width: u32,
    pub image_height: u32,
    /// Cell edge in pixels.
    pub cell_size: u32,
    /// Block edge in cells.
    pub block_size: u32,
    pub orientations: usize,
    pub l2hys_clip: f64,
    pub l2hys_epsilon: f64,
    pub lbp_radius: f64,
    pub lbp_points: usize,
    pub histogram_epsilon: f64,
}

impl FeatureConfig {
    pub const DEFAULT: Self = Self {
        image_width: 256,
        image_height: 128,
        cell_size: 8,
        block_size: 2,
        orientations: 9,
        l2hys_clip: 0.2,
        l2hys_epsilon: 1e-5,
        lbp_radius: 8.0,
        lbp_points: 24,
        histogram_epsilon: 1e-7,
    };

    pub const fn cells(&self) -> (usize, usize) {
        (
            (self.image_height / self.cell_size) as usize,
            (self.image_width / self.cell_size) as usize,
        )
    }

    pub const fn blocks(&self) -> (usize, usize) {
        let (rows, cols) = self.cells();
        let b = self.block_size as usize;
        (rows + 1 - b, cols + 1 - b)
    }

    pub const fn hog_len(&self) -> usize {
        let (rows, cols) = self.blocks();
        let b = self.block_size as usize;
        rows * cols * b * b * self.orientations
    }

    /// Uniform codes `0..=P` plus one bucket for non-uniform patterns.
    pub const fn lbp_bins(&self) -> usize {
        self.lbp_points + 2
    }

    pub const fn feature_len(&self) -> usize {
        self.hog_len() + self.lbp_bins()
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub fn extract(image: &NormalizedImage) -> FeatureVector {
    extract_with(image, &FeatureConfig::DEFAULT)
}

pub fn extract_with(image: &NormalizedImage, config: &FeatureConfig) -> FeatureVector {
    let mut features = hog::hog(image.as_image(), config);
    features.extend(lbp::lbp_histogram(image.as_image(), config));
    debug_assert_eq!(features.len(), config.feature_len());
    features
}

/// Extract features for many images in parallel, preserving input order.
pub fn extract_batch(images: &[NormalizedImage], config: &FeatureConfig) -> Vec<FeatureVector> {
    images
        .par_iter()
        .map(|image| extract_with(image, config))
        .collect()
}
