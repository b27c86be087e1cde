use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use crate::errors::{Result, SignatureError};
use crate::features::FeatureConfig;
use crate::traits::{BinaryClassifier, ClassProbabilities};

/// テスト用のモック分類器：入力に関係なく固定の確率を返す
#[derive(Debug, Clone)]
pub struct MockClassifier {
    pub genuine: f64,
    pub feature_len: usize,
}

impl MockClassifier {
    pub const fn new(genuine: f64) -> Self {
        Self {
            genuine,
            feature_len: FeatureConfig::DEFAULT.feature_len(),
        }
    }
}

impl BinaryClassifier for MockClassifier {
    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities> {
        if features.len() != self.feature_len {
            return Err(SignatureError::validation("features", "unexpected length"));
        }
        Ok(ClassProbabilities {
            forged: 1.0 - self.genuine,
            genuine: self.genuine,
        })
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }
}

/// テスト用の署名らしい画像：明るい背景に正弦波のストローク
///
/// `phase` と `thickness` を変えるとクラスごとに異なる筆跡を作れる
pub fn synthetic_signature(width: u32, height: u32, phase: f32, thickness: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([235]));
    let amplitude = height as f32 / 4.0;
    for x in width / 8..width * 7 / 8 {
        let t = x as f32 / width as f32 * std::f32::consts::TAU * 2.0 + phase;
        let y = (height as f32 / 2.0 + t.sin() * amplitude) as u32;
        for dy in 0..thickness {
            let yy = (y + dy).min(height - 1);
            img.put_pixel(x, yy, Luma([25]));
        }
    }
    img
}

/// 画像を指定フォーマットでエンコード
pub fn encode(image: &GrayImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image.clone()).write_to(&mut Cursor::new(&mut bytes), format)?;
    Ok(bytes)
}
