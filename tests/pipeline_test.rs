use std::fs;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use tempfile::TempDir;

use signature_forgery_rs::mocks::{encode, synthetic_signature, MockClassifier};
use signature_forgery_rs::{
    extract, normalize, train, BinaryClassifier, ClassProbabilities, FeatureConfig,
    InferenceEngine, Label, LoadReport, ProcessingError, SignatureError, TrainConfig,
};

// テスト用データセット：クラスごとに筆跡の太さと位相を変える
fn write_class(dir: &Path, count: usize, phase: f32, thickness: u32) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let img = synthetic_signature(240 + 10 * i as u32, 110, phase + 0.05 * i as f32, thickness);
        img.save(dir.join(format!("sig_{i:02}.png"))).unwrap();
    }
}

#[test]
fn test_normalized_geometry_for_any_input_size() {
    for (w, h) in [(1u32, 1u32), (17, 300), (256, 128), (1024, 77)] {
        let bytes = encode(&synthetic_signature(w.max(8), h.max(8), 0.3, 2), ImageFormat::Png).unwrap();
        let normalized = normalize(&bytes).unwrap();
        assert_eq!(normalized.as_image().dimensions(), (256, 128));
        assert!(normalized
            .as_image()
            .pixels()
            .all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}

#[test]
fn test_features_are_deterministic() {
    let bytes = encode(&synthetic_signature(300, 150, 1.2, 3), ImageFormat::Png).unwrap();
    let a = extract(&normalize(&bytes).unwrap());
    let b = extract(&normalize(&bytes).unwrap());
    assert_eq!(a.len(), FeatureConfig::DEFAULT.feature_len());
    assert_eq!(a, b);
}

#[test]
fn test_blank_white_image_is_classified() {
    let blank = GrayImage::from_pixel(100, 50, Luma([255]));
    let bytes = encode(&blank, ImageFormat::Png).unwrap();

    let normalized = normalize(&bytes).unwrap();
    assert_eq!(normalized.foreground_pixels(), 0);
    assert!(extract(&normalized).iter().all(|v| v.is_finite()));

    let engine = InferenceEngine::new(MockClassifier::new(0.4));
    let result = engine.predict(&bytes).unwrap();
    assert_eq!(result.label, Label::Forged);
    assert!((result.confidence - 60.0).abs() < 1e-9);
}

#[test]
fn test_corrupt_upload_is_recoverable() {
    let engine = InferenceEngine::new(MockClassifier::new(0.9));
    assert_eq!(
        engine.predict(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]),
        Err(ProcessingError::CouldNotProcessImage)
    );
    assert_eq!(engine.predict(&[]), Err(ProcessingError::CouldNotProcessImage));
    // the engine keeps serving after a failure
    let bytes = encode(&synthetic_signature(120, 60, 0.0, 2), ImageFormat::Png).unwrap();
    assert!(engine.predict(&bytes).is_ok());
}

// 特徴量に依存する分類器：同じ入力なら同じ確率になる
struct InkRatioClassifier;

impl BinaryClassifier for InkRatioClassifier {
    fn predict_proba(&self, features: &[f64]) -> signature_forgery_rs::Result<ClassProbabilities> {
        let hog_len = FeatureConfig::DEFAULT.hog_len();
        let genuine = 1.0 / (1.0 + features[..hog_len].iter().sum::<f64>() / hog_len as f64);
        Ok(ClassProbabilities {
            forged: 1.0 - genuine,
            genuine,
        })
    }

    fn feature_len(&self) -> usize {
        FeatureConfig::DEFAULT.feature_len()
    }
}

fn encode_dynamic(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

#[test]
fn test_same_pixels_in_different_containers() {
    let gray = synthetic_signature(320, 140, 0.7, 4);
    let rgb = DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray.clone()).to_rgb8());

    let gray_png = encode(&gray, ImageFormat::Png).unwrap();
    let rgb_png = encode_dynamic(&rgb, ImageFormat::Png);
    // lossless WebP
    let rgb_webp = encode_dynamic(&rgb, ImageFormat::WebP);

    let reference = normalize(&gray_png).unwrap();
    let engine = InferenceEngine::new(InkRatioClassifier);
    let expected = engine.predict(&gray_png).unwrap();
    for bytes in [&rgb_png, &rgb_webp] {
        let normalized = normalize(bytes).unwrap();
        assert_eq!(normalized, reference);
        assert_eq!(extract(&normalized), extract(&reference));
        assert_eq!(engine.predict(bytes).unwrap(), expected);
    }
}

#[test]
fn test_empty_class_directory_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let genuine_dir = temp_dir.path().join("genuine");
    let forged_dir = temp_dir.path().join("forged");
    write_class(&genuine_dir, 4, 0.0, 2);
    fs::create_dir_all(&forged_dir).unwrap();
    let model_path = temp_dir.path().join("signature_model.json");

    let config = TrainConfig::new(genuine_dir, forged_dir.clone(), model_path.clone());
    let err = train(&config).unwrap_err();
    assert!(matches!(err, SignatureError::EmptyDataset { path } if path == forged_dir));
    assert!(!model_path.exists());
}

#[test]
fn test_missing_class_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = TrainConfig::new(
        temp_dir.path().join("nope"),
        temp_dir.path().join("also_nope"),
        temp_dir.path().join("model.json"),
    );
    assert!(matches!(
        train(&config),
        Err(SignatureError::DatasetDirectoryMissing { .. })
    ));
}

#[test]
fn test_train_then_predict() {
    let temp_dir = TempDir::new().unwrap();
    let genuine_dir = temp_dir.path().join("genuine");
    let forged_dir = temp_dir.path().join("forged");
    write_class(&genuine_dir, 6, 0.0, 2);
    write_class(&forged_dir, 6, std::f32::consts::PI, 7);
    // 画像でないファイルは無視される
    fs::write(genuine_dir.join("notes.txt"), b"not an image").unwrap();
    let model_path = temp_dir.path().join("models").join("signature_model.json");

    let config = TrainConfig::new(genuine_dir.clone(), forged_dir, model_path.clone());
    let outcome = train(&config).unwrap();

    assert_eq!(outcome.genuine, LoadReport { loaded: 6, skipped: 1 });
    assert_eq!(outcome.forged, LoadReport { loaded: 6, skipped: 0 });
    assert_eq!(outcome.fit.partition.test.len(), 4);
    assert_eq!(outcome.fit.grid.points.len(), 4);
    assert_eq!(outcome.fit.report.weighted_avg.support, 4);
    assert!(model_path.exists());

    let engine = InferenceEngine::load(&model_path).unwrap();
    let bytes = fs::read(genuine_dir.join("sig_00.png")).unwrap();
    let first = engine.predict(&bytes).unwrap();
    let again = InferenceEngine::load(&model_path).unwrap().predict(&bytes).unwrap();
    assert_eq!(first, again);
    assert!((50.0..=100.0).contains(&first.confidence));
}
