use std::io::Cursor;

use image::{
    imageops, imageops::FilterType, metadata::Orientation, DynamicImage, GrayImage, ImageDecoder,
    ImageReader, Luma,
};
use imageproc::{contrast::otsu_level, map::map_colors};

use crate::features::FeatureConfig;

/// Ink pixel value after binarization.
pub const FOREGROUND: u8 = 255;
/// Paper pixel value after binarization.
pub const BACKGROUND: u8 = 0;

const PREVIEW_SIZE: (u32, u32) = (400, 200);

/// A grayscale signature resized to the model's fixed geometry and binarized
/// with inverted polarity (ink = 255, paper = 0).
///
/// Only the functions in this module construct it, so every instance has the
/// configured dimensions and pixel values in {0, 255}.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage(GrayImage);

impl NormalizedImage {
    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_inner(self) -> GrayImage {
        self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn foreground_pixels(&self) -> usize {
        self.0.pixels().filter(|p| p.0[0] == FOREGROUND).count()
    }
}

/// Decode `bytes` and normalize them with the default feature geometry.
///
/// Returns `None` when the bytes are not a decodable raster image.
pub fn normalize(bytes: &[u8]) -> Option<NormalizedImage> {
    normalize_with(bytes, &FeatureConfig::DEFAULT)
}

pub fn normalize_with(bytes: &[u8], config: &FeatureConfig) -> Option<NormalizedImage> {
    let image = decode(bytes)?;
    Some(normalize_image(&image, config))
}

/// Decode an encoded image, upright.
///
/// The format is sniffed from the content, so file names never matter, and the
/// EXIF orientation tag is applied. Training and inference both decode here.
pub fn decode(bytes: &[u8]) -> Option<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_decoder()
        .ok()?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).ok()?;
    image.apply_orientation(orientation);
    Some(image)
}

/// Resize (non-uniformly) to the configured size and apply an inverted Otsu threshold.
///
/// Training and inference both go through this function so the foreground /
/// background boundary is bit-identical between them.
pub fn normalize_image(image: &DynamicImage, config: &FeatureConfig) -> NormalizedImage {
    let gray = image.to_luma8();
    let resized = imageops::resize(
        &gray,
        config.image_width,
        config.image_height,
        FilterType::Triangle,
    );
    NormalizedImage(binarize_inverted(&resized))
}

/// Otsu threshold with inverted output: pixels above the level become
/// background, the rest become foreground.
pub fn binarize_inverted(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    map_colors(image, |Luma([v])| {
        if v > level {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Grayscale copy of the upload resized for side-by-side display.
pub fn preview_image(image: &DynamicImage) -> GrayImage {
    let (w, h) = PREVIEW_SIZE;
    imageops::resize(&image.to_luma8(), w, h, FilterType::Triangle)
}
