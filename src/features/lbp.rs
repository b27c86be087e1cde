use std::f64::consts::PI;

use image::GrayImage;
use ndarray::prelude::*;
use nshare::AsNdarray2;

use super::FeatureConfig;

/// Rotation-invariant uniform LBP codes.
///
/// Samples `P` points on a circle of radius `R` with bilinear interpolation
/// (pixels outside the image read as 0). A pattern with at most two bit
/// transitions maps to its number of set bits (`0..=P`); every other pattern
/// maps to `P + 1`.
pub fn uniform_lbp(image: &GrayImage, config: &FeatureConfig) -> Array2<u8> {
    let pixels = image.as_ndarray2().mapv(f64::from);
    let (rows, cols) = pixels.dim();
    let points = config.lbp_points;
    let offsets = sample_offsets(points, config.lbp_radius);

    let mut codes = Array2::<u8>::zeros((rows, cols));
    let mut bits = vec![false; points];
    for ((r, c), code) in codes.indexed_iter_mut() {
        let centre = pixels[[r, c]];
        for (bit, &(dr, dc)) in bits.iter_mut().zip(&offsets) {
            let sample = bilinear(pixels.view(), r as f64 + dr, c as f64 + dc);
            *bit = sample - centre >= 0.0;
        }
        let transitions = bits.windows(2).filter(|w| w[0] != w[1]).count();
        *code = if transitions <= 2 {
            bits.iter().filter(|&&b| b).count() as u8
        } else {
            (points + 1) as u8
        };
    }
    codes
}

/// Normalized histogram of uniform LBP codes: `count / (total + eps)`.
pub fn lbp_histogram(image: &GrayImage, config: &FeatureConfig) -> Vec<f64> {
    let codes = uniform_lbp(image, config);
    let mut hist = vec![0.0f64; config.lbp_bins()];
    for &code in codes.iter() {
        hist[code as usize] += 1.0;
    }
    let total: f64 = hist.iter().sum();
    hist.iter_mut()
        .for_each(|v| *v /= total + config.histogram_epsilon);
    hist
}

/// (row, column) offsets of the circular neighbours, rounded to 5 decimals.
fn sample_offsets(points: usize, radius: f64) -> Vec<(f64, f64)> {
    let round5 = |v: f64| (v * 1e5).round() / 1e5;
    (0..points)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / points as f64;
            (round5(-radius * angle.sin()), round5(radius * angle.cos()))
        })
        .collect()
}

fn bilinear(image: ArrayView2<f64>, r: f64, c: f64) -> f64 {
    let pixel = |r: f64, c: f64| -> f64 {
        let (rows, cols) = image.dim();
        if r < 0.0 || c < 0.0 || r >= rows as f64 || c >= cols as f64 {
            0.0
        } else {
            image[[r as usize, c as usize]]
        }
    };
    let (min_r, min_c) = (r.floor(), c.floor());
    let (max_r, max_c) = (r.ceil(), c.ceil());
    let (dr, dc) = (r - min_r, c - min_c);
    let top = (1.0 - dc) * pixel(min_r, min_c) + dc * pixel(min_r, max_c);
    let bottom = (1.0 - dc) * pixel(max_r, min_c) + dc * pixel(max_r, max_c);
    (1.0 - dr) * top + dr * bottom
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_offsets_on_axes() {
        let offsets = sample_offsets(24, 8.0);
        assert_eq!(offsets.len(), 24);
        assert_eq!(offsets[0], (0.0, 8.0));
        assert_eq!(offsets[6], (-8.0, 0.0));
        assert_eq!(offsets[12], (0.0, -8.0));
        assert_eq!(offsets[18], (8.0, 0.0));
    }

    #[test]
    fn test_flat_zero_image_is_all_ones_pattern() {
        let image = GrayImage::from_pixel(32, 32, Luma([0]));
        let codes = uniform_lbp(&image, &FeatureConfig::DEFAULT);
        assert!(codes.iter().all(|&c| c == 24));
    }

    #[test]
    fn test_bright_centre_pixel_has_code_zero() {
        let mut image = GrayImage::from_pixel(32, 32, Luma([0]));
        image.put_pixel(16, 16, Luma([255]));
        let codes = uniform_lbp(&image, &FeatureConfig::DEFAULT);
        assert_eq!(codes[[16, 16]], 0);
    }

    #[test]
    fn test_codes_stay_in_range() {
        let image = GrayImage::from_fn(48, 40, |x, y| {
            if (x / 3 + y / 5) % 2 == 0 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let codes = uniform_lbp(&image, &FeatureConfig::DEFAULT);
        assert!(codes.iter().all(|&c| c <= 25));
    }

    #[test]
    fn test_histogram_sums_to_one() {
        let image = GrayImage::from_fn(40, 40, |x, _| Luma([(x * 6) as u8]));
        let hist = lbp_histogram(&image, &FeatureConfig::DEFAULT);
        assert_eq!(hist.len(), 26);
        let sum: f64 = hist.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
