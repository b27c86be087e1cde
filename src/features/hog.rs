use image::GrayImage;
use ndarray::{prelude::*, Zip};
use nshare::AsNdarray2;

use super::FeatureConfig;

/// Histogram of oriented gradients.
///
/// Orientation is unsigned (0..180 degrees) with hard binning. Each cell
/// histogram holds the gradient magnitude per bin averaged over the cell area.
/// Blocks overlap with a stride of one cell and are L2-Hys normalized; the
/// output is ordered by block row, block column, cell row, cell column, bin.
pub fn hog(image: &GrayImage, config: &FeatureConfig) -> Vec<f64> {
    let pixels = image.as_ndarray2().mapv(f64::from);
    let (magnitude, orientation) = gradients(pixels.view());
    let cells = cell_histograms(magnitude.view(), orientation.view(), config);
    normalize_blocks(cells.view(), config)
}

/// Centred differences along rows and columns; the outermost row/column has
/// zero gradient along its own axis.
fn gradients(image: ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (rows, cols) = image.dim();
    let mut g_row = Array2::<f64>::zeros((rows, cols));
    let mut g_col = Array2::<f64>::zeros((rows, cols));

    if rows > 2 {
        let diff = &image.slice(s![2.., ..]) - &image.slice(s![..-2, ..]);
        g_row.slice_mut(s![1..-1, ..]).assign(&diff);
    }
    if cols > 2 {
        let diff = &image.slice(s![.., 2..]) - &image.slice(s![.., ..-2]);
        g_col.slice_mut(s![.., 1..-1]).assign(&diff);
    }

    let magnitude = Zip::from(&g_row)
        .and(&g_col)
        .map_collect(|&gr, &gc| gr.hypot(gc));
    let orientation = Zip::from(&g_row)
        .and(&g_col)
        .map_collect(|&gr, &gc| gr.atan2(gc).to_degrees().rem_euclid(180.0));
    (magnitude, orientation)
}

fn cell_histograms(
    magnitude: ArrayView2<f64>,
    orientation: ArrayView2<f64>,
    config: &FeatureConfig,
) -> Array3<f64> {
    let (cell_rows, cell_cols) = config.cells();
    let cell = config.cell_size as usize;
    let bins = config.orientations;
    let bin_width = 180.0 / bins as f64;
    let area = (cell * cell) as f64;

    let mut hist = Array3::<f64>::zeros((cell_rows, cell_cols, bins));
    for ((cr, cc, bin), value) in hist.indexed_iter_mut() {
        let lower = bin_width * bin as f64;
        let upper = bin_width * (bin + 1) as f64;
        let window = s![cr * cell..(cr + 1) * cell, cc * cell..(cc + 1) * cell];
        let total: f64 = Zip::from(magnitude.slice(window))
            .and(orientation.slice(window))
            .fold(0.0, |acc, &m, &o| {
                if o >= lower && o < upper {
                    acc + m
                } else {
                    acc
                }
            });
        *value = total / area;
    }
    hist
}

fn normalize_blocks(cells: ArrayView3<f64>, config: &FeatureConfig) -> Vec<f64> {
    let (block_rows, block_cols) = config.blocks();
    let b = config.block_size as usize;
    let mut out = Vec::with_capacity(config.hog_len());

    for br in 0..block_rows {
        for bc in 0..block_cols {
            let block: Vec<f64> = cells
                .slice(s![br..br + b, bc..bc + b, ..])
                .iter()
                .copied()
                .collect();
            out.extend(l2_hys(block, config.l2hys_clip, config.l2hys_epsilon));
        }
    }
    out
}

/// L2 normalize, clip at `clip`, renormalize.
pub fn l2_hys(mut block: Vec<f64>, clip: f64, eps: f64) -> Vec<f64> {
    let scale = |v: &mut Vec<f64>| {
        let norm = (v.iter().map(|x| x * x).sum::<f64>() + eps * eps).sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
    };
    scale(&mut block);
    block.iter_mut().for_each(|x| *x = x.min(clip));
    scale(&mut block);
    block
}
