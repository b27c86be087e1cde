use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    Rbf { gamma: f64 },
}

impl Kernel {
    pub fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            Kernel::Rbf { gamma } => rbf_from_distance(gamma, squared_distance(a, b)),
        }
    }

    /// Kernel values from a precomputed squared-distance matrix.
    pub fn gram_from_distances(&self, distances: ArrayView2<f64>) -> Array2<f64> {
        match *self {
            Kernel::Rbf { gamma } => distances.mapv(|d| rbf_from_distance(gamma, d)),
        }
    }
}

#[inline]
pub fn rbf_from_distance(gamma: f64, squared_distance: f64) -> f64 {
    (-gamma * squared_distance).exp()
}

#[inline]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Pairwise squared Euclidean distances between the rows of `x`.
///
/// The matrix does not depend on the kernel coefficient, so it is computed once
/// and shared by every grid-search trial.
pub fn squared_distances(x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let norms: Vec<f64> = x.rows().into_iter().map(|r| r.dot(&r)).collect();
    let mut out = Array2::<f64>::zeros((n, n));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let xi = x.row(i);
            for j in 0..n {
                // clamp the rounding error of the expanded form
                row[j] = if i == j {
                    0.0
                } else {
                    (norms[i] + norms[j] - 2.0 * xi.dot(&x.row(j))).max(0.0)
                };
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rbf_values() {
        let k = Kernel::Rbf { gamma: 0.5 };
        assert_eq!(k.eval(&[1.0, 2.0], &[1.0, 2.0]), 1.0);
        let v = k.eval(&[0.0, 0.0], &[1.0, 1.0]);
        assert!((v - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_distance_matrix_matches_pairwise() {
        let x = array![[0.0, 0.0], [3.0, 4.0], [1.0, 1.0]];
        let d = squared_distances(x.view());
        assert_eq!(d[[0, 1]], 25.0);
        assert_eq!(d[[1, 0]], 25.0);
        assert_eq!(d[[2, 2]], 0.0);
        for i in 0..3 {
            for j in 0..3 {
                let expected = squared_distance(&x.row(i).to_vec(), &x.row(j).to_vec());
                assert!((d[[i, j]] - expected).abs() < 1e-9);
            }
        }
    }
}
