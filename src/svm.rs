pub mod kernel;
pub mod platt;
pub mod smo;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

pub use kernel::Kernel;
pub use platt::PlattScaling;

use crate::dataset::Label;
use crate::errors::{Result, SignatureError};
use crate::split::{shuffled_kfold, Partition};
use crate::traits::{BinaryClassifier, ClassProbabilities};

/// Folds used to collect out-of-sample decision values for calibration.
pub const CALIBRATION_FOLDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    /// Penalty strength.
    pub c: f64,
    /// RBF kernel coefficient.
    pub gamma: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl SvmParams {
    pub const fn new(c: f64, gamma: f64) -> Self {
        Self {
            c,
            gamma,
            tolerance: 1e-3,
            max_iterations: 10_000_000,
        }
    }

    pub const fn kernel(&self) -> Kernel {
        Kernel::Rbf { gamma: self.gamma }
    }
}

/// C-SVC keeping only its support vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmModel {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    /// `αᵢyᵢ` per support vector.
    pub dual_coef: Vec<f64>,
    pub rho: f64,
}

impl SvmModel {
    pub fn fit(x: ArrayView2<f64>, labels: &[Label], params: &SvmParams) -> Result<Self> {
        let distances = kernel::squared_distances(x);
        let gram = params.kernel().gram_from_distances(distances.view());
        Self::fit_gram(x, gram.view(), labels, params)
    }

    pub(crate) fn fit_gram(
        x: ArrayView2<f64>,
        gram: ArrayView2<f64>,
        labels: &[Label],
        params: &SvmParams,
    ) -> Result<Self> {
        if x.nrows() != labels.len() {
            return Err(SignatureError::validation(
                "labels",
                format!("has {} entries for {} samples", labels.len(), x.nrows()),
            ));
        }
        if !Label::ALL
            .iter()
            .all(|class| labels.iter().any(|l| l == class))
        {
            return Err(SignatureError::validation(
                "labels",
                "must contain both forged and genuine samples",
            ));
        }

        let y = signs(labels);
        let solution = smo::solve(gram, &y, params.c, params.tolerance, params.max_iterations);
        if !solution.converged {
            tracing::warn!(
                "SMO stopped after {} iterations without reaching tolerance {}",
                solution.iterations,
                params.tolerance
            );
        }

        let mut support_vectors = Vec::new();
        let mut dual_coef = Vec::new();
        for (i, coef) in solution.dual_coefficients(&y).into_iter().enumerate() {
            if solution.alpha[i] > 0.0 {
                support_vectors.push(x.row(i).to_vec());
                dual_coef.push(coef);
            }
        }
        tracing::debug!(
            "SVM fit (C={}, gamma={}): {} support vectors, {} iterations",
            params.c,
            params.gamma,
            support_vectors.len(),
            solution.iterations
        );

        Ok(Self {
            kernel: params.kernel(),
            support_vectors,
            dual_coef,
            rho: solution.rho,
        })
    }

    pub fn decision_value(&self, features: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, coef)| coef * self.kernel.eval(sv, features))
            .sum::<f64>()
            - self.rho
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn dimension(&self) -> usize {
        self.support_vectors.first().map_or(0, Vec::len)
    }
}

/// Out-of-fold decision values computed from a precomputed kernel matrix.
///
/// The result is indexed like `labels`; every sample must appear in exactly
/// one test fold. A fold whose training part holds a single class scores its
/// test samples with that class's sign.
pub(crate) fn cross_validation_decisions(
    gram: ArrayView2<f64>,
    labels: &[Label],
    folds: &[Partition],
    params: &SvmParams,
) -> Vec<f64> {
    let mut decisions = vec![0.0; labels.len()];
    for fold in folds {
        for (idx, value) in fold_decisions(gram, labels, fold, params) {
            decisions[idx] = value;
        }
    }
    decisions
}

/// Decision values of one fold's test samples, as `(sample index, value)`.
pub(crate) fn fold_decisions(
    gram: ArrayView2<f64>,
    labels: &[Label],
    fold: &Partition,
    params: &SvmParams,
) -> Vec<(usize, f64)> {
    let train_labels: Vec<Label> = fold.train.iter().map(|&i| labels[i]).collect();
    let y = signs(&train_labels);

    let single_class = y.iter().all(|&v| v == y[0]);
    if y.is_empty() || single_class {
        let sign = y.first().copied().unwrap_or(1.0);
        return fold.test.iter().map(|&t| (t, sign)).collect();
    }

    let sub_gram = gram.select(Axis(0), &fold.train).select(Axis(1), &fold.train);
    let solution = smo::solve(
        sub_gram.view(),
        &y,
        params.c,
        params.tolerance,
        params.max_iterations,
    );
    let coef = solution.dual_coefficients(&y);

    fold.test
        .iter()
        .map(|&t| {
            let value = fold
                .train
                .iter()
                .zip(&coef)
                .filter(|(_, c)| **c != 0.0)
                .map(|(&k, c)| c * gram[[k, t]])
                .sum::<f64>()
                - solution.rho;
            (t, value)
        })
        .collect()
}

fn signs(labels: &[Label]) -> Vec<f64> {
    labels.iter().map(|l| l.sign()).collect()
}

/// SVM with Platt-calibrated class probabilities; genuine is the positive class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedSvm {
    pub params: SvmParams,
    pub svm: SvmModel,
    pub platt: PlattScaling,
}

impl CalibratedSvm {
    pub fn fit(x: ArrayView2<f64>, labels: &[Label], params: &SvmParams, seed: u64) -> Result<Self> {
        let distances = kernel::squared_distances(x);
        let gram = params.kernel().gram_from_distances(distances.view());
        Self::fit_gram(x, gram.view(), labels, params, seed)
    }

    /// Calibrate on out-of-fold decision values, then refit on every sample.
    pub(crate) fn fit_gram(
        x: ArrayView2<f64>,
        gram: ArrayView2<f64>,
        labels: &[Label],
        params: &SvmParams,
        seed: u64,
    ) -> Result<Self> {
        let folds = shuffled_kfold(labels.len(), CALIBRATION_FOLDS, seed);
        let decisions = cross_validation_decisions(gram, labels, &folds, params);
        let positive: Vec<bool> = labels.iter().map(|&l| l == Label::Genuine).collect();
        let platt = PlattScaling::fit(&decisions, &positive);
        tracing::debug!("Platt calibration: A={:.6}, B={:.6}", platt.a, platt.b);

        let svm = SvmModel::fit_gram(x, gram, labels, params)?;
        Ok(Self {
            params: *params,
            svm,
            platt,
        })
    }

    pub fn probabilities(&self, features: &[f64]) -> ClassProbabilities {
        let genuine = self.platt.probability(self.svm.decision_value(features));
        ClassProbabilities {
            forged: 1.0 - genuine,
            genuine,
        }
    }
}

impl BinaryClassifier for CalibratedSvm {
    fn predict_proba(&self, features: &[f64]) -> Result<ClassProbabilities> {
        let expected = self.svm.dimension();
        if features.len() != expected {
            return Err(SignatureError::validation(
                "features",
                format!("has length {}, model expects {}", features.len(), expected),
            ));
        }
        Ok(self.probabilities(features))
    }

    fn feature_len(&self) -> usize {
        self.svm.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy() -> (Array2<f64>, Vec<Label>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [0.0, 0.4],
            [2.0, 2.1],
            [2.2, 1.9],
            [1.9, 2.3],
            [2.4, 2.0],
            [2.1, 2.4],
        ];
        let labels = [vec![Label::Forged; 5], vec![Label::Genuine; 5]].concat();
        (x, labels)
    }

    #[test]
    fn test_svm_separates_clusters() -> Result<()> {
        let (x, labels) = toy();
        let model = SvmModel::fit(x.view(), &labels, &SvmParams::new(10.0, 0.5))?;
        assert!(model.n_support() > 0);
        assert!(model.decision_value(&[0.1, 0.1]) < 0.0);
        assert!(model.decision_value(&[2.1, 2.1]) > 0.0);
        Ok(())
    }

    #[test]
    fn test_single_class_is_rejected() {
        let (x, _) = toy();
        let labels = vec![Label::Genuine; 10];
        let err = SvmModel::fit(x.view(), &labels, &SvmParams::new(10.0, 0.5)).unwrap_err();
        assert!(matches!(err, SignatureError::Validation { .. }));
    }

    #[test]
    fn test_calibrated_probabilities() -> Result<()> {
        let (x, labels) = toy();
        let model = CalibratedSvm::fit(x.view(), &labels, &SvmParams::new(10.0, 0.5), 42)?;

        let near_genuine = model.predict_proba(&[2.0, 2.0])?;
        let near_forged = model.predict_proba(&[0.1, 0.2])?;
        assert!((near_genuine.forged + near_genuine.genuine - 1.0).abs() < 1e-12);
        assert!(near_genuine.genuine > near_forged.genuine);
        assert_eq!(model.feature_len(), 2);
        assert!(model.predict_proba(&[1.0]).is_err());
        Ok(())
    }
}
