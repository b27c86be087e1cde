use std::path::{Path, PathBuf};

use ndarray::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TrainConfig;
use crate::dataset::{DatasetLoader, Label, LabeledImage, LoadReport};
use crate::errors::{Result, SignatureError};
use crate::features::{extract_batch, FeatureConfig};
use crate::metrics::{accuracy, ClassificationReport};
use crate::model::TrainedModel;
use crate::preprocess::NormalizedImage;
use crate::split::{stratified_kfold, stratified_split, Partition, SplitConfig};
use crate::svm::{self, kernel, CalibratedSvm, SvmParams};

/// Hyperparameter grid for the RBF SVM.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSearchConfig {
    pub c_values: Vec<f64>,
    pub gamma_values: Vec<f64>,
    pub folds: usize,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            c_values: vec![10.0, 100.0],
            gamma_values: vec![0.01, 0.001],
            folds: 3,
        }
    }
}

impl GridSearchConfig {
    /// Candidates ordered by ascending C, then ascending gamma.
    ///
    /// The search keeps the first candidate with the best score, so this order
    /// is also the tie-break.
    pub fn candidates(&self) -> Vec<SvmParams> {
        let gamma_values = sorted_unique(&self.gamma_values);
        sorted_unique(&self.c_values)
            .into_iter()
            .flat_map(|c| gamma_values.iter().map(move |&gamma| SvmParams::new(c, gamma)))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.c_values.is_empty() || self.gamma_values.is_empty() {
            return Err(SignatureError::validation(
                "grid",
                "needs at least one C and one gamma value",
            ));
        }
        if self
            .c_values
            .iter()
            .chain(&self.gamma_values)
            .any(|v| !(v.is_finite() && *v > 0.0))
        {
            return Err(SignatureError::validation(
                "grid",
                "C and gamma values must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPoint {
    pub params: SvmParams,
    pub fold_accuracies: Vec<f64>,
    pub mean_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub points: Vec<GridPoint>,
    pub best: usize,
}

impl GridSearchResult {
    pub fn best(&self) -> &GridPoint {
        &self.points[self.best]
    }
}

/// Result of fitting on an in-memory feature matrix.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub model: TrainedModel,
    pub grid: GridSearchResult,
    pub partition: Partition,
    pub report: ClassificationReport,
}

/// Result of a full training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub fit: FitOutcome,
    pub model_path: PathBuf,
    pub genuine: LoadReport,
    pub forged: LoadReport,
}

/// Cross-validated accuracy for every candidate.
///
/// Each (candidate, fold) trial only reads the shared kernel matrices, so all
/// trials run in parallel.
pub fn grid_search(
    distances: ArrayView2<f64>,
    labels: &[Label],
    grid: &GridSearchConfig,
) -> Result<GridSearchResult> {
    grid.validate()?;
    let folds = stratified_kfold(labels, grid.folds)?;
    let candidates = grid.candidates();

    // candidates are C-major, so candidate `i` uses gamma `i % gammas.len()`
    let grams: Vec<Array2<f64>> = sorted_unique(&grid.gamma_values)
        .into_iter()
        .map(|gamma| svm::Kernel::Rbf { gamma }.gram_from_distances(distances))
        .collect();

    let trials: Vec<(usize, usize)> = (0..candidates.len())
        .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
        .collect();
    let scores: Vec<f64> = trials
        .par_iter()
        .map(|&(candidate, fold)| {
            let gram = grams[candidate % grams.len()].view();
            fold_accuracy(gram, labels, &folds[fold], &candidates[candidate])
        })
        .collect();

    let points: Vec<GridPoint> = candidates
        .into_iter()
        .enumerate()
        .map(|(candidate, params)| {
            let fold_accuracies = scores[candidate * folds.len()..][..folds.len()].to_vec();
            let mean_accuracy =
                fold_accuracies.iter().sum::<f64>() / fold_accuracies.len() as f64;
            tracing::info!(
                "C={:<6} gamma={:<6} cv accuracy {:.4} {:?}",
                params.c,
                params.gamma,
                mean_accuracy,
                fold_accuracies
            );
            GridPoint {
                params,
                fold_accuracies,
                mean_accuracy,
            }
        })
        .collect();

    let mut best = 0;
    for (i, point) in points.iter().enumerate() {
        if point.mean_accuracy > points[best].mean_accuracy {
            best = i;
        }
    }
    Ok(GridSearchResult { points, best })
}

fn fold_accuracy(
    gram: ArrayView2<f64>,
    labels: &[Label],
    fold: &Partition,
    params: &SvmParams,
) -> f64 {
    let decisions = svm::fold_decisions(gram, labels, fold, params);
    let truth: Vec<Label> = decisions.iter().map(|&(i, _)| labels[i]).collect();
    let predicted: Vec<Label> = decisions.iter().map(|&(_, f)| label_for_decision(f)).collect();
    accuracy(&truth, &predicted)
}

fn sorted_unique(values: &[f64]) -> Vec<f64> {
    let mut values = values.to_vec();
    values.sort_by(f64::total_cmp);
    values.dedup();
    values
}

fn label_for_decision(value: f64) -> Label {
    if value > 0.0 {
        Label::Genuine
    } else {
        Label::Forged
    }
}

/// Split, search, refit with calibration, and evaluate on the held-out part.
pub fn fit(
    features: ArrayView2<f64>,
    labels: &[Label],
    feature_config: &FeatureConfig,
    split: &SplitConfig,
    grid: &GridSearchConfig,
) -> Result<FitOutcome> {
    if features.nrows() != labels.len() {
        return Err(SignatureError::validation(
            "labels",
            format!("has {} entries for {} samples", labels.len(), features.nrows()),
        ));
    }

    let partition = stratified_split(labels, split)?;
    let x_train = features.select(Axis(0), &partition.train);
    let y_train: Vec<Label> = partition.train.iter().map(|&i| labels[i]).collect();
    tracing::info!(
        "Split {} samples: {} train / {} test (seed {})",
        labels.len(),
        partition.train.len(),
        partition.test.len(),
        split.seed
    );

    let distances = kernel::squared_distances(x_train.view());
    let search = grid_search(distances.view(), &y_train, grid)?;
    let best = search.best();
    tracing::info!(
        "Best parameters: C={}, gamma={} (cv accuracy {:.4})",
        best.params.c,
        best.params.gamma,
        best.mean_accuracy
    );

    let gram = best.params.kernel().gram_from_distances(distances.view());
    let classifier =
        CalibratedSvm::fit_gram(x_train.view(), gram.view(), &y_train, &best.params, split.seed)?;

    let truth: Vec<Label> = partition.test.iter().map(|&i| labels[i]).collect();
    let predicted: Vec<Label> = partition
        .test
        .par_iter()
        .map(|&i| classifier.probabilities(&features.row(i).to_vec()).argmax())
        .collect();
    let report = ClassificationReport::from_predictions(&truth, &predicted);
    tracing::info!("Test accuracy: {:.4}", report.accuracy);

    let model = TrainedModel::new(*feature_config, classifier, best.mean_accuracy);
    Ok(FitOutcome {
        model,
        grid: search,
        partition,
        report,
    })
}

/// Full offline training run: load both class directories, fit, evaluate, persist.
///
/// Nothing is written unless both directories yield at least one image.
pub fn train(config: &TrainConfig) -> Result<TrainingOutcome> {
    let feature_config = FeatureConfig::DEFAULT;
    let loader = DatasetLoader::new(feature_config).with_progress(config.progress);

    let (genuine, genuine_report) = load_class(&loader, &config.genuine_dir, Label::Genuine)?;
    let (forged, forged_report) = load_class(&loader, &config.forged_dir, Label::Forged)?;

    let (images, labels): (Vec<NormalizedImage>, Vec<Label>) = genuine
        .into_iter()
        .chain(forged)
        .map(|sample| (sample.image, sample.label))
        .unzip();

    tracing::info!("Extracting features from {} images", images.len());
    let rows = extract_batch(&images, &feature_config);
    let features = Array2::from_shape_vec(
        (rows.len(), feature_config.feature_len()),
        rows.into_iter().flatten().collect(),
    )?;

    let outcome = fit(
        features.view(),
        &labels,
        &feature_config,
        &config.split(),
        &config.grid(),
    )?;
    outcome.model.save(&config.model_path)?;

    Ok(TrainingOutcome {
        fit: outcome,
        model_path: config.model_path.clone(),
        genuine: genuine_report,
        forged: forged_report,
    })
}

fn load_class(
    loader: &DatasetLoader,
    dir: &Path,
    label: Label,
) -> Result<(Vec<LabeledImage>, LoadReport)> {
    let (samples, report) = loader.load(dir, label)?;
    if samples.is_empty() {
        return Err(SignatureError::EmptyDataset {
            path: dir.to_path_buf(),
        });
    }
    Ok((samples, report))
}
