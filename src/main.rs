use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use image::{ImageFormat, ImageReader};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::{prelude::*, ThreadPoolBuilder};
use walkdir::WalkDir;

use signature_forgery_rs::{
    init_tracing, train, Cli, Command, InferenceEngine, PredictConfig, TrainConfig,
};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(num_threads) = cli.num_threads {
        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()?;
    }

    match cli.command {
        Command::Train(config) => run_train(&config),
        Command::Predict(config) => run_predict(&config),
    }
}

fn run_train(config: &TrainConfig) -> Result<()> {
    let outcome = train(config).context("Training failed; no model artifact was written")?;
    let best = outcome.fit.grid.best();

    println!(
        "Samples: {} genuine ({} skipped), {} forged ({} skipped), {} train / {} test",
        outcome.genuine.loaded,
        outcome.genuine.skipped,
        outcome.forged.loaded,
        outcome.forged.skipped,
        outcome.fit.partition.train.len(),
        outcome.fit.partition.test.len()
    );
    println!(
        "Best parameters: C={}, gamma={}, kernel=rbf (cv accuracy {:.4})",
        best.params.c, best.params.gamma, best.mean_accuracy
    );
    println!("Accuracy: {:.4}", outcome.fit.report.accuracy);
    println!("{}", outcome.fit.report);
    println!("Model saved to {}", outcome.model_path.display());
    Ok(())
}

fn run_predict(config: &PredictConfig) -> Result<()> {
    let engine = InferenceEngine::load(&config.model_path)
        .with_context(|| format!("Failed to load model: {}", config.model_path.display()))?;

    let inputs = collect_inputs(&config.inputs)?;
    ensure!(!inputs.is_empty(), "No input images found");

    let progress_bar = ProgressBar::new(inputs.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )?
        .progress_chars("#>-"),
    );

    let lines = inputs
        .par_iter()
        .progress_with(progress_bar.clone())
        .map(|(root, path)| -> Result<String> {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read: {}", path.display()))?;
            let line = match engine.classify(&bytes) {
                Ok(classification) => {
                    if let Some(output_dir) = &config.output_dir {
                        let output_path = construct_output_path(path, root, output_dir)?;
                        let preview_path = output_path.with_extension("preview.png");
                        for (image, target) in [
                            (&classification.preprocessed, &output_path),
                            (&classification.preview, &preview_path),
                        ] {
                            image
                                .save_with_format(target, ImageFormat::Png)
                                .with_context(|| {
                                    format!("Failed to save image: {}", target.display())
                                })?;
                        }
                    }
                    let prediction = classification.prediction;
                    format!(
                        "{}\t{}\t{:.2}%",
                        path.display(),
                        prediction.label,
                        prediction.confidence
                    )
                }
                Err(e) => format!("{}\t{}", path.display(), e),
            };
            Ok(line)
        })
        .collect::<Result<Vec<_>>>()?;

    progress_bar.finish_and_clear();
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Expand directories into the image files below them, keeping the root each
/// file was found under. Directory entries are recognised by content, so
/// extensionless scans are picked up too.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut files = Vec::new();
    for input in inputs {
        ensure!(input.exists(), "Input does not exist: {}", input.display());
        if input.is_dir() {
            files.extend(
                WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| is_image_file(e.path()))
                    .map(|e| (input.clone(), e.into_path())),
            );
        } else {
            let root = input.parent().map(Path::to_path_buf).unwrap_or_default();
            files.push((root, input.clone()));
        }
    }
    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map(|reader| reader.format().is_some())
        .unwrap_or(false)
}

fn relocate<P: AsRef<Path>>(path: P, prefix: P, new_prefix: P) -> Result<PathBuf> {
    let relative = path.as_ref().strip_prefix(prefix.as_ref()).with_context(|| {
        format!(
            "{} is not inside {}",
            path.as_ref().display(),
            prefix.as_ref().display()
        )
    })?;
    Ok(new_prefix.as_ref().join(relative))
}

fn construct_output_path(path: &Path, root: &Path, output_dir: &Path) -> Result<PathBuf> {
    let output_path = relocate(path, root, output_dir)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(output_path.with_extension("png"))
}
