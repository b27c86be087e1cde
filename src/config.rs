use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::DEFAULT_MODEL_PATH;
use crate::split::SplitConfig;
use crate::trainer::GridSearchConfig;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Worker threads for decoding, feature extraction, and grid search
    #[arg(short, long, global = true)]
    pub num_threads: Option<usize>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Train a model from genuine and forged signature directories
    Train(TrainConfig),
    /// Classify signature images with a trained model
    Predict(PredictConfig),
}

#[derive(Args, Clone, Debug)]
pub struct TrainConfig {
    #[arg(short, long)]
    pub genuine_dir: PathBuf,

    #[arg(short, long)]
    pub forged_dir: PathBuf,

    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    #[arg(long, default_value_t = 0.25, value_parser = check_fraction)]
    pub test_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(2..))]
    pub folds: u32,

    #[arg(long = "c", value_delimiter = ',', default_values_t = [10.0, 100.0], value_parser = check_positive)]
    pub c_values: Vec<f64>,

    #[arg(long = "gamma", value_delimiter = ',', default_values_t = [0.01, 0.001], value_parser = check_positive)]
    pub gamma_values: Vec<f64>,

    /// Hide the progress bars
    #[arg(long = "quiet", action = clap::ArgAction::SetFalse)]
    pub progress: bool,
}

impl TrainConfig {
    /// Defaults for everything except the two data directories.
    pub fn new(genuine_dir: PathBuf, forged_dir: PathBuf, model_path: PathBuf) -> Self {
        let grid = GridSearchConfig::default();
        let split = SplitConfig::default();
        Self {
            genuine_dir,
            forged_dir,
            model_path,
            test_fraction: split.test_fraction,
            seed: split.seed,
            folds: grid.folds as u32,
            c_values: grid.c_values,
            gamma_values: grid.gamma_values,
            progress: false,
        }
    }

    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            test_fraction: self.test_fraction,
            seed: self.seed,
        }
    }

    pub fn grid(&self) -> GridSearchConfig {
        GridSearchConfig {
            c_values: self.c_values.clone(),
            gamma_values: self.gamma_values.clone(),
            folds: self.folds as usize,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct PredictConfig {
    /// Image files or directories of images
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Save the binarized model input of every image here
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

fn check_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{s} is not a number: {e}"))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("{s} must be strictly between 0 and 1"))
    }
}

fn check_positive(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{s} is not a number: {e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{s} must be a positive number"))
    }
}
