pub mod config;
pub mod dataset;
pub mod errors;
pub mod features;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod split;
pub mod svm;
pub mod trainer;
pub mod traits;

pub mod mocks;

pub use config::{Cli, Command, PredictConfig, TrainConfig};
pub use dataset::{Label, LabeledImage, LoadReport};
pub use errors::{ProcessingError, Result, SignatureError};
pub use features::{extract, FeatureConfig, FeatureVector};
pub use inference::{Classification, InferenceEngine, PredictionResult};
pub use model::TrainedModel;
pub use preprocess::{normalize, NormalizedImage};
pub use trainer::{train, TrainingOutcome};
pub use traits::*;

/// Install the global tracing subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
