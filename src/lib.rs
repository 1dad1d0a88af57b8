//! churnforge: customer churn prediction with an SVM over a Telco-style dataset
//!
//! The crate covers the whole lifecycle: splitting a labeled CSV, fitting a
//! feature pipeline and classifier, persisting it as one artifact, and scoring
//! customers from a terminal prompt or an HTML form.

pub mod cli;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod preprocess;
pub mod prompt;
pub mod schema;
pub mod split;
pub mod train;
pub mod web;

// Re-export public items for easier access
pub use cli::{Args, Command};
pub use error::ChurnError;
pub use metrics::{ConfusionMatrix, EvaluationReport};
pub use model::{ChurnPipeline, Prediction, SvmParams, DECISION_THRESHOLD};
pub use preprocess::{FeatureLayout, FittedTransform, UnknownCategory};
pub use prompt::collect_record;
pub use schema::CustomerRecord;
pub use split::{split_dataset, SplitSummary};
pub use train::{evaluate_model, train_model, TrainConfig, TrainSummary};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, ChurnError>;
