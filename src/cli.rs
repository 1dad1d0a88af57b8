//! Command-line interface definitions and argument parsing

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::SvmParams;
use crate::preprocess::UnknownCategory;
use crate::train::TrainConfig;

/// Default location of the fitted pipeline artifact
pub const DEFAULT_MODEL_FILE: &str = "pipeline_model.bin";

/// Customer churn prediction: split a dataset, train an SVM pipeline and
/// score customers interactively or through a web form
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a labeled dataset into training and test files
    Split {
        /// Source CSV with all dataset columns
        #[arg(short, long, default_value = "customer_churn.csv")]
        input: PathBuf,

        /// Destination for the training rows
        #[arg(long, default_value = "customer_churn_train.csv")]
        train_file: PathBuf,

        /// Destination for the test rows
        #[arg(long, default_value = "customer_churn_test.csv")]
        test_file: PathBuf,

        /// Share of rows assigned to the test file
        #[arg(long, default_value = "0.2")]
        test_size: f64,
    },

    /// Fit the feature pipeline and classifier, then save the artifact
    Train {
        /// Labeled training CSV
        #[arg(long, default_value = "customer_churn_train.csv")]
        train_file: PathBuf,

        /// Artifact destination
        #[arg(short, long, env = "CHURNFORGE_MODEL", default_value = DEFAULT_MODEL_FILE)]
        model: PathBuf,

        /// Share of the training file held out for validation
        #[arg(long, default_value = "0.2")]
        validation_size: f64,

        /// Seed of the validation shuffle
        #[arg(long, default_value = "42")]
        seed: u64,

        /// SVM misclassification penalty
        #[arg(long, default_value = "1.0")]
        c: f64,

        /// How categories unseen during training are encoded
        #[arg(long, value_enum, default_value_t = UnknownCategory::Reject)]
        unknown_categories: UnknownCategory,
    },

    /// Score a labeled CSV with a saved artifact
    Evaluate {
        /// Labeled CSV to score
        #[arg(long, default_value = "customer_churn_test.csv")]
        test_file: PathBuf,

        /// Saved artifact
        #[arg(short, long, env = "CHURNFORGE_MODEL", default_value = DEFAULT_MODEL_FILE)]
        model: PathBuf,
    },

    /// Answer questions about one customer and print the churn prediction
    Predict {
        /// Saved artifact
        #[arg(short, long, env = "CHURNFORGE_MODEL", default_value = DEFAULT_MODEL_FILE)]
        model: PathBuf,
    },

    /// Serve the prediction form over HTTP
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:8501")]
        addr: SocketAddr,

        /// Saved artifact, loaded on the first request
        #[arg(short, long, env = "CHURNFORGE_MODEL", default_value = DEFAULT_MODEL_FILE)]
        model: PathBuf,
    },
}

impl Command {
    /// Training settings from the `train` flags, `None` for other subcommands
    pub fn train_config(&self) -> Option<TrainConfig> {
        match *self {
            Command::Train {
                validation_size,
                seed,
                c,
                unknown_categories,
                ..
            } => Some(TrainConfig {
                validation_fraction: validation_size,
                seed,
                svm: SvmParams {
                    c,
                    ..SvmParams::default()
                },
                unknown_categories,
            }),
            _ => None,
        }
    }
}

impl Args {
    /// Default log filter directive, used when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "churnforge=debug"
        } else {
            "churnforge=info"
        }
    }
}
