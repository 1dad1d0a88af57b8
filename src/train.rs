//! Training and evaluation flows over CSV files

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{load_labeled_data, load_training_data, LabeledData};
use crate::error::ChurnError;
use crate::metrics::EvaluationReport;
use crate::model::{ChurnPipeline, SvmParams};
use crate::preprocess::{FeatureLayout, UnknownCategory};
use crate::schema::CustomerRecord;
use crate::split::partition_indices;

/// Settings for one training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Share of the training file held out for evaluation, in [0, 1)
    pub validation_fraction: f64,
    /// Seed of the internal train/validation shuffle
    pub seed: u64,
    pub svm: SvmParams,
    pub unknown_categories: UnknownCategory,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.2,
            seed: 42,
            svm: SvmParams::default(),
            unknown_categories: UnknownCategory::default(),
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainSummary {
    /// Metrics on the held-out validation rows
    pub report: EvaluationReport,
    pub train_rows: usize,
    pub validation_rows: usize,
}

/// Train on a CSV file and persist the fitted pipeline
///
/// # Arguments
/// * `train_file` - Labeled CSV with all 21 dataset columns
/// * `model_file` - Destination of the pipeline artifact
/// * `config` - Validation split and classifier settings
///
/// # Returns
/// * `TrainSummary` with validation metrics; the artifact is only written on success
pub fn train_model(
    train_file: &Path,
    model_file: &Path,
    config: &TrainConfig,
) -> crate::Result<TrainSummary> {
    let data = load_training_data(train_file)?;
    let (pipeline, summary) = fit_and_evaluate(&data, config)?;
    pipeline.save(model_file)?;
    Ok(summary)
}

/// Split `data` with the configured seed, fit on the training part and score
/// the validation part
pub fn fit_and_evaluate(
    data: &LabeledData,
    config: &TrainConfig,
) -> crate::Result<(ChurnPipeline, TrainSummary)> {
    let fraction = config.validation_fraction;
    if !(0.0..1.0).contains(&fraction) {
        return Err(ChurnError::InvalidFraction(fraction));
    }

    let (train_idx, validation_idx) = partition_indices(data.len(), fraction, config.seed);
    if train_idx.is_empty() {
        return Err(ChurnError::NotEnoughRows {
            purpose: "train a model",
            rows: data.len(),
        });
    }

    let (train_records, train_labels) = select(data, &train_idx);
    let layout = FeatureLayout::default().unknown_categories(config.unknown_categories);
    let pipeline = ChurnPipeline::fit(
        &layout,
        &train_records,
        &train_labels,
        data.total_charges_fill,
        &config.svm,
    )?;
    tracing::info!("Model training completed on {} rows", train_idx.len());

    let (validation_records, validation_labels) = select(data, &validation_idx);
    let report = score(&pipeline, &validation_records, &validation_labels)?;

    Ok((
        pipeline,
        TrainSummary {
            report,
            train_rows: train_idx.len(),
            validation_rows: validation_idx.len(),
        },
    ))
}

/// Score a labeled CSV with a persisted pipeline
pub fn evaluate_model(test_file: &Path, model_file: &Path) -> crate::Result<EvaluationReport> {
    let pipeline = ChurnPipeline::load(model_file)?;
    let data = load_labeled_data(test_file, pipeline.total_charges_fill())?;
    tracing::info!("Scoring {} rows from {}", data.len(), test_file.display());
    score(&pipeline, &data.records, &data.labels)
}

/// Predict `records` and compare against `labels`
pub fn score(
    pipeline: &ChurnPipeline,
    records: &[CustomerRecord],
    labels: &[bool],
) -> crate::Result<EvaluationReport> {
    let predicted: Vec<bool> = pipeline
        .predict_batch(records)?
        .iter()
        .map(|prediction| prediction.churn)
        .collect();
    Ok(EvaluationReport::from_predictions(labels, &predicted))
}

fn select(data: &LabeledData, rows: &[usize]) -> (Vec<CustomerRecord>, Vec<bool>) {
    rows.iter()
        .map(|&row| (data.records[row].clone(), data.labels[row]))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::training_set;

    fn labeled(n: usize) -> LabeledData {
        let (records, labels) = training_set(n);
        LabeledData {
            records,
            labels,
            total_charges_fill: 1000.0,
            imputed: 0,
        }
    }

    #[test]
    fn test_fit_and_evaluate_reports_bounded_metrics() {
        let (pipeline, summary) = fit_and_evaluate(&labeled(100), &TrainConfig::default()).unwrap();

        assert_eq!(summary.train_rows, 80);
        assert_eq!(summary.validation_rows, 20);
        assert_eq!(summary.report.confusion_matrix.total(), 20);
        assert_eq!(pipeline.total_charges_fill(), 1000.0);

        let report = summary.report;
        for metric in [report.accuracy, report.recall, report.precision, report.f1] {
            assert!((0.0..=1.0).contains(&metric));
        }
        if report.precision + report.recall > 0.0 {
            let harmonic =
                2.0 * report.precision * report.recall / (report.precision + report.recall);
            assert!((report.f1 - harmonic).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let data = labeled(60);
        let (_, first) = fit_and_evaluate(&data, &TrainConfig::default()).unwrap();
        let (_, second) = fit_and_evaluate(&data, &TrainConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_configuration() {
        let data = labeled(10);
        let config = TrainConfig {
            validation_fraction: 1.0,
            ..TrainConfig::default()
        };
        let result = fit_and_evaluate(&data, &config);
        assert!(matches!(result, Err(ChurnError::InvalidFraction(_))));

        let empty = LabeledData {
            records: Vec::new(),
            labels: Vec::new(),
            total_charges_fill: 0.0,
            imputed: 0,
        };
        let result = fit_and_evaluate(&empty, &TrainConfig::default());
        assert!(matches!(result, Err(ChurnError::NotEnoughRows { .. })));
    }
}
