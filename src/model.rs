//! Churn classifier: the fitted feature transform bundled with an SVM
//!
//! [`ChurnPipeline`] is the only unit that is trained, persisted and loaded.
//! The transform never travels without the classifier fitted against its
//! output, so inference always sees the training-time scaling and vocabulary.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use linfa::dataset::Pr;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::{persist_file, temp_file_beside};
use crate::error::ChurnError;
use crate::preprocess::{FeatureLayout, FittedTransform};
use crate::schema::CustomerRecord;

/// Probability at or above which a customer is labeled as churning
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Hyperparameters of the RBF-kernel SVM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    /// Misclassification penalty, applied to both classes
    pub c: f64,
    /// Gaussian kernel width `eps` in `exp(-|x - y|^2 / eps)`.
    /// `None` uses the number of encoded features.
    pub kernel_eps: Option<f64>,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel_eps: None,
        }
    }
}

/// Outcome of running one record through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub churn: bool,
    /// Probability of the churn class, in [0, 1]
    pub probability: f64,
}

impl Prediction {
    fn from_probability(probability: f64) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            churn: probability >= DECISION_THRESHOLD,
            probability,
        }
    }

    /// `"Yes"` or `"No"`, the spelling of the dataset's `Churn` column
    pub fn label(&self) -> &'static str {
        if self.churn {
            "Yes"
        } else {
            "No"
        }
    }
}

#[derive(Serialize, Deserialize)]
enum Classifier {
    /// Platt-scaled SVM
    Svm(Svm<f64, Pr>),
    /// Training data held a single class
    Constant { churn: bool },
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Svm(svm) => write!(f, "Svm({} support vectors)", svm.nsupport()),
            Self::Constant { churn } => write!(f, "Constant({churn})"),
        }
    }
}

/// Fitted feature transform plus classifier, persisted as one artifact
#[derive(Debug, Serialize, Deserialize)]
pub struct ChurnPipeline {
    transform: FittedTransform,
    classifier: Classifier,
    total_charges_fill: f64,
}

impl ChurnPipeline {
    /// Fit the feature transform and the classifier together
    ///
    /// # Arguments
    /// * `layout` - Column partition and unknown-category policy
    /// * `records` - Training records
    /// * `labels` - Churn labels, one per record
    /// * `total_charges_fill` - Median used for missing `TotalCharges`, kept for scoring files
    /// * `params` - SVM hyperparameters
    pub fn fit(
        layout: &FeatureLayout,
        records: &[CustomerRecord],
        labels: &[bool],
        total_charges_fill: f64,
        params: &SvmParams,
    ) -> crate::Result<Self> {
        debug_assert_eq!(records.len(), labels.len());

        let transform = layout.fit(records)?;
        let features = transform.transform(records)?;

        let classifier = match single_class(labels) {
            Some(churn) => {
                tracing::warn!(
                    "Training labels contain only churn={}; using a constant classifier",
                    churn
                );
                Classifier::Constant { churn }
            }
            None => {
                let eps = params.kernel_eps.unwrap_or(features.ncols() as f64);
                tracing::debug!(
                    "Fitting SVM on {:?} features (C={}, kernel eps={})",
                    features.shape(),
                    params.c,
                    eps
                );

                let dataset = Dataset::new(features, Array1::from(labels.to_vec()));
                let svm = Svm::<f64, Pr>::params()
                    .pos_neg_weights(params.c, params.c)
                    .gaussian_kernel(eps)
                    .fit(&dataset)?;
                tracing::info!("SVM fitted with {} support vectors", svm.nsupport());
                Classifier::Svm(svm)
            }
        };

        Ok(Self {
            transform,
            classifier,
            total_charges_fill,
        })
    }

    /// Predict one record
    pub fn predict(&self, record: &CustomerRecord) -> crate::Result<Prediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(record))?;
        predictions.pop().ok_or(ChurnError::NotEnoughRows {
            purpose: "predict",
            rows: 0,
        })
    }

    /// Predict many records in one pass; fails on the first record the
    /// transform rejects
    pub fn predict_batch(&self, records: &[CustomerRecord]) -> crate::Result<Vec<Prediction>> {
        let features = self.transform.transform(records)?;

        let probabilities: Vec<f64> = match &self.classifier {
            Classifier::Svm(svm) => svm
                .predict(&features)
                .iter()
                .map(|probability| f64::from(**probability))
                .collect(),
            Classifier::Constant { churn } => {
                vec![if *churn { 1.0 } else { 0.0 }; records.len()]
            }
        };

        Ok(probabilities
            .into_iter()
            .map(Prediction::from_probability)
            .collect())
    }

    /// Write the pipeline to `path`, replacing any previous artifact in one rename
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let mut file = temp_file_beside(path)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            bincode::serialize_into(&mut writer, self).map_err(|err| ChurnError::WriteFile {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
            writer.flush()?;
        }
        persist_file(file, path)?;

        tracing::info!("Pipeline saved to {}", path.display());
        Ok(())
    }

    /// Read a pipeline written by [`ChurnPipeline::save`]
    pub fn load(path: &Path) -> crate::Result<Self> {
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ChurnError::ModelNotFound {
                path: path.to_path_buf(),
            },
            _ => ChurnError::Io(err),
        })?;

        let pipeline: Self = bincode::deserialize_from(BufReader::new(file)).map_err(|source| {
            ChurnError::ModelCorrupt {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::debug!("Loaded {:?} from {}", pipeline.classifier, path.display());
        Ok(pipeline)
    }

    pub fn transform(&self) -> &FittedTransform {
        &self.transform
    }

    /// `TotalCharges` value imputed for missing cells in scoring files
    pub fn total_charges_fill(&self) -> f64 {
        self.total_charges_fill
    }

    /// Number of support vectors, `None` for a constant classifier
    pub fn n_support(&self) -> Option<usize> {
        match &self.classifier {
            Classifier::Svm(svm) => Some(svm.nsupport()),
            Classifier::Constant { .. } => None,
        }
    }
}

fn single_class(labels: &[bool]) -> Option<bool> {
    let first = *labels.first()?;
    labels.iter().all(|&label| label == first).then_some(first)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::vocabulary;
    use tempfile::tempdir;

    const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
    const INTERNET: [&str; 3] = ["Fiber optic", "DSL", "No"];

    pub(crate) fn customer(tenure: u32, contract: &str, internet: &str, seed: usize) -> CustomerRecord {
        let pick = |column: &str, offset: usize| {
            let values = vocabulary(column).unwrap();
            values[(seed + offset) % values.len()].to_string()
        };
        let monthly = if internet == "Fiber optic" { 85.0 } else { 45.0 } + (seed % 10) as f64;
        CustomerRecord {
            gender: pick("gender", 0),
            senior_citizen: (seed % 2) as i64,
            partner: pick("Partner", 1),
            dependents: pick("Dependents", 2),
            tenure,
            phone_service: pick("PhoneService", 3),
            multiple_lines: pick("MultipleLines", 4),
            internet_service: internet.to_string(),
            online_security: pick("OnlineSecurity", 5),
            online_backup: pick("OnlineBackup", 6),
            device_protection: pick("DeviceProtection", 7),
            tech_support: pick("TechSupport", 8),
            streaming_tv: pick("StreamingTV", 9),
            streaming_movies: pick("StreamingMovies", 10),
            contract: contract.to_string(),
            paperless_billing: pick("PaperlessBilling", 11),
            payment_method: pick("PaymentMethod", 12),
            monthly_charges: monthly,
            total_charges: monthly * f64::from(tenure.max(1)),
        }
    }

    /// Churn follows short tenure on month-to-month contracts
    pub(crate) fn training_set(n: usize) -> (Vec<CustomerRecord>, Vec<bool>) {
        (0..n)
            .map(|i| {
                let contract = CONTRACTS[i % 3];
                let internet = INTERNET[(i / 3) % 3];
                let tenure = ((i * 7) % 72) as u32;
                let churn = contract == "Month-to-month" && tenure < 30;
                (customer(tenure, contract, internet, i), churn)
            })
            .unzip()
    }

    fn fitted(n: usize) -> ChurnPipeline {
        let (records, labels) = training_set(n);
        ChurnPipeline::fit(
            &FeatureLayout::default(),
            &records,
            &labels,
            500.0,
            &SvmParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_fit_and_predict_batch() {
        let pipeline = fitted(90);
        assert!(pipeline.n_support().is_some());

        let (records, _) = training_set(12);
        let predictions = pipeline.predict_batch(&records).unwrap();
        assert_eq!(predictions.len(), 12);
        for prediction in predictions {
            assert!((0.0..=1.0).contains(&prediction.probability));
            assert_eq!(prediction.churn, prediction.probability >= DECISION_THRESHOLD);
        }
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let pipeline = fitted(90);
        let record = customer(5, "One year", "DSL", 3);
        let first = pipeline.predict(&record).unwrap();
        let second = pipeline.predict(&record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_risky_profile_scores_above_loyal_profile() {
        let pipeline = fitted(90);
        let risky = pipeline
            .predict(&customer(0, "Month-to-month", "Fiber optic", 1))
            .unwrap();
        let loyal = pipeline
            .predict(&customer(70, "Two year", "DSL", 1))
            .unwrap();
        assert!(risky.probability > loyal.probability);
    }

    #[test]
    fn test_single_class_training_predicts_that_class() {
        let (records, _) = training_set(30);
        let labels = vec![false; records.len()];
        let pipeline = ChurnPipeline::fit(
            &FeatureLayout::default(),
            &records,
            &labels,
            0.0,
            &SvmParams::default(),
        )
        .unwrap();

        assert_eq!(pipeline.n_support(), None);
        let prediction = pipeline
            .predict(&customer(0, "Month-to-month", "Fiber optic", 0))
            .unwrap();
        assert_eq!(prediction.label(), "No");
        assert_eq!(prediction.probability, 0.0);
    }

    #[test]
    fn test_unknown_category_does_not_predict() {
        let pipeline = fitted(60);
        let mut record = customer(3, "Month-to-month", "DSL", 0);
        record.internet_service = "Satellite".to_string();
        let result = pipeline.predict(&record);
        assert!(matches!(result, Err(ChurnError::UnknownCategory { .. })));
    }

    #[test]
    fn test_non_finite_charges_error_instead_of_scoring() {
        let pipeline = fitted(60);
        let mut record = customer(3, "Month-to-month", "DSL", 0);
        record.monthly_charges = f64::NAN;
        assert!(matches!(
            pipeline.predict(&record),
            Err(ChurnError::InvalidInput { .. })
        ));

        record.monthly_charges = 40.0;
        record.total_charges = f64::INFINITY;
        assert!(matches!(
            pipeline.predict_batch(&[customer(9, "One year", "DSL", 1), record]),
            Err(ChurnError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_save_and_load_preserve_predictions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline_model.bin");
        let pipeline = fitted(60);
        pipeline.save(&path).unwrap();

        let loaded = ChurnPipeline::load(&path).unwrap();
        assert_eq!(loaded.total_charges_fill(), 500.0);
        assert_eq!(loaded.transform(), pipeline.transform());

        let record = customer(10, "Month-to-month", "Fiber optic", 4);
        assert_eq!(
            loaded.predict(&record).unwrap(),
            pipeline.predict(&record).unwrap()
        );
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = ChurnPipeline::load(&dir.path().join("absent.bin"));
        assert!(matches!(missing, Err(ChurnError::ModelNotFound { .. })));

        let garbage = dir.path().join("garbage.bin");
        std::fs::write(&garbage, b"not a model").unwrap();
        let corrupt = ChurnPipeline::load(&garbage);
        assert!(matches!(corrupt, Err(ChurnError::ModelCorrupt { .. })));
    }
}
