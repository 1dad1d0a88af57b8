//! Binary classification metrics for the positive (churn) class

use serde::{Deserialize, Serialize};

/// Confusion matrix for churn predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Churners predicted to churn
    pub tp: usize,
    /// Stayers predicted to stay
    pub tn: usize,
    /// Stayers predicted to churn
    pub fp: usize,
    /// Churners predicted to stay
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against actual labels, pairwise
    pub fn from_predictions(actual: &[bool], predicted: &[bool]) -> Self {
        let mut cm = Self::default();
        for (&actual, &predicted) in actual.iter().zip(predicted) {
            cm.record(actual, predicted);
        }
        cm
    }

    pub fn record(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }
}

/// Accuracy, recall, precision and F1 of one evaluation run.
///
/// A metric whose denominator is zero is reported as 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl EvaluationReport {
    pub fn from_confusion_matrix(cm: ConfusionMatrix) -> Self {
        let accuracy = ratio(cm.tp + cm.tn, cm.total());
        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy,
            recall,
            precision,
            f1,
            confusion_matrix: cm,
        }
    }

    pub fn from_predictions(actual: &[bool], predicted: &[bool]) -> Self {
        Self::from_confusion_matrix(ConfusionMatrix::from_predictions(actual, predicted))
    }

    /// Print the four metrics, one per line, with four decimals
    pub fn print_summary(&self) {
        println!("Accuracy: {:.4}", self.accuracy);
        println!("Recall: {:.4}", self.recall);
        println!("Precision: {:.4}", self.precision);
        println!("F1 Score: {:.4}", self.f1);
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
