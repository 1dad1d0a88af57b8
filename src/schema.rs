//! Column layout of the customer churn dataset and the typed record used for inference

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::ChurnError;

/// Identifier column, never used as a feature
pub const ID_COLUMN: &str = "customerID";

/// Label column, present in training data only
pub const LABEL_COLUMN: &str = "Churn";

/// Columns standardized by the feature pipeline
pub const NUMERIC_FEATURES: [&str; 3] = ["tenure", "MonthlyCharges", "TotalCharges"];

/// Columns one-hot encoded by the feature pipeline
pub const CATEGORICAL_FEATURES: [&str; 16] = [
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
];

/// Every column a dataset file must carry, in file order
pub const REQUIRED_COLUMNS: [&str; 21] = [
    ID_COLUMN,
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "tenure",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
    "MonthlyCharges",
    "TotalCharges",
    LABEL_COLUMN,
];

const YES_NO: &[&str] = &["Yes", "No"];
const INTERNET_ADDON: &[&str] = &["Yes", "No", "No internet service"];

/// Known spellings for a categorical column, as offered by the front ends.
///
/// The fitted encoder learns its own vocabulary from training data; this list
/// only drives form controls and prompt hints.
pub fn vocabulary(column: &str) -> Option<&'static [&'static str]> {
    let values: &'static [&'static str] = match column {
        "gender" => &["Male", "Female"],
        "SeniorCitizen" => &["0", "1"],
        "Partner" | "Dependents" | "PhoneService" | "PaperlessBilling" => YES_NO,
        "MultipleLines" => &["Yes", "No", "No phone service"],
        "InternetService" => &["DSL", "Fiber optic", "No"],
        "OnlineSecurity" | "OnlineBackup" | "DeviceProtection" | "TechSupport"
        | "StreamingTV" | "StreamingMovies" => INTERNET_ADDON,
        "Contract" => &["Month-to-month", "One year", "Two year"],
        "PaymentMethod" => &[
            "Electronic check",
            "Mailed check",
            "Bank transfer (automatic)",
            "Credit card (automatic)",
        ],
        _ => return None,
    };
    Some(values)
}

/// The 19 modeling fields of one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: i64,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    pub tenure: u32,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl CustomerRecord {
    /// Value of a numeric column, looked up by its dataset name
    pub fn numeric(&self, column: &str) -> Option<f64> {
        match column {
            "tenure" => Some(f64::from(self.tenure)),
            "MonthlyCharges" => Some(self.monthly_charges),
            "TotalCharges" => Some(self.total_charges),
            _ => None,
        }
    }

    /// Value of a categorical column, looked up by its dataset name.
    ///
    /// `SeniorCitizen` is stored as an integer and encoded by its decimal text,
    /// which matches how it reads from a CSV file.
    pub fn categorical(&self, column: &str) -> Option<Cow<'_, str>> {
        let value = match column {
            "gender" => &self.gender,
            "SeniorCitizen" => return Some(Cow::Owned(self.senior_citizen.to_string())),
            "Partner" => &self.partner,
            "Dependents" => &self.dependents,
            "PhoneService" => &self.phone_service,
            "MultipleLines" => &self.multiple_lines,
            "InternetService" => &self.internet_service,
            "OnlineSecurity" => &self.online_security,
            "OnlineBackup" => &self.online_backup,
            "DeviceProtection" => &self.device_protection,
            "TechSupport" => &self.tech_support,
            "StreamingTV" => &self.streaming_tv,
            "StreamingMovies" => &self.streaming_movies,
            "Contract" => &self.contract,
            "PaperlessBilling" => &self.paperless_billing,
            "PaymentMethod" => &self.payment_method,
            _ => return None,
        };
        Some(Cow::Borrowed(value.as_str()))
    }

    /// Check that every numeric feature is a finite number
    pub fn validate(&self) -> crate::Result<()> {
        for column in NUMERIC_FEATURES {
            if let Some(value) = self.numeric(column) {
                if !value.is_finite() {
                    return Err(ChurnError::InvalidInput {
                        field: column.to_string(),
                        value: value.to_string(),
                        expected: "finite number",
                    });
                }
            }
        }
        Ok(())
    }

    /// Mutable handle to a string-valued categorical column
    pub(crate) fn categorical_mut(&mut self, column: &str) -> Option<&mut String> {
        let slot = match column {
            "gender" => &mut self.gender,
            "Partner" => &mut self.partner,
            "Dependents" => &mut self.dependents,
            "PhoneService" => &mut self.phone_service,
            "MultipleLines" => &mut self.multiple_lines,
            "InternetService" => &mut self.internet_service,
            "OnlineSecurity" => &mut self.online_security,
            "OnlineBackup" => &mut self.online_backup,
            "DeviceProtection" => &mut self.device_protection,
            "TechSupport" => &mut self.tech_support,
            "StreamingTV" => &mut self.streaming_tv,
            "StreamingMovies" => &mut self.streaming_movies,
            "Contract" => &mut self.contract,
            "PaperlessBilling" => &mut self.paperless_billing,
            "PaymentMethod" => &mut self.payment_method,
            _ => return None,
        };
        Some(slot)
    }
}

/// A record with every field blank or zero, filled in column by column
impl Default for CustomerRecord {
    fn default() -> Self {
        Self {
            gender: String::new(),
            senior_citizen: 0,
            partner: String::new(),
            dependents: String::new(),
            tenure: 0,
            phone_service: String::new(),
            multiple_lines: String::new(),
            internet_service: String::new(),
            online_security: String::new(),
            online_backup: String::new(),
            device_protection: String::new(),
            tech_support: String::new(),
            streaming_tv: String::new(),
            streaming_movies: String::new(),
            contract: String::new(),
            paperless_billing: String::new(),
            payment_method: String::new(),
            monthly_charges: 0.0,
            total_charges: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_partition_covers_required_columns() {
        let mut features: Vec<&str> = NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .copied()
            .collect();
        features.push(ID_COLUMN);
        features.push(LABEL_COLUMN);
        features.sort_unstable();

        let mut required = REQUIRED_COLUMNS.to_vec();
        required.sort_unstable();
        assert_eq!(features, required);
    }

    #[test]
    fn test_every_categorical_column_has_vocabulary() {
        for column in CATEGORICAL_FEATURES {
            assert!(vocabulary(column).is_some(), "{column} has no vocabulary");
        }
        assert!(vocabulary("tenure").is_none());
    }

    #[test]
    fn test_lookup_by_column_name() {
        let mut record = CustomerRecord {
            senior_citizen: 1,
            tenure: 18,
            monthly_charges: 50.3,
            ..CustomerRecord::default()
        };
        *record.categorical_mut("Contract").unwrap() = "One year".to_string();

        assert_eq!(record.numeric("tenure"), Some(18.0));
        assert_eq!(record.numeric("MonthlyCharges"), Some(50.3));
        assert_eq!(record.numeric("gender"), None);
        assert_eq!(record.categorical("SeniorCitizen").as_deref(), Some("1"));
        assert_eq!(record.categorical("Contract").as_deref(), Some("One year"));
        assert_eq!(record.categorical("customerID"), None);
        assert!(record.categorical_mut("SeniorCitizen").is_none());
    }

    #[test]
    fn test_validate_rejects_non_finite_charges() {
        let record = CustomerRecord {
            monthly_charges: 50.0,
            total_charges: 500.0,
            ..CustomerRecord::default()
        };
        assert!(record.validate().is_ok());

        let nan = CustomerRecord {
            monthly_charges: f64::NAN,
            ..record.clone()
        };
        assert!(matches!(
            nan.validate(),
            Err(ChurnError::InvalidInput { ref field, .. }) if field == "MonthlyCharges"
        ));

        let infinite = CustomerRecord {
            total_charges: f64::INFINITY,
            ..record
        };
        assert!(matches!(
            infinite.validate(),
            Err(ChurnError::InvalidInput { ref field, .. }) if field == "TotalCharges"
        ));
    }
}
