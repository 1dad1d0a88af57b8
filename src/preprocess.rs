//! Feature preprocessing: standardization of numeric columns and one-hot
//! encoding of categorical columns.
//!
//! A [`FeatureLayout`] declares which columns receive which transform. Fitting
//! it on training records yields a [`FittedTransform`], which from then on only
//! transforms: its statistics and vocabularies never change.

use std::collections::BTreeSet;

use ndarray::{s, Array1, Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ChurnError;
use crate::schema::{CustomerRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

/// What the encoder does with a category it never saw during fitting
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum UnknownCategory {
    /// Fail the whole transform, naming the column and value
    #[default]
    Reject,
    /// Encode the column as an all-zero indicator block
    Ignore,
}

/// Per-column centering and scaling learned from a reference matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl StandardScaler {
    /// Learn column means and population standard deviations.
    ///
    /// Columns with zero deviation are scaled by 1 so they map to 0.
    pub fn fit(columns: Vec<String>, values: &Array2<f64>) -> crate::Result<Self> {
        let means = values
            .mean_axis(Axis(0))
            .ok_or(ChurnError::NotEnoughRows {
                purpose: "fit the scaler",
                rows: 0,
            })?;
        let scales = values
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > 0.0 && std.is_finite() { std } else { 1.0 });

        Ok(Self {
            columns,
            means,
            scales,
        })
    }

    /// Apply the learned statistics to new rows
    pub fn transform(&self, values: &Array2<f64>) -> Array2<f64> {
        (values - &self.means) / &self.scales
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn scales(&self) -> &Array1<f64> {
        &self.scales
    }
}

/// Indicator encoding over per-column vocabularies learned from training records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    /// Sorted distinct values per column
    categories: Vec<Vec<String>>,
    unknown: UnknownCategory,
}

impl OneHotEncoder {
    /// Collect the distinct values of each column
    pub fn fit(
        columns: Vec<String>,
        records: &[CustomerRecord],
        unknown: UnknownCategory,
    ) -> crate::Result<Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for column in &columns {
            let mut seen = BTreeSet::new();
            for record in records {
                seen.insert(categorical_value(record, column)?.into_owned());
            }
            categories.push(seen.into_iter().collect());
        }

        Ok(Self {
            columns,
            categories,
            unknown,
        })
    }

    /// Width of the encoded block
    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|idx| self.categories[idx].as_slice())
    }

    pub fn unknown_policy(&self) -> UnknownCategory {
        self.unknown
    }

    /// Write one record's indicators into `out`, which must be zeroed and
    /// `n_outputs()` wide
    pub fn encode_into(
        &self,
        record: &CustomerRecord,
        mut out: ArrayViewMut1<'_, f64>,
    ) -> crate::Result<()> {
        let mut offset = 0;
        for (column, categories) in self.columns.iter().zip(&self.categories) {
            let value = categorical_value(record, column)?;
            match categories.binary_search_by(|known| known.as_str().cmp(&*value)) {
                Ok(position) => out[offset + position] = 1.0,
                Err(_) => match self.unknown {
                    UnknownCategory::Reject => {
                        return Err(ChurnError::UnknownCategory {
                            column: column.clone(),
                            value: value.into_owned(),
                        })
                    }
                    UnknownCategory::Ignore => {
                        tracing::debug!("Unseen {} value {:?} encoded as zeros", column, value)
                    }
                },
            }
            offset += categories.len();
        }
        Ok(())
    }

    fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        self.columns
            .iter()
            .zip(&self.categories)
            .flat_map(|(column, categories)| {
                categories
                    .iter()
                    .map(move |category| format!("{column}={category}"))
            })
    }
}

/// Declares the numeric/categorical partition of the modeling columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayout {
    numeric: Vec<String>,
    categorical: Vec<String>,
    unknown: UnknownCategory,
}

impl Default for FeatureLayout {
    /// The churn dataset partition: three numeric columns, sixteen categorical
    fn default() -> Self {
        Self::new(&NUMERIC_FEATURES, &CATEGORICAL_FEATURES)
    }
}

impl FeatureLayout {
    pub fn new(numeric: &[&str], categorical: &[&str]) -> Self {
        Self {
            numeric: numeric.iter().map(|name| name.to_string()).collect(),
            categorical: categorical.iter().map(|name| name.to_string()).collect(),
            unknown: UnknownCategory::default(),
        }
    }

    /// Set the policy for categories unseen at fit time
    pub fn unknown_categories(mut self, policy: UnknownCategory) -> Self {
        self.unknown = policy;
        self
    }

    pub fn numeric(&self) -> &[String] {
        &self.numeric
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    /// Learn scaling statistics and vocabularies from `records`
    pub fn fit(&self, records: &[CustomerRecord]) -> crate::Result<FittedTransform> {
        if records.is_empty() {
            return Err(ChurnError::NotEnoughRows {
                purpose: "fit the feature transform",
                rows: 0,
            });
        }

        let numeric = numeric_matrix(records, &self.numeric)?;
        let scaler = StandardScaler::fit(self.numeric.clone(), &numeric)?;
        let encoder = OneHotEncoder::fit(self.categorical.clone(), records, self.unknown)?;

        tracing::debug!(
            "Feature transform fitted: {} numeric + {} indicator columns",
            self.numeric.len(),
            encoder.n_outputs()
        );
        Ok(FittedTransform { scaler, encoder })
    }
}

/// Scaler and encoder frozen after fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl FittedTransform {
    /// Encode records into a feature matrix: the scaled numeric block first,
    /// then one indicator block per categorical column
    pub fn transform(&self, records: &[CustomerRecord]) -> crate::Result<Array2<f64>> {
        let n_numeric = self.scaler.columns().len();
        let mut features = Array2::zeros((records.len(), self.n_features()));

        let numeric = numeric_matrix(records, self.scaler.columns())?;
        features
            .slice_mut(s![.., ..n_numeric])
            .assign(&self.scaler.transform(&numeric));

        for (record, mut row) in records.iter().zip(features.outer_iter_mut()) {
            self.encoder
                .encode_into(record, row.slice_mut(s![n_numeric..]))?;
        }
        Ok(features)
    }

    pub fn n_features(&self) -> usize {
        self.scaler.columns().len() + self.encoder.n_outputs()
    }

    /// Output column names, e.g. `tenure` or `Contract=One year`
    pub fn feature_names(&self) -> Vec<String> {
        self.scaler
            .columns()
            .iter()
            .cloned()
            .chain(self.encoder.feature_names())
            .collect()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

fn numeric_matrix(records: &[CustomerRecord], columns: &[String]) -> crate::Result<Array2<f64>> {
    let mut values = Array2::zeros((records.len(), columns.len()));
    for (record, mut row) in records.iter().zip(values.outer_iter_mut()) {
        for (slot, column) in row.iter_mut().zip(columns) {
            let value = record
                .numeric(column)
                .ok_or_else(|| missing_column(column))?;
            if !value.is_finite() {
                return Err(ChurnError::InvalidInput {
                    field: column.clone(),
                    value: value.to_string(),
                    expected: "finite number",
                });
            }
            *slot = value;
        }
    }
    Ok(values)
}

fn categorical_value<'a>(
    record: &'a CustomerRecord,
    column: &str,
) -> crate::Result<std::borrow::Cow<'a, str>> {
    record
        .categorical(column)
        .ok_or_else(|| missing_column(column))
}

fn missing_column(column: &str) -> ChurnError {
    ChurnError::MissingColumns {
        missing: vec![column.to_string()],
    }
}
