//! Dataset loading and cleaning using Polars

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use polars::prelude::*;
use tempfile::NamedTempFile;

use crate::error::ChurnError;
use crate::schema::{
    CustomerRecord, CATEGORICAL_FEATURES, LABEL_COLUMN, NUMERIC_FEATURES, REQUIRED_COLUMNS,
};

/// Cleaned feature records with their churn labels
#[derive(Debug, Clone)]
pub struct LabeledData {
    /// One record per data row, in file order
    pub records: Vec<CustomerRecord>,
    /// `true` where the row's `Churn` column reads `Yes`
    pub labels: Vec<bool>,
    /// Value substituted for missing or non-numeric `TotalCharges` cells
    pub total_charges_fill: f64,
    /// How many `TotalCharges` cells were filled in
    pub imputed: usize,
}

impl LabeledData {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows labeled as churned
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&churn| churn).count()
    }
}

/// Read a CSV file with every column kept as text.
///
/// Missing files, empty files and unparseable files are reported as distinct
/// errors carrying the path. A file with a header but no rows counts as empty.
pub fn load_frame(path: &Path) -> crate::Result<DataFrame> {
    let metadata = fs::metadata(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ChurnError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ChurnError::Io(err),
    })?;
    if metadata.len() == 0 {
        return Err(ChurnError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    // A schema inference length of zero reads every column as String
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| match source {
            PolarsError::NoData(_) => ChurnError::EmptyFile {
                path: path.to_path_buf(),
            },
            source => ChurnError::ParseFile {
                path: path.to_path_buf(),
                source,
            },
        })?;

    if df.height() == 0 {
        return Err(ChurnError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Fail with every absent column name if `df` lacks any of `columns`
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> crate::Result<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|name| df.column(name).is_err())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ChurnError::MissingColumns { missing })
    }
}

/// Load a labeled training file, imputing `TotalCharges` with its own median
///
/// # Arguments
/// * `path` - CSV file carrying all 21 dataset columns
///
/// # Returns
/// * `LabeledData` whose `total_charges_fill` is the median of the parsed values
pub fn load_training_data(path: &Path) -> crate::Result<LabeledData> {
    let df = load_frame(path)?;
    require_columns(&df, &REQUIRED_COLUMNS)?;

    let total_charges = coerce_numeric(&df, "TotalCharges")?;
    let observed: Vec<f64> = total_charges.iter().flatten().copied().collect();
    let fill = median(&observed).ok_or_else(|| ChurnError::NoNumericValues {
        column: "TotalCharges".to_string(),
    })?;

    let data = labeled_from_frame(&df, &total_charges, fill)?;
    tracing::info!(
        "Training data: {} rows, {} churned, {} TotalCharges imputed with median {:.2}",
        data.len(),
        data.positives(),
        data.imputed,
        fill
    );
    Ok(data)
}

/// Load a labeled file for scoring, imputing `TotalCharges` with a known value
/// (normally the median learned at training time)
pub fn load_labeled_data(path: &Path, total_charges_fill: f64) -> crate::Result<LabeledData> {
    let df = load_frame(path)?;
    require_columns(&df, &REQUIRED_COLUMNS)?;

    let total_charges = coerce_numeric(&df, "TotalCharges")?;
    labeled_from_frame(&df, &total_charges, total_charges_fill)
}

fn labeled_from_frame(
    df: &DataFrame,
    total_charges: &[Option<f64>],
    fill: f64,
) -> crate::Result<LabeledData> {
    let imputed = total_charges.iter().filter(|value| value.is_none()).count();
    let filled: Vec<f64> = total_charges
        .iter()
        .map(|value| value.unwrap_or(fill))
        .collect();

    Ok(LabeledData {
        records: records_from_frame(df, &filled)?,
        labels: labels_from_frame(df)?,
        total_charges_fill: fill,
        imputed,
    })
}

/// Convert a column to numbers; blank or non-numeric cells become `None`
pub fn coerce_numeric(df: &DataFrame, column: &str) -> crate::Result<Vec<Option<f64>>> {
    let values = string_column(df, column)?;
    Ok(values
        .into_iter()
        .map(|cell| {
            cell.and_then(|text| text.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
        })
        .collect())
}

/// Median of a slice, averaging the two middle values for even lengths
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Build one `CustomerRecord` per row.
///
/// `total_charges` supplies the already coerced and imputed `TotalCharges`
/// values; every other feature column is parsed from its text.
pub fn records_from_frame(
    df: &DataFrame,
    total_charges: &[f64],
) -> crate::Result<Vec<CustomerRecord>> {
    let senior = string_column(df, "SeniorCitizen")?;
    let tenure = string_column(df, NUMERIC_FEATURES[0])?;
    let monthly = string_column(df, NUMERIC_FEATURES[1])?;
    let categorical = CATEGORICAL_FEATURES
        .iter()
        .filter(|&&name| name != "SeniorCitizen")
        .map(|&name| Ok((name, string_column(df, name)?)))
        .collect::<crate::Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut record = CustomerRecord {
            senior_citizen: parse_cell("SeniorCitizen", row, senior.get(row))?,
            tenure: parse_cell("tenure", row, tenure.get(row))?,
            monthly_charges: parse_real("MonthlyCharges", row, monthly.get(row))?,
            total_charges: total_charges.get(row).copied().unwrap_or_default(),
            ..CustomerRecord::default()
        };

        for (name, values) in &categorical {
            let value = values.get(row).ok_or_else(|| invalid_value(name, row, ""))?;
            if let Some(slot) = record.categorical_mut(name) {
                *slot = value.to_string();
            }
        }
        records.push(record);
    }

    Ok(records)
}

/// Map the `Churn` column to booleans: `Yes` is churn, anything else is not
pub fn labels_from_frame(df: &DataFrame) -> crate::Result<Vec<bool>> {
    let churn = string_column(df, LABEL_COLUMN)?;
    Ok(churn
        .into_iter()
        .map(|cell| cell.map(str::trim) == Some("Yes"))
        .collect())
}

/// Temp file in the destination's directory, so persisting it is a rename
pub(crate) fn temp_file_beside(path: &Path) -> crate::Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(NamedTempFile::new_in(dir)?)
}

/// Move a finished temp file over `path`
pub(crate) fn persist_file(file: NamedTempFile, path: &Path) -> crate::Result<()> {
    file.persist(path).map_err(|err| ChurnError::WriteFile {
        path: path.to_path_buf(),
        reason: err.error.to_string(),
    })?;
    Ok(())
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> crate::Result<&'a StringChunked> {
    df.column(name)
        .and_then(|column| column.str())
        .map_err(|_| ChurnError::MissingColumns {
            missing: vec![name.to_string()],
        })
}

fn parse_cell<T: FromStr>(column: &str, row: usize, cell: Option<&str>) -> crate::Result<T> {
    let text = cell.unwrap_or_default();
    text.trim()
        .parse()
        .map_err(|_| invalid_value(column, row, text))
}

/// Like [`parse_cell`] for real-valued columns; `NaN` and infinities are invalid
fn parse_real(column: &str, row: usize, cell: Option<&str>) -> crate::Result<f64> {
    let value: f64 = parse_cell(column, row, cell)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid_value(column, row, cell.unwrap_or_default()))
    }
}

/// Rows are reported 1-based, counting data rows after the header
fn invalid_value(column: &str, row: usize, value: &str) -> ChurnError {
    ChurnError::InvalidValue {
        column: column.to_string(),
        row: row + 1,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", REQUIRED_COLUMNS.join(",")).unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    const ROWS: [&str; 4] = [
        "7590-VHVEG,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No",
        "5575-GNVDE,Male,0,No,No,34,Yes,No,DSL,Yes,No,Yes,No,No,No,One year,No,Mailed check,56.95,1889.5,No",
        "3668-QPYBK,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,Yes",
        "4472-LVYGI,Female,0,Yes,Yes,0,No,No phone service,DSL,Yes,No,Yes,Yes,Yes,No,Two year,Yes,Bank transfer (automatic),52.55, ,No",
    ];

    #[test]
    fn test_load_training_data() {
        let file = create_test_csv(&ROWS);
        let data = load_training_data(file.path()).unwrap();

        assert_eq!(data.len(), 4);
        assert_eq!(data.labels, vec![false, false, true, false]);
        assert_eq!(data.records[1].tenure, 34);
        assert_eq!(data.records[2].contract, "Month-to-month");
        assert_eq!(data.records[3].payment_method, "Bank transfer (automatic)");
    }

    #[test]
    fn test_blank_total_charges_imputed_with_median() {
        let file = create_test_csv(&ROWS);
        let data = load_training_data(file.path()).unwrap();

        // median of 29.85, 1889.5 and 108.15
        assert_eq!(data.imputed, 1);
        assert!((data.total_charges_fill - 108.15).abs() < 1e-9);
        assert!((data.records[3].total_charges - 108.15).abs() < 1e-9);
        assert!((data.records[1].total_charges - 1889.5).abs() < 1e-9);
    }

    #[test]
    fn test_na_total_charges_is_not_zero_filled() {
        let rows = [
            ROWS[0],
            ROWS[1],
            "9999-NAROW,Male,1,No,No,5,Yes,Yes,Fiber optic,No,No,No,No,Yes,Yes,Month-to-month,Yes,Electronic check,99.65,NA,Yes",
        ];
        let file = create_test_csv(&rows);
        let data = load_training_data(file.path()).unwrap();

        let expected = (29.85 + 1889.5) / 2.0;
        assert!((data.records[2].total_charges - expected).abs() < 1e-9);
        assert_eq!(data.records[2].senior_citizen, 1);
    }

    #[test]
    fn test_missing_file_and_empty_file() {
        let result = load_frame(Path::new("definitely/not/here.csv"));
        assert!(matches!(result, Err(ChurnError::FileNotFound { .. })));

        let empty = NamedTempFile::new().unwrap();
        let result = load_frame(empty.path());
        assert!(matches!(result, Err(ChurnError::EmptyFile { .. })));

        let header_only = create_test_csv(&[]);
        let result = load_frame(header_only.path());
        assert!(matches!(result, Err(ChurnError::EmptyFile { .. })));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customerID,gender,tenure").unwrap();
        writeln!(file, "0001,Male,3").unwrap();

        let result = load_training_data(file.path());
        match result {
            Err(ChurnError::MissingColumns { missing }) => {
                assert!(missing.contains(&"Churn".to_string()));
                assert!(missing.contains(&"TotalCharges".to_string()));
                assert!(!missing.contains(&"tenure".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_tenure_is_rejected_with_row() {
        let rows = [
            "0001,Female,0,Yes,No,many,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No",
        ];
        let file = create_test_csv(&rows);
        let result = load_training_data(file.path());
        match result {
            Err(ChurnError::InvalidValue { column, row, value }) => {
                assert_eq!(column, "tenure");
                assert_eq!(row, 1);
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_monthly_charges_rejected() {
        for bad in ["NaN", "inf", "-inf"] {
            let row = format!(
                "0001,Female,0,Yes,No,3,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,{bad},29.85,No"
            );
            let file = create_test_csv(&[ROWS[0], &row]);
            match load_training_data(file.path()) {
                Err(ChurnError::InvalidValue { column, row, value }) => {
                    assert_eq!(column, "MonthlyCharges");
                    assert_eq!(row, 2);
                    assert_eq!(value, bad);
                }
                other => panic!("expected InvalidValue for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_ragged_file_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "customerID,gender,tenure").unwrap();
        writeln!(file, "0001,Male,3").unwrap();
        writeln!(file, "0002,Female,5,extra,fields").unwrap();

        let result = load_frame(file.path());
        match result {
            Err(ChurnError::ParseFile { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected ParseFile, got {other:?}"),
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
