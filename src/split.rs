//! Random train/test partitioning of a churn dataset
//!
//! The dataset splitter draws a fresh seed on every run, so two runs over the
//! same file agree on partition sizes but not on which rows land where. The
//! trainer reuses [`partition_indices`] with a fixed seed for its internal
//! validation split.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

use crate::data::{load_frame, persist_file, require_columns, temp_file_beside};
use crate::error::ChurnError;
use crate::schema::REQUIRED_COLUMNS;

/// Largest seed the splitter draws
pub const MAX_SEED: u64 = 10_000;

/// Row counts and seed of a completed split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub seed: u64,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Shuffle `0..n` with a seeded RNG and cut it into (train, test) index sets.
///
/// The test side receives `round(n * test_fraction)` indices, clamped to `n`.
pub fn partition_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len = ((n as f64) * test_fraction).round() as usize;
    let train = indices.split_off(test_len.min(n));

    tracing::debug!(
        "Partitioned {} rows: {} train, {} test (seed {})",
        n,
        train.len(),
        indices.len(),
        seed
    );
    (train, indices)
}

/// Split a dataset file into a training file and a test file
///
/// # Arguments
/// * `input` - Source CSV carrying all 21 dataset columns
/// * `train_path` - Destination for the training rows
/// * `test_path` - Destination for the test rows
/// * `test_fraction` - Share of rows assigned to the test file, in (0, 1)
///
/// # Returns
/// * `SplitSummary` with the seed and row counts; nothing is written on error
///
/// The test file is moved into place first. If the training file then fails
/// to persist, the new test file is removed again, so a failed run never
/// leaves one fresh output beside one stale one. A test file that existed
/// before the run is not restored in that case.
pub fn split_dataset(
    input: &Path,
    train_path: &Path,
    test_path: &Path,
    test_fraction: f64,
) -> crate::Result<SplitSummary> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ChurnError::InvalidFraction(test_fraction));
    }

    let df = load_frame(input)?;
    tracing::info!("Dataset loaded: {} rows from {}", df.height(), input.display());
    require_columns(&df, &REQUIRED_COLUMNS)?;

    let seed = rand::thread_rng().gen_range(0..=MAX_SEED);
    tracing::info!("Using random seed: {}", seed);

    let (train_idx, test_idx) = partition_indices(df.height(), test_fraction, seed);
    let mut train = take_rows(&df, &train_idx, train_path)?;
    let mut test = take_rows(&df, &test_idx, test_path)?;

    // Stage both files before either destination is touched
    let staged_train = stage_csv(&mut train, train_path)?;
    let staged_test = stage_csv(&mut test, test_path)?;
    persist_file(staged_test, test_path)?;
    if let Err(err) = persist_file(staged_train, train_path) {
        if let Err(cleanup) = fs::remove_file(test_path) {
            tracing::warn!("Could not remove {}: {}", test_path.display(), cleanup);
        }
        return Err(err);
    }

    tracing::info!("Training set saved to {}", train_path.display());
    tracing::info!("Testing set saved to {}", test_path.display());

    Ok(SplitSummary {
        seed,
        train_rows: train.height(),
        test_rows: test.height(),
    })
}

fn take_rows(df: &DataFrame, rows: &[usize], destination: &Path) -> crate::Result<DataFrame> {
    let indices: Vec<IdxSize> = rows.iter().map(|&row| row as IdxSize).collect();
    let indices = IdxCa::from_vec("row".into(), indices);
    df.take(&indices).map_err(|err| ChurnError::WriteFile {
        path: destination.to_path_buf(),
        reason: err.to_string(),
    })
}

fn stage_csv(df: &mut DataFrame, destination: &Path) -> crate::Result<NamedTempFile> {
    let mut file = temp_file_beside(destination)?;
    CsvWriter::new(file.as_file_mut())
        .include_header(true)
        .finish(df)
        .map_err(|err| ChurnError::WriteFile {
            path: destination.to_path_buf(),
            reason: err.to_string(),
        })?;
    Ok(file)
}
