//! churnforge: customer churn prediction CLI
//!
//! Entry point that wires the subcommands to the library: dataset splitting,
//! training, evaluation, the interactive prompt and the web form.

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use churnforge::{
    collect_record, evaluate_model, split_dataset, train_model, web, Args, ChurnPipeline, Command,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.command.train_config();

    match args.command {
        Command::Split {
            input,
            train_file,
            test_file,
            test_size,
        } => {
            let summary = split_dataset(&input, &train_file, &test_file, test_size)?;
            println!("Using random seed: {}", summary.seed);
            println!(
                "Training set saved to {} ({} rows)",
                train_file.display(),
                summary.train_rows
            );
            println!(
                "Test set saved to {} ({} rows)",
                test_file.display(),
                summary.test_rows
            );
        }
        Command::Train {
            train_file, model, ..
        } => {
            let config = config.unwrap_or_default();
            tracing::debug!("Training configuration: {:?}", config);

            let start_time = Instant::now();
            let summary = train_model(&train_file, &model, &config)?;
            tracing::info!("Training finished in {:.2}s", start_time.elapsed().as_secs_f64());

            println!(
                "Trained on {} rows, validated on {} rows",
                summary.train_rows, summary.validation_rows
            );
            summary.report.print_summary();
            println!("Model saved to {}", model.display());
        }
        Command::Evaluate { test_file, model } => {
            let report = evaluate_model(&test_file, &model)?;
            println!(
                "Evaluated {} rows from {}",
                report.confusion_matrix.total(),
                test_file.display()
            );
            report.print_summary();
        }
        Command::Predict { model } => run_prediction(&model)?,
        Command::Serve { addr, model } => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime.block_on(web::serve(addr, model))?;
        }
    }

    Ok(())
}

/// Collect one customer record from the terminal, then score it
fn run_prediction(model: &Path) -> Result<()> {
    println!("Welcome to the Customer Churn Prediction Tool");
    println!("Please answer the following questions:");

    let stdin = io::stdin();
    let record = collect_record(&mut stdin.lock(), &mut io::stdout())?;

    let pipeline = ChurnPipeline::load(model)?;
    let prediction = pipeline.predict(&record)?;

    println!("\nPrediction: The customer will churn: {}", prediction.label());
    println!("Probability of churn: {:.4}", prediction.probability);
    Ok(())
}
