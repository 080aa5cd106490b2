//! appmetrics: synthetic mobile-app engagement data and analytics CLI
//!
//! Entry point that dispatches generation, reporting and churn scoring.

use anyhow::Result;
use appmetrics::cli::{Command, GenerateArgs};
use appmetrics::data::{churn_labels, predictions_to_dataframe};
use appmetrics::metrics::{daily_trend, summarize_predictions};
use appmetrics::{
    compute_churn_features, generate_dataset, load_dataset, predict_churn, records_to_dataframe,
    summarize, viz, write_csv, Args, LogisticChurnModel,
};
use chrono::Local;
use clap::Parser;
use polars::prelude::DataFrame;
use std::time::Instant;
use tracing::debug;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &args.command {
        Command::Generate(generate) => run_generate(generate),
        Command::Report { input, plot } => run_report(input, plot.as_deref()),
        Command::Churn {
            input,
            train,
            inactive_days,
            max_iters,
            output,
        } => run_churn(
            input,
            train.as_deref(),
            *inactive_days,
            *max_iters,
            output.as_deref(),
        ),
    }
}

/// Generate a dataset, persist it and print its summary
fn run_generate(args: &GenerateArgs) -> Result<()> {
    println!("=== Generating Mobile Analytics Data ===\n");
    let start_time = Instant::now();

    let config = args.config_file()?.resolve(Local::now().date_naive())?;
    println!(
        "Users: {}, days: {}, seed: {}, reference date: {}",
        config.users, config.days, config.seed, config.reference_date
    );

    let gen_start = Instant::now();
    let dataset = generate_dataset(&config)?;
    println!(
        "✓ Generated {} records for {} users",
        dataset.records.len(),
        dataset.users.len()
    );
    println!(
        "  Missing channels: {}, outliers: {}",
        dataset.noise.missing, dataset.noise.outliers
    );
    debug!(
        elapsed = gen_start.elapsed().as_secs_f64(),
        backfilled = dataset.backfilled,
        "generation finished"
    );

    let mut df = records_to_dataframe(&dataset.records)?;
    write_csv(&mut df, &args.output)?;
    println!("✓ Data saved to: {}", args.output);

    report(&df, args.plot.as_deref())?;

    println!("\n=== Generation Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_report(input: &str, plot: Option<&str>) -> Result<()> {
    println!("=== Engagement Report ===");
    let df = load_dataset(input)?;
    println!("✓ Data loaded: {} rows from {}", df.height(), input);
    report(&df, plot)
}

fn report(df: &DataFrame, plot: Option<&str>) -> Result<()> {
    let summary = summarize(df)?;
    viz::print_summary(&summary);

    if let Some(path) = plot {
        let trend = daily_trend(df)?;
        viz::create_trend_chart(&trend, path, None)?;
    }
    Ok(())
}

/// Fit the churn classifier and score every user of `input`
fn run_churn(
    input: &str,
    train: Option<&str>,
    inactive_days: u32,
    max_iters: u64,
    output: Option<&str>,
) -> Result<()> {
    println!("=== Churn Prediction ===\n");
    let start_time = Instant::now();

    let df = load_dataset(input)?;
    let train_df = match train {
        Some(path) => load_dataset(path)?,
        None => df.clone(),
    };

    let train_table = compute_churn_features(&train_df)?;
    let labels = churn_labels(&train_df, &train_table.user_ids, inactive_days)?;
    let churned = labels.iter().filter(|&&l| l).count();
    println!(
        "✓ Training data: {} users, {} features, {} labelled churned",
        train_table.n_users(),
        train_table.feature_names.len(),
        churned
    );

    let model_start = Instant::now();
    let model = LogisticChurnModel::fit(&train_table, &labels, max_iters)?;
    println!(
        "✓ Model fitted in {:.2}s",
        model_start.elapsed().as_secs_f64()
    );

    let table = compute_churn_features(&df)?;
    let predictions = predict_churn(&model, &table)?;

    let summary = summarize_predictions(&predictions, &df)?;
    viz::print_churn_summary(&summary);

    if let Some(path) = output {
        let mut out = predictions_to_dataframe(&predictions)?;
        write_csv(&mut out, path)?;
        println!("✓ Predictions saved to: {}", path);
    }

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
