//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::ConfigFile;

/// Synthetic mobile-app engagement data with DAU, retention and churn analytics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (debug-level logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Generate a synthetic engagement table and write it as CSV
    Generate(GenerateArgs),

    /// Summarize engagement and retention of an existing table
    Report {
        /// Path to the input CSV file
        #[arg(short, long)]
        input: String,

        /// Write a DAU/retention trend chart (SVG)
        #[arg(short, long)]
        plot: Option<String>,
    },

    /// Score every user of a table with a churn classifier
    Churn {
        /// Table to score
        #[arg(short, long)]
        input: String,

        /// Table to fit the classifier on (defaults to the input)
        #[arg(short, long)]
        train: Option<String>,

        /// Users unseen for this many trailing days count as churned
        #[arg(long, default_value = "7")]
        inactive_days: u32,

        /// Maximum iterations for the logistic regression solver
        #[arg(long, default_value = "200")]
        max_iters: u64,

        /// Write per-user predictions as CSV
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct GenerateArgs {
    /// Number of users to simulate
    #[arg(short, long)]
    pub users: Option<usize>,

    /// Number of days of activity ending at the reference date
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Seed for every random draw
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Last simulated day, YYYY-MM-DD (defaults to today)
    #[arg(short, long)]
    pub reference_date: Option<NaiveDate>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output path for the generated CSV
    #[arg(short, long, default_value = "mobile_analytics.csv")]
    pub output: String,

    /// Write a DAU/retention trend chart (SVG)
    #[arg(short, long)]
    pub plot: Option<String>,
}

impl GenerateArgs {
    /// Load the configuration file (if any) and lay command-line values over it.
    pub fn config_file(&self) -> crate::Result<ConfigFile> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::load_from_path(path)?,
            None => ConfigFile::default(),
        };
        if self.users.is_some() {
            file.users = self.users;
        }
        if self.days.is_some() {
            file.days = self.days;
        }
        if self.seed.is_some() {
            file.seed = self.seed;
        }
        if self.reference_date.is_some() {
            file.reference_date = self.reference_date;
        }
        Ok(file)
    }
}
