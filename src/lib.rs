//! appmetrics: synthetic mobile-app engagement data with DAU, retention
//! and churn analytics
//!
//! The generator simulates a user base, their daily sessions, cohort
//! retention and realistic data-quality noise. Every draw derives from a
//! single seed, so a configuration always produces the same table.

pub mod activity;
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod distribution;
pub mod error;
pub mod metrics;
pub mod model;
pub mod noise;
pub mod pipeline;
pub mod population;
pub mod records;
pub mod retention;
pub mod rng;
pub mod session;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ConfigFile, GeneratorConfig};
pub use data::{compute_churn_features, load_dataset, records_to_dataframe, write_csv, FeatureTable};
pub use error::{ChurnError, GeneratorError};
pub use metrics::{summarize, MetricsSummary};
pub use model::{predict_churn, ChurnClassifier, ChurnPrediction, LogisticChurnModel};
pub use pipeline::{generate_dataset, Dataset};
pub use records::{DailyUserRecord, SessionRecord};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
