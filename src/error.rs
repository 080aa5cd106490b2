//! Error types for the generator and the churn-inference layer

use thiserror::Error;

/// Failures raised while validating or running the synthetic data generator.
///
/// Every variant is produced before the first random draw of a run, so a
/// failed run never leaves partial output behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("population size must be positive (got {0})")]
    InvalidPopulation(usize),

    #[error("simulation window must span at least one day (got {0})")]
    InvalidDays(u32),

    #[error("invalid date bounds: {0}")]
    InvalidDateBounds(String),

    #[error("distribution '{name}' must sum to 1.0 (got {sum:.6})")]
    Distribution { name: String, sum: f64 },

    #[error("distribution '{name}' has an invalid weight {weight} for '{category}'")]
    InvalidWeight {
        name: String,
        category: String,
        weight: f64,
    },

    #[error("{name} must be within [0, 1] (got {value})")]
    InvalidFraction { name: String, value: f64 },
}

/// Failures surfaced by the churn classifier collaborator.
#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("churn classifier is not available: {0}")]
    ModelUnavailable(String),

    #[error("feature schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("failed to fit churn classifier")]
    Training(#[source] linfa_logistic::error::Error),
}
