//! Churn classifier capability and a logistic-regression implementation

use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

use crate::data::{FeatureTable, StandardScaler};
use crate::error::ChurnError;

/// A fitted binary churn classifier.
///
/// Implementations declare the exact feature order they were trained on;
/// callers must pass matrices whose columns follow that order.
pub trait ChurnClassifier {
    fn feature_names(&self) -> &[String];

    /// Churn label per row
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<bool>, ChurnError>;

    /// Churn probability in [0, 1] per row
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ChurnError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChurnPrediction {
    pub user_id: String,
    pub churn_probability: f64,
    pub churn_prediction: bool,
}

/// Reorder `table` to `expected`, zero-filling columns it lacks and
/// dropping columns the classifier does not know.
pub fn align_features(table: &FeatureTable, expected: &[String]) -> Array2<f64> {
    let mut aligned = Array2::zeros((table.n_users(), expected.len()));
    for (j, name) in expected.iter().enumerate() {
        if let Some(src) = table.column_index(name) {
            aligned.column_mut(j).assign(&table.features.column(src));
        }
    }
    aligned
}

/// Score every user in `table`.
pub fn predict_churn(
    classifier: &dyn ChurnClassifier,
    table: &FeatureTable,
) -> Result<Vec<ChurnPrediction>, ChurnError> {
    let expected = classifier.feature_names();
    if expected.is_empty() {
        return Err(ChurnError::ModelUnavailable(
            "classifier declares no input features".to_string(),
        ));
    }

    let missing = expected
        .iter()
        .filter(|name| table.column_index(name).is_none())
        .count();
    if missing > 0 {
        debug!(missing, "zero-filling features absent from input");
    }

    let features = align_features(table, expected);
    let labels = classifier.predict(&features)?;
    let probabilities = classifier.predict_proba(&features)?;

    for found in [labels.len(), probabilities.len()] {
        if found != table.n_users() {
            return Err(ChurnError::SchemaMismatch {
                expected: table.n_users(),
                found,
            });
        }
    }

    Ok(table
        .user_ids
        .iter()
        .zip(labels.iter().zip(probabilities.iter()))
        .map(|(user_id, (&churn_prediction, &churn_probability))| ChurnPrediction {
            user_id: user_id.clone(),
            churn_probability,
            churn_prediction,
        })
        .collect())
}

/// Standard-scaled L2 logistic regression over the churn feature table
pub struct LogisticChurnModel {
    model: FittedLogisticRegression<f64, bool>,
    scaler: StandardScaler,
    feature_names: Vec<String>,
}

impl LogisticChurnModel {
    /// Fit on `table` with one label per user (true = churned).
    pub fn fit(
        table: &FeatureTable,
        labels: &Array1<bool>,
        max_iterations: u64,
    ) -> Result<Self, ChurnError> {
        if labels.len() != table.n_users() {
            return Err(ChurnError::SchemaMismatch {
                expected: table.n_users(),
                found: labels.len(),
            });
        }

        let scaler = StandardScaler::fit(&table.features);
        let records = scaler.transform(table.features.clone());
        let dataset = Dataset::new(records, labels.clone());

        let model = LogisticRegression::default()
            .max_iterations(max_iterations)
            .fit(&dataset)
            .map_err(ChurnError::Training)?;

        info!(
            users = table.n_users(),
            features = table.feature_names.len(),
            churned = labels.iter().filter(|&&l| l).count(),
            "fitted churn model"
        );

        Ok(Self {
            model,
            scaler,
            feature_names: table.feature_names.clone(),
        })
    }

    fn check_width(&self, features: &Array2<f64>) -> Result<(), ChurnError> {
        if features.ncols() != self.feature_names.len() {
            return Err(ChurnError::SchemaMismatch {
                expected: self.feature_names.len(),
                found: features.ncols(),
            });
        }
        Ok(())
    }
}

impl ChurnClassifier for LogisticChurnModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Array1<bool>, ChurnError> {
        self.check_width(features)?;
        let scaled = self.scaler.transform(features.clone());
        Ok(self.model.predict(&scaled))
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>, ChurnError> {
        self.check_width(features)?;
        let scaled = self.scaler.transform(features.clone());
        let labels = self.model.predict(&scaled);
        // Probabilities refer to linfa's positive class, which may be `false`.
        let probabilities = self.model.predict_probabilities(&scaled);
        if positive_class_is_churn(&probabilities, &labels) {
            Ok(probabilities)
        } else {
            Ok(probabilities.mapv(|p| 1.0 - p))
        }
    }
}

fn positive_class_is_churn(probabilities: &Array1<f64>, labels: &Array1<bool>) -> bool {
    probabilities
        .iter()
        .zip(labels.iter())
        .find(|(p, _)| (**p - 0.5).abs() > 1e-9)
        .map(|(p, &label)| (*p > 0.5) == label)
        .unwrap_or(true)
}
