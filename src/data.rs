//! Tabular persistence and per-user churn features using Polars

use std::collections::{BTreeSet, HashMap};
use std::fs::File;

use chrono::{Duration, NaiveDate};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;

use crate::model::ChurnPrediction;
use crate::records::DailyUserRecord;

/// Output columns, in file order
pub const COLUMNS: [&str; 10] = [
    "user_id",
    "date",
    "session_duration",
    "screens_viewed",
    "app_opens",
    "device_type",
    "user_acquisition_channel",
    "user_segment",
    "daily_active_users",
    "retention_rate",
];

/// Sentinel written for a blanked acquisition channel
pub const UNKNOWN_CHANNEL: &str = "unknown";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Categorical columns one-hot encoded from each user's last row
const CATEGORICAL_COLUMNS: [&str; 3] = ["device_type", "user_acquisition_channel", "user_segment"];

/// Per-user feature matrix with named columns
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub user_ids: Vec<String>,
    pub feature_names: Vec<String>,
    /// (n_users, n_features)
    pub features: Array2<f64>,
}

impl FeatureTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    pub fn n_users(&self) -> usize {
        self.user_ids.len()
    }
}

/// Column-wise standardization fitted on training features
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(features: &Array2<f64>) -> Self {
        let n_features = features.ncols();
        let mean = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        // Constant columns are left centered but unscaled.
        let std = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        Self { mean, std }
    }

    pub fn transform(&self, features: Array2<f64>) -> Array2<f64> {
        (features - &self.mean) / &self.std
    }
}

/// Build the persisted table from aggregated records.
pub fn records_to_dataframe(records: &[DailyUserRecord]) -> crate::Result<DataFrame> {
    let df = df!(
        "user_id" => records.iter().map(|r| r.user_id.clone()).collect::<Vec<_>>(),
        "date" => records
            .iter()
            .map(|r| r.date.format(DATE_FORMAT).to_string())
            .collect::<Vec<_>>(),
        "session_duration" => records.iter().map(|r| r.session_duration).collect::<Vec<_>>(),
        "screens_viewed" => records.iter().map(|r| i64::from(r.screens_viewed)).collect::<Vec<_>>(),
        "app_opens" => records.iter().map(|r| i64::from(r.app_opens)).collect::<Vec<_>>(),
        "device_type" => records.iter().map(|r| r.device_type.as_str()).collect::<Vec<_>>(),
        "user_acquisition_channel" => records
            .iter()
            .map(|r| r.acquisition_channel.map_or(UNKNOWN_CHANNEL, |c| c.as_str()))
            .collect::<Vec<_>>(),
        "user_segment" => records.iter().map(|r| r.segment.as_str()).collect::<Vec<_>>(),
        "daily_active_users" => records
            .iter()
            .map(|r| i64::from(r.daily_active_users))
            .collect::<Vec<_>>(),
        "retention_rate" => records.iter().map(|r| r.retention_rate).collect::<Vec<_>>()
    )?;
    Ok(df)
}

pub fn predictions_to_dataframe(predictions: &[ChurnPrediction]) -> crate::Result<DataFrame> {
    let df = df!(
        "user_id" => predictions.iter().map(|p| p.user_id.clone()).collect::<Vec<_>>(),
        "churn_probability" => predictions.iter().map(|p| p.churn_probability).collect::<Vec<_>>(),
        "churn_prediction" => predictions
            .iter()
            .map(|p| i64::from(p.churn_prediction))
            .collect::<Vec<_>>()
    )?;
    Ok(df)
}

pub fn write_csv(df: &mut DataFrame, file_path: &str) -> crate::Result<()> {
    let mut file = File::create(file_path)?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}

/// Load a persisted activity table, normalizing numeric column types.
///
/// `date` stays an ISO-8601 string column.
pub fn load_dataset(file_path: &str) -> crate::Result<DataFrame> {
    let df = LazyCsvReader::new(file_path)
        .finish()?
        .with_columns([
            col("user_id").cast(DataType::String),
            col("date").cast(DataType::String),
            col("session_duration").cast(DataType::Float64),
            col("screens_viewed").cast(DataType::Int64),
            col("app_opens").cast(DataType::Int64),
            col("daily_active_users").cast(DataType::Int64),
            col("retention_rate").cast(DataType::Float64),
        ])
        .collect()?;

    for name in COLUMNS {
        if df.column(name).is_err() {
            anyhow::bail!("Missing expected column '{}' in {}", name, file_path);
        }
    }
    if df.height() == 0 {
        anyhow::bail!("No rows found in {}", file_path);
    }

    Ok(df)
}

/// Aggregate the activity table into one feature row per user.
///
/// Numeric features are `<column>_<stat>`; `total_active_days` counts the
/// user's rows; the last-seen categorical values are one-hot encoded as
/// `<column>_last_<value>` with the first category of each column dropped.
/// Standard deviations of single-row users are 0.
pub fn compute_churn_features(df: &DataFrame) -> crate::Result<FeatureTable> {
    let numeric: [(&str, Expr); 20] = [
        ("session_duration_mean", col("session_duration").mean()),
        ("session_duration_std", col("session_duration").std(1)),
        ("session_duration_min", col("session_duration").min()),
        ("session_duration_max", col("session_duration").max()),
        ("session_duration_sum", col("session_duration").sum()),
        ("screens_viewed_mean", col("screens_viewed").mean()),
        ("screens_viewed_std", col("screens_viewed").std(1)),
        ("screens_viewed_max", col("screens_viewed").max()),
        ("screens_viewed_sum", col("screens_viewed").sum()),
        ("app_opens_mean", col("app_opens").mean()),
        ("app_opens_std", col("app_opens").std(1)),
        ("app_opens_max", col("app_opens").max()),
        ("app_opens_sum", col("app_opens").sum()),
        ("retention_rate_mean", col("retention_rate").mean()),
        ("retention_rate_min", col("retention_rate").min()),
        ("retention_rate_max", col("retention_rate").max()),
        ("retention_rate_std", col("retention_rate").std(1)),
        ("daily_active_users_mean", col("daily_active_users").mean()),
        ("daily_active_users_std", col("daily_active_users").std(1)),
        ("total_active_days", col("date").count()),
    ];
    let numeric_names: Vec<String> = numeric.iter().map(|(name, _)| name.to_string()).collect();

    let mut aggregations: Vec<Expr> = numeric
        .into_iter()
        .map(|(name, expr)| expr.cast(DataType::Float64).fill_null(lit(0.0)).alias(name))
        .collect();
    for name in CATEGORICAL_COLUMNS {
        aggregations.push(col(name).last().alias(&format!("{}_last", name)));
    }

    let per_user = df
        .clone()
        .lazy()
        .sort(["user_id", "date"], SortMultipleOptions::default())
        .group_by_stable([col("user_id")])
        .agg(aggregations)
        .collect()?;

    let user_ids: Vec<String> = per_user
        .column("user_id")?
        .str()?
        .into_no_null_iter()
        .map(str::to_string)
        .collect();
    let n_users = user_ids.len();

    let mut feature_names = numeric_names.clone();
    let mut columns: Vec<Vec<f64>> = numeric_names
        .iter()
        .map(|name| column_f64(&per_user, name))
        .collect::<crate::Result<_>>()?;

    for name in CATEGORICAL_COLUMNS {
        let last_name = format!("{}_last", name);
        let values: Vec<String> = per_user
            .column(&last_name)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or(UNKNOWN_CHANNEL).to_string())
            .collect();

        let categories: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        for category in categories.into_iter().skip(1) {
            feature_names.push(format!("{}_{}", last_name, category));
            columns.push(
                values
                    .iter()
                    .map(|v| if v == category { 1.0 } else { 0.0 })
                    .collect(),
            );
        }
    }

    let mut features = Array2::zeros((n_users, feature_names.len()));
    for (j, column) in columns.iter().enumerate() {
        for (i, value) in column.iter().enumerate() {
            features[[i, j]] = *value;
        }
    }

    Ok(FeatureTable {
        user_ids,
        feature_names,
        features,
    })
}

/// Label each user as churned when they were not seen during the final
/// `inactive_days` days of the table.
pub fn churn_labels(
    df: &DataFrame,
    user_ids: &[String],
    inactive_days: u32,
) -> crate::Result<Array1<bool>> {
    let last_seen = last_seen_dates(df)?;
    let window_end = last_seen
        .values()
        .max()
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Cannot label churn on an empty table"))?;
    let Some(cutoff) = window_end.checked_sub_signed(Duration::days(i64::from(inactive_days)))
    else {
        anyhow::bail!(
            "Inactivity window of {} days before {} is out of range",
            inactive_days,
            window_end
        );
    };

    user_ids
        .iter()
        .map(|id| {
            last_seen
                .get(id)
                .map(|seen| *seen <= cutoff)
                .ok_or_else(|| anyhow::anyhow!("User {} not present in table", id))
        })
        .collect()
}

/// Most recent activity date per user
pub fn last_seen_dates(df: &DataFrame) -> crate::Result<HashMap<String, NaiveDate>> {
    let ids = df.column("user_id")?.str()?;
    let dates = df.column("date")?.str()?;

    let mut last_seen: HashMap<String, NaiveDate> = HashMap::new();
    for (id, date) in ids.into_iter().zip(dates.into_iter()) {
        let (Some(id), Some(date)) = (id, date) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)?;
        last_seen
            .entry(id.to_string())
            .and_modify(|seen| *seen = (*seen).max(date))
            .or_insert(date);
    }
    Ok(last_seen)
}

/// Read a numeric column as f64, treating nulls as 0.
pub fn column_f64(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect();
    Ok(values)
}

/// Read a string column, mapping nulls to the empty string.
pub fn column_str(df: &DataFrame, name: &str) -> crate::Result<Vec<String>> {
    let values = df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{AcquisitionChannel, DeviceType, Segment};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", COLUMNS.join(",")).unwrap();
        writeln!(file, "user_a,2024-06-01,20.5,10,1,Android,organic,power_users,2,50.0").unwrap();
        writeln!(file, "user_a,2024-06-02,30.5,14,1,Android,unknown,power_users,1,25.0").unwrap();
        writeln!(file, "user_b,2024-06-01,4.0,2,1,iOS,email,casual_users,2,50.0").unwrap();
        file
    }

    fn record(id: &str, day: u32, channel: Option<AcquisitionChannel>) -> DailyUserRecord {
        DailyUserRecord {
            user_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            session_duration: 12.25,
            screens_viewed: 7,
            app_opens: 1,
            device_type: DeviceType::Ios,
            acquisition_channel: channel,
            segment: Segment::Regular,
            daily_active_users: 3,
            retention_rate: 42.86,
        }
    }

    #[test]
    fn test_records_to_dataframe() {
        let records = vec![
            record("user_a", 1, Some(AcquisitionChannel::PaidSocial)),
            record("user_b", 1, None),
        ];
        let df = records_to_dataframe(&records).unwrap();
        assert_eq!(df.get_column_names(), COLUMNS.to_vec());
        assert_eq!(df.height(), 2);

        let channels = column_str(&df, "user_acquisition_channel").unwrap();
        assert_eq!(channels, vec!["paid_social", "unknown"]);
        let dates = column_str(&df, "date").unwrap();
        assert_eq!(dates[0], "2024-06-01");
    }

    #[test]
    fn test_write_and_load() {
        let records = vec![record("user_a", 1, None), record("user_a", 2, None)];
        let mut df = records_to_dataframe(&records).unwrap();
        let out = NamedTempFile::new().unwrap();
        let path = out.path().to_str().unwrap();
        write_csv(&mut df, path).unwrap();

        let loaded = load_dataset(path).unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(column_f64(&loaded, "session_duration").unwrap(), vec![12.25, 12.25]);
        assert_eq!(column_str(&loaded, "user_acquisition_channel").unwrap()[0], "unknown");
    }

    #[test]
    fn test_load_rejects_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "user_id,date").unwrap();
        writeln!(file, "user_a,2024-06-01").unwrap();
        assert!(load_dataset(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_compute_churn_features() {
        let file = create_test_csv();
        let df = load_dataset(file.path().to_str().unwrap()).unwrap();
        let table = compute_churn_features(&df).unwrap();

        assert_eq!(table.user_ids, vec!["user_a", "user_b"]);
        assert_eq!(table.features.nrows(), 2);

        let sum = table.column_index("session_duration_sum").unwrap();
        assert_eq!(table.features[[0, sum]], 51.0);
        let days = table.column_index("total_active_days").unwrap();
        assert_eq!(table.features[[0, days]], 2.0);
        assert_eq!(table.features[[1, days]], 1.0);

        // Single-row users get a zero standard deviation.
        let std = table.column_index("session_duration_std").unwrap();
        assert_eq!(table.features[[1, std]], 0.0);

        // Last-seen channel of user_a is the sentinel; "email" sorts first and is dropped.
        assert!(table.column_index("user_acquisition_channel_last_email").is_none());
        let unknown = table.column_index("user_acquisition_channel_last_unknown").unwrap();
        assert_eq!(table.features[[0, unknown]], 1.0);
        assert_eq!(table.features[[1, unknown]], 0.0);
        let power = table.column_index("user_segment_last_power_users").unwrap();
        assert_eq!(table.features[[0, power]], 1.0);
    }

    #[test]
    fn test_churn_labels() {
        let file = create_test_csv();
        let df = load_dataset(file.path().to_str().unwrap()).unwrap();
        let ids = vec!["user_a".to_string(), "user_b".to_string()];

        let labels = churn_labels(&df, &ids, 1).unwrap();
        assert_eq!(labels.to_vec(), vec![false, true]);

        let missing = churn_labels(&df, &["user_z".to_string()], 1);
        assert!(missing.is_err());
    }

    #[test]
    fn test_churn_labels_rejects_oversized_window() {
        let file = create_test_csv();
        let df = load_dataset(file.path().to_str().unwrap()).unwrap();
        let ids = vec!["user_a".to_string()];
        assert!(churn_labels(&df, &ids, u32::MAX).is_err());
    }

    #[test]
    fn test_standard_scaler() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0]).unwrap();
        let scaler = StandardScaler::fit(&x);
        let scaled = scaler.transform(x);
        assert!((scaled[[0, 0]] + scaled[[2, 0]]).abs() < 1e-12);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0, 0.0]);
    }
}
