//! Engagement and retention summaries over a persisted activity table

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use polars::prelude::*;

use crate::data::{column_f64, column_str, DATE_FORMAT};
use crate::model::ChurnPrediction;

/// Churn probability above which a user counts as high risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Per-date engagement point
#[derive(Debug, Clone, PartialEq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub active_users: u32,
    pub retention_rate: f64,
    pub avg_session_duration: f64,
}

/// Usage broken down by one categorical column
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub name: String,
    pub users: u32,
    pub mean_session_duration: f64,
    pub mean_screens_viewed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub days: usize,
    pub total_users: usize,
    pub average_dau: f64,
    pub peak_dau: u32,
    pub average_session_duration: f64,
    pub total_app_opens: u64,
    pub average_screens_viewed: f64,
    pub average_retention: f64,
    /// Highest daily retention rate
    pub best_retention: f64,
    /// 100 minus average retention
    pub average_churn: f64,
    /// Day-over-day DAU change in percent; `None` with fewer than two days
    pub average_dau_growth: Option<f64>,
    pub peak_dau_growth: Option<f64>,
    pub segments: Vec<GroupStats>,
    pub devices: Vec<GroupStats>,
    pub channels: Vec<GroupStats>,
}

/// DAU, retention and mean duration per date, ascending.
pub fn daily_trend(df: &DataFrame) -> crate::Result<Vec<DailyPoint>> {
    let daily = df
        .clone()
        .lazy()
        .group_by([col("date")])
        .agg([
            col("user_id").n_unique().alias("active_users"),
            col("retention_rate").mean().alias("retention_rate"),
            col("session_duration").mean().alias("avg_session_duration"),
        ])
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;

    let dates = column_str(&daily, "date")?;
    let active = column_f64(&daily, "active_users")?;
    let retention = column_f64(&daily, "retention_rate")?;
    let duration = column_f64(&daily, "avg_session_duration")?;

    dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            Ok(DailyPoint {
                date: NaiveDate::parse_from_str(date, DATE_FORMAT)?,
                active_users: active[i] as u32,
                retention_rate: retention[i],
                avg_session_duration: duration[i],
            })
        })
        .collect()
}

/// Day-over-day percentage change of DAU, skipping days after a zero.
pub fn dau_growth(trend: &[DailyPoint]) -> Vec<f64> {
    trend
        .windows(2)
        .filter(|pair| pair[0].active_users > 0)
        .map(|pair| {
            let previous = f64::from(pair[0].active_users);
            (f64::from(pair[1].active_users) - previous) / previous * 100.0
        })
        .collect()
}

pub fn summarize(df: &DataFrame) -> crate::Result<MetricsSummary> {
    if df.height() == 0 {
        anyhow::bail!("Cannot summarize an empty table");
    }

    let trend = daily_trend(df)?;
    let growth = dau_growth(&trend);
    let days = trend.len();

    let durations = column_f64(df, "session_duration")?;
    let screens = column_f64(df, "screens_viewed")?;
    let opens = column_f64(df, "app_opens")?;

    Ok(MetricsSummary {
        days,
        total_users: df.column("user_id")?.n_unique()?,
        average_dau: mean(trend.iter().map(|p| f64::from(p.active_users))),
        peak_dau: trend.iter().map(|p| p.active_users).max().unwrap_or(0),
        average_session_duration: mean(durations.iter().copied()),
        total_app_opens: opens.iter().sum::<f64>() as u64,
        average_screens_viewed: mean(screens.iter().copied()),
        average_retention: mean(trend.iter().map(|p| p.retention_rate)),
        best_retention: trend.iter().map(|p| p.retention_rate).fold(0.0, f64::max),
        average_churn: 100.0 - mean(trend.iter().map(|p| p.retention_rate)),
        average_dau_growth: (!growth.is_empty()).then(|| mean(growth.iter().copied())),
        peak_dau_growth: growth.iter().copied().reduce(f64::max),
        segments: group_stats(df, "user_segment")?,
        devices: group_stats(df, "device_type")?,
        channels: group_stats(df, "user_acquisition_channel")?,
    })
}

/// Outcome of scoring a table with a churn classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ChurnSummary {
    pub users: usize,
    pub predicted_churners: usize,
    pub average_probability: f64,
    /// Users with probability above [`HIGH_RISK_THRESHOLD`]
    pub high_risk: usize,
    /// Share of predicted churners per segment, by segment name
    pub segment_churn: Vec<(String, f64)>,
}

/// Summarize predictions, attributing each user to the segment of their
/// last row in `df`.
pub fn summarize_predictions(
    predictions: &[ChurnPrediction],
    df: &DataFrame,
) -> crate::Result<ChurnSummary> {
    let ids = column_str(df, "user_id")?;
    let segments = column_str(df, "user_segment")?;
    let dates = column_str(df, "date")?;

    let mut last_segment: HashMap<&str, (&str, &str)> = HashMap::new();
    for ((id, segment), date) in ids.iter().zip(&segments).zip(&dates) {
        let entry = last_segment
            .entry(id.as_str())
            .or_insert((date.as_str(), segment.as_str()));
        if date.as_str() >= entry.0 {
            *entry = (date.as_str(), segment.as_str());
        }
    }

    let mut by_segment: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for prediction in predictions {
        let Some(&(_, segment)) = last_segment.get(prediction.user_id.as_str()) else {
            anyhow::bail!("User {} not present in table", prediction.user_id);
        };
        let entry = by_segment.entry(segment).or_insert((0.0, 0));
        entry.0 += if prediction.churn_prediction { 1.0 } else { 0.0 };
        entry.1 += 1;
    }

    Ok(ChurnSummary {
        users: predictions.len(),
        predicted_churners: predictions.iter().filter(|p| p.churn_prediction).count(),
        average_probability: mean(predictions.iter().map(|p| p.churn_probability)),
        high_risk: predictions
            .iter()
            .filter(|p| p.churn_probability > HIGH_RISK_THRESHOLD)
            .count(),
        segment_churn: by_segment
            .into_iter()
            .map(|(segment, (sum, count))| (segment.to_string(), sum / count as f64))
            .collect(),
    })
}

fn group_stats(df: &DataFrame, key: &str) -> crate::Result<Vec<GroupStats>> {
    let grouped = df
        .clone()
        .lazy()
        .group_by([col(key)])
        .agg([
            col("user_id").n_unique().alias("users"),
            col("session_duration").mean().alias("mean_session_duration"),
            col("screens_viewed").mean().alias("mean_screens_viewed"),
        ])
        .sort([key], SortMultipleOptions::default())
        .collect()?;

    let names = column_str(&grouped, key)?;
    let users = column_f64(&grouped, "users")?;
    let durations = column_f64(&grouped, "mean_session_duration")?;
    let screens = column_f64(&grouped, "mean_screens_viewed")?;

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| GroupStats {
            name,
            users: users[i] as u32,
            mean_session_duration: durations[i],
            mean_screens_viewed: screens[i],
        })
        .collect())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::load_dataset;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "user_id,date,session_duration,screens_viewed,app_opens,device_type,\
             user_acquisition_channel,user_segment,daily_active_users,retention_rate"
        )
        .unwrap();
        writeln!(file, "u1,2024-06-01,30.0,12,1,Android,organic,power_users,2,20.0").unwrap();
        writeln!(file, "u2,2024-06-01,10.0,4,1,iOS,referral,regular_users,2,20.0").unwrap();
        writeln!(file, "u1,2024-06-02,20.0,8,1,Android,organic,power_users,3,30.0").unwrap();
        writeln!(file, "u2,2024-06-02,5.0,2,1,iOS,unknown,regular_users,3,30.0").unwrap();
        writeln!(file, "u3,2024-06-02,2.0,1,1,Android,email,casual_users,3,30.0").unwrap();
        file
    }

    #[test]
    fn test_daily_trend() {
        let file = create_test_csv();
        let df = load_dataset(file.path().to_str().unwrap()).unwrap();
        let trend = daily_trend(&df).unwrap();

        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(trend[0].active_users, 2);
        assert_eq!(trend[1].active_users, 3);
        assert_eq!(trend[1].retention_rate, 30.0);
        assert_eq!(trend[0].avg_session_duration, 20.0);
    }

    #[test]
    fn test_summarize() {
        let file = create_test_csv();
        let df = load_dataset(file.path().to_str().unwrap()).unwrap();
        let summary = summarize(&df).unwrap();

        assert_eq!(summary.days, 2);
        assert_eq!(summary.total_users, 3);
        assert_eq!(summary.peak_dau, 3);
        assert_eq!(summary.average_dau, 2.5);
        assert_eq!(summary.total_app_opens, 5);
        assert_eq!(summary.average_retention, 25.0);
        assert_eq!(summary.best_retention, 30.0);
        assert_eq!(summary.average_churn, 75.0);
        assert_eq!(summary.average_dau_growth, Some(50.0));

        assert_eq!(summary.segments.len(), 3);
        let power = summary.segments.iter().find(|s| s.name == "power_users").unwrap();
        assert_eq!(power.users, 1);
        assert_eq!(power.mean_session_duration, 25.0);

        let devices: Vec<_> = summary.devices.iter().map(|d| (d.name.as_str(), d.users)).collect();
        assert_eq!(devices, vec![("Android", 2), ("iOS", 1)]);
        assert!(summary.channels.iter().any(|c| c.name == "unknown"));
    }

    #[test]
    fn test_dau_growth_skips_zero_base() {
        let point = |d, n| DailyPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            active_users: n,
            retention_rate: 0.0,
            avg_session_duration: 0.0,
        };
        let growth = dau_growth(&[point(1, 0), point(2, 4), point(3, 2)]);
        assert_eq!(growth, vec![-50.0]);
    }

    #[test]
    fn test_summarize_predictions() {
        let file = create_test_csv();
        let df = load_dataset(file.path().to_str().unwrap()).unwrap();
        let prediction = |id: &str, p: f64| ChurnPrediction {
            user_id: id.to_string(),
            churn_probability: p,
            churn_prediction: p > 0.5,
        };
        let predictions = vec![
            prediction("u1", 0.9),
            prediction("u2", 0.6),
            prediction("u3", 0.1),
        ];

        let summary = summarize_predictions(&predictions, &df).unwrap();
        assert_eq!(summary.users, 3);
        assert_eq!(summary.predicted_churners, 2);
        assert_eq!(summary.high_risk, 1);
        assert!((summary.average_probability - 1.6 / 3.0).abs() < 1e-12);
        assert_eq!(
            summary.segment_churn,
            vec![
                ("casual_users".to_string(), 0.0),
                ("power_users".to_string(), 1.0),
                ("regular_users".to_string(), 1.0),
            ]
        );

        let unknown = vec![prediction("nobody", 0.2)];
        assert!(summarize_predictions(&unknown, &df).is_err());
    }
}
