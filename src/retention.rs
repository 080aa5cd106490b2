//! Per-date retention relative to the cohort of installed users

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::population::User;
use crate::records::ActivityRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPoint {
    pub date: NaiveDate,
    /// Percentage in [0, 100], two decimals
    pub retention_rate: f64,
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One retention point per distinct activity date, ascending.
///
/// Eligible users are those installed on or before the date; the rate is
/// `100 * active / eligible`, or 0 when nobody is eligible.
pub fn calculate_retention<R: ActivityRow>(
    activities: &[R],
    users: &[User],
) -> Vec<RetentionPoint> {
    let mut active_by_date: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for row in activities {
        active_by_date.entry(row.date()).or_default().insert(row.user_id());
    }

    let mut install_dates: Vec<NaiveDate> = users.iter().map(|u| u.install_date).collect();
    install_dates.sort_unstable();

    active_by_date
        .into_iter()
        .map(|(date, active)| {
            let eligible = install_dates.partition_point(|install| *install <= date);
            let retention_rate = if eligible > 0 {
                round2(active.len() as f64 / eligible as f64 * 100.0)
            } else {
                0.0
            };
            RetentionPoint {
                date,
                retention_rate,
            }
        })
        .collect()
}
