//! Collapse activity rows into one record per (user, date)

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use tracing::warn;

use crate::distribution::{AcquisitionChannel, DeviceType, Segment};
use crate::records::{ActivityRow, DailyUserRecord};
use crate::retention::{round2, RetentionPoint};

/// Aggregated rows plus the number of rows whose retention had to be
/// back-filled from the segment mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub records: Vec<DailyUserRecord>,
    pub backfilled: usize,
}

/// Distinct active users per date
pub fn daily_active_users<R: ActivityRow>(rows: &[R]) -> BTreeMap<NaiveDate, u32> {
    let mut users_by_date: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for row in rows {
        users_by_date.entry(row.date()).or_default().insert(row.user_id());
    }
    users_by_date
        .into_iter()
        .map(|(date, users)| (date, users.len() as u32))
        .collect()
}

struct Group {
    session_duration: f64,
    screens_viewed: u32,
    app_opens: u32,
    device_type: DeviceType,
    acquisition_channel: Option<AcquisitionChannel>,
    segment: Segment,
}

/// Group rows by (user, date), summing duration, screens and opens and
/// keeping the first categorical attributes seen, then join the date's DAU
/// and retention rate.
///
/// Rows whose date has no retention point get the mean retention of their
/// segment. Retention is computed over the same activity dates, so this
/// path never fires during normal generation; it stays to keep the output
/// total if the two inputs ever drift apart.
pub fn aggregate<R: ActivityRow>(rows: &[R], retention: &[RetentionPoint]) -> Aggregation {
    let mut groups: BTreeMap<(String, NaiveDate), Group> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.user_id().to_string(), row.date()))
            .and_modify(|group| {
                group.session_duration += row.session_duration();
                group.screens_viewed += row.screens_viewed();
                group.app_opens += row.app_opens();
            })
            .or_insert_with(|| Group {
                session_duration: row.session_duration(),
                screens_viewed: row.screens_viewed(),
                app_opens: row.app_opens(),
                device_type: row.device_type(),
                acquisition_channel: row.acquisition_channel(),
                segment: row.segment(),
            });
    }

    let dau = daily_active_users(rows);
    let retention_by_date: HashMap<NaiveDate, f64> = retention
        .iter()
        .map(|point| (point.date, point.retention_rate))
        .collect();

    let joined: Vec<(DailyUserRecord, bool)> = groups
        .into_iter()
        .map(|((user_id, date), group)| {
            let rate = retention_by_date.get(&date).copied();
            let record = DailyUserRecord {
                user_id,
                date,
                session_duration: group.session_duration,
                screens_viewed: group.screens_viewed,
                app_opens: group.app_opens,
                device_type: group.device_type,
                acquisition_channel: group.acquisition_channel,
                segment: group.segment,
                daily_active_users: dau.get(&date).copied().unwrap_or(0),
                retention_rate: rate.unwrap_or(f64::NAN),
            };
            (record, rate.is_some())
        })
        .collect();

    backfill_retention(joined)
}

fn backfill_retention(joined: Vec<(DailyUserRecord, bool)>) -> Aggregation {
    let mut sums: HashMap<Segment, (f64, usize)> = HashMap::new();
    for (record, known) in &joined {
        if *known {
            let entry = sums.entry(record.segment).or_insert((0.0, 0));
            entry.0 += record.retention_rate;
            entry.1 += 1;
        }
    }

    let mut backfilled = 0;
    let records = joined
        .into_iter()
        .map(|(mut record, known)| {
            if !known {
                backfilled += 1;
                record.retention_rate = match sums.get(&record.segment) {
                    Some(&(sum, count)) if count > 0 => round2(sum / count as f64),
                    _ => {
                        warn!(
                            segment = %record.segment,
                            "no retention observed for segment, using 0"
                        );
                        0.0
                    }
                };
            }
            record
        })
        .collect();

    if backfilled > 0 {
        warn!(rows = backfilled, "back-filled missing retention rates by segment mean");
    }

    Aggregation { records, backfilled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SessionRecord;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn session(
        id: &str,
        on: NaiveDate,
        minutes: f64,
        screens: u32,
        opens: u8,
        segment: Segment,
    ) -> SessionRecord {
        SessionRecord {
            user_id: id.to_string(),
            date: on,
            session_duration: minutes,
            screens_viewed: screens,
            app_opens: opens,
            device_type: DeviceType::Android,
            acquisition_channel: AcquisitionChannel::Referral,
            segment,
        }
    }

    fn sample_sessions() -> Vec<SessionRecord> {
        vec![
            session("u1", date(1), 10.0, 5, 1, Segment::Power),
            session("u1", date(1), 12.5, 6, 0, Segment::Power),
            session("u2", date(1), 3.0, 2, 1, Segment::Casual),
            session("u1", date(2), 9.0, 4, 1, Segment::Power),
        ]
    }

    #[test]
    fn test_aggregate_sums_and_joins() {
        let retention = vec![
            RetentionPoint { date: date(1), retention_rate: 40.0 },
            RetentionPoint { date: date(2), retention_rate: 20.0 },
        ];
        let result = aggregate(&sample_sessions(), &retention);
        assert_eq!(result.backfilled, 0);
        assert_eq!(result.records.len(), 3);

        let first = &result.records[0];
        assert_eq!(first.user_id, "u1");
        assert_eq!(first.date, date(1));
        assert_eq!(first.session_duration, 22.5);
        assert_eq!(first.screens_viewed, 11);
        assert_eq!(first.app_opens, 1);
        assert_eq!(first.daily_active_users, 2);
        assert_eq!(first.retention_rate, 40.0);

        assert_eq!(result.records[1].daily_active_users, 1);
        assert_eq!(result.records[2].user_id, "u2");
    }

    #[test]
    fn test_reaggregation_is_fixed_point() {
        let retention = vec![
            RetentionPoint { date: date(1), retention_rate: 40.0 },
            RetentionPoint { date: date(2), retention_rate: 20.0 },
        ];
        let once = aggregate(&sample_sessions(), &retention);
        let twice = aggregate(&once.records, &retention);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_backfill_uses_segment_mean() {
        let sessions = vec![
            session("u1", date(1), 10.0, 5, 1, Segment::Power),
            session("u2", date(2), 10.0, 5, 1, Segment::Power),
            session("u3", date(3), 10.0, 5, 1, Segment::Power),
            session("u4", date(3), 2.0, 1, 1, Segment::Casual),
        ];
        let retention = vec![
            RetentionPoint { date: date(1), retention_rate: 30.0 },
            RetentionPoint { date: date(2), retention_rate: 50.0 },
        ];

        let result = aggregate(&sessions, &retention);
        assert_eq!(result.backfilled, 2);
        let u3 = result.records.iter().find(|r| r.user_id == "u3").unwrap();
        assert_eq!(u3.retention_rate, 40.0);
        // No casual row has a known rate to average.
        let u4 = result.records.iter().find(|r| r.user_id == "u4").unwrap();
        assert_eq!(u4.retention_rate, 0.0);
    }

    #[test]
    fn test_backfilled_rate_is_rounded() {
        let sessions = vec![
            session("u1", date(1), 10.0, 5, 1, Segment::Regular),
            session("u2", date(2), 10.0, 5, 1, Segment::Regular),
            session("u3", date(3), 10.0, 5, 1, Segment::Regular),
            session("u4", date(4), 10.0, 5, 1, Segment::Regular),
        ];
        let retention = vec![
            RetentionPoint { date: date(1), retention_rate: 10.0 },
            RetentionPoint { date: date(2), retention_rate: 10.0 },
            RetentionPoint { date: date(3), retention_rate: 10.01 },
        ];

        let result = aggregate(&sessions, &retention);
        assert_eq!(result.backfilled, 1);
        let u4 = result.records.iter().find(|r| r.user_id == "u4").unwrap();
        assert_eq!(u4.retention_rate, 10.0);
    }
}
