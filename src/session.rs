//! Per-user, per-day session simulation

use chrono::{Datelike, NaiveDate, Weekday};

use crate::distribution::Segment;
use crate::population::User;
use crate::records::SessionRecord;
use crate::retention::round2;
use crate::rng::SimRng;

/// Hard cap on sessions per user per active day, for every segment.
pub const MAX_SESSIONS_PER_DAY: u32 = 8;

pub const WEEKEND_MULTIPLIER: f64 = 1.3;

/// Activity likelihood never decays below this floor.
pub const RETENTION_DECAY_FLOOR: f64 = 0.1;
pub const RETENTION_DECAY_PER_DAY: f64 = 0.002;

/// Behavioral parameters of a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProfile {
    pub base_activity: f64,
    pub weekend_sensitive: bool,
    /// Poisson rate for extra sessions; `None` means exactly one session
    pub session_lambda: Option<f64>,
    /// Session duration range in minutes
    pub duration_range: (f64, f64),
}

impl SegmentProfile {
    pub fn for_segment(segment: Segment) -> Self {
        match segment {
            Segment::Power => SegmentProfile {
                base_activity: 0.85,
                weekend_sensitive: true,
                session_lambda: Some(4.0),
                duration_range: (8.0, 45.0),
            },
            Segment::Regular => SegmentProfile {
                base_activity: 0.45,
                weekend_sensitive: true,
                session_lambda: Some(2.0),
                duration_range: (3.0, 20.0),
            },
            Segment::Casual => SegmentProfile {
                base_activity: 0.15,
                weekend_sensitive: true,
                session_lambda: Some(1.0),
                duration_range: (1.0, 8.0),
            },
            Segment::Churned => SegmentProfile {
                base_activity: 0.02,
                weekend_sensitive: false,
                session_lambda: None,
                duration_range: (0.5, 3.0),
            },
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Linear tenure decay: `max(0.1, 1 - 0.002 * days)`
pub fn retention_decay(days_since_install: i64) -> f64 {
    (1.0 - days_since_install as f64 * RETENTION_DECAY_PER_DAY).max(RETENTION_DECAY_FLOOR)
}

/// Probability that a user of `segment` is active on a given day.
pub fn activity_probability(segment: Segment, days_since_install: i64, weekend: bool) -> f64 {
    let profile = SegmentProfile::for_segment(segment);
    let base = if weekend && profile.weekend_sensitive {
        profile.base_activity * WEEKEND_MULTIPLIER
    } else {
        profile.base_activity
    };
    base * retention_decay(days_since_install)
}

/// Decide whether `user` is active on `date` and emit that day's sessions.
///
/// Returns nothing for dates before install or inactive days.
pub fn simulate_day(
    user: &User,
    date: NaiveDate,
    weekend: bool,
    rng: &mut SimRng,
) -> Vec<SessionRecord> {
    if date < user.install_date {
        return Vec::new();
    }

    let days_since_install = (date - user.install_date).num_days();
    let probability = activity_probability(user.segment, days_since_install, weekend);
    if rng.uniform() >= probability {
        return Vec::new();
    }

    let profile = SegmentProfile::for_segment(user.segment);
    let session_count = session_count(&profile, rng);
    let (min_duration, max_duration) = profile.duration_range;

    (0..session_count)
        .map(|index| {
            let duration = rng.uniform_range(min_duration, max_duration);
            let screens = ((duration / 2.0).floor() as u32 + rng.poisson(1.0)).max(1);

            SessionRecord {
                user_id: user.user_id.clone(),
                date,
                session_duration: round2(duration),
                screens_viewed: screens,
                app_opens: u8::from(index == 0),
                device_type: user.device_type,
                acquisition_channel: user.acquisition_channel,
                segment: user.segment,
            }
        })
        .collect()
}

fn session_count(profile: &SegmentProfile, rng: &mut SimRng) -> u32 {
    let count = match profile.session_lambda {
        Some(lambda) => rng.poisson(lambda) + 1,
        None => 1,
    };
    count.min(MAX_SESSIONS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{AcquisitionChannel, AgeGroup, DeviceType};

    fn user(segment: Segment, install: NaiveDate) -> User {
        User {
            user_id: "user_0000abcd".to_string(),
            segment,
            device_type: DeviceType::Android,
            acquisition_channel: AcquisitionChannel::Organic,
            install_date: install,
            country: "US".to_string(),
            age_group: AgeGroup::Age25To34,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_retention_decay() {
        assert_eq!(retention_decay(0), 1.0);
        assert!((retention_decay(100) - 0.8).abs() < 1e-12);
        assert_eq!(retention_decay(450), RETENTION_DECAY_FLOOR);
        assert_eq!(retention_decay(10_000), RETENTION_DECAY_FLOOR);
    }

    #[test]
    fn test_churned_ignores_weekend() {
        let weekday = activity_probability(Segment::Churned, 0, false);
        let weekend = activity_probability(Segment::Churned, 0, true);
        assert_eq!(weekday, 0.02);
        assert_eq!(weekend, 0.02);

        // Decay still applies afterwards.
        let decayed = activity_probability(Segment::Churned, 100, true);
        assert!((decayed - 0.02 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_weekend_multiplier() {
        let weekday = activity_probability(Segment::Regular, 0, false);
        let weekend = activity_probability(Segment::Regular, 0, true);
        assert!((weekday - 0.45).abs() < 1e-12);
        assert!((weekend - 0.45 * 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_is_weekend() {
        assert!(is_weekend(date(2024, 6, 1))); // Saturday
        assert!(is_weekend(date(2024, 6, 2)));
        assert!(!is_weekend(date(2024, 6, 3)));
    }

    #[test]
    fn test_no_sessions_before_install() {
        let u = user(Segment::Power, date(2024, 6, 10));
        let mut rng = SimRng::new(1);
        for _ in 0..50 {
            assert!(simulate_day(&u, date(2024, 6, 9), false, &mut rng).is_empty());
        }
    }

    #[test]
    fn test_session_shape() {
        let u = user(Segment::Power, date(2024, 6, 1));
        let mut rng = SimRng::new(11);
        let mut active_days = 0;

        for offset in 0..200 {
            let day = date(2024, 6, 1) + chrono::Duration::days(offset % 20);
            let sessions = simulate_day(&u, day, is_weekend(day), &mut rng);
            if sessions.is_empty() {
                continue;
            }
            active_days += 1;
            assert!(sessions.len() as u32 <= MAX_SESSIONS_PER_DAY);
            assert_eq!(sessions[0].app_opens, 1);
            assert!(sessions[1..].iter().all(|s| s.app_opens == 0));
            for s in &sessions {
                assert!(s.session_duration >= 8.0 && s.session_duration <= 45.0);
                assert!(s.screens_viewed >= 1);
                assert!(s.screens_viewed >= (s.session_duration / 2.0).floor() as u32 - 1);
                assert_eq!(s.date, day);
            }
        }
        assert!(active_days > 100);
    }

    #[test]
    fn test_churned_single_session() {
        // Churned users are never weekend-boosted and always emit one session.
        let u = user(Segment::Churned, date(2024, 1, 1));
        let mut rng = SimRng::new(99);
        for _ in 0..5_000 {
            let sessions = simulate_day(&u, date(2024, 1, 6), true, &mut rng);
            assert!(sessions.len() <= 1);
            if let Some(s) = sessions.first() {
                assert!(s.session_duration >= 0.5 && s.session_duration <= 3.0);
                assert_eq!(s.app_opens, 1);
            }
        }
    }
}
