//! Daily activity generation over the full (user x date) grid

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::error::GeneratorError;
use crate::population::User;
use crate::records::SessionRecord;
use crate::rng::{domain, SimRng};
use crate::session::{is_weekend, simulate_day};

/// Inclusive date window ending at `reference_date` and starting `days`
/// earlier, so it covers `days + 1` calendar dates.
pub fn simulation_window(
    reference_date: NaiveDate,
    days: u32,
) -> Result<(NaiveDate, NaiveDate), GeneratorError> {
    if days == 0 {
        return Err(GeneratorError::InvalidDays(days));
    }
    let start = reference_date
        .checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            GeneratorError::InvalidDateBounds(format!(
                "{} days before {} is out of range",
                days, reference_date
            ))
        })?;
    Ok((start, reference_date))
}

/// Simulate every user on every date in `[start, end]`.
///
/// User `i` draws from the sub-stream `(ACTIVITY, i)` for all of its days,
/// so its sessions depend only on the seed and its own attributes. The
/// result is ordered by date, then user id.
pub fn generate_daily_activities(
    users: &[User],
    start: NaiveDate,
    end: NaiveDate,
    rng: &SimRng,
) -> Result<Vec<SessionRecord>, GeneratorError> {
    if start > end {
        return Err(GeneratorError::InvalidDateBounds(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }

    let dates: Vec<(NaiveDate, bool)> = start
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| (date, is_weekend(date)))
        .collect();

    let mut activities = Vec::new();
    for (index, user) in users.iter().enumerate() {
        let mut user_rng = rng.fork(domain::ACTIVITY, index as u64);
        for &(date, weekend) in &dates {
            if date < user.install_date {
                continue;
            }
            activities.extend(simulate_day(user, date, weekend, &mut user_rng));
        }
    }

    // Stable sort keeps each user-day's sessions in session-index order.
    activities.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.user_id.cmp(&b.user_id)));

    debug!(
        users = users.len(),
        days = dates.len(),
        sessions = activities.len(),
        "generated daily activities"
    );
    Ok(activities)
}
