//! Synthetic user population: identity, segment and static attributes

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::distribution::{AcquisitionChannel, AgeGroup, DeviceType, Distributions, Segment};
use crate::error::GeneratorError;
use crate::rng::{domain, SimRng};

/// Install dates fall in `[reference - MAX, reference - MIN]` days.
pub const INSTALL_WINDOW_MIN_DAYS: i64 = 30;
pub const INSTALL_WINDOW_MAX_DAYS: i64 = 365;

/// ISO 3166-1 alpha-2 codes users are drawn from
pub const COUNTRY_CODES: &[&str] = &[
    "US", "GB", "CA", "AU", "DE", "FR", "ES", "IT", "NL", "SE", "NO", "DK", "FI", "PL", "PT",
    "IE", "BR", "MX", "AR", "CL", "CO", "IN", "ID", "PH", "VN", "TH", "MY", "SG", "JP", "KR",
    "CN", "TR", "EG", "NG", "KE", "ZA", "MA", "SA", "AE", "IL", "RU", "UA", "NZ", "CH", "AT",
    "BE", "CZ", "GR", "HU", "RO",
];

/// A synthetic app user. Immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: String,
    pub segment: Segment,
    pub device_type: DeviceType,
    pub acquisition_channel: AcquisitionChannel,
    pub install_date: NaiveDate,
    pub country: String,
    pub age_group: AgeGroup,
}

/// Generate `count` users relative to `reference_date`.
///
/// User `i` draws all of its attributes from the sub-stream
/// `(POPULATION, i)`, so no user's attributes depend on another's draws.
pub fn generate_users(
    count: usize,
    reference_date: NaiveDate,
    distributions: &Distributions,
    rng: &SimRng,
) -> Result<Vec<User>, GeneratorError> {
    if count == 0 {
        return Err(GeneratorError::InvalidPopulation(count));
    }
    install_window(reference_date)?;

    let mut seen_ids = HashSet::with_capacity(count);
    let mut users = Vec::with_capacity(count);

    for index in 0..count {
        let mut user_rng = rng.fork(domain::POPULATION, index as u64);
        let user = assign_user(&mut user_rng, reference_date, distributions, &mut seen_ids);
        users.push(user);
    }

    debug!(users = users.len(), "generated user population");
    Ok(users)
}

/// Earliest and latest install date allowed for `reference_date`.
pub fn install_window(reference_date: NaiveDate) -> Result<(NaiveDate, NaiveDate), GeneratorError> {
    let earliest = reference_date.checked_sub_signed(Duration::days(INSTALL_WINDOW_MAX_DAYS));
    let latest = reference_date.checked_sub_signed(Duration::days(INSTALL_WINDOW_MIN_DAYS));
    match (earliest, latest) {
        (Some(earliest), Some(latest)) => Ok((earliest, latest)),
        _ => Err(GeneratorError::InvalidDateBounds(format!(
            "install window before {} is out of range",
            reference_date
        ))),
    }
}

fn assign_user(
    rng: &mut SimRng,
    reference_date: NaiveDate,
    distributions: &Distributions,
    seen_ids: &mut HashSet<String>,
) -> User {
    let segment = distributions.segments.sample(rng);
    let device_type = distributions.devices.sample(rng);
    let acquisition_channel = distributions.channels.sample(rng);

    let days_back = rng.int_range(
        INSTALL_WINDOW_MIN_DAYS as u64,
        INSTALL_WINDOW_MAX_DAYS as u64 + 1,
    ) as i64;
    let install_date = reference_date - Duration::days(days_back);

    let country_index = rng.int_range(0, COUNTRY_CODES.len() as u64) as usize;
    let country = COUNTRY_CODES[country_index].to_string();
    let age_group = distributions.age_groups.sample(rng);

    // Id last: collision redraws must not shift the attribute draws.
    let user_id = loop {
        let candidate = format!("user_{:08x}", rng.next_u32());
        if seen_ids.insert(candidate.clone()) {
            break candidate;
        }
    };

    User {
        user_id,
        segment,
        device_type,
        acquisition_channel,
        install_date,
        country,
        age_group,
    }
}
