//! Real-world imperfections injected into the aggregated table.
//!
//! Both passes are destructive on purpose: consumers of the table must
//! tolerate an `unknown` acquisition channel and inflated power-user rows.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distribution::Segment;
use crate::error::GeneratorError;
use crate::records::DailyUserRecord;
use crate::rng::{domain, SimRng};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Share of all rows whose acquisition channel is blanked
    pub missing_fraction: f64,
    /// Share of power-user rows turned into usage outliers
    pub outlier_fraction: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            missing_fraction: 0.02,
            outlier_fraction: 0.05,
        }
    }
}

impl NoiseConfig {
    pub fn validate(&self) -> Result<(), GeneratorError> {
        for (name, value) in [
            ("missing_fraction", self.missing_fraction),
            ("outlier_fraction", self.outlier_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GeneratorError::InvalidFraction {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Rows touched by each pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoiseReport {
    pub missing: usize,
    pub outliers: usize,
}

fn sample_size(available: usize, fraction: f64) -> usize {
    ((available as f64 * fraction).floor() as usize).min(available)
}

/// Blank the acquisition channel of `floor(fraction * N)` distinct rows.
pub fn inject_missingness(
    records: &mut [DailyUserRecord],
    fraction: f64,
    rng: &mut SimRng,
) -> usize {
    let amount = sample_size(records.len(), fraction);
    let picked = rng.sample_indices(records.len(), amount);
    for &idx in &picked {
        records[idx].acquisition_channel = None;
    }
    picked.len()
}

/// Inflate `floor(fraction * P)` distinct power-user rows: duration by a
/// uniform factor in [2, 5) and screens by an integer factor of 2 or 3,
/// drawn independently per row.
pub fn inject_outliers(
    records: &mut [DailyUserRecord],
    fraction: f64,
    rng: &mut SimRng,
) -> usize {
    let power_rows: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.segment == Segment::Power)
        .map(|(idx, _)| idx)
        .collect();

    let amount = sample_size(power_rows.len(), fraction);
    let picked = rng.sample_indices(power_rows.len(), amount);
    for &pos in &picked {
        let record = &mut records[power_rows[pos]];
        record.session_duration *= rng.uniform_range(2.0, 5.0);
        record.screens_viewed *= rng.int_range(2, 4) as u32;
    }
    picked.len()
}

/// Run both passes, each on its own sub-stream of `rng`.
pub fn add_realistic_variations(
    records: &mut [DailyUserRecord],
    config: &NoiseConfig,
    rng: &SimRng,
) -> NoiseReport {
    let missing = inject_missingness(
        records,
        config.missing_fraction,
        &mut rng.fork(domain::MISSINGNESS, 0),
    );
    let outliers = inject_outliers(
        records,
        config.outlier_fraction,
        &mut rng.fork(domain::OUTLIERS, 0),
    );

    debug!(missing, outliers, "injected data variations");
    NoiseReport { missing, outliers }
}
