//! Generator configuration: defaults, optional TOML file, validation

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activity::simulation_window;
use crate::distribution::{AcquisitionChannel, AgeGroup, DeviceType, Distributions, Segment};
use crate::error::GeneratorError;
use crate::noise::NoiseConfig;
use crate::population::install_window;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_USERS: usize = 10_000;
pub const DEFAULT_DAYS: u32 = 60;

/// Fully resolved and validated generator parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Determinism anchor for every draw of the run
    pub seed: u64,
    pub users: usize,
    /// Length of the simulation window ending at `reference_date`
    pub days: u32,
    /// The run's notion of "now"
    pub reference_date: NaiveDate,
    pub distributions: Distributions,
    pub noise: NoiseConfig,
}

impl GeneratorConfig {
    /// Configuration with the standard distribution tables and noise levels
    pub fn new(
        seed: u64,
        users: usize,
        days: u32,
        reference_date: NaiveDate,
    ) -> Result<Self, GeneratorError> {
        let config = Self {
            seed,
            users,
            days,
            reference_date,
            distributions: Distributions::standard()?,
            noise: NoiseConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject bad sizes, dates and noise fractions before any draw happens.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.users == 0 {
            return Err(GeneratorError::InvalidPopulation(self.users));
        }
        simulation_window(self.reference_date, self.days)?;
        install_window(self.reference_date)?;
        self.noise.validate()
    }
}

/// On-disk configuration. Every field is optional; unset fields fall back
/// to command-line values or built-in defaults.
///
/// ```toml
/// seed = 7
/// users = 5000
/// days = 90
/// reference_date = "2024-06-01"
///
/// [segments]
/// power_users = 0.2
/// regular_users = 0.3
/// casual_users = 0.35
/// churned_users = 0.15
///
/// [noise]
/// missing_fraction = 0.01
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub seed: Option<u64>,
    pub users: Option<usize>,
    pub days: Option<u32>,
    pub reference_date: Option<NaiveDate>,
    pub segments: Option<BTreeMap<String, f64>>,
    pub devices: Option<BTreeMap<String, f64>>,
    pub channels: Option<BTreeMap<String, f64>>,
    pub age_groups: Option<BTreeMap<String, f64>>,
    pub noise: Option<NoiseConfig>,
}

impl ConfigFile {
    pub fn load_from_path(path: &Path) -> crate::Result<Self> {
        debug!("Loading generator configuration from {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let file = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        info!("Loaded generator configuration from {:?}", path);
        Ok(file)
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve into a validated configuration. `reference_date` is used when
    /// the file does not pin one.
    pub fn resolve(self, reference_date: NaiveDate) -> crate::Result<GeneratorConfig> {
        let distributions = Distributions::from_tables(
            weight_table(self.segments, Segment::ALL, Distributions::default_segments)?,
            weight_table(self.devices, DeviceType::ALL, Distributions::default_devices)?,
            weight_table(self.channels, AcquisitionChannel::ALL, Distributions::default_channels)?,
            weight_table(self.age_groups, AgeGroup::ALL, Distributions::default_age_groups)?,
        )?;

        let config = GeneratorConfig {
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            users: self.users.unwrap_or(DEFAULT_USERS),
            days: self.days.unwrap_or(DEFAULT_DAYS),
            reference_date: self.reference_date.unwrap_or(reference_date),
            distributions,
            noise: self.noise.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Turn a name -> weight map into a table in declaration order. Categories
/// missing from the map weigh zero; unknown names are rejected.
fn weight_table<T>(
    raw: Option<BTreeMap<String, f64>>,
    all: &[T],
    default: fn() -> Vec<(T, f64)>,
) -> crate::Result<Vec<(T, f64)>>
where
    T: Copy + Ord + Display + FromStr<Err = anyhow::Error>,
{
    let Some(raw) = raw else {
        return Ok(default());
    };

    let mut parsed: BTreeMap<T, f64> = BTreeMap::new();
    for (name, weight) in raw {
        parsed.insert(name.parse::<T>()?, weight);
    }

    Ok(all
        .iter()
        .map(|category| (*category, parsed.get(category).copied().unwrap_or(0.0)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default().resolve(reference()).unwrap();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.users, DEFAULT_USERS);
        assert_eq!(config.days, DEFAULT_DAYS);
        assert_eq!(config.reference_date, reference());
        assert_eq!(config.distributions, Distributions::standard().unwrap());
    }

    #[test]
    fn test_parse_file() {
        let file = ConfigFile::parse(
            r#"
            seed = 7
            users = 250
            reference_date = "2023-12-31"

            [devices]
            Android = 0.5
            iOS = 0.5

            [noise]
            missing_fraction = 0.1
            "#,
        )
        .unwrap();

        let config = file.resolve(reference()).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.users, 250);
        assert_eq!(config.reference_date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(config.noise.missing_fraction, 0.1);
        assert_eq!(config.noise.outlier_fraction, 0.05);
        assert_eq!(config.distributions.devices.boundaries(), &[0.5, 1.0]);
    }

    #[test]
    fn test_bad_distribution_rejected() {
        let file = ConfigFile::parse(
            r#"
            [segments]
            power_users = 0.5
            regular_users = 0.5
            casual_users = 0.5
            "#,
        )
        .unwrap();

        let err = file.resolve(reference()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeneratorError>(),
            Some(GeneratorError::Distribution { .. })
        ));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let file = ConfigFile::parse("[channels]\ntelevision = 1.0\n").unwrap();
        assert!(file.resolve(reference()).is_err());
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert_eq!(
            GeneratorConfig::new(1, 0, 10, reference()),
            Err(GeneratorError::InvalidPopulation(0))
        );
        assert_eq!(
            GeneratorConfig::new(1, 10, 0, reference()),
            Err(GeneratorError::InvalidDays(0))
        );
    }
}
