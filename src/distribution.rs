//! Enumerated user attributes and validated categorical weight tables

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;
use crate::rng::SimRng;

/// Tolerance allowed when checking that weights sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => anyhow::bail!("unknown {} value: {}", stringify!($name), other),
                }
            }
        }
    };
}

string_enum! {
    /// Behavioral segment governing activity probability and session shape
    Segment {
        Power => "power_users",
        Regular => "regular_users",
        Casual => "casual_users",
        Churned => "churned_users",
    }
}

string_enum! {
    DeviceType {
        Android => "Android",
        Ios => "iOS",
    }
}

string_enum! {
    /// Channel through which the user installed the app
    AcquisitionChannel {
        Organic => "organic",
        PaidSocial => "paid_social",
        AppStore => "app_store",
        PaidSearch => "paid_search",
        Referral => "referral",
        Email => "email",
        Direct => "direct",
    }
}

string_enum! {
    AgeGroup {
        Age18To24 => "18-24",
        Age25To34 => "25-34",
        Age35To44 => "35-44",
        Age45To54 => "45-54",
        Age55Plus => "55+",
    }
}

/// Categorical distribution over `T` with weights checked at construction.
///
/// Categories keep their declaration order, which fixes the cumulative
/// boundaries that a single uniform draw is compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical<T> {
    name: String,
    categories: Vec<T>,
    cumulative: Vec<f64>,
}

impl<T: Copy + fmt::Display> Categorical<T> {
    /// Build a distribution, rejecting negative or non-finite weights and
    /// tables that do not sum to one. Weights are never renormalized.
    pub fn new(name: &str, weights: Vec<(T, f64)>) -> Result<Self, GeneratorError> {
        if weights.is_empty() {
            return Err(GeneratorError::Distribution {
                name: name.to_string(),
                sum: 0.0,
            });
        }

        let mut categories = Vec::with_capacity(weights.len());
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut running = 0.0;

        for (category, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(GeneratorError::InvalidWeight {
                    name: name.to_string(),
                    category: category.to_string(),
                    weight,
                });
            }
            running += weight;
            categories.push(category);
            cumulative.push(running);
        }

        if (running - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(GeneratorError::Distribution {
                name: name.to_string(),
                sum: running,
            });
        }

        Ok(Self {
            name: name.to_string(),
            categories,
            cumulative,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[T] {
        &self.categories
    }

    /// Cumulative upper boundaries, one per category
    pub fn boundaries(&self) -> &[f64] {
        &self.cumulative
    }

    /// Pick the category whose boundary is the first one above `u`.
    pub fn select(&self, u: f64) -> T {
        self.cumulative
            .iter()
            .position(|&bound| u < bound)
            .map(|idx| self.categories[idx])
            // Rounding can leave the last boundary just under 1.0.
            .unwrap_or(self.categories[self.categories.len() - 1])
    }

    /// Sample with exactly one uniform draw.
    pub fn sample(&self, rng: &mut SimRng) -> T {
        self.select(rng.uniform())
    }
}

/// The four distribution tables used when assigning user attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Distributions {
    pub segments: Categorical<Segment>,
    pub devices: Categorical<DeviceType>,
    pub channels: Categorical<AcquisitionChannel>,
    pub age_groups: Categorical<AgeGroup>,
}

impl Distributions {
    pub fn default_segments() -> Vec<(Segment, f64)> {
        vec![
            (Segment::Power, 0.15),
            (Segment::Regular, 0.35),
            (Segment::Casual, 0.35),
            (Segment::Churned, 0.15),
        ]
    }

    pub fn default_devices() -> Vec<(DeviceType, f64)> {
        vec![(DeviceType::Android, 0.72), (DeviceType::Ios, 0.28)]
    }

    pub fn default_channels() -> Vec<(AcquisitionChannel, f64)> {
        vec![
            (AcquisitionChannel::Organic, 0.35),
            (AcquisitionChannel::PaidSocial, 0.20),
            (AcquisitionChannel::AppStore, 0.15),
            (AcquisitionChannel::PaidSearch, 0.12),
            (AcquisitionChannel::Referral, 0.08),
            (AcquisitionChannel::Email, 0.05),
            (AcquisitionChannel::Direct, 0.05),
        ]
    }

    pub fn default_age_groups() -> Vec<(AgeGroup, f64)> {
        vec![
            (AgeGroup::Age18To24, 0.25),
            (AgeGroup::Age25To34, 0.35),
            (AgeGroup::Age35To44, 0.25),
            (AgeGroup::Age45To54, 0.10),
            (AgeGroup::Age55Plus, 0.05),
        ]
    }

    pub fn from_tables(
        segments: Vec<(Segment, f64)>,
        devices: Vec<(DeviceType, f64)>,
        channels: Vec<(AcquisitionChannel, f64)>,
        age_groups: Vec<(AgeGroup, f64)>,
    ) -> Result<Self, GeneratorError> {
        Ok(Self {
            segments: Categorical::new("segments", segments)?,
            devices: Categorical::new("devices", devices)?,
            channels: Categorical::new("channels", channels)?,
            age_groups: Categorical::new("age_groups", age_groups)?,
        })
    }

    pub fn standard() -> Result<Self, GeneratorError> {
        Self::from_tables(
            Self::default_segments(),
            Self::default_devices(),
            Self::default_channels(),
            Self::default_age_groups(),
        )
    }
}
