//! Activity records produced by the simulator and the aggregator

use chrono::NaiveDate;

use crate::distribution::{AcquisitionChannel, DeviceType, Segment};

/// One simulated usage session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub user_id: String,
    pub date: NaiveDate,
    /// Minutes, rounded to two decimals
    pub session_duration: f64,
    pub screens_viewed: u32,
    /// 1 for the first session of the day, else 0
    pub app_opens: u8,
    pub device_type: DeviceType,
    pub acquisition_channel: AcquisitionChannel,
    pub segment: Segment,
}

/// One row per (user, date) of the persisted table.
///
/// `acquisition_channel` is `None` once the missingness pass has blanked it;
/// it is written out as `unknown`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyUserRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub session_duration: f64,
    pub screens_viewed: u32,
    pub app_opens: u32,
    pub device_type: DeviceType,
    pub acquisition_channel: Option<AcquisitionChannel>,
    pub segment: Segment,
    pub daily_active_users: u32,
    pub retention_rate: f64,
}

/// Read-only view over a row of activity, shared by raw sessions and
/// already-aggregated daily rows.
pub trait ActivityRow {
    fn user_id(&self) -> &str;
    fn date(&self) -> NaiveDate;
    fn session_duration(&self) -> f64;
    fn screens_viewed(&self) -> u32;
    fn app_opens(&self) -> u32;
    fn device_type(&self) -> DeviceType;
    fn acquisition_channel(&self) -> Option<AcquisitionChannel>;
    fn segment(&self) -> Segment;
}

impl ActivityRow for SessionRecord {
    fn user_id(&self) -> &str {
        &self.user_id
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
    fn session_duration(&self) -> f64 {
        self.session_duration
    }
    fn screens_viewed(&self) -> u32 {
        self.screens_viewed
    }
    fn app_opens(&self) -> u32 {
        u32::from(self.app_opens)
    }
    fn device_type(&self) -> DeviceType {
        self.device_type
    }
    fn acquisition_channel(&self) -> Option<AcquisitionChannel> {
        Some(self.acquisition_channel)
    }
    fn segment(&self) -> Segment {
        self.segment
    }
}

impl ActivityRow for DailyUserRecord {
    fn user_id(&self) -> &str {
        &self.user_id
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
    fn session_duration(&self) -> f64 {
        self.session_duration
    }
    fn screens_viewed(&self) -> u32 {
        self.screens_viewed
    }
    fn app_opens(&self) -> u32 {
        self.app_opens
    }
    fn device_type(&self) -> DeviceType {
        self.device_type
    }
    fn acquisition_channel(&self) -> Option<AcquisitionChannel> {
        self.acquisition_channel
    }
    fn segment(&self) -> Segment {
        self.segment
    }
}
