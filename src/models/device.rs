use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered push-eligible device.
///
/// `push_time` is a wall-clock time of day in the single fixed delivery
/// timezone. `last_push_date` is the once-per-day delivery latch: once it
/// equals today, the device is out of the candidate set until tomorrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub account_id: String,
    pub push_token: String,
    pub lang: String,
    pub push_time: NaiveTime,
    pub is_active: bool,
    pub last_push_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub account_id: String,
    pub push_token: String,
    pub lang: String,
    pub push_time: NaiveTime,
}
