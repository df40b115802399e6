//! Bookable slot models.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::Lifecycle;

/// An administratively defined bookable (provider, date, time) unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    /// Stable slot ID (UUID)
    pub id: String,
    /// Provider (doctor) this slot belongs to
    pub provider_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Staff-controlled availability, independent of whether it is booked
    pub available: bool,
    /// Soft-delete state; uniqueness only applies among active slots
    pub lifecycle: Lifecycle,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Slot {
    /// Create a new active, available slot.
    pub fn new(provider_id: String, date: NaiveDate, time: NaiveTime) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id,
            date,
            time,
            available: true,
            lifecycle: Lifecycle::Active,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Active and switched on by staff.
    pub fn is_bookable(&self) -> bool {
        self.is_active() && self.available
    }
}
