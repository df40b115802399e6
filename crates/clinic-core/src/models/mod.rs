//! Domain models for the clinic identity and scheduling core.

mod appointment;
mod contact;
mod duplicate;
mod patient;
mod slot;

pub use appointment::*;
pub use contact::*;
pub use duplicate::*;
pub use patient::*;
pub use slot::*;

use serde::{Deserialize, Serialize};

/// Entity lifecycle used in place of physical deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Inactive,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Active => "active",
            Lifecycle::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Lifecycle::Active),
            "inactive" => Some(Lifecycle::Inactive),
            _ => None,
        }
    }
}

/// Date format used for storage and the query surface.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time-of-day format used for storage and the query surface.
pub const TIME_FORMAT: &str = "%H:%M";
