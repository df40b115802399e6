//! Appointment models and the appointment lifecycle state machine.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Appointment lifecycle status.
///
/// ```text
/// SCHEDULED → CONFIRMED → IN_PROGRESS → COMPLETED
///     │           │
///     └─────┬─────┘
///           ├──→ CANCELLED
///           └──→ NO_SHOW
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Statuses reachable from this one.
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Scheduled => &[Confirmed, Cancelled, NoShow],
            Confirmed => &[InProgress, Cancelled, NoShow],
            InProgress => &[Completed],
            // Terminal states
            Completed | Cancelled | NoShow => &[],
        }
    }

    /// Same-state moves are not transitions.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Date and time may still be changed.
    pub fn is_reschedulable(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::InProgress => "IN_PROGRESS",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of clinical encounter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    FirstVisit,
    Consultation,
    FollowUp,
    Telemedicine,
    Procedure,
    Exam,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 6] = [
        AppointmentType::FirstVisit,
        AppointmentType::Consultation,
        AppointmentType::FollowUp,
        AppointmentType::Telemedicine,
        AppointmentType::Procedure,
        AppointmentType::Exam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::FirstVisit => "FIRST_VISIT",
            AppointmentType::Consultation => "CONSULTATION",
            AppointmentType::FollowUp => "FOLLOW_UP",
            AppointmentType::Telemedicine => "TELEMEDICINE",
            AppointmentType::Procedure => "PROCEDURE",
            AppointmentType::Exam => "EXAM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&wanted))
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intake channel an appointment was booked through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingSource {
    /// Public booking form
    Public,
    /// Entered by a secretary
    Secretary,
    /// Migration/import job
    Import,
    /// Messaging channel (WhatsApp/Telegram)
    Messaging,
}

impl BookingSource {
    pub const ALL: [BookingSource; 4] = [
        BookingSource::Public,
        BookingSource::Secretary,
        BookingSource::Import,
        BookingSource::Messaging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSource::Public => "public",
            BookingSource::Secretary => "secretary",
            BookingSource::Import => "import",
            BookingSource::Messaging => "messaging",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for BookingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled clinical encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Stable appointment ID (UUID)
    pub id: String,
    pub contact_id: String,
    /// Set once the contact is formally registered as a patient
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    /// Pre-created slot this appointment occupies, if booked through one
    pub slot_id: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub appointment_type: AppointmentType,
    pub source: BookingSource,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Appointment {
    /// Start of the appointment window.
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Half-open `[start, end)` window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start(), self.duration_minutes)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Request to create an appointment. Date and time arrive as strings and are
/// validated by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub contact_id: String,
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    pub slot_id: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM` (or `HH:MM:SS` with zero seconds)
    pub time: String,
    /// Falls back to the configured default when absent
    pub duration_minutes: Option<u32>,
    pub appointment_type: AppointmentType,
    pub source: BookingSource,
    pub notes: Option<String>,
}

impl NewAppointment {
    pub fn new(
        contact_id: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        appointment_type: AppointmentType,
        source: BookingSource,
    ) -> Self {
        Self {
            contact_id: contact_id.into(),
            patient_id: None,
            provider_id: None,
            slot_id: None,
            date: date.into(),
            time: time.into(),
            duration_minutes: None,
            appointment_type,
            source,
            notes: None,
        }
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_slot(mut self, slot_id: impl Into<String>) -> Self {
        self.slot_id = Some(slot_id.into());
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, duration_minutes: u32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }

    /// Touching windows (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_transition_table() {
        use AppointmentStatus::*;

        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Scheduled.can_transition_to(NoShow));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(InProgress));
        assert!(!Scheduled.can_transition_to(Scheduled));
        assert!(!InProgress.can_transition_to(Cancelled));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in AppointmentStatus::ALL {
            if status.is_terminal() {
                assert!(status.valid_transitions().is_empty(), "{status} must be terminal");
                for next in AppointmentStatus::ALL {
                    assert!(!status.can_transition_to(next));
                }
            }
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(AppointmentStatus::parse("in_progress"), Some(AppointmentStatus::InProgress));
        assert_eq!(AppointmentStatus::parse("NO_SHOW"), Some(AppointmentStatus::NoShow));
        assert_eq!(AppointmentStatus::parse("done"), None);
    }

    #[test]
    fn test_type_and_source_parse() {
        assert_eq!(AppointmentType::parse("CONSULTATION"), Some(AppointmentType::Consultation));
        assert_eq!(AppointmentType::parse("follow-up"), Some(AppointmentType::FollowUp));
        assert_eq!(AppointmentType::parse("first visit"), Some(AppointmentType::FirstVisit));
        assert_eq!(AppointmentType::parse("surgery"), None);

        assert_eq!(BookingSource::parse("public"), Some(BookingSource::Public));
        assert_eq!(BookingSource::parse("Secretary"), Some(BookingSource::Secretary));
        assert_eq!(BookingSource::parse("fax"), None);
    }

    #[test]
    fn test_window_overlap() {
        let a = TimeWindow::new(at(9, 0), 30);
        let b = TimeWindow::new(at(9, 15), 30);
        let c = TimeWindow::new(at(9, 30), 30);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(b.overlaps(&c));
        // Back-to-back windows are fine
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn test_window_across_midnight() {
        let late = TimeWindow::new(at(23, 45), 30);
        let next_day = NaiveDate::from_ymd_opt(2024, 1, 16)
            .unwrap()
            .and_hms_opt(0, 5, 0)
            .unwrap();
        assert!(late.overlaps(&TimeWindow::new(next_day, 10)));
    }
}
