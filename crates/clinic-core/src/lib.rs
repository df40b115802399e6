//! Clinic Core Library
//!
//! Unified patient identity and appointment scheduling for clinic management.
//!
//! # Architecture
//!
//! ```text
//! Intake (public form, secretary, import, messaging)
//!                     │
//!         ┌───────────▼───────────┐
//!         │   Identity Resolver   │  normalize → exact match → merge/create
//!         └───────────┬───────────┘
//!                     │──────────────▶ Duplicate Detector ──▶ Review queue
//!                     │                (flags, never merges)   (staff only)
//!         ┌───────────▼───────────┐
//!         │     Slot Manager      │  (provider, date, time) unique
//!         └───────────┬───────────┘
//!                     │
//!         ┌───────────▼───────────┐
//!         │ Appointment Scheduler │  no overlap per patient / provider
//!         └───────────┬───────────┘
//!                     │
//!              Notification sink  (after commit, failures swallowed)
//! ```
//!
//! # Core Principle
//!
//! **Every check-then-act runs in one write transaction.** Two concurrent
//! bookings for the same patient window or the same slot cannot both succeed.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 name search
//! - [`models`]: Domain types (Contact, Patient, Slot, Appointment, etc.)
//! - [`identity`]: Identity resolver, duplicate detector, patient registry
//! - [`scheduling`]: Slot manager and appointment scheduler
//! - [`review`]: Staff review of duplicate candidates
//! - [`booking`]: Scheduling core tying the components together
//! - [`notify`]: Notification boundary

pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod review;
pub mod scheduling;

// Re-export commonly used types
pub use booking::{Booking, BookingRequest, SchedulingCore};
pub use config::CoreConfig;
pub use db::Database;
pub use error::{ConflictKind, CoreError, CoreResult, ErrorKind};
pub use identity::{DuplicateDetector, IdentityResolver, Normalizer, PatientRegistry};
pub use models::{
    Appointment, AppointmentStatus, AppointmentType, BookingSource, Contact, ContactDraft,
    DuplicateCandidate, DuplicateLevel, NewAppointment, Patient, ResolvedContact, Slot,
};
pub use notify::{ChannelNotifier, NoopNotifier, NotificationEvent, NotificationSink};
pub use review::MergeReview;
pub use scheduling::{AppointmentScheduler, SlotManager};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use models::{Lifecycle, DATE_FORMAT, TIME_FORMAT};

// =========================================================================
// FFI Error Type
// =========================================================================

/// Errors surfaced across the FFI boundary.
///
/// Conflicts are split by what the user should be told: the slot itself
/// (`SlotConflict`), "this time is taken" (`TimeTaken`) or "you already have
/// an appointment at this time" (`PatientBusy`).
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicCoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Slot conflict: {0}")]
    SlotConflict(String),

    #[error("Time taken: {0}")]
    TimeTaken(String),

    #[error("Patient busy: {0}")]
    PatientBusy(String),

    #[error("Registration conflict: {0}")]
    RegistrationConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<CoreError> for ClinicCoreError {
    fn from(e: CoreError) -> Self {
        let message = e.to_string();
        match e {
            CoreError::Validation(msg) => ClinicCoreError::Validation(msg),
            CoreError::NotFound(what) => ClinicCoreError::NotFound(what),
            CoreError::InvalidTransition { .. } => ClinicCoreError::InvalidTransition(message),
            CoreError::Database(_) => ClinicCoreError::Storage(message),
            CoreError::Conflict(kind) => {
                let detail = kind.to_string();
                match kind {
                    ConflictKind::SlotExists { .. } | ConflictKind::SlotOccupied { .. } => {
                        ClinicCoreError::SlotConflict(detail)
                    }
                    ConflictKind::SlotTaken { .. }
                    | ConflictKind::SlotUnavailable { .. }
                    | ConflictKind::ProviderOverlap { .. } => ClinicCoreError::TimeTaken(detail),
                    ConflictKind::PatientOverlap { .. } => ClinicCoreError::PatientBusy(detail),
                    ConflictKind::DocumentInUse { .. }
                    | ConflictKind::ContactAlreadyRegistered { .. } => {
                        ClinicCoreError::RegistrationConflict(detail)
                    }
                }
            }
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicCoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicCoreError::Storage(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path, configured from `CLINIC_*`
/// environment variables.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicCore>, ClinicCoreError> {
    let core = SchedulingCore::open(&path, CoreConfig::from_env())?;
    Ok(Arc::new(ClinicCore {
        core: Mutex::new(core),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicCore>, ClinicCoreError> {
    let core = SchedulingCore::open_in_memory(CoreConfig::default())?;
    Ok(Arc::new(ClinicCore {
        core: Mutex::new(core),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe scheduling core for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    core: Mutex<SchedulingCore>,
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Booking
    // =========================================================================

    /// Resolve the contact and book an appointment in one call.
    pub fn book(&self, request: FfiBookingRequest) -> Result<FfiBooking, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let request = BookingRequest::try_from(request)?;
        Ok(core.book(&request)?.into())
    }

    // =========================================================================
    // Identity Operations
    // =========================================================================

    /// Resolve raw contact fields to a canonical contact.
    pub fn resolve_contact(
        &self,
        contact: FfiContactInput,
    ) -> Result<FfiResolvedContact, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.resolve_contact(&contact.into())?.into())
    }

    /// Duplicate candidates for a stored contact.
    pub fn find_candidates(&self, contact_id: String) -> Result<Vec<FfiCandidate>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let candidates = core.find_candidates(&contact_id)?;
        Ok(candidates.into_iter().map(|c| c.into()).collect())
    }

    pub fn get_contact(&self, contact_id: String) -> Result<FfiContact, ClinicCoreError> {
        let core = self.core.lock()?;
        Ok(core.get_contact(&contact_id)?.into())
    }

    pub fn deactivate_contact(&self, contact_id: String) -> Result<FfiContact, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.deactivate_contact(&contact_id)?.into())
    }

    /// Register a contact as a patient (or reactivate one by document).
    pub fn register_patient(
        &self,
        contact_id: String,
        document_number: String,
    ) -> Result<FfiPatient, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.register_patient(&contact_id, &document_number)?.into())
    }

    pub fn deactivate_patient(&self, patient_id: String) -> Result<FfiPatient, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.deactivate_patient(&patient_id)?.into())
    }

    pub fn get_patient(&self, patient_id: String) -> Result<FfiPatient, ClinicCoreError> {
        let core = self.core.lock()?;
        Ok(core.get_patient(&patient_id)?.into())
    }

    /// The contact's active patient record, if registered.
    pub fn patient_for_contact(
        &self,
        contact_id: String,
    ) -> Result<Option<FfiPatient>, ClinicCoreError> {
        let core = self.core.lock()?;
        Ok(core.patient_for_contact(&contact_id)?.map(|p| p.into()))
    }

    // =========================================================================
    // Duplicate Review
    // =========================================================================

    pub fn list_pending_candidates(&self) -> Result<Vec<FfiCandidate>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let candidates = core.list_pending_candidates()?;
        Ok(candidates.into_iter().map(|c| c.into()).collect())
    }

    pub fn confirm_distinct(&self, candidate_id: String) -> Result<FfiCandidate, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.confirm_distinct(&candidate_id)?.into())
    }

    /// Merge `merge_id` into `keep_id` after staff confirmation.
    pub fn confirm_merge(
        &self,
        keep_id: String,
        merge_id: String,
    ) -> Result<FfiContact, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.confirm_merge(&keep_id, &merge_id)?.into())
    }

    // =========================================================================
    // Slot Operations
    // =========================================================================

    pub fn create_slot(
        &self,
        provider_id: String,
        date: String,
        time: String,
    ) -> Result<FfiSlot, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.create_slot(&provider_id, &date, &time)?.into())
    }

    pub fn toggle_slot(&self, slot_id: String) -> Result<FfiSlot, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.toggle_slot(&slot_id)?.into())
    }

    pub fn get_slot(&self, slot_id: String) -> Result<FfiSlot, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.get_slot(&slot_id)?.into())
    }

    pub fn delete_slot(&self, slot_id: String) -> Result<(), ClinicCoreError> {
        let mut core = self.core.lock()?;
        core.delete_slot(&slot_id)?;
        Ok(())
    }

    pub fn list_slots(
        &self,
        provider_id: String,
        from: String,
        to: String,
    ) -> Result<Vec<FfiSlot>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let slots = core.list_slots(&provider_id, &from, &to)?;
        Ok(slots.into_iter().map(|s| s.into()).collect())
    }

    /// Slots open for booking (public booking form view).
    pub fn list_available_slots(
        &self,
        provider_id: String,
        from: String,
        to: String,
    ) -> Result<Vec<FfiSlot>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let slots = core.list_available_slots(&provider_id, &from, &to)?;
        Ok(slots.into_iter().map(|s| s.into()).collect())
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    pub fn create_appointment(
        &self,
        request: FfiNewAppointment,
    ) -> Result<FfiAppointment, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let request = NewAppointment::try_from(request)?;
        Ok(core.create_appointment(&request)?.into())
    }

    /// Move an appointment to `status` (e.g. "CONFIRMED").
    pub fn update_status(
        &self,
        appointment_id: String,
        status: String,
    ) -> Result<FfiAppointment, ClinicCoreError> {
        let new_status = parse_status(&status)?;
        let mut core = self.core.lock()?;
        Ok(core.update_status(&appointment_id, new_status)?.into())
    }

    pub fn reschedule(
        &self,
        appointment_id: String,
        new_date: String,
        new_time: String,
    ) -> Result<FfiAppointment, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.reschedule(&appointment_id, &new_date, &new_time)?.into())
    }

    pub fn get_appointment(&self, appointment_id: String) -> Result<FfiAppointment, ClinicCoreError> {
        let mut core = self.core.lock()?;
        Ok(core.get_appointment(&appointment_id)?.into())
    }

    pub fn list_by_date(&self, date: String) -> Result<Vec<FfiAppointment>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let appointments = core.list_by_date(&date)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn list_by_patient(&self, patient_id: String) -> Result<Vec<FfiAppointment>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let appointments = core.list_by_patient(&patient_id)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    pub fn list_by_contact(&self, contact_id: String) -> Result<Vec<FfiAppointment>, ClinicCoreError> {
        let mut core = self.core.lock()?;
        let appointments = core.list_by_contact(&contact_id)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    /// Statuses reachable from `status` in one step.
    pub fn valid_transitions(&self, status: String) -> Result<Vec<String>, ClinicCoreError> {
        let status = parse_status(&status)?;
        Ok(status
            .valid_transitions()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect())
    }
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, ClinicCoreError> {
    AppointmentStatus::parse(raw)
        .ok_or_else(|| ClinicCoreError::Validation(format!("Unknown appointment status: {raw}")))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe raw contact fields.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiContactInput {
    pub name: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub document_number: Option<String>,
    pub source: Option<String>,
}

impl From<FfiContactInput> for ContactDraft {
    fn from(input: FfiContactInput) -> Self {
        ContactDraft {
            name: input.name,
            phone: input.phone,
            whatsapp: input.whatsapp,
            email: input.email,
            date_of_birth: input.date_of_birth,
            document_number: input.document_number,
            source: input.source,
        }
    }
}

/// FFI-safe contact.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiContact {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub document_number: Option<String>,
    pub sources: Vec<String>,
    pub active: bool,
    pub merged_into: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Contact> for FfiContact {
    fn from(contact: Contact) -> Self {
        Self {
            active: contact.lifecycle == Lifecycle::Active,
            id: contact.id,
            name: contact.name,
            phone: contact.phone,
            whatsapp: contact.whatsapp,
            email: contact.email,
            date_of_birth: contact.date_of_birth,
            document_number: contact.document_number,
            sources: contact.sources,
            merged_into: contact.merged_into,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        }
    }
}

/// FFI-safe duplicate candidate.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCandidate {
    pub id: String,
    pub contact_a: String,
    pub contact_b: String,
    pub score: f64,
    pub matched_fields: Vec<String>,
    /// "likely" or "possible"
    pub level: String,
    pub status: String,
    pub requires_review: bool,
}

impl From<DuplicateCandidate> for FfiCandidate {
    fn from(candidate: DuplicateCandidate) -> Self {
        Self {
            requires_review: candidate.requires_review(),
            matched_fields: candidate
                .matched_fields
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            level: candidate.level.as_str().to_string(),
            status: candidate.status.as_str().to_string(),
            id: candidate.id,
            contact_a: candidate.contact_a,
            contact_b: candidate.contact_b,
            score: candidate.score,
        }
    }
}

/// FFI-safe resolution outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiResolvedContact {
    pub contact: FfiContact,
    pub is_new: bool,
    pub duplicate_candidates: Vec<FfiCandidate>,
}

impl From<ResolvedContact> for FfiResolvedContact {
    fn from(resolved: ResolvedContact) -> Self {
        Self {
            contact: resolved.contact.into(),
            is_new: resolved.is_new,
            duplicate_candidates: resolved
                .duplicate_candidates
                .into_iter()
                .map(|c| c.into())
                .collect(),
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub contact_id: String,
    pub document_number: String,
    pub medical_record_number: i64,
    pub active: bool,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            active: patient.is_active(),
            id: patient.id,
            contact_id: patient.contact_id,
            document_number: patient.document_number,
            medical_record_number: patient.medical_record_number,
        }
    }
}

/// FFI-safe slot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSlot {
    pub id: String,
    pub provider_id: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub available: bool,
    pub active: bool,
}

impl From<Slot> for FfiSlot {
    fn from(slot: Slot) -> Self {
        Self {
            active: slot.is_active(),
            date: slot.date.format(DATE_FORMAT).to_string(),
            time: slot.time.format(TIME_FORMAT).to_string(),
            id: slot.id,
            provider_id: slot.provider_id,
            available: slot.available,
        }
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub contact_id: String,
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    pub slot_id: Option<String>,
    pub date: String,
    pub time: String,
    pub duration_minutes: u32,
    pub appointment_type: String,
    pub source: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            date: appointment.date.format(DATE_FORMAT).to_string(),
            time: appointment.time.format(TIME_FORMAT).to_string(),
            appointment_type: appointment.appointment_type.as_str().to_string(),
            source: appointment.source.as_str().to_string(),
            status: appointment.status.as_str().to_string(),
            id: appointment.id,
            contact_id: appointment.contact_id,
            patient_id: appointment.patient_id,
            provider_id: appointment.provider_id,
            slot_id: appointment.slot_id,
            duration_minutes: appointment.duration_minutes,
            notes: appointment.notes,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

/// FFI-safe appointment request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewAppointment {
    pub contact_id: String,
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    pub slot_id: Option<String>,
    pub date: String,
    pub time: String,
    pub duration_minutes: Option<u32>,
    /// e.g. "CONSULTATION", "FIRST_VISIT"
    pub appointment_type: String,
    /// e.g. "public", "secretary"
    pub source: String,
    pub notes: Option<String>,
}

impl TryFrom<FfiNewAppointment> for NewAppointment {
    type Error = ClinicCoreError;

    fn try_from(request: FfiNewAppointment) -> Result<Self, Self::Error> {
        Ok(NewAppointment {
            appointment_type: parse_type(&request.appointment_type)?,
            source: parse_source(&request.source)?,
            contact_id: request.contact_id,
            patient_id: request.patient_id,
            provider_id: request.provider_id,
            slot_id: request.slot_id,
            date: request.date,
            time: request.time,
            duration_minutes: request.duration_minutes,
            notes: request.notes,
        })
    }
}

/// FFI-safe booking request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBookingRequest {
    pub contact: FfiContactInput,
    pub provider_id: Option<String>,
    pub date: String,
    pub time: String,
    pub duration_minutes: Option<u32>,
    pub appointment_type: String,
    pub source: String,
    pub notes: Option<String>,
}

impl TryFrom<FfiBookingRequest> for BookingRequest {
    type Error = ClinicCoreError;

    fn try_from(request: FfiBookingRequest) -> Result<Self, Self::Error> {
        Ok(BookingRequest {
            appointment_type: parse_type(&request.appointment_type)?,
            source: parse_source(&request.source)?,
            contact: request.contact.into(),
            provider_id: request.provider_id,
            date: request.date,
            time: request.time,
            duration_minutes: request.duration_minutes,
            notes: request.notes,
        })
    }
}

/// FFI-safe booking outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBooking {
    pub contact: FfiResolvedContact,
    pub appointment: FfiAppointment,
}

impl From<Booking> for FfiBooking {
    fn from(booking: Booking) -> Self {
        Self {
            contact: booking.resolution.into(),
            appointment: booking.appointment.into(),
        }
    }
}

fn parse_type(raw: &str) -> Result<AppointmentType, ClinicCoreError> {
    AppointmentType::parse(raw)
        .ok_or_else(|| ClinicCoreError::Validation(format!("Unknown appointment type: {raw}")))
}

fn parse_source(raw: &str) -> Result<BookingSource, ClinicCoreError> {
    BookingSource::parse(raw)
        .ok_or_else(|| ClinicCoreError::Validation(format!("Unknown booking source: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> FfiContactInput {
        FfiContactInput {
            name: "Ana Silva".into(),
            phone: None,
            whatsapp: Some("11987654321".into()),
            email: None,
            date_of_birth: None,
            document_number: None,
            source: Some("public-scheduling".into()),
        }
    }

    #[test]
    fn test_ffi_booking_flow() {
        let core = open_database_in_memory().unwrap();
        core.create_slot("p1".into(), "2024-01-15".into(), "09:00".into())
            .unwrap();

        let booking = core
            .book(FfiBookingRequest {
                contact: ana(),
                provider_id: Some("p1".into()),
                date: "2024-01-15".into(),
                time: "09:00".into(),
                duration_minutes: None,
                appointment_type: "consultation".into(),
                source: "public".into(),
                notes: None,
            })
            .unwrap();
        assert!(booking.contact.is_new);
        assert_eq!(booking.appointment.status, "SCHEDULED");
        assert_eq!(booking.appointment.time, "09:00");

        let err = core
            .update_status(booking.appointment.id.clone(), "COMPLETED".into())
            .unwrap_err();
        assert!(matches!(err, ClinicCoreError::InvalidTransition(_)));

        let confirmed = core
            .update_status(booking.appointment.id.clone(), "confirmed".into())
            .unwrap();
        assert_eq!(confirmed.status, "CONFIRMED");
        assert_eq!(
            core.valid_transitions("CONFIRMED".into()).unwrap(),
            vec!["IN_PROGRESS", "CANCELLED", "NO_SHOW"]
        );
    }

    #[test]
    fn test_conflicts_map_to_distinct_errors() {
        let core = open_database_in_memory().unwrap();
        core.create_slot("p1".into(), "2024-01-15".into(), "09:00".into())
            .unwrap();
        let err = core
            .create_slot("p1".into(), "2024-01-15".into(), "09:00".into())
            .unwrap_err();
        assert!(matches!(err, ClinicCoreError::SlotConflict(_)));

        let resolved = core.resolve_contact(ana()).unwrap();
        let request = FfiNewAppointment {
            contact_id: resolved.contact.id.clone(),
            patient_id: None,
            provider_id: None,
            slot_id: None,
            date: "2024-01-15".into(),
            time: "10:00".into(),
            duration_minutes: None,
            appointment_type: "FOLLOW_UP".into(),
            source: "secretary".into(),
            notes: None,
        };
        core.create_appointment(request.clone()).unwrap();
        let err = core.create_appointment(request).unwrap_err();
        assert!(matches!(err, ClinicCoreError::PatientBusy(_)));
    }

    #[test]
    fn test_unknown_enums_rejected() {
        let core = open_database_in_memory().unwrap();
        let err = core.valid_transitions("DONE".into()).unwrap_err();
        assert!(matches!(err, ClinicCoreError::Validation(_)));
    }
}
