//! Scheduling core: one entry point over identity, slots and appointments.
//!
//! Booking flow: Resolve contact → Attach patient → Find slot → Create
//! appointment → Notify

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CoreConfig;
use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::identity::{IdentityResolver, PatientRegistry};
use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, BookingSource, Contact, ContactDraft,
    DuplicateCandidate, NewAppointment, Patient, ResolvedContact, Slot,
};
use crate::notify::{NoopNotifier, NotificationSink};
use crate::review::MergeReview;
use crate::scheduling::{parse_date, parse_time, AppointmentScheduler, SlotManager};

/// An intake request from a booking channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    /// Raw contact fields as typed into the channel
    pub contact: ContactDraft,
    pub provider_id: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub duration_minutes: Option<u32>,
    pub appointment_type: AppointmentType,
    pub source: BookingSource,
    pub notes: Option<String>,
}

/// Outcome of a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    /// Resolved contact, with any duplicate candidates flagged on the way
    pub resolution: ResolvedContact,
    pub appointment: Appointment,
}

impl Booking {
    pub fn duplicate_candidates(&self) -> &[DuplicateCandidate] {
        &self.resolution.duplicate_candidates
    }
}

/// Owns the database connection and hands it to each component per call.
pub struct SchedulingCore {
    db: Database,
    config: CoreConfig,
    notifier: Arc<dyn NotificationSink>,
}

impl SchedulingCore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: CoreConfig) -> CoreResult<Self> {
        config.validate().map_err(CoreError::Validation)?;
        let db = Database::open_with_timeout(path, config.busy_timeout())?;
        Ok(Self::with_database(db, config))
    }

    /// In-memory core (for testing).
    pub fn open_in_memory(config: CoreConfig) -> CoreResult<Self> {
        config.validate().map_err(CoreError::Validation)?;
        Ok(Self::with_database(Database::open_in_memory()?, config))
    }

    pub fn with_database(db: Database, config: CoreConfig) -> Self {
        Self {
            db,
            config,
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Route appointment events to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Get raw database (for advanced queries).
    pub fn database(&self) -> &Database {
        &self.db
    }

    // =====================================================================
    // Booking
    // =====================================================================

    /// Book an appointment from raw intake fields.
    ///
    /// The contact is resolved (and committed) first, so a rejected booking
    /// still records who asked. When a provider is given and has an active
    /// slot at the requested time, the appointment is booked into that slot.
    pub fn book(&mut self, request: &BookingRequest) -> CoreResult<Booking> {
        // Malformed input records nothing
        parse_date(&request.date)?;
        parse_time(&request.time)?;

        let resolution = self.resolve_contact(&request.contact)?;

        let mut new = NewAppointment::new(
            resolution.contact.id.clone(),
            request.date.clone(),
            request.time.clone(),
            request.appointment_type,
            request.source,
        );
        new.duration_minutes = request.duration_minutes;
        new.notes = request.notes.clone();
        new.provider_id = request.provider_id.clone();

        let appointment = self.scheduler().create_in_matching_slot(&new)?;
        info!(
            "Booked appointment {} for contact {} (new contact: {})",
            appointment.id, resolution.contact.id, resolution.is_new
        );

        Ok(Booking {
            resolution,
            appointment,
        })
    }

    // =====================================================================
    // Identity
    // =====================================================================

    pub fn resolve_contact(&mut self, draft: &ContactDraft) -> CoreResult<ResolvedContact> {
        IdentityResolver::new(&mut self.db, &self.config).resolve(draft)
    }

    /// Fresh duplicate candidates for a stored contact (not recorded).
    pub fn find_candidates(&mut self, contact_id: &str) -> CoreResult<Vec<DuplicateCandidate>> {
        IdentityResolver::new(&mut self.db, &self.config).find_candidates(contact_id)
    }

    pub fn get_contact(&self, contact_id: &str) -> CoreResult<Contact> {
        self.db
            .get_contact(contact_id)?
            .ok_or_else(|| CoreError::not_found("contact", contact_id))
    }

    pub fn deactivate_contact(&mut self, contact_id: &str) -> CoreResult<Contact> {
        IdentityResolver::new(&mut self.db, &self.config).deactivate(contact_id)
    }

    pub fn register_patient(
        &mut self,
        contact_id: &str,
        document_number: &str,
    ) -> CoreResult<Patient> {
        PatientRegistry::new(&mut self.db).register(contact_id, document_number)
    }

    pub fn deactivate_patient(&mut self, patient_id: &str) -> CoreResult<Patient> {
        PatientRegistry::new(&mut self.db).deactivate(patient_id)
    }

    pub fn get_patient(&self, patient_id: &str) -> CoreResult<Patient> {
        self.db
            .get_patient(patient_id)?
            .ok_or_else(|| CoreError::not_found("patient", patient_id))
    }

    /// The active patient registered for a contact, if any.
    pub fn patient_for_contact(&self, contact_id: &str) -> CoreResult<Option<Patient>> {
        Ok(self.db.get_active_patient_for_contact(contact_id)?)
    }

    // =====================================================================
    // Duplicate review
    // =====================================================================

    pub fn list_pending_candidates(&mut self) -> CoreResult<Vec<DuplicateCandidate>> {
        MergeReview::new(&mut self.db).list_pending_candidates()
    }

    pub fn confirm_distinct(&mut self, candidate_id: &str) -> CoreResult<DuplicateCandidate> {
        MergeReview::new(&mut self.db).confirm_distinct(candidate_id)
    }

    pub fn confirm_merge(&mut self, keep_id: &str, merge_id: &str) -> CoreResult<Contact> {
        MergeReview::new(&mut self.db).confirm_merge(keep_id, merge_id)
    }

    // =====================================================================
    // Slots
    // =====================================================================

    pub fn create_slot(&mut self, provider_id: &str, date: &str, time: &str) -> CoreResult<Slot> {
        SlotManager::new(&mut self.db).create_slot(provider_id, date, time)
    }

    pub fn toggle_slot(&mut self, slot_id: &str) -> CoreResult<Slot> {
        SlotManager::new(&mut self.db).toggle_slot(slot_id)
    }

    pub fn delete_slot(&mut self, slot_id: &str) -> CoreResult<()> {
        SlotManager::new(&mut self.db).delete_slot(slot_id)
    }

    pub fn get_slot(&mut self, slot_id: &str) -> CoreResult<Slot> {
        SlotManager::new(&mut self.db).get_slot(slot_id)
    }

    pub fn list_slots(&mut self, provider_id: &str, from: &str, to: &str) -> CoreResult<Vec<Slot>> {
        SlotManager::new(&mut self.db).list_slots(provider_id, from, to)
    }

    pub fn list_available_slots(
        &mut self,
        provider_id: &str,
        from: &str,
        to: &str,
    ) -> CoreResult<Vec<Slot>> {
        SlotManager::new(&mut self.db).list_available_slots(provider_id, from, to)
    }

    // =====================================================================
    // Appointments
    // =====================================================================

    pub fn create_appointment(&mut self, request: &NewAppointment) -> CoreResult<Appointment> {
        self.scheduler().create_appointment(request)
    }

    pub fn update_status(
        &mut self,
        appointment_id: &str,
        new_status: AppointmentStatus,
    ) -> CoreResult<Appointment> {
        self.scheduler().update_status(appointment_id, new_status)
    }

    pub fn reschedule(
        &mut self,
        appointment_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> CoreResult<Appointment> {
        self.scheduler().reschedule(appointment_id, new_date, new_time)
    }

    pub fn get_appointment(&mut self, appointment_id: &str) -> CoreResult<Appointment> {
        self.scheduler().get_appointment(appointment_id)
    }

    pub fn list_by_date(&mut self, date: &str) -> CoreResult<Vec<Appointment>> {
        self.scheduler().list_by_date(date)
    }

    pub fn list_by_patient(&mut self, patient_id: &str) -> CoreResult<Vec<Appointment>> {
        self.scheduler().list_by_patient(patient_id)
    }

    pub fn list_by_contact(&mut self, contact_id: &str) -> CoreResult<Vec<Appointment>> {
        self.scheduler().list_by_contact(contact_id)
    }

    fn scheduler(&mut self) -> AppointmentScheduler<'_> {
        AppointmentScheduler::new(&mut self.db, &self.config, self.notifier.as_ref())
    }
}
