//! Appointment scheduler: creation, status transitions and rescheduling.
//!
//! Every check-then-act sequence runs inside one `BEGIN IMMEDIATE`
//! transaction, so two concurrent bookings can never both observe "no
//! overlap" for the same patient or provider.

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, warn};

use super::{parse_date, parse_time, require_id};
use crate::config::CoreConfig;
use crate::db::Database;
use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::models::{Appointment, AppointmentStatus, NewAppointment, TimeWindow};
use crate::notify::{emit_logged, NotificationEvent, NotificationKind, NotificationSink};

/// Allocates appointments and drives their lifecycle.
pub struct AppointmentScheduler<'a> {
    db: &'a mut Database,
    config: CoreConfig,
    notifier: &'a dyn NotificationSink,
}

impl<'a> AppointmentScheduler<'a> {
    /// Create a new scheduler.
    pub fn new(
        db: &'a mut Database,
        config: &CoreConfig,
        notifier: &'a dyn NotificationSink,
    ) -> Self {
        Self {
            db,
            config: config.clone(),
            notifier,
        }
    }

    /// Create an appointment in `SCHEDULED`.
    pub fn create_appointment(&mut self, request: &NewAppointment) -> CoreResult<Appointment> {
        self.create(request, false)
    }

    /// Create an appointment, booking it into the provider's active slot at
    /// that time when the request names no slot. The slot is looked up in
    /// the booking transaction; without one the appointment is slotless.
    pub(crate) fn create_in_matching_slot(
        &mut self,
        request: &NewAppointment,
    ) -> CoreResult<Appointment> {
        self.create(request, true)
    }

    fn create(&mut self, request: &NewAppointment, match_slot: bool) -> CoreResult<Appointment> {
        let contact_id = require_id(&request.contact_id, "contact id")?;
        let date = parse_date(&request.date)?;
        let time = parse_time(&request.time)?;
        let duration = self.duration_for(request.duration_minutes)?;
        let provider_id = request
            .provider_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);

        let config = &self.config;
        let appointment = self.db.immediate(|db| {
            let input = BookingInput {
                contact_id: &contact_id,
                patient_id: request.patient_id.as_deref(),
                provider_id: provider_id.as_deref(),
                slot_id: request.slot_id.as_deref(),
                match_slot,
                date,
                time,
                duration,
            };
            create_in(db, config, &input, request)
        })?;

        info!(
            "Created appointment {} for contact {} on {} at {}",
            appointment.id, appointment.contact_id, appointment.date, appointment.time
        );
        emit_logged(
            self.notifier,
            NotificationEvent::for_appointment(NotificationKind::AppointmentCreated, &appointment),
        );
        Ok(appointment)
    }

    /// Move an appointment to a new status along the transition table.
    pub fn update_status(
        &mut self,
        appointment_id: &str,
        new_status: AppointmentStatus,
    ) -> CoreResult<Appointment> {
        let appointment = self.db.immediate(|db| -> CoreResult<Appointment> {
            let mut appointment = get_in(db, appointment_id)?;

            if !appointment.status.can_transition_to(new_status) {
                warn!(
                    "Rejected transition {} -> {} for appointment {}",
                    appointment.status, new_status, appointment.id
                );
                return Err(CoreError::InvalidTransition {
                    from: appointment.status,
                    requested: format!("move to {new_status}"),
                });
            }

            appointment.status = new_status;
            appointment.touch();
            db.update_appointment(&appointment)?;
            Ok(appointment)
        })?;

        info!("Appointment {} is now {}", appointment.id, appointment.status);

        let kind = match new_status {
            AppointmentStatus::Confirmed => Some(NotificationKind::AppointmentConfirmed),
            AppointmentStatus::Cancelled => Some(NotificationKind::AppointmentCancelled),
            _ => None,
        };
        if let Some(kind) = kind {
            emit_logged(
                self.notifier,
                NotificationEvent::for_appointment(kind, &appointment),
            );
        }
        Ok(appointment)
    }

    /// Move a `SCHEDULED` or `CONFIRMED` appointment to a new date and time.
    ///
    /// The overlap checks run against the new window, ignoring the
    /// appointment itself. The old slot is released; a free slot of the same
    /// provider at the new time is taken if one exists.
    pub fn reschedule(
        &mut self,
        appointment_id: &str,
        new_date: &str,
        new_time: &str,
    ) -> CoreResult<Appointment> {
        let date = parse_date(new_date)?;
        let time = parse_time(new_time)?;

        let config = &self.config;
        let appointment = self.db.immediate(|db| -> CoreResult<Appointment> {
            let mut appointment = get_in(db, appointment_id)?;

            if !appointment.status.is_reschedulable() {
                warn!(
                    "Rejected reschedule of appointment {} in state {}",
                    appointment.id, appointment.status
                );
                return Err(CoreError::InvalidTransition {
                    from: appointment.status,
                    requested: "reschedule".into(),
                });
            }

            let window = TimeWindow::new(date.and_time(time), appointment.duration_minutes);
            check_overlaps(
                db,
                config,
                &appointment.contact_id,
                appointment.patient_id.as_deref(),
                appointment.provider_id.as_deref(),
                &window,
                Some(appointment.id.as_str()),
            )?;

            let mut new_slot = None;
            if let Some(provider_id) = &appointment.provider_id {
                if let Some(slot) = db.find_active_slot(provider_id, &date, &time)? {
                    let occupant = db.find_open_appointment_in_slot(&slot.id)?;
                    if slot.available && occupant.map_or(true, |a| a.id == appointment.id) {
                        new_slot = Some(slot.id);
                    }
                }
            }

            appointment.date = date;
            appointment.time = time;
            appointment.slot_id = new_slot;
            appointment.touch();
            db.update_appointment(&appointment)?;
            Ok(appointment)
        })?;

        info!(
            "Rescheduled appointment {} to {} at {}",
            appointment.id, appointment.date, appointment.time
        );
        emit_logged(
            self.notifier,
            NotificationEvent::for_appointment(
                NotificationKind::AppointmentRescheduled,
                &appointment,
            ),
        );
        Ok(appointment)
    }

    pub fn get_appointment(&self, appointment_id: &str) -> CoreResult<Appointment> {
        get_in(&*self.db, appointment_id)
    }

    /// Appointments on a date, by time then creation order.
    pub fn list_by_date(&self, date: &str) -> CoreResult<Vec<Appointment>> {
        let date = parse_date(date)?;
        Ok(self.db.list_appointments_by_date(&date)?)
    }

    /// Appointments of a patient (or the patient's contact), by date then time.
    pub fn list_by_patient(&self, patient_id: &str) -> CoreResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_by_patient(patient_id)?)
    }

    /// Appointments booked for a contact, by date then time.
    pub fn list_by_contact(&self, contact_id: &str) -> CoreResult<Vec<Appointment>> {
        Ok(self.db.list_appointments_by_contact(contact_id)?)
    }

    fn duration_for(&self, requested: Option<u32>) -> CoreResult<u32> {
        let minutes = requested.unwrap_or(self.config.default_duration_minutes);
        if minutes == 0 || minutes > self.config.max_duration_minutes {
            return Err(CoreError::validation(format!(
                "duration must be between 1 and {} minutes, got {}",
                self.config.max_duration_minutes, minutes
            )));
        }
        Ok(minutes)
    }
}

/// Validated booking inputs.
pub(crate) struct BookingInput<'r> {
    pub contact_id: &'r str,
    pub patient_id: Option<&'r str>,
    pub provider_id: Option<&'r str>,
    pub slot_id: Option<&'r str>,
    /// Look up the provider's slot at `date`/`time` when `slot_id` is empty
    pub match_slot: bool,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration: u32,
}

/// Create an appointment inside the caller's transaction.
pub(crate) fn create_in(
    db: &Database,
    config: &CoreConfig,
    booking: &BookingInput<'_>,
    request: &NewAppointment,
) -> CoreResult<Appointment> {
    let contact = db
        .get_contact(booking.contact_id)?
        .ok_or_else(|| CoreError::not_found("contact", booking.contact_id))?;
    if !contact.is_active() {
        return Err(CoreError::validation(format!(
            "contact {} is inactive",
            contact.id
        )));
    }

    let patient_id = match booking.patient_id {
        Some(patient_id) => {
            let patient = db
                .get_patient(patient_id)?
                .filter(|p| p.is_active())
                .ok_or_else(|| CoreError::not_found("patient", patient_id))?;
            if patient.contact_id != contact.id {
                return Err(CoreError::validation(format!(
                    "patient {} is not registered for contact {}",
                    patient.id, contact.id
                )));
            }
            Some(patient.id)
        }
        None => db.get_active_patient_for_contact(&contact.id)?.map(|p| p.id),
    };

    let mut provider_id = booking.provider_id.map(String::from);
    let slot_id = match (booking.slot_id, booking.provider_id) {
        (Some(slot_id), _) => Some(slot_id.to_string()),
        (None, Some(provider)) if booking.match_slot => db
            .find_active_slot(provider, &booking.date, &booking.time)?
            .map(|slot| slot.id),
        _ => None,
    };

    if let Some(slot_id) = slot_id.as_deref() {
        let slot = db
            .get_slot(slot_id)?
            .filter(|s| s.is_active())
            .ok_or_else(|| CoreError::not_found("slot", slot_id))?;

        if slot.date != booking.date || slot.time != booking.time {
            return Err(CoreError::validation(format!(
                "slot {} is for {} at {}",
                slot.id, slot.date, slot.time
            )));
        }
        if provider_id.as_deref().is_some_and(|p| p != slot.provider_id) {
            return Err(CoreError::validation(format!(
                "slot {} belongs to provider {}",
                slot.id, slot.provider_id
            )));
        }
        if !slot.available {
            warn!("Slot {} is switched off", slot.id);
            return Err(ConflictKind::SlotUnavailable { slot_id: slot.id }.into());
        }
        if let Some(occupant) = db.find_open_appointment_in_slot(&slot.id)? {
            let same_person = occupant.contact_id == contact.id
                || (patient_id.is_some() && occupant.patient_id == patient_id);
            if same_person {
                warn!(
                    "Contact {} already holds slot {} with appointment {}",
                    contact.id, slot.id, occupant.id
                );
                return Err(ConflictKind::PatientOverlap {
                    appointment_id: occupant.id,
                }
                .into());
            }
            warn!("Slot {} is already booked", slot.id);
            return Err(ConflictKind::SlotTaken { slot_id: slot.id }.into());
        }
        provider_id = Some(slot.provider_id);
    }

    let window = TimeWindow::new(booking.date.and_time(booking.time), booking.duration);
    check_overlaps(
        db,
        config,
        &contact.id,
        patient_id.as_deref(),
        provider_id.as_deref(),
        &window,
        None,
    )?;

    let now = chrono::Utc::now().to_rfc3339();
    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        contact_id: contact.id,
        patient_id,
        provider_id,
        slot_id,
        date: booking.date,
        time: booking.time,
        duration_minutes: booking.duration,
        appointment_type: request.appointment_type,
        source: request.source,
        status: AppointmentStatus::Scheduled,
        notes: request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_appointment(&appointment)?;
    Ok(appointment)
}

/// Reject a window overlapping another non-terminal appointment of the same
/// person or the same provider.
fn check_overlaps(
    db: &Database,
    config: &CoreConfig,
    contact_id: &str,
    patient_id: Option<&str>,
    provider_id: Option<&str>,
    window: &TimeWindow,
    exclude_id: Option<&str>,
) -> CoreResult<()> {
    // Anything starting earlier than this cannot reach into the window
    let lookback = Duration::minutes(i64::from(config.max_duration_minutes));
    let from = (window.start - lookback).date();
    let to = window.end.date();

    let clashes = |candidates: Vec<Appointment>| {
        candidates
            .into_iter()
            .filter(|a| Some(a.id.as_str()) != exclude_id)
            .find(|a| a.window().overlaps(window))
    };

    let own = db.list_open_appointments_for_subject(contact_id, patient_id, &from, &to)?;
    if let Some(existing) = clashes(own) {
        warn!(
            "Contact {} already has appointment {} at {} {}",
            contact_id, existing.id, existing.date, existing.time
        );
        return Err(ConflictKind::PatientOverlap {
            appointment_id: existing.id,
        }
        .into());
    }

    if let Some(provider_id) = provider_id {
        let booked = db.list_open_appointments_for_provider(provider_id, &from, &to)?;
        if let Some(existing) = clashes(booked) {
            warn!(
                "Provider {} already has appointment {} at {} {}",
                provider_id, existing.id, existing.date, existing.time
            );
            return Err(ConflictKind::ProviderOverlap {
                appointment_id: existing.id,
            }
            .into());
        }
    }

    debug!("No overlap for window starting {}", window.start);
    Ok(())
}

/// Reject moving `incoming` appointments under a person (contact and/or
/// patient) who already holds an overlapping open appointment.
pub(crate) fn check_person_overlaps(
    db: &Database,
    contact_id: Option<&str>,
    patient_id: Option<&str>,
    incoming: &[Appointment],
) -> CoreResult<()> {
    let held = db.list_open_appointments_for_person(contact_id, patient_id)?;
    for existing in held
        .iter()
        .filter(|h| !incoming.iter().any(|a| a.id == h.id))
    {
        if let Some(moving) = incoming
            .iter()
            .find(|a| a.window().overlaps(&existing.window()))
        {
            warn!(
                "Appointment {} would overlap appointment {} at {} {}",
                moving.id, existing.id, existing.date, existing.time
            );
            return Err(ConflictKind::PatientOverlap {
                appointment_id: existing.id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn get_in(db: &Database, appointment_id: &str) -> CoreResult<Appointment> {
    db.get_appointment(appointment_id)?
        .ok_or_else(|| CoreError::not_found("appointment", appointment_id))
}
