//! Patient registration on top of resolved contacts.

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::models::{Lifecycle, Patient};
use crate::scheduling::check_person_overlaps;

use super::normalizer::normalize_document;

/// Registers contacts as patients, one active patient per document number.
pub struct PatientRegistry<'a> {
    db: &'a mut Database,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Register a contact as a patient.
    ///
    /// Re-registering the same contact with the same document returns the
    /// existing patient. A soft-deleted patient with the document is
    /// reactivated instead of duplicated; its appointments are left as they are,
    /// and reactivation fails with `Conflict(PatientOverlap)` if one of its
    /// open appointments overlaps one of the contact's.
    pub fn register(&mut self, contact_id: &str, document_number: &str) -> CoreResult<Patient> {
        let document = normalize_document(document_number)
            .ok_or_else(|| CoreError::validation("document number is required"))?;

        self.db.immediate(|db| register_in(db, contact_id, &document))
    }

    /// Soft-deactivate a patient.
    pub fn deactivate(&mut self, patient_id: &str) -> CoreResult<Patient> {
        self.db.immediate(|db| {
            let mut patient = db
                .get_patient(patient_id)?
                .ok_or_else(|| CoreError::not_found("patient", patient_id))?;

            if patient.is_active() {
                patient.lifecycle = Lifecycle::Inactive;
                patient.updated_at = chrono::Utc::now().to_rfc3339();
                db.update_patient(&patient)?;
                info!("Deactivated patient {}", patient.id);
            }
            Ok(patient)
        })
    }
}

fn register_in(db: &Database, contact_id: &str, document: &str) -> CoreResult<Patient> {
    let mut contact = db
        .get_contact(contact_id)?
        .ok_or_else(|| CoreError::not_found("contact", contact_id))?;
    if !contact.is_active() {
        return Err(CoreError::validation(format!(
            "contact {contact_id} is inactive"
        )));
    }

    if let Some(active) = db.get_active_patient_by_document(document)? {
        if active.contact_id == contact_id {
            return Ok(active);
        }
        warn!("Document already registered to patient {}", active.id);
        return Err(ConflictKind::DocumentInUse {
            document: document.to_string(),
        }
        .into());
    }

    if let Some(existing) = db.get_active_patient_for_contact(contact_id)? {
        warn!(
            "Contact {} already registered as patient {} with another document",
            contact_id, existing.id
        );
        return Err(ConflictKind::ContactAlreadyRegistered {
            patient_id: existing.id,
        }
        .into());
    }

    let patient = match db.get_inactive_patient_by_document(document)? {
        Some(mut previous) => {
            // Appointments still linked to the old record join this contact's
            let incoming =
                db.list_open_appointments_for_person(None, Some(previous.id.as_str()))?;
            check_person_overlaps(db, Some(contact_id), None, &incoming)?;

            previous.lifecycle = Lifecycle::Active;
            previous.contact_id = contact_id.to_string();
            previous.updated_at = chrono::Utc::now().to_rfc3339();
            db.update_patient(&previous)?;
            info!(
                "Reactivated patient {} (record {})",
                previous.id, previous.medical_record_number
            );
            previous
        }
        None => {
            let patient = Patient::new(
                contact_id.to_string(),
                document.to_string(),
                db.next_medical_record_number()?,
            );
            db.insert_patient(&patient).map_err(|e| {
                if e.is_constraint_violation() {
                    CoreError::from(ConflictKind::DocumentInUse {
                        document: document.to_string(),
                    })
                } else {
                    e.into()
                }
            })?;
            info!(
                "Registered patient {} (record {})",
                patient.id, patient.medical_record_number
            );
            patient
        }
    };

    if contact.document_number.is_none() {
        contact.document_number = Some(document.to_string());
        contact.touch();
        db.update_contact(&contact)?;
    }

    Ok(patient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, ContactDraft};

    fn setup() -> (Database, Contact, Contact) {
        let db = Database::open_in_memory().unwrap();
        let ana = Contact::from_draft(&ContactDraft::new("Ana Silva"));
        let bruno = Contact::from_draft(&ContactDraft::new("Bruno Costa"));
        db.insert_contact(&ana).unwrap();
        db.insert_contact(&bruno).unwrap();
        (db, ana, bruno)
    }

    #[test]
    fn test_register_assigns_sequential_records() {
        let (mut db, ana, bruno) = setup();
        let mut registry = PatientRegistry::new(&mut db);

        let first = registry.register(&ana.id, "123.456.789-00").unwrap();
        let second = registry.register(&bruno.id, "98765432100").unwrap();
        assert_eq!(first.document_number, "12345678900");
        assert_eq!(first.medical_record_number, 1);
        assert_eq!(second.medical_record_number, 2);

        let contact = db.get_contact(&ana.id).unwrap().unwrap();
        assert_eq!(contact.document_number, Some("12345678900".into()));
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut db, ana, _) = setup();
        let mut registry = PatientRegistry::new(&mut db);

        let first = registry.register(&ana.id, "12345678900").unwrap();
        let again = registry.register(&ana.id, "123.456.789-00").unwrap();
        assert_eq!(first.id, again.id);
    }

    #[test]
    fn test_document_in_use() {
        let (mut db, ana, bruno) = setup();
        let mut registry = PatientRegistry::new(&mut db);

        registry.register(&ana.id, "12345678900").unwrap();
        let err = registry.register(&bruno.id, "12345678900").unwrap_err();
        assert_eq!(err.conflict().unwrap().code(), "document_in_use");
    }

    #[test]
    fn test_contact_already_registered() {
        let (mut db, ana, _) = setup();
        let mut registry = PatientRegistry::new(&mut db);

        registry.register(&ana.id, "12345678900").unwrap();
        let err = registry.register(&ana.id, "55555555555").unwrap_err();
        assert_eq!(err.conflict().unwrap().code(), "contact_already_registered");
    }

    #[test]
    fn test_reactivates_instead_of_duplicating() {
        let (mut db, ana, bruno) = setup();
        let mut registry = PatientRegistry::new(&mut db);

        let original = registry.register(&ana.id, "12345678900").unwrap();
        registry.deactivate(&original.id).unwrap();

        let revived = registry.register(&bruno.id, "12345678900").unwrap();
        assert_eq!(revived.id, original.id);
        assert_eq!(revived.medical_record_number, original.medical_record_number);
        assert_eq!(revived.contact_id, bruno.id);
        assert!(revived.is_active());
    }

    #[test]
    fn test_reactivation_rejects_overlapping_appointments() {
        use crate::config::CoreConfig;
        use crate::models::{AppointmentStatus, AppointmentType, BookingSource, NewAppointment};
        use crate::notify::NoopNotifier;
        use crate::scheduling::AppointmentScheduler;

        let (mut db, ana, bruno) = setup();
        let config = CoreConfig::default();
        let at_nine = |contact_id: &str| {
            NewAppointment::new(
                contact_id,
                "2024-01-15",
                "09:00",
                AppointmentType::Consultation,
                BookingSource::Secretary,
            )
        };

        let original = PatientRegistry::new(&mut db)
            .register(&ana.id, "12345678900")
            .unwrap();
        let linked = AppointmentScheduler::new(&mut db, &config, &NoopNotifier)
            .create_appointment(&at_nine(&ana.id))
            .unwrap();
        assert_eq!(linked.patient_id.as_deref(), Some(original.id.as_str()));

        PatientRegistry::new(&mut db).deactivate(&original.id).unwrap();
        let own = AppointmentScheduler::new(&mut db, &config, &NoopNotifier)
            .create_appointment(&at_nine(&bruno.id))
            .unwrap();

        let err = PatientRegistry::new(&mut db)
            .register(&bruno.id, "12345678900")
            .unwrap_err();
        assert_eq!(err.conflict().unwrap().code(), "patient_overlap");
        let unchanged = db.get_patient(&original.id).unwrap().unwrap();
        assert!(!unchanged.is_active());
        assert_eq!(unchanged.contact_id, ana.id);

        AppointmentScheduler::new(&mut db, &config, &NoopNotifier)
            .update_status(&own.id, AppointmentStatus::Cancelled)
            .unwrap();
        let revived = PatientRegistry::new(&mut db)
            .register(&bruno.id, "12345678900")
            .unwrap();
        assert_eq!(revived.id, original.id);
        assert_eq!(revived.contact_id, bruno.id);
    }

    #[test]
    fn test_missing_contact_and_document() {
        let (mut db, ana, _) = setup();
        let mut registry = PatientRegistry::new(&mut db);

        let err = registry.register("nobody", "12345678900").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);

        let err = registry.register(&ana.id, " - ").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);

        let err = registry.deactivate("nobody").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }
}
