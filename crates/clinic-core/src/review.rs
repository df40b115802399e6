//! Human review of duplicate candidates.
//!
//! Nothing in the core calls into this module: merges happen only when staff
//! confirm them.

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::models::{CandidateStatus, Contact, DuplicateCandidate, Lifecycle};
use crate::scheduling::check_person_overlaps;

/// Staff-facing operations on duplicate candidates.
pub struct MergeReview<'a> {
    db: &'a mut Database,
}

impl<'a> MergeReview<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Pending candidates, highest score first.
    pub fn list_pending_candidates(&self) -> CoreResult<Vec<DuplicateCandidate>> {
        Ok(self.db.list_pending_candidates()?)
    }

    /// Record that a candidate pair are different people.
    pub fn confirm_distinct(&mut self, candidate_id: &str) -> CoreResult<DuplicateCandidate> {
        let candidate = self.db.immediate(|db| -> CoreResult<DuplicateCandidate> {
            let candidate = pending_candidate(db, candidate_id)?;
            db.resolve_candidate(&candidate.id, CandidateStatus::ConfirmedDistinct)?;
            db.get_candidate(&candidate.id)?
                .ok_or_else(|| CoreError::not_found("candidate", candidate_id))
        })?;

        info!(
            "Candidate {} confirmed distinct ({} / {})",
            candidate.id, candidate.contact_a, candidate.contact_b
        );
        Ok(candidate)
    }

    /// Merge `merge_id` into `keep_id`.
    ///
    /// The kept contact takes over the absorbed contact's missing fields,
    /// sources, appointments and patient record. The absorbed contact is
    /// deactivated and points at the kept one.
    ///
    /// Fails with `Conflict(PatientOverlap)` if an open appointment of the
    /// absorbed contact overlaps one of the kept contact's; staff cancel or
    /// reschedule one of them first.
    pub fn confirm_merge(&mut self, keep_id: &str, merge_id: &str) -> CoreResult<Contact> {
        if keep_id == merge_id {
            return Err(CoreError::validation("cannot merge a contact into itself"));
        }

        self.db.immediate(|db| -> CoreResult<Contact> {
            let mut kept = active_contact(db, keep_id)?;
            let mut absorbed = active_contact(db, merge_id)?;

            let kept_patient = db.get_active_patient_for_contact(&kept.id)?;
            let absorbed_patient = db.get_active_patient_for_contact(&absorbed.id)?;
            if let (Some(_), Some(other)) = (&kept_patient, &absorbed_patient) {
                warn!(
                    "Both contacts {} and {} are registered patients; refusing merge",
                    kept.id, absorbed.id
                );
                return Err(ConflictKind::ContactAlreadyRegistered {
                    patient_id: other.id.clone(),
                }
                .into());
            }

            // Open appointments of the absorbed person must fit the kept one's
            let incoming = db.list_open_appointments_for_person(
                Some(absorbed.id.as_str()),
                absorbed_patient.as_ref().map(|p| p.id.as_str()),
            )?;
            check_person_overlaps(
                db,
                Some(kept.id.as_str()),
                kept_patient.as_ref().map(|p| p.id.as_str()),
                &incoming,
            )?;

            if kept.absorb(&absorbed) {
                db.update_contact(&kept)?;
            }

            let moved_appointments = db.reassign_appointments(&absorbed.id, &kept.id)?;
            let moved_patients = db.reassign_patients(&absorbed.id, &kept.id)?;

            absorbed.lifecycle = Lifecycle::Inactive;
            absorbed.merged_into = Some(kept.id.clone());
            absorbed.touch();
            db.update_contact(&absorbed)?;

            if let Some(candidate) = db.get_candidate_for_pair(&kept.id, &absorbed.id)? {
                db.resolve_candidate(&candidate.id, CandidateStatus::ConfirmedMerge)?;
            }

            info!(
                "Merged contact {} into {} ({} appointments, {} patients moved)",
                absorbed.id, kept.id, moved_appointments, moved_patients
            );
            Ok(kept)
        })
    }
}

fn pending_candidate(db: &Database, candidate_id: &str) -> CoreResult<DuplicateCandidate> {
    let candidate = db
        .get_candidate(candidate_id)?
        .ok_or_else(|| CoreError::not_found("candidate", candidate_id))?;
    if candidate.status != CandidateStatus::Pending {
        return Err(CoreError::validation(format!(
            "candidate {} is already {}",
            candidate.id,
            candidate.status.as_str()
        )));
    }
    Ok(candidate)
}

fn active_contact(db: &Database, contact_id: &str) -> CoreResult<Contact> {
    let contact = db
        .get_contact(contact_id)?
        .ok_or_else(|| CoreError::not_found("contact", contact_id))?;
    if !contact.is_active() {
        return Err(CoreError::validation(format!(
            "contact {contact_id} is inactive"
        )));
    }
    Ok(contact)
}
