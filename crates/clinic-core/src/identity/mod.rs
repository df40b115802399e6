//! Identity resolution for intake requests.
//!
//! Pipeline: Normalization → Exact match (WhatsApp, email, phone) → Merge or
//! Create → Duplicate detection (new contacts only)

mod detector;
mod normalizer;
mod patients;

pub use detector::*;
pub use normalizer::*;
pub use patients::*;

use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::models::{Contact, ContactDraft, DuplicateCandidate, Lifecycle, ResolvedContact};

/// Resolves raw contact fields to a canonical contact.
pub struct IdentityResolver<'a> {
    db: &'a mut Database,
    normalizer: Normalizer,
    config: CoreConfig,
}

impl<'a> IdentityResolver<'a> {
    /// Create a new resolver.
    pub fn new(db: &'a mut Database, config: &CoreConfig) -> Self {
        Self {
            db,
            normalizer: Normalizer::new(),
            config: config.clone(),
        }
    }

    /// Resolve a draft to an existing or new contact.
    ///
    /// Runs in one write transaction, so concurrent first-touch requests for
    /// the same WhatsApp number end up on a single contact.
    pub fn resolve(&mut self, draft: &ContactDraft) -> CoreResult<ResolvedContact> {
        let normalized = self.normalizer.normalize(draft);
        let config = &self.config;
        self.db.immediate(|db| resolve_normalized(db, &normalized, config))
    }

    /// Soft-deactivate a contact. Its appointments and history stay readable.
    pub fn deactivate(&mut self, contact_id: &str) -> CoreResult<Contact> {
        self.db.immediate(|db| {
            let mut contact = db
                .get_contact(contact_id)?
                .ok_or_else(|| CoreError::not_found("contact", contact_id))?;
            if contact.is_active() {
                contact.lifecycle = Lifecycle::Inactive;
                contact.touch();
                db.update_contact(&contact)?;
                info!("Deactivated contact {}", contact.id);
            }
            Ok(contact)
        })
    }

    /// Score a stored contact against the others without recording anything.
    pub fn find_candidates(&self, contact_id: &str) -> CoreResult<Vec<DuplicateCandidate>> {
        let contact = self
            .db
            .get_contact(contact_id)?
            .ok_or_else(|| CoreError::not_found("contact", contact_id))?;
        Ok(DuplicateDetector::new(&*self.db, &self.config).find_candidates(&contact))
    }

    /// Get the normalizer for direct access.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}

/// Resolve an already-normalized draft inside the caller's transaction.
pub(crate) fn resolve_normalized(
    db: &Database,
    draft: &ContactDraft,
    config: &CoreConfig,
) -> CoreResult<ResolvedContact> {
    if draft.name.is_empty() {
        return Err(CoreError::validation("contact name is required"));
    }

    if let Some(mut existing) = find_exact_match(db, draft)? {
        if existing.merge_from(draft) {
            db.update_contact(&existing)?;
            debug!("Merged new fields into contact {}", existing.id);
        }

        let duplicate_candidates = db
            .list_pending_candidates_for_contact(&existing.id)
            .unwrap_or_else(|e| {
                warn!("Could not list candidates for contact {}: {}", existing.id, e);
                Vec::new()
            });

        return Ok(ResolvedContact {
            contact: existing,
            is_new: false,
            duplicate_candidates,
        });
    }

    let contact = Contact::from_draft(draft);
    db.insert_contact(&contact)?;
    info!("Created contact {}", contact.id);

    let detector = DuplicateDetector::new(db, config);
    let found = detector.find_candidates(&contact);
    let duplicate_candidates = detector.record(found);
    if duplicate_candidates.iter().any(|c| c.requires_review()) {
        warn!(
            "Contact {} is a likely duplicate; flagged for review",
            contact.id
        );
    }

    Ok(ResolvedContact {
        contact,
        is_new: true,
        duplicate_candidates,
    })
}

/// Exact lookup by WhatsApp, then email, then phone.
fn find_exact_match(db: &Database, draft: &ContactDraft) -> CoreResult<Option<Contact>> {
    if let Some(whatsapp) = &draft.whatsapp {
        if let Some(contact) = db.find_contact_by_whatsapp(whatsapp)? {
            return Ok(Some(contact));
        }
    }
    if let Some(email) = &draft.email {
        if let Some(contact) = db.find_contact_by_email(email)? {
            return Ok(Some(contact));
        }
    }
    if let Some(phone) = &draft.phone {
        if let Some(contact) = db.find_contact_by_phone(phone)? {
            return Ok(Some(contact));
        }
    }
    Ok(None)
}
