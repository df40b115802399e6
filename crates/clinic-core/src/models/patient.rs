//! Patient models: the clinical identity layered on a contact.

use serde::{Deserialize, Serialize};

use super::Lifecycle;

/// A registered patient.
///
/// References exactly one contact; the contact itself is shared, never owned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Stable patient ID (UUID)
    pub id: String,
    /// Contact this patient is registered for
    pub contact_id: String,
    /// National ID, unique among active patients
    pub document_number: String,
    /// Clinic-assigned sequential medical record number
    pub medical_record_number: i64,
    /// Soft-delete state
    pub lifecycle: Lifecycle,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new active patient.
    pub fn new(contact_id: String, document_number: String, medical_record_number: i64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            contact_id,
            document_number,
            medical_record_number,
            lifecycle: Lifecycle::Active,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }
}
