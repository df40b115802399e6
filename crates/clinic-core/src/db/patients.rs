//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Lifecycle, Patient};

const PATIENT_COLUMNS: &str =
    "id, contact_id, document_number, medical_record_number, lifecycle, created_at, updated_at";

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, contact_id, document_number, medical_record_number,
                lifecycle, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                patient.id,
                patient.contact_id,
                patient.document_number,
                patient.medical_record_number,
                patient.lifecycle.as_str(),
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update the mutable fields of a patient (contact link and lifecycle).
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                contact_id = ?2,
                lifecycle = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.contact_id,
                patient.lifecycle.as_str(),
                patient.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID, regardless of lifecycle.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
                [id],
                PatientRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get the active patient holding a document number.
    pub fn get_active_patient_by_document(&self, document: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {PATIENT_COLUMNS} FROM patients \
                     WHERE document_number = ? AND lifecycle = 'active'"
                ),
                [document],
                PatientRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Most recently updated inactive patient with a document number.
    pub fn get_inactive_patient_by_document(&self, document: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {PATIENT_COLUMNS} FROM patients \
                     WHERE document_number = ? AND lifecycle = 'inactive' \
                     ORDER BY updated_at DESC LIMIT 1"
                ),
                [document],
                PatientRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get the active patient registered for a contact.
    pub fn get_active_patient_for_contact(&self, contact_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {PATIENT_COLUMNS} FROM patients \
                     WHERE contact_id = ? AND lifecycle = 'active' \
                     ORDER BY created_at LIMIT 1"
                ),
                [contact_id],
                PatientRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Next medical record number in sequence.
    pub fn next_medical_record_number(&self) -> DbResult<i64> {
        let current: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(medical_record_number), 0) FROM patients",
            [],
            |row| row.get(0),
        )?;
        Ok(current + 1)
    }

    /// Move every patient of one contact to another (used by merge review).
    pub fn reassign_patients(&self, from_contact: &str, to_contact: &str) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "UPDATE patients SET contact_id = ?2, updated_at = ?3 WHERE contact_id = ?1",
            params![from_contact, to_contact, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected)
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    contact_id: String,
    document_number: String,
    medical_record_number: i64,
    lifecycle: String,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact_id: row.get(1)?,
            document_number: row.get(2)?,
            medical_record_number: row.get(3)?,
            lifecycle: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let lifecycle = Lifecycle::parse(&row.lifecycle)
            .ok_or_else(|| DbError::Constraint(format!("Unknown lifecycle: {}", row.lifecycle)))?;

        Ok(Patient {
            id: row.id,
            contact_id: row.contact_id,
            document_number: row.document_number,
            medical_record_number: row.medical_record_number,
            lifecycle,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, ContactDraft};

    fn setup_db() -> (Database, Contact) {
        let db = Database::open_in_memory().unwrap();
        let contact = Contact::from_draft(&ContactDraft::new("Ana Silva"));
        db.insert_contact(&contact).unwrap();
        (db, contact)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, contact) = setup_db();

        let patient = Patient::new(contact.id.clone(), "12345678900".into(), 1);
        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);

        let by_doc = db.get_active_patient_by_document("12345678900").unwrap().unwrap();
        assert_eq!(by_doc.id, patient.id);

        let by_contact = db.get_active_patient_for_contact(&contact.id).unwrap().unwrap();
        assert_eq!(by_contact.id, patient.id);
    }

    #[test]
    fn test_active_document_unique() {
        let (db, contact) = setup_db();

        db.insert_patient(&Patient::new(contact.id.clone(), "123".into(), 1))
            .unwrap();
        let err = db
            .insert_patient(&Patient::new(contact.id.clone(), "123".into(), 2))
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_inactive_lookup_and_sequence() {
        let (db, contact) = setup_db();
        assert_eq!(db.next_medical_record_number().unwrap(), 1);

        let mut patient = Patient::new(contact.id.clone(), "123".into(), 1);
        db.insert_patient(&patient).unwrap();
        assert_eq!(db.next_medical_record_number().unwrap(), 2);

        patient.lifecycle = Lifecycle::Inactive;
        db.update_patient(&patient).unwrap();

        assert!(db.get_active_patient_by_document("123").unwrap().is_none());
        let inactive = db.get_inactive_patient_by_document("123").unwrap().unwrap();
        assert_eq!(inactive.id, patient.id);
    }
}
