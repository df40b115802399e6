//! Appointment database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{date_from_sql, date_to_sql, time_from_sql, time_to_sql, Database, DbError, DbResult};
use crate::models::{Appointment, AppointmentStatus, AppointmentType, BookingSource};

const APPOINTMENT_COLUMNS: &str = "id, contact_id, patient_id, provider_id, slot_id, \
    appointment_date, appointment_time, duration_minutes, appointment_type, source, \
    status, notes, created_at, updated_at";

/// SQL predicate for statuses that still hold their time window.
const NON_TERMINAL: &str = "status IN ('SCHEDULED', 'CONFIRMED', 'IN_PROGRESS')";

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, contact_id, patient_id, provider_id, slot_id,
                appointment_date, appointment_time, duration_minutes,
                appointment_type, source, status, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                appointment.id,
                appointment.contact_id,
                appointment.patient_id,
                appointment.provider_id,
                appointment.slot_id,
                date_to_sql(&appointment.date),
                time_to_sql(&appointment.time),
                appointment.duration_minutes,
                appointment.appointment_type.as_str(),
                appointment.source.as_str(),
                appointment.status.as_str(),
                appointment.notes,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing appointment.
    pub fn update_appointment(&self, appointment: &Appointment) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                contact_id = ?2,
                patient_id = ?3,
                slot_id = ?4,
                appointment_date = ?5,
                appointment_time = ?6,
                status = ?7,
                notes = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                appointment.id,
                appointment.contact_id,
                appointment.patient_id,
                appointment.slot_id,
                date_to_sql(&appointment.date),
                time_to_sql(&appointment.time),
                appointment.status.as_str(),
                appointment.notes,
                appointment.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?"),
                [id],
                AppointmentRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// All appointments on a date, by time then insertion order.
    pub fn list_appointments_by_date(&self, date: &NaiveDate) -> DbResult<Vec<Appointment>> {
        self.query_appointments(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE appointment_date = ?1 \
                 ORDER BY appointment_date, appointment_time, rowid"
            ),
            params![date_to_sql(date)],
        )
    }

    /// All appointments of a patient, including ones booked for its contact
    /// before registration.
    pub fn list_appointments_by_patient(&self, patient_id: &str) -> DbResult<Vec<Appointment>> {
        self.query_appointments(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE patient_id = ?1 \
                    OR contact_id = (SELECT contact_id FROM patients WHERE id = ?1) \
                 ORDER BY appointment_date, appointment_time, rowid"
            ),
            params![patient_id],
        )
    }

    /// All appointments of a contact.
    pub fn list_appointments_by_contact(&self, contact_id: &str) -> DbResult<Vec<Appointment>> {
        self.query_appointments(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE contact_id = ?1 \
                 ORDER BY appointment_date, appointment_time, rowid"
            ),
            params![contact_id],
        )
    }

    /// Non-terminal appointments of a person (by contact or patient) dated
    /// within the inclusive range.
    pub fn list_open_appointments_for_subject(
        &self,
        contact_id: &str,
        patient_id: Option<&str>,
        from: &NaiveDate,
        to: &NaiveDate,
    ) -> DbResult<Vec<Appointment>> {
        self.query_appointments(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE (contact_id = ?1 OR (?2 IS NOT NULL AND patient_id = ?2)) \
                   AND appointment_date >= ?3 AND appointment_date <= ?4 \
                   AND {NON_TERMINAL} \
                 ORDER BY appointment_date, appointment_time, rowid"
            ),
            params![contact_id, patient_id, date_to_sql(from), date_to_sql(to)],
        )
    }

    /// Non-terminal appointments of a provider dated within the inclusive range.
    pub fn list_open_appointments_for_provider(
        &self,
        provider_id: &str,
        from: &NaiveDate,
        to: &NaiveDate,
    ) -> DbResult<Vec<Appointment>> {
        self.query_appointments(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE provider_id = ?1 \
                   AND appointment_date >= ?2 AND appointment_date <= ?3 \
                   AND {NON_TERMINAL} \
                 ORDER BY appointment_date, appointment_time, rowid"
            ),
            params![provider_id, date_to_sql(from), date_to_sql(to)],
        )
    }

    /// Every non-terminal appointment held by a contact or a patient, whatever
    /// the date.
    pub fn list_open_appointments_for_person(
        &self,
        contact_id: Option<&str>,
        patient_id: Option<&str>,
    ) -> DbResult<Vec<Appointment>> {
        self.query_appointments(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                 WHERE ((?1 IS NOT NULL AND contact_id = ?1) \
                     OR (?2 IS NOT NULL AND patient_id = ?2)) \
                   AND {NON_TERMINAL} \
                 ORDER BY appointment_date, appointment_time, rowid"
            ),
            params![contact_id, patient_id],
        )
    }

    /// The non-terminal appointment occupying a slot, if any.
    pub fn find_open_appointment_in_slot(&self, slot_id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
                     WHERE slot_id = ?1 AND {NON_TERMINAL} \
                     ORDER BY rowid LIMIT 1"
                ),
                [slot_id],
                AppointmentRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Move every appointment of one contact to another (used by merge review).
    pub fn reassign_appointments(&self, from_contact: &str, to_contact: &str) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET contact_id = ?2, updated_at = ?3 WHERE contact_id = ?1",
            params![from_contact, to_contact, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected)
    }

    fn query_appointments<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    contact_id: String,
    patient_id: Option<String>,
    provider_id: Option<String>,
    slot_id: Option<String>,
    appointment_date: String,
    appointment_time: String,
    duration_minutes: u32,
    appointment_type: String,
    source: String,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact_id: row.get(1)?,
            patient_id: row.get(2)?,
            provider_id: row.get(3)?,
            slot_id: row.get(4)?,
            appointment_date: row.get(5)?,
            appointment_time: row.get(6)?,
            duration_minutes: row.get(7)?,
            appointment_type: row.get(8)?,
            source: row.get(9)?,
            status: row.get(10)?,
            notes: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown appointment status: {}", row.status)))?;
        let appointment_type = AppointmentType::parse(&row.appointment_type).ok_or_else(|| {
            DbError::Constraint(format!("Unknown appointment type: {}", row.appointment_type))
        })?;
        let source = BookingSource::parse(&row.source)
            .ok_or_else(|| DbError::Constraint(format!("Unknown booking source: {}", row.source)))?;

        Ok(Appointment {
            id: row.id,
            contact_id: row.contact_id,
            patient_id: row.patient_id,
            provider_id: row.provider_id,
            slot_id: row.slot_id,
            date: date_from_sql(&row.appointment_date)?,
            time: time_from_sql(&row.appointment_time)?,
            duration_minutes: row.duration_minutes,
            appointment_type,
            source,
            status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use crate::models::{Contact, ContactDraft};

    fn setup_db() -> (Database, Contact) {
        let db = Database::open_in_memory().unwrap();
        let contact = Contact::from_draft(&ContactDraft::new("Ana Silva"));
        db.insert_contact(&contact).unwrap();
        (db, contact)
    }

    fn appointment(contact_id: &str, day: u32, h: u32, m: u32) -> Appointment {
        let now = chrono::Utc::now().to_rfc3339();
        Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            contact_id: contact_id.to_string(),
            patient_id: None,
            provider_id: Some("p1".into()),
            slot_id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            duration_minutes: 30,
            appointment_type: AppointmentType::Consultation,
            source: BookingSource::Public,
            status: AppointmentStatus::Scheduled,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let (db, contact) = setup_db();

        let appt = appointment(&contact.id, 15, 9, 0);
        db.insert_appointment(&appt).unwrap();

        let retrieved = db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(retrieved, appt);
    }

    #[test]
    fn test_list_by_date_tie_breaks_on_insertion() {
        let (db, contact) = setup_db();

        let nine_a = appointment(&contact.id, 15, 9, 0);
        let mut nine_b = appointment(&contact.id, 15, 9, 0);
        nine_b.provider_id = Some("p2".into());
        let eight = appointment(&contact.id, 15, 8, 0);
        let other_day = appointment(&contact.id, 16, 7, 0);
        for a in [&nine_a, &nine_b, &eight, &other_day] {
            db.insert_appointment(a).unwrap();
        }

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let listed = db.list_appointments_by_date(&date).unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![eight.id.as_str(), nine_a.id.as_str(), nine_b.id.as_str()]);
    }

    #[test]
    fn test_open_appointments_skip_terminal() {
        let (db, contact) = setup_db();

        let open = appointment(&contact.id, 15, 9, 0);
        let mut cancelled = appointment(&contact.id, 15, 10, 0);
        cancelled.status = AppointmentStatus::Cancelled;
        db.insert_appointment(&open).unwrap();
        db.insert_appointment(&cancelled).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let listed = db
            .list_open_appointments_for_subject(&contact.id, None, &date, &date)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.id);

        let by_provider = db
            .list_open_appointments_for_provider("p1", &date, &date)
            .unwrap();
        assert_eq!(by_provider.len(), 1);

        let later = appointment(&contact.id, 20, 9, 0);
        db.insert_appointment(&later).unwrap();
        let all_open = db
            .list_open_appointments_for_person(Some(&contact.id), None)
            .unwrap();
        assert_eq!(all_open.len(), 2);
        assert!(db
            .list_open_appointments_for_person(None, Some("no-patient"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_status() {
        let (db, contact) = setup_db();

        let mut appt = appointment(&contact.id, 15, 9, 0);
        db.insert_appointment(&appt).unwrap();

        appt.status = AppointmentStatus::Confirmed;
        appt.touch();
        assert!(db.update_appointment(&appt).unwrap());

        let retrieved = db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(retrieved.status, AppointmentStatus::Confirmed);
    }
}
