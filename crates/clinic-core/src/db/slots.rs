//! Slot database operations.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, OptionalExtension, Row};

use super::{date_from_sql, date_to_sql, time_from_sql, time_to_sql, Database, DbError, DbResult};
use crate::models::{Lifecycle, Slot};

const SLOT_COLUMNS: &str =
    "id, provider_id, slot_date, slot_time, available, lifecycle, created_at, updated_at";

impl Database {
    /// Insert a new slot.
    pub fn insert_slot(&self, slot: &Slot) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO slots (
                id, provider_id, slot_date, slot_time, available,
                lifecycle, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                slot.id,
                slot.provider_id,
                date_to_sql(&slot.date),
                time_to_sql(&slot.time),
                slot.available,
                slot.lifecycle.as_str(),
                slot.created_at,
                slot.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Persist availability and lifecycle of a slot.
    pub fn update_slot(&self, slot: &Slot) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE slots SET
                available = ?2,
                lifecycle = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
            params![
                slot.id,
                slot.available,
                slot.lifecycle.as_str(),
                slot.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a slot by ID, regardless of lifecycle.
    pub fn get_slot(&self, id: &str) -> DbResult<Option<Slot>> {
        self.conn
            .query_row(
                &format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?"),
                [id],
                SlotRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get the active slot for a (provider, date, time) identity.
    pub fn find_active_slot(
        &self,
        provider_id: &str,
        date: &NaiveDate,
        time: &NaiveTime,
    ) -> DbResult<Option<Slot>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SLOT_COLUMNS} FROM slots \
                     WHERE provider_id = ?1 AND slot_date = ?2 AND slot_time = ?3 \
                     AND lifecycle = 'active'"
                ),
                params![provider_id, date_to_sql(date), time_to_sql(time)],
                SlotRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Active slots of a provider within an inclusive date range, by date then time.
    pub fn list_active_slots(
        &self,
        provider_id: &str,
        from: &NaiveDate,
        to: &NaiveDate,
    ) -> DbResult<Vec<Slot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots \
             WHERE provider_id = ?1 AND slot_date >= ?2 AND slot_date <= ?3 \
             AND lifecycle = 'active' \
             ORDER BY slot_date, slot_time"
        ))?;

        let rows = stmt.query_map(
            params![provider_id, date_to_sql(from), date_to_sql(to)],
            SlotRow::from_row,
        )?;

        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?.try_into()?);
        }
        Ok(slots)
    }

    /// Active, available slots in range with no non-terminal appointment in them.
    pub fn list_open_slots(
        &self,
        provider_id: &str,
        from: &NaiveDate,
        to: &NaiveDate,
    ) -> DbResult<Vec<Slot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id, s.provider_id, s.slot_date, s.slot_time, s.available,
                   s.lifecycle, s.created_at, s.updated_at
            FROM slots s
            WHERE s.provider_id = ?1 AND s.slot_date >= ?2 AND s.slot_date <= ?3
              AND s.lifecycle = 'active' AND s.available = 1
              AND NOT EXISTS (
                  SELECT 1 FROM appointments a
                  WHERE a.slot_id = s.id
                    AND a.status IN ('SCHEDULED', 'CONFIRMED', 'IN_PROGRESS')
              )
            ORDER BY s.slot_date, s.slot_time
            "#,
        )?;

        let rows = stmt.query_map(
            params![provider_id, date_to_sql(from), date_to_sql(to)],
            SlotRow::from_row,
        )?;

        let mut slots = Vec::new();
        for row in rows {
            slots.push(row?.try_into()?);
        }
        Ok(slots)
    }
}

/// Intermediate row struct for database mapping.
struct SlotRow {
    id: String,
    provider_id: String,
    slot_date: String,
    slot_time: String,
    available: bool,
    lifecycle: String,
    created_at: String,
    updated_at: String,
}

impl SlotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            provider_id: row.get(1)?,
            slot_date: row.get(2)?,
            slot_time: row.get(3)?,
            available: row.get(4)?,
            lifecycle: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl TryFrom<SlotRow> for Slot {
    type Error = DbError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let lifecycle = Lifecycle::parse(&row.lifecycle)
            .ok_or_else(|| DbError::Constraint(format!("Unknown lifecycle: {}", row.lifecycle)))?;

        Ok(Slot {
            id: row.id,
            provider_id: row.provider_id,
            date: date_from_sql(&row.slot_date)?,
            time: time_from_sql(&row.slot_time)?,
            available: row.available,
            lifecycle,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
