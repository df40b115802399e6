//! Slot manager: bookable (provider, date, time) units.

use tracing::{info, warn};

use super::{parse_date, parse_time, require_id};
use crate::db::Database;
use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::models::{Lifecycle, Slot, DATE_FORMAT, TIME_FORMAT};

/// Owns slot creation, availability and removal.
pub struct SlotManager<'a> {
    db: &'a mut Database,
}

impl<'a> SlotManager<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Create an active, available slot.
    ///
    /// Fails with `Conflict(SlotExists)` if an active slot already has the
    /// same provider, date and time.
    pub fn create_slot(&mut self, provider_id: &str, date: &str, time: &str) -> CoreResult<Slot> {
        let provider_id = require_id(provider_id, "provider id")?;
        let date = parse_date(date)?;
        let time = parse_time(time)?;

        let slot = self.db.immediate(|db| -> CoreResult<Slot> {
            let exists = || {
                CoreError::from(ConflictKind::SlotExists {
                    provider_id: provider_id.clone(),
                    date: date.format(DATE_FORMAT).to_string(),
                    time: time.format(TIME_FORMAT).to_string(),
                })
            };

            if db.find_active_slot(&provider_id, &date, &time)?.is_some() {
                warn!("Slot for {} on {} at {} already exists", provider_id, date, time);
                return Err(exists());
            }

            let slot = Slot::new(provider_id.clone(), date, time);
            db.insert_slot(&slot).map_err(|e| {
                if e.is_constraint_violation() {
                    exists()
                } else {
                    e.into()
                }
            })?;
            Ok(slot)
        })?;

        info!(
            "Created slot {} for provider {} on {} at {}",
            slot.id, slot.provider_id, slot.date, slot.time
        );
        Ok(slot)
    }

    /// Flip a slot's availability.
    pub fn toggle_slot(&mut self, slot_id: &str) -> CoreResult<Slot> {
        self.db.immediate(|db| {
            let mut slot = active_slot(db, slot_id)?;
            slot.available = !slot.available;
            slot.updated_at = chrono::Utc::now().to_rfc3339();
            db.update_slot(&slot)?;
            info!("Slot {} availability set to {}", slot.id, slot.available);
            Ok(slot)
        })
    }

    /// Remove a slot that nothing is booked into.
    ///
    /// Removal deactivates the row, freeing its (provider, date, time) for a
    /// new slot while keeping history readable.
    pub fn delete_slot(&mut self, slot_id: &str) -> CoreResult<()> {
        self.db.immediate(|db| {
            let mut slot = active_slot(db, slot_id)?;

            if let Some(appointment) = db.find_open_appointment_in_slot(&slot.id)? {
                warn!(
                    "Refusing to delete slot {}: occupied by appointment {}",
                    slot.id, appointment.id
                );
                return Err(ConflictKind::SlotOccupied {
                    slot_id: slot.id,
                    appointment_id: appointment.id,
                }
                .into());
            }

            slot.lifecycle = Lifecycle::Inactive;
            slot.updated_at = chrono::Utc::now().to_rfc3339();
            db.update_slot(&slot)?;
            info!("Deleted slot {}", slot.id);
            Ok(())
        })
    }

    /// Get a slot by ID, including deleted ones.
    pub fn get_slot(&self, slot_id: &str) -> CoreResult<Slot> {
        self.db
            .get_slot(slot_id)?
            .ok_or_else(|| CoreError::not_found("slot", slot_id))
    }

    /// Active slots of a provider in an inclusive date range, by date then time.
    pub fn list_slots(&self, provider_id: &str, from: &str, to: &str) -> CoreResult<Vec<Slot>> {
        let from = parse_date(from)?;
        let to = parse_date(to)?;
        Ok(self.db.list_active_slots(provider_id.trim(), &from, &to)?)
    }

    /// Slots a new booking could go into: active, available and unoccupied.
    pub fn list_available_slots(
        &self,
        provider_id: &str,
        from: &str,
        to: &str,
    ) -> CoreResult<Vec<Slot>> {
        let from = parse_date(from)?;
        let to = parse_date(to)?;
        Ok(self.db.list_open_slots(provider_id.trim(), &from, &to)?)
    }
}

fn active_slot(db: &Database, slot_id: &str) -> CoreResult<Slot> {
    db.get_slot(slot_id)?
        .filter(Slot::is_active)
        .ok_or_else(|| CoreError::not_found("slot", slot_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_duplicate_slot_conflicts() {
        let mut db = Database::open_in_memory().unwrap();
        let mut slots = SlotManager::new(&mut db);

        let slot = slots.create_slot("p1", "2024-01-15", "09:00").unwrap();
        assert!(slot.available);

        let err = slots.create_slot("p1", "2024-01-15", "09:00").unwrap_err();
        assert_eq!(err.conflict().unwrap().code(), "slot_exists");

        // Same time, other provider is fine
        slots.create_slot("p2", "2024-01-15", "09:00").unwrap();
        // Seconds-form of the same time is the same slot
        let err = slots.create_slot("p1", "2024-01-15", "09:00:00").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_create_validates_input() {
        let mut db = Database::open_in_memory().unwrap();
        let mut slots = SlotManager::new(&mut db);

        for (provider, date, time) in [
            ("p1", "2024-02-30", "09:00"),
            ("p1", "2024-01-15", "25:00"),
            (" ", "2024-01-15", "09:00"),
        ] {
            let err = slots.create_slot(provider, date, time).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_toggle() {
        let mut db = Database::open_in_memory().unwrap();
        let mut slots = SlotManager::new(&mut db);

        let slot = slots.create_slot("p1", "2024-01-15", "09:00").unwrap();
        assert!(!slots.toggle_slot(&slot.id).unwrap().available);
        assert!(slots.toggle_slot(&slot.id).unwrap().available);

        let err = slots.toggle_slot("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_frees_identity() {
        let mut db = Database::open_in_memory().unwrap();
        let mut slots = SlotManager::new(&mut db);

        let slot = slots.create_slot("p1", "2024-01-15", "09:00").unwrap();
        slots.delete_slot(&slot.id).unwrap();

        assert!(slots.list_slots("p1", "2024-01-15", "2024-01-15").unwrap().is_empty());
        assert_eq!(slots.get_slot(&slot.id).unwrap().lifecycle, Lifecycle::Inactive);
        assert_eq!(slots.delete_slot(&slot.id).unwrap_err().kind(), ErrorKind::NotFound);

        // The (provider, date, time) can be offered again
        slots.create_slot("p1", "2024-01-15", "09:00").unwrap();
    }

    #[test]
    fn test_list_slots_ordered() {
        let mut db = Database::open_in_memory().unwrap();
        let mut slots = SlotManager::new(&mut db);

        slots.create_slot("p1", "2024-01-16", "08:00").unwrap();
        slots.create_slot("p1", "2024-01-15", "10:00").unwrap();
        slots.create_slot("p1", "2024-01-15", "09:00").unwrap();
        slots.create_slot("p1", "2024-01-20", "09:00").unwrap();

        let listed = slots.list_slots("p1", "2024-01-15", "2024-01-16").unwrap();
        let times: Vec<String> = listed
            .iter()
            .map(|s| format!("{} {}", s.date, s.time.format(TIME_FORMAT)))
            .collect();
        assert_eq!(times, vec!["2024-01-15 09:00", "2024-01-15 10:00", "2024-01-16 08:00"]);

        assert!(slots.list_slots("p9", "2024-01-01", "2024-12-31").unwrap().is_empty());
    }
}
