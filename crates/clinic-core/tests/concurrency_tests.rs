//! Races between independent connections to the same database file.
//!
//! Each thread owns its own `SchedulingCore`, as separate request handlers
//! would.

use std::sync::{Arc, Barrier};
use std::thread;

use clinic_core::models::{AppointmentType, BookingSource, ContactDraft, NewAppointment};
use clinic_core::{CoreConfig, CoreResult, SchedulingCore};
use tempfile::TempDir;

const THREADS: usize = 4;

fn cores(dir: &TempDir, count: usize) -> Vec<SchedulingCore> {
    let path = dir.path().join("clinic.db");
    (0..count)
        .map(|_| SchedulingCore::open(&path, CoreConfig::default()).unwrap())
        .collect()
}

/// Run `op` once per core, all released at the same moment.
fn race<T, F>(cores: Vec<SchedulingCore>, op: F) -> Vec<CoreResult<T>>
where
    T: Send + 'static,
    F: Fn(usize, &mut SchedulingCore) -> CoreResult<T> + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(cores.len()));
    let op = Arc::new(op);

    let handles: Vec<_> = cores
        .into_iter()
        .enumerate()
        .map(|(i, mut core)| {
            let barrier = Arc::clone(&barrier);
            let op = Arc::clone(&op);
            thread::spawn(move || {
                barrier.wait();
                op(i, &mut core)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn test_concurrent_booking_same_patient() {
    let dir = TempDir::new().unwrap();
    let mut cores = cores(&dir, 2);

    let contact = cores[0]
        .resolve_contact(&ContactDraft::new("Ana Silva").with_whatsapp("11987654321"))
        .unwrap()
        .contact;
    let contact_id = contact.id.clone();

    let results = race(cores, move |_, core| {
        core.create_appointment(&NewAppointment::new(
            contact_id.clone(),
            "2024-01-15",
            "09:00",
            AppointmentType::Consultation,
            BookingSource::Public,
        ))
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let conflict = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .and_then(|e| e.conflict())
        .map(|c| c.code());
    assert_eq!(conflict, Some("patient_overlap"));

    let mut check = SchedulingCore::open(dir.path().join("clinic.db"), CoreConfig::default())
        .unwrap();
    assert_eq!(check.list_by_contact(&contact.id).unwrap().len(), 1);
}

#[test]
fn test_concurrent_slot_creation() {
    let dir = TempDir::new().unwrap();
    let cores = cores(&dir, THREADS);

    let results = race(cores, |_, core| core.create_slot("p1", "2024-01-15", "09:00"));

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.conflict().map(|c| c.code()), Some("slot_exists"));
    }

    let mut check = SchedulingCore::open(dir.path().join("clinic.db"), CoreConfig::default())
        .unwrap();
    assert_eq!(
        check.list_slots("p1", "2024-01-15", "2024-01-15").unwrap().len(),
        1
    );
}

#[test]
fn test_concurrent_booking_same_slot() {
    let dir = TempDir::new().unwrap();
    let mut cores = cores(&dir, THREADS);
    let slot = cores[0].create_slot("p1", "2024-01-15", "09:00").unwrap();

    let mut contact_ids = Vec::new();
    for i in 0..THREADS {
        let contact = cores[0]
            .resolve_contact(
                &ContactDraft::new(format!("Paciente {i}"))
                    .with_whatsapp(format!("1191111000{i}")),
            )
            .unwrap()
            .contact;
        contact_ids.push(contact.id);
    }
    let contact_ids = Arc::new(contact_ids);
    let slot_id = slot.id.clone();

    let results = race(cores, move |i, core| {
        core.create_appointment(
            &NewAppointment::new(
                contact_ids[i].clone(),
                "2024-01-15",
                "09:00",
                AppointmentType::Consultation,
                BookingSource::Secretary,
            )
            .with_slot(slot_id.clone()),
        )
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.conflict().map(|c| c.code()), Some("slot_taken"));
    }
}

#[test]
fn test_concurrent_first_touch_creates_one_contact() {
    let dir = TempDir::new().unwrap();
    let cores = cores(&dir, THREADS);

    let results = race(cores, |_, core| {
        core.resolve_contact(
            &ContactDraft::new("Ana Silva")
                .with_whatsapp("(11) 98765-4321")
                .with_source("public-scheduling"),
        )
    });

    let resolved: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    let first_id = &resolved[0].contact.id;
    assert!(resolved.iter().all(|r| &r.contact.id == first_id));
    assert_eq!(resolved.iter().filter(|r| r.is_new).count(), 1);
}
