//! SQLite schema definition.

/// Complete database schema for the clinic core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Contacts (communication identities)
-- ============================================================================

CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(name) > 0),
    phone TEXT,                                  -- digits only
    whatsapp TEXT,                               -- digits only
    email TEXT,                                  -- lower-cased
    date_of_birth TEXT,                          -- free text as reported
    document_number TEXT,                        -- as reported at intake
    sources TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    lifecycle TEXT NOT NULL DEFAULT 'active' CHECK (lifecycle IN ('active', 'inactive')),
    merged_into TEXT REFERENCES contacts(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_contacts_whatsapp ON contacts(whatsapp);
CREATE INDEX IF NOT EXISTS idx_contacts_email ON contacts(email);
CREATE INDEX IF NOT EXISTS idx_contacts_phone ON contacts(phone);
CREATE INDEX IF NOT EXISTS idx_contacts_document ON contacts(document_number);

-- FTS5 over names for duplicate candidate retrieval
CREATE VIRTUAL TABLE IF NOT EXISTS contacts_fts USING fts5(
    name,
    content='contacts',
    content_rowid='rowid',
    tokenize='unicode61 remove_diacritics 2'
);

CREATE TRIGGER IF NOT EXISTS contacts_ai AFTER INSERT ON contacts BEGIN
    INSERT INTO contacts_fts(rowid, name) VALUES (new.rowid, new.name);
END;

CREATE TRIGGER IF NOT EXISTS contacts_ad AFTER DELETE ON contacts BEGIN
    INSERT INTO contacts_fts(contacts_fts, rowid, name) VALUES ('delete', old.rowid, old.name);
END;

CREATE TRIGGER IF NOT EXISTS contacts_au AFTER UPDATE OF name ON contacts BEGIN
    INSERT INTO contacts_fts(contacts_fts, rowid, name) VALUES ('delete', old.rowid, old.name);
    INSERT INTO contacts_fts(rowid, name) VALUES (new.rowid, new.name);
END;

-- ============================================================================
-- Patients (clinical identities)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL REFERENCES contacts(id),
    document_number TEXT NOT NULL CHECK (length(document_number) > 0),
    medical_record_number INTEGER NOT NULL UNIQUE,
    lifecycle TEXT NOT NULL DEFAULT 'active' CHECK (lifecycle IN ('active', 'inactive')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- At most one active patient per document number
CREATE UNIQUE INDEX IF NOT EXISTS idx_patients_active_document
    ON patients(document_number) WHERE lifecycle = 'active';
CREATE INDEX IF NOT EXISTS idx_patients_contact ON patients(contact_id);

-- ============================================================================
-- Slots (bookable provider time units)
-- ============================================================================

CREATE TABLE IF NOT EXISTS slots (
    id TEXT PRIMARY KEY,
    provider_id TEXT NOT NULL,
    slot_date TEXT NOT NULL,                     -- YYYY-MM-DD
    slot_time TEXT NOT NULL,                     -- HH:MM
    available INTEGER NOT NULL DEFAULT 1,
    lifecycle TEXT NOT NULL DEFAULT 'active' CHECK (lifecycle IN ('active', 'inactive')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- (provider, date, time) unique among active slots
CREATE UNIQUE INDEX IF NOT EXISTS idx_slots_active_identity
    ON slots(provider_id, slot_date, slot_time) WHERE lifecycle = 'active';
CREATE INDEX IF NOT EXISTS idx_slots_provider_date ON slots(provider_id, slot_date);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL REFERENCES contacts(id),
    patient_id TEXT REFERENCES patients(id),
    provider_id TEXT,
    slot_id TEXT REFERENCES slots(id),
    appointment_date TEXT NOT NULL,              -- YYYY-MM-DD
    appointment_time TEXT NOT NULL,              -- HH:MM
    duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
    appointment_type TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'SCHEDULED'
        CHECK (status IN ('SCHEDULED', 'CONFIRMED', 'IN_PROGRESS', 'COMPLETED', 'CANCELLED', 'NO_SHOW')),
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_contact ON appointments(contact_id, appointment_date);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id, appointment_date);
CREATE INDEX IF NOT EXISTS idx_appointments_provider ON appointments(provider_id, appointment_date);
CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date, appointment_time);
CREATE INDEX IF NOT EXISTS idx_appointments_slot ON appointments(slot_id);

-- ============================================================================
-- Duplicate candidates (advisory, human-reviewed)
-- ============================================================================

CREATE TABLE IF NOT EXISTS duplicate_candidates (
    id TEXT PRIMARY KEY,
    contact_a TEXT NOT NULL REFERENCES contacts(id),
    contact_b TEXT NOT NULL REFERENCES contacts(id),
    score REAL NOT NULL CHECK (score >= 0.0 AND score <= 1.0),
    matched_fields TEXT NOT NULL DEFAULT '[]',   -- JSON array of field names
    level TEXT NOT NULL CHECK (level IN ('likely', 'possible')),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'confirmed_merge', 'confirmed_distinct')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    resolved_at TEXT,
    CHECK (contact_a < contact_b),
    UNIQUE (contact_a, contact_b)
);

CREATE INDEX IF NOT EXISTS idx_candidates_status ON duplicate_candidates(status, score);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_fts_trigger() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO contacts (id, name) VALUES (?, ?)",
            ["c1", "João Pereira"],
        )
        .unwrap();

        // Diacritics are folded by the tokenizer
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM contacts_fts WHERE contacts_fts MATCH 'joao'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);

        conn.execute("UPDATE contacts SET name = 'Maria Pereira' WHERE id = 'c1'", [])
            .unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM contacts_fts WHERE contacts_fts MATCH 'joao'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_active_slot_identity_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO slots (id, provider_id, slot_date, slot_time) VALUES ('s1', 'p1', '2024-01-15', '09:00')",
            [],
        )
        .unwrap();

        // Second active slot for the same identity should fail
        let result = conn.execute(
            "INSERT INTO slots (id, provider_id, slot_date, slot_time) VALUES ('s2', 'p1', '2024-01-15', '09:00')",
            [],
        );
        assert!(result.is_err());

        // An inactive slot does not count
        conn.execute("UPDATE slots SET lifecycle = 'inactive' WHERE id = 's1'", [])
            .unwrap();
        let result = conn.execute(
            "INSERT INTO slots (id, provider_id, slot_date, slot_time) VALUES ('s2', 'p1', '2024-01-15', '09:00')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_candidate_pair_ordering_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute("INSERT INTO contacts (id, name) VALUES ('a', 'A'), ('b', 'B')", [])
            .unwrap();

        let result = conn.execute(
            "INSERT INTO duplicate_candidates (id, contact_a, contact_b, score, level) VALUES ('d1', 'b', 'a', 0.9, 'likely')",
            [],
        );
        assert!(result.is_err());
    }
}
