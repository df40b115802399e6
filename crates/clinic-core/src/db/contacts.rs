//! Contact database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Contact, Lifecycle};

const CONTACT_COLUMNS: &str = "id, name, phone, whatsapp, email, date_of_birth, \
    document_number, sources, lifecycle, merged_into, created_at, updated_at";

impl Database {
    /// Insert a new contact.
    pub fn insert_contact(&self, contact: &Contact) -> DbResult<()> {
        let sources_json = serde_json::to_string(&contact.sources)?;

        self.conn.execute(
            r#"
            INSERT INTO contacts (
                id, name, phone, whatsapp, email, date_of_birth, document_number,
                sources, lifecycle, merged_into, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                contact.id,
                contact.name,
                contact.phone,
                contact.whatsapp,
                contact.email,
                contact.date_of_birth,
                contact.document_number,
                sources_json,
                contact.lifecycle.as_str(),
                contact.merged_into,
                contact.created_at,
                contact.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing contact.
    pub fn update_contact(&self, contact: &Contact) -> DbResult<bool> {
        let sources_json = serde_json::to_string(&contact.sources)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE contacts SET
                name = ?2,
                phone = ?3,
                whatsapp = ?4,
                email = ?5,
                date_of_birth = ?6,
                document_number = ?7,
                sources = ?8,
                lifecycle = ?9,
                merged_into = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
            params![
                contact.id,
                contact.name,
                contact.phone,
                contact.whatsapp,
                contact.email,
                contact.date_of_birth,
                contact.document_number,
                sources_json,
                contact.lifecycle.as_str(),
                contact.merged_into,
                contact.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a contact by ID, regardless of lifecycle.
    pub fn get_contact(&self, id: &str) -> DbResult<Option<Contact>> {
        self.conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?"),
                [id],
                ContactRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// First active contact with this normalized WhatsApp number.
    pub fn find_contact_by_whatsapp(&self, whatsapp: &str) -> DbResult<Option<Contact>> {
        self.find_active_contact_by("whatsapp", whatsapp)
    }

    /// First active contact with this normalized email.
    pub fn find_contact_by_email(&self, email: &str) -> DbResult<Option<Contact>> {
        self.find_active_contact_by("email", email)
    }

    /// First active contact with this normalized phone number.
    pub fn find_contact_by_phone(&self, phone: &str) -> DbResult<Option<Contact>> {
        self.find_active_contact_by("phone", phone)
    }

    // `column` is always one of the fixed names above, never caller input.
    fn find_active_contact_by(&self, column: &str, value: &str) -> DbResult<Option<Contact>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts \
                     WHERE {column} = ? AND lifecycle = 'active' \
                     ORDER BY created_at, rowid LIMIT 1"
                ),
                [value],
                ContactRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Active contacts sharing a phone-like number or document with the given
    /// values, or whose name matches the FTS query. Used to retrieve duplicate
    /// candidates; `exclude_id` is left out of the result.
    pub fn find_contact_match_candidates(
        &self,
        exclude_id: &str,
        numbers: &[&str],
        document: Option<&str>,
        name_query: Option<&str>,
        limit: usize,
    ) -> DbResult<Vec<Contact>> {
        let mut found: Vec<Contact> = Vec::new();

        let push_unique = |contact: Contact, found: &mut Vec<Contact>| {
            if contact.id != exclude_id && !found.iter().any(|c| c.id == contact.id) {
                found.push(contact);
            }
        };

        for number in numbers {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts \
                 WHERE (phone = ?1 OR whatsapp = ?1) AND lifecycle = 'active' \
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![number, limit as i64], ContactRow::from_row)?;
            for row in rows {
                push_unique(row?.try_into()?, &mut found);
            }
        }

        if let Some(document) = document {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts \
                 WHERE document_number = ?1 AND lifecycle = 'active' \
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![document, limit as i64], ContactRow::from_row)?;
            for row in rows {
                push_unique(row?.try_into()?, &mut found);
            }
        }

        if let Some(query) = name_query {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT c.id, c.name, c.phone, c.whatsapp, c.email, c.date_of_birth,
                       c.document_number, c.sources, c.lifecycle, c.merged_into,
                       c.created_at, c.updated_at
                FROM contacts_fts f
                JOIN contacts c ON c.rowid = f.rowid
                WHERE contacts_fts MATCH ?1 AND c.lifecycle = 'active'
                ORDER BY rank
                LIMIT ?2
                "#,
            )?;
            let rows = stmt.query_map(params![query, limit as i64], ContactRow::from_row)?;
            for row in rows {
                push_unique(row?.try_into()?, &mut found);
            }
        }

        Ok(found)
    }

    /// List active contacts ordered by name.
    pub fn list_active_contacts(&self) -> DbResult<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE lifecycle = 'active' ORDER BY name"
        ))?;

        let rows = stmt.query_map([], ContactRow::from_row)?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?.try_into()?);
        }
        Ok(contacts)
    }

    /// Soft-deactivate a contact. Contacts are never physically deleted.
    pub fn set_contact_lifecycle(&self, id: &str, lifecycle: Lifecycle) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE contacts SET lifecycle = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, lifecycle.as_str(), chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct ContactRow {
    id: String,
    name: String,
    phone: Option<String>,
    whatsapp: Option<String>,
    email: Option<String>,
    date_of_birth: Option<String>,
    document_number: Option<String>,
    sources: String,
    lifecycle: String,
    merged_into: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ContactRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            whatsapp: row.get(3)?,
            email: row.get(4)?,
            date_of_birth: row.get(5)?,
            document_number: row.get(6)?,
            sources: row.get(7)?,
            lifecycle: row.get(8)?,
            merged_into: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl TryFrom<ContactRow> for Contact {
    type Error = DbError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let sources: Vec<String> = serde_json::from_str(&row.sources)?;
        let lifecycle = Lifecycle::parse(&row.lifecycle)
            .ok_or_else(|| DbError::Constraint(format!("Unknown lifecycle: {}", row.lifecycle)))?;

        Ok(Contact {
            id: row.id,
            name: row.name,
            phone: row.phone,
            whatsapp: row.whatsapp,
            email: row.email,
            date_of_birth: row.date_of_birth,
            document_number: row.document_number,
            sources,
            lifecycle,
            merged_into: row.merged_into,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactDraft;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn contact(name: &str, whatsapp: Option<&str>) -> Contact {
        let mut draft = ContactDraft::new(name);
        draft.whatsapp = whatsapp.map(Into::into);
        Contact::from_draft(&draft)
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut c = contact("Ana Silva", Some("11987654321"));
        c.sources = vec!["newsletter".into()];
        db.insert_contact(&c).unwrap();

        let retrieved = db.get_contact(&c.id).unwrap().unwrap();
        assert_eq!(retrieved, c);
    }

    #[test]
    fn test_find_by_channel_ignores_inactive() {
        let db = setup_db();

        let c = contact("Ana Silva", Some("11987654321"));
        db.insert_contact(&c).unwrap();
        assert!(db.find_contact_by_whatsapp("11987654321").unwrap().is_some());

        db.set_contact_lifecycle(&c.id, Lifecycle::Inactive).unwrap();
        assert!(db.find_contact_by_whatsapp("11987654321").unwrap().is_none());

        // Still readable by ID
        let retrieved = db.get_contact(&c.id).unwrap().unwrap();
        assert_eq!(retrieved.lifecycle, Lifecycle::Inactive);
    }

    #[test]
    fn test_update_contact() {
        let db = setup_db();

        let mut c = contact("Ana Silva", None);
        db.insert_contact(&c).unwrap();

        c.email = Some("ana@x.com".into());
        c.sources.push("public-scheduling".into());
        assert!(db.update_contact(&c).unwrap());

        let retrieved = db.find_contact_by_email("ana@x.com").unwrap().unwrap();
        assert_eq!(retrieved.id, c.id);
        assert_eq!(retrieved.sources, vec!["public-scheduling".to_string()]);
    }

    #[test]
    fn test_match_candidates() {
        let db = setup_db();

        let ana = contact("Ana Silva", Some("11987654321"));
        let ana_phone = {
            let mut c = contact("A. Souza", None);
            c.phone = Some("11987654321".into());
            c
        };
        let ana_name = contact("Ana Maria Silva", None);
        let bruno = contact("Bruno Costa", Some("21999990000"));
        for c in [&ana, &ana_phone, &ana_name, &bruno] {
            db.insert_contact(c).unwrap();
        }

        let found = db
            .find_contact_match_candidates(
                &ana.id,
                &["11987654321"],
                None,
                Some("\"ana\" OR \"silva\""),
                20,
            )
            .unwrap();

        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&ana_phone.id.as_str()));
        assert!(ids.contains(&ana_name.id.as_str()));
        assert!(!ids.contains(&ana.id.as_str()));
        assert!(!ids.contains(&bruno.id.as_str()));
    }

    #[test]
    fn test_malformed_sources_is_error() {
        let db = setup_db();
        db.conn()
            .execute(
                "INSERT INTO contacts (id, name, sources) VALUES ('bad', 'Broken', 'not json')",
                [],
            )
            .unwrap();
        assert!(db.get_contact("bad").is_err());
    }
}
