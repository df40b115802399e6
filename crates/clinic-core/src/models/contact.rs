//! Contact models: the communication identity shared by every intake channel.

use serde::{Deserialize, Serialize};

use super::Lifecycle;

/// A communication identity (name + phone/WhatsApp/email).
///
/// Uniqueness is probabilistic; see [`crate::identity::DuplicateDetector`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    /// Stable contact ID (UUID)
    pub id: String,
    /// Display name, whitespace-collapsed
    pub name: String,
    /// Phone number, digits only
    pub phone: Option<String>,
    /// WhatsApp number, digits only
    pub whatsapp: Option<String>,
    /// Email, trimmed and lower-cased
    pub email: Option<String>,
    /// Date of birth as reported (free text tolerated)
    pub date_of_birth: Option<String>,
    /// National ID as reported at intake, alphanumerics only
    pub document_number: Option<String>,
    /// Registration sources ("newsletter", "public-scheduling", ...)
    pub sources: Vec<String>,
    /// Soft-delete state
    pub lifecycle: Lifecycle,
    /// Contact this one was merged into, if any
    pub merged_into: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// Raw contact fields as they arrive from an intake channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactDraft {
    pub name: String,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<String>,
    pub document_number: Option<String>,
    /// Registration source tag for this touch
    pub source: Option<String>,
}

impl ContactDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_whatsapp(mut self, whatsapp: impl Into<String>) -> Self {
        self.whatsapp = Some(whatsapp.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_date_of_birth(mut self, dob: impl Into<String>) -> Self {
        self.date_of_birth = Some(dob.into());
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document_number = Some(document.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Contact {
    /// Create a new active contact from an already-normalized draft.
    pub fn from_draft(draft: &ContactDraft) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name.clone(),
            phone: draft.phone.clone(),
            whatsapp: draft.whatsapp.clone(),
            email: draft.email.clone(),
            date_of_birth: draft.date_of_birth.clone(),
            document_number: draft.document_number.clone(),
            sources: draft.source.iter().cloned().collect(),
            lifecycle: Lifecycle::Active,
            merged_into: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Merge newly reported fields into this contact.
    ///
    /// A field is only overwritten when the incoming value is non-empty.
    /// Sources are appended, never dropped. Returns true if anything changed.
    pub fn merge_from(&mut self, draft: &ContactDraft) -> bool {
        let mut changed = false;

        if !draft.name.trim().is_empty() && draft.name != self.name {
            self.name = draft.name.clone();
            changed = true;
        }

        changed |= overwrite_if_present(&mut self.phone, &draft.phone);
        changed |= overwrite_if_present(&mut self.whatsapp, &draft.whatsapp);
        changed |= overwrite_if_present(&mut self.email, &draft.email);
        changed |= overwrite_if_present(&mut self.date_of_birth, &draft.date_of_birth);
        changed |= overwrite_if_present(&mut self.document_number, &draft.document_number);

        if let Some(source) = &draft.source {
            changed |= self.add_source(source);
        }

        if changed {
            self.touch();
        }
        changed
    }

    /// Take over another contact's data after staff confirmed they are the
    /// same person. This contact's values win where both are present.
    pub fn absorb(&mut self, other: &Contact) -> bool {
        let mut changed = false;

        changed |= fill_if_empty(&mut self.phone, &other.phone);
        changed |= fill_if_empty(&mut self.whatsapp, &other.whatsapp);
        changed |= fill_if_empty(&mut self.email, &other.email);
        changed |= fill_if_empty(&mut self.date_of_birth, &other.date_of_birth);
        changed |= fill_if_empty(&mut self.document_number, &other.document_number);
        for source in &other.sources {
            changed |= self.add_source(source);
        }

        if changed {
            self.touch();
        }
        changed
    }

    /// Append a registration source if not already present.
    pub fn add_source(&mut self, source: &str) -> bool {
        if source.is_empty() || self.sources.iter().any(|s| s == source) {
            return false;
        }
        self.sources.push(source.to_string());
        true
    }

    /// All phone-like channels (phone and WhatsApp) this contact is reachable on.
    pub fn phone_numbers(&self) -> impl Iterator<Item = &str> {
        self.phone
            .iter()
            .chain(self.whatsapp.iter())
            .map(String::as_str)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

fn overwrite_if_present(field: &mut Option<String>, incoming: &Option<String>) -> bool {
    match incoming {
        Some(value) if !value.is_empty() && field.as_deref() != Some(value.as_str()) => {
            *field = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn fill_if_empty(field: &mut Option<String>, other: &Option<String>) -> bool {
    let empty = field.as_deref().map_or(true, str::is_empty);
    match other {
        Some(value) if empty && !value.is_empty() => {
            *field = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// Outcome of resolving raw contact fields to a canonical contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedContact {
    pub contact: Contact,
    pub is_new: bool,
    pub duplicate_candidates: Vec<super::DuplicateCandidate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_draft() {
        let draft = ContactDraft::new("Ana Silva")
            .with_whatsapp("11987654321")
            .with_source("public-scheduling");
        let contact = Contact::from_draft(&draft);

        assert_eq!(contact.name, "Ana Silva");
        assert_eq!(contact.whatsapp, Some("11987654321".into()));
        assert_eq!(contact.sources, vec!["public-scheduling".to_string()]);
        assert!(contact.is_active());
        assert_eq!(contact.id.len(), 36);
    }

    #[test]
    fn test_merge_non_empty_wins() {
        let mut contact = Contact::from_draft(
            &ContactDraft::new("Ana Silva")
                .with_whatsapp("11987654321")
                .with_email("ana@x.com"),
        );

        let mut incoming = ContactDraft::new("Ana Silva").with_phone("1133334444");
        incoming.email = Some(String::new());

        assert!(contact.merge_from(&incoming));
        assert_eq!(contact.phone, Some("1133334444".into()));
        // Empty value never clears an existing one
        assert_eq!(contact.email, Some("ana@x.com".into()));
        assert_eq!(contact.whatsapp, Some("11987654321".into()));
    }

    #[test]
    fn test_merge_keeps_sources() {
        let mut contact =
            Contact::from_draft(&ContactDraft::new("Ana").with_source("newsletter"));

        contact.merge_from(&ContactDraft::new("Ana").with_source("public-scheduling"));
        contact.merge_from(&ContactDraft::new("Ana").with_source("newsletter"));

        assert_eq!(
            contact.sources,
            vec!["newsletter".to_string(), "public-scheduling".to_string()]
        );
    }

    #[test]
    fn test_merge_identical_is_noop() {
        let draft = ContactDraft::new("Ana").with_whatsapp("11987654321");
        let mut contact = Contact::from_draft(&draft);
        assert!(!contact.merge_from(&draft));
    }

    #[test]
    fn test_absorb_keeps_own_values() {
        let mut kept = Contact::from_draft(
            &ContactDraft::new("Ana Silva")
                .with_whatsapp("11987654321")
                .with_source("newsletter"),
        );
        let absorbed = Contact::from_draft(
            &ContactDraft::new("Ana S.")
                .with_whatsapp("11900000000")
                .with_email("ana@x.com")
                .with_source("public-scheduling"),
        );

        assert!(kept.absorb(&absorbed));
        assert_eq!(kept.name, "Ana Silva");
        assert_eq!(kept.whatsapp, Some("11987654321".into()));
        assert_eq!(kept.email, Some("ana@x.com".into()));
        assert_eq!(
            kept.sources,
            vec!["newsletter".to_string(), "public-scheduling".to_string()]
        );
        assert!(!kept.absorb(&absorbed));
    }

    #[test]
    fn test_phone_numbers() {
        let contact = Contact::from_draft(
            &ContactDraft::new("Ana")
                .with_phone("1133334444")
                .with_whatsapp("11987654321"),
        );
        let numbers: Vec<&str> = contact.phone_numbers().collect();
        assert_eq!(numbers, vec!["1133334444", "11987654321"]);
    }
}
