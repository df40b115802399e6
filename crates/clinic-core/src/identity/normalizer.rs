//! Contact field normalizer.
//!
//! Handles:
//! - Phone/WhatsApp digit extraction ("(11) 98765-4321" → "11987654321")
//! - Email trimming and lower-casing
//! - Name whitespace collapsing and tokenizing for similarity
//! - Date-of-birth canonicalization (several day-first formats → ISO)

use chrono::NaiveDate;

use crate::models::ContactDraft;

/// Name particles ignored when comparing names ("Ana da Silva" ~ "Ana Silva").
const NAME_PARTICLES: &[&str] = &["da", "de", "do", "das", "dos", "e", "del", "la", "van", "von"];

/// Normalizer for raw contact fields.
pub struct Normalizer {
    /// Accepted date-of-birth layouts, tried in order
    dob_formats: Vec<&'static str>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with the default date layouts.
    pub fn new() -> Self {
        Self {
            dob_formats: vec!["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"],
        }
    }

    /// Normalize every field of a draft. Empty values become `None`.
    pub fn normalize(&self, draft: &ContactDraft) -> ContactDraft {
        ContactDraft {
            name: normalize_name(&draft.name),
            phone: draft.phone.as_deref().and_then(normalize_phone),
            whatsapp: draft.whatsapp.as_deref().and_then(normalize_phone),
            email: draft.email.as_deref().and_then(normalize_email),
            date_of_birth: draft
                .date_of_birth
                .as_deref()
                .and_then(|dob| self.canonical_date_of_birth(dob)),
            document_number: draft.document_number.as_deref().and_then(normalize_document),
            source: draft.source.as_deref().and_then(normalize_source),
        }
    }

    /// ISO date if the value parses with a known layout, otherwise the trimmed
    /// text as reported.
    pub fn canonical_date_of_birth(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        for format in &self.dob_formats {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Some(date.format("%Y-%m-%d").to_string());
            }
        }
        Some(trimmed.to_lowercase())
    }
}

/// Keep digits only.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep ASCII alphanumerics, upper-cased ("123.456.789-00" → "12345678900").
pub fn normalize_document(raw: &str) -> Option<String> {
    let doc: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!doc.is_empty()).then_some(doc)
}

/// Lower-case, trimmed, inner whitespace turned into dashes.
pub fn normalize_source(raw: &str) -> Option<String> {
    let source = raw.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase();
    (!source.is_empty()).then_some(source)
}

/// Comparable name tokens: lower-cased, accents folded, punctuation dropped,
/// particles and single letters removed.
pub fn name_tokens(name: &str) -> Vec<String> {
    name.split(|c: char| c.is_whitespace() || c == '-' || c == '.' || c == ',')
        .map(|token| {
            token
                .chars()
                .flat_map(char::to_lowercase)
                .map(fold_accent)
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|token| token.chars().count() > 1 && !NAME_PARTICLES.contains(&token.as_str()))
        .collect()
}

/// Build an FTS5 query that matches any of the name's tokens.
pub fn fts_name_query(name: &str) -> Option<String> {
    let tokens = name_tokens(name);
    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_digits_only() {
        assert_eq!(normalize_phone("(11) 98765-4321"), Some("11987654321".into()));
        assert_eq!(normalize_phone("+55 11 98765 4321"), Some("5511987654321".into()));
        assert_eq!(normalize_phone("n/a"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_email() {
        assert_eq!(normalize_email("  Ana@X.com "), Some("ana@x.com".into()));
        assert_eq!(normalize_email("   "), None);
    }

    #[test]
    fn test_name_collapse() {
        assert_eq!(normalize_name("  Ana   Maria\tSilva "), "Ana Maria Silva");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_document() {
        assert_eq!(normalize_document("123.456.789-00"), Some("12345678900".into()));
        assert_eq!(normalize_document("mg-12.345"), Some("MG12345".into()));
        assert_eq!(normalize_document(" - "), None);
    }

    #[test]
    fn test_source() {
        assert_eq!(normalize_source(" Public Scheduling "), Some("public-scheduling".into()));
        assert_eq!(normalize_source(""), None);
    }

    #[test]
    fn test_dob_formats() {
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.canonical_date_of_birth("1990-03-25"), Some("1990-03-25".into()));
        assert_eq!(normalizer.canonical_date_of_birth("25/03/1990"), Some("1990-03-25".into()));
        assert_eq!(normalizer.canonical_date_of_birth("25.03.1990"), Some("1990-03-25".into()));
        // Free text is kept
        assert_eq!(normalizer.canonical_date_of_birth(" March 1990 "), Some("march 1990".into()));
        assert_eq!(normalizer.canonical_date_of_birth("  "), None);
    }

    #[test]
    fn test_name_tokens() {
        assert_eq!(name_tokens("Ana da Silva"), vec!["ana", "silva"]);
        assert_eq!(name_tokens("JOÃO  Conceição"), vec!["joao", "conceicao"]);
        assert_eq!(name_tokens("M. O'Neil-Souza"), vec!["oneil", "souza"]);
    }

    #[test]
    fn test_fts_query() {
        assert_eq!(fts_name_query("Ana Silva"), Some("\"ana\" OR \"silva\"".into()));
        assert_eq!(fts_name_query("A."), None);
    }

    #[test]
    fn test_normalize_draft() {
        let normalizer = Normalizer::new();
        let draft = ContactDraft::new("  Ana  Silva ")
            .with_whatsapp("(11) 98765-4321")
            .with_email(" ANA@X.COM")
            .with_phone("")
            .with_source("Public Scheduling");

        let normalized = normalizer.normalize(&draft);
        assert_eq!(normalized.name, "Ana Silva");
        assert_eq!(normalized.whatsapp, Some("11987654321".into()));
        assert_eq!(normalized.email, Some("ana@x.com".into()));
        assert_eq!(normalized.phone, None);
        assert_eq!(normalized.source, Some("public-scheduling".into()));
    }
}
