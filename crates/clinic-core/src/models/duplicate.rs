//! Duplicate candidate models produced by the duplicate detector.

use serde::{Deserialize, Serialize};

/// A field that contributed to a duplicate score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Document,
    Phone,
    Name,
    DateOfBirth,
}

impl MatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::Document => "document",
            MatchField::Phone => "phone",
            MatchField::Name => "name",
            MatchField::DateOfBirth => "date_of_birth",
        }
    }
}

/// How strongly a candidate pair is suspected to be one person.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateLevel {
    /// Score ≥ likely threshold: review required
    Likely,
    /// Between the possible and likely thresholds: informational
    Possible,
}

impl DuplicateLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateLevel::Likely => "likely",
            DuplicateLevel::Possible => "possible",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "likely" => Some(DuplicateLevel::Likely),
            "possible" => Some(DuplicateLevel::Possible),
            _ => None,
        }
    }
}

/// Human review state of a candidate. Only staff actions move it out of `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    ConfirmedMerge,
    ConfirmedDistinct,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::ConfirmedMerge => "confirmed_merge",
            CandidateStatus::ConfirmedDistinct => "confirmed_distinct",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CandidateStatus::Pending),
            "confirmed_merge" => Some(CandidateStatus::ConfirmedMerge),
            "confirmed_distinct" => Some(CandidateStatus::ConfirmedDistinct),
            _ => None,
        }
    }
}

/// Advisory link between two contacts that may be the same person.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCandidate {
    /// Stable candidate ID (UUID)
    pub id: String,
    /// Lexicographically smaller contact ID of the pair
    pub contact_a: String,
    /// Lexicographically larger contact ID of the pair
    pub contact_b: String,
    /// Similarity score (0.0 - 1.0)
    pub score: f64,
    pub matched_fields: Vec<MatchField>,
    pub level: DuplicateLevel,
    pub status: CandidateStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Set when staff resolve the candidate
    pub resolved_at: Option<String>,
}

impl DuplicateCandidate {
    /// Create a pending candidate. The pair is stored in canonical order so
    /// (a, b) and (b, a) map to the same record.
    pub fn new(
        first: &str,
        second: &str,
        score: f64,
        matched_fields: Vec<MatchField>,
        level: DuplicateLevel,
    ) -> Self {
        let (contact_a, contact_b) = if first <= second {
            (first.to_string(), second.to_string())
        } else {
            (second.to_string(), first.to_string())
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            contact_a,
            contact_b,
            score,
            matched_fields,
            level,
            status: CandidateStatus::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
            resolved_at: None,
        }
    }

    /// The other contact of the pair.
    pub fn other(&self, contact_id: &str) -> &str {
        if self.contact_a == contact_id {
            &self.contact_b
        } else {
            &self.contact_a
        }
    }

    pub fn requires_review(&self) -> bool {
        self.level == DuplicateLevel::Likely && self.status == CandidateStatus::Pending
    }
}
