//! Duplicate detection across contacts.
//!
//! Signals:
//! - Same document number: 1.0
//! - Shared phone/WhatsApp number: 0.85
//! - Name token overlap: up to 0.5
//! - Same date of birth: +0.3
//!
//! Independent strong signals combine by maximum, not sum, so two weak
//! coincidences never outrank one strong match. The result is clamped to 1.0.

use strsim::jaro_winkler;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::db::{Database, DbResult};
use crate::models::{Contact, DuplicateCandidate, DuplicateLevel, MatchField};

use super::normalizer::{fts_name_query, name_tokens};

const DOCUMENT_SCORE: f64 = 1.0;
const PHONE_SCORE: f64 = 0.85;
const NAME_WEIGHT: f64 = 0.5;
const DATE_OF_BIRTH_BONUS: f64 = 0.3;

/// Two name tokens closer than this count as the same token ("Sousa"/"Souza").
const TOKEN_SIMILARITY: f64 = 0.92;

/// Number of contacts to pull back for scoring.
const CANDIDATE_LIMIT: usize = 50;

/// Score of one contact pair with the fields that contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchScore {
    pub score: f64,
    pub matched_fields: Vec<MatchField>,
}

/// Score a pair of contacts (0.0 - 1.0). Symmetric in its arguments.
pub fn score(a: &Contact, b: &Contact) -> f64 {
    score_pair(a, b).score
}

/// Score a pair of contacts and report which fields matched.
pub fn score_pair(a: &Contact, b: &Contact) -> MatchScore {
    let mut matched_fields = Vec::new();
    let mut strongest: f64 = 0.0;

    if let (Some(doc_a), Some(doc_b)) = (&a.document_number, &b.document_number) {
        if doc_a == doc_b {
            strongest = strongest.max(DOCUMENT_SCORE);
            matched_fields.push(MatchField::Document);
        }
    }

    if a.phone_numbers().any(|n| b.phone_numbers().any(|m| m == n)) {
        strongest = strongest.max(PHONE_SCORE);
        matched_fields.push(MatchField::Phone);
    }

    let name_similarity = name_similarity(&a.name, &b.name);
    if name_similarity > 0.0 {
        strongest = strongest.max(name_similarity * NAME_WEIGHT);
        matched_fields.push(MatchField::Name);
    }

    if let (Some(dob_a), Some(dob_b)) = (&a.date_of_birth, &b.date_of_birth) {
        if dob_a == dob_b {
            strongest += DATE_OF_BIRTH_BONUS;
            matched_fields.push(MatchField::DateOfBirth);
        }
    }

    MatchScore {
        score: strongest.clamp(0.0, 1.0),
        matched_fields,
    }
}

/// Token overlap of two names (0.0 - 1.0), tolerant to small spelling
/// differences per token.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = name_tokens(a);
    let tokens_b = name_tokens(b);
    let total = tokens_a.len() + tokens_b.len();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let matched_a = tokens_a
        .iter()
        .filter(|t| tokens_b.iter().any(|u| tokens_match(t, u)))
        .count();
    let matched_b = tokens_b
        .iter()
        .filter(|t| tokens_a.iter().any(|u| tokens_match(t, u)))
        .count();

    (matched_a + matched_b) as f64 / total as f64
}

fn tokens_match(a: &str, b: &str) -> bool {
    a == b || jaro_winkler(a, b).max(jaro_winkler(b, a)) >= TOKEN_SIMILARITY
}

/// Detector that finds likely duplicates of a contact among stored contacts.
pub struct DuplicateDetector<'a> {
    db: &'a Database,
    likely_threshold: f64,
    possible_threshold: f64,
}

impl<'a> DuplicateDetector<'a> {
    /// Create a new detector using the configured thresholds.
    pub fn new(db: &'a Database, config: &CoreConfig) -> Self {
        Self {
            db,
            likely_threshold: config.likely_duplicate_threshold,
            possible_threshold: config.possible_duplicate_threshold,
        }
    }

    /// Classify a score, or `None` if it is below the reporting threshold.
    pub fn classify(&self, score: f64) -> Option<DuplicateLevel> {
        if score >= self.likely_threshold {
            Some(DuplicateLevel::Likely)
        } else if score >= self.possible_threshold {
            Some(DuplicateLevel::Possible)
        } else {
            None
        }
    }

    /// Find candidates for a contact, highest score first.
    ///
    /// Failures (including malformed stored rows) are logged and reported as
    /// "no candidates"; they never fail the caller.
    pub fn find_candidates(&self, contact: &Contact) -> Vec<DuplicateCandidate> {
        match self.try_find_candidates(contact) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Duplicate detection failed for contact {}: {}", contact.id, e);
                Vec::new()
            }
        }
    }

    fn try_find_candidates(&self, contact: &Contact) -> DbResult<Vec<DuplicateCandidate>> {
        let numbers: Vec<&str> = contact.phone_numbers().collect();
        let name_query = fts_name_query(&contact.name);

        let others = self.db.find_contact_match_candidates(
            &contact.id,
            &numbers,
            contact.document_number.as_deref(),
            name_query.as_deref(),
            CANDIDATE_LIMIT,
        )?;

        let mut candidates: Vec<DuplicateCandidate> = others
            .iter()
            .filter_map(|other| {
                let scored = score_pair(contact, other);
                self.classify(scored.score).map(|level| {
                    DuplicateCandidate::new(
                        &contact.id,
                        &other.id,
                        scored.score,
                        scored.matched_fields,
                        level,
                    )
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            "Found {} duplicate candidates for contact {} among {} retrieved",
            candidates.len(),
            contact.id,
            others.len()
        );
        Ok(candidates)
    }

    /// Persist candidates for review. Storage failures are logged and skipped.
    pub fn record(&self, candidates: Vec<DuplicateCandidate>) -> Vec<DuplicateCandidate> {
        candidates
            .into_iter()
            .filter_map(|candidate| match self.db.upsert_candidate(&candidate) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    warn!(
                        "Could not record duplicate candidate {} / {}: {}",
                        candidate.contact_a, candidate.contact_b, e
                    );
                    None
                }
            })
            .collect()
    }
}
