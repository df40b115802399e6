//! Duplicate candidate database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{CandidateStatus, DuplicateCandidate, DuplicateLevel, MatchField};

const CANDIDATE_COLUMNS: &str = "id, contact_a, contact_b, score, matched_fields, level, \
    status, created_at, resolved_at";

impl Database {
    /// Record a candidate pair, or refresh the score of a still-pending one.
    ///
    /// A pair already resolved by staff is left untouched. Returns the stored row.
    pub fn upsert_candidate(&self, candidate: &DuplicateCandidate) -> DbResult<DuplicateCandidate> {
        let fields_json = serde_json::to_string(&candidate.matched_fields)?;

        self.conn.execute(
            r#"
            INSERT INTO duplicate_candidates (
                id, contact_a, contact_b, score, matched_fields, level,
                status, created_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(contact_a, contact_b) DO UPDATE SET
                score = excluded.score,
                matched_fields = excluded.matched_fields,
                level = excluded.level
            WHERE duplicate_candidates.status = 'pending'
            "#,
            params![
                candidate.id,
                candidate.contact_a,
                candidate.contact_b,
                candidate.score,
                fields_json,
                candidate.level.as_str(),
                candidate.status.as_str(),
                candidate.created_at,
                candidate.resolved_at,
            ],
        )?;

        self.get_candidate_for_pair(&candidate.contact_a, &candidate.contact_b)?
            .ok_or_else(|| {
                DbError::NotFound(format!(
                    "candidate {} / {}",
                    candidate.contact_a, candidate.contact_b
                ))
            })
    }

    /// Get a candidate by ID.
    pub fn get_candidate(&self, id: &str) -> DbResult<Option<DuplicateCandidate>> {
        self.conn
            .query_row(
                &format!("SELECT {CANDIDATE_COLUMNS} FROM duplicate_candidates WHERE id = ?"),
                [id],
                CandidateRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get the candidate for a pair, in either order.
    pub fn get_candidate_for_pair(
        &self,
        first: &str,
        second: &str,
    ) -> DbResult<Option<DuplicateCandidate>> {
        let (a, b) = if first <= second { (first, second) } else { (second, first) };
        self.conn
            .query_row(
                &format!(
                    "SELECT {CANDIDATE_COLUMNS} FROM duplicate_candidates \
                     WHERE contact_a = ?1 AND contact_b = ?2"
                ),
                [a, b],
                CandidateRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Pending candidates, highest score first.
    pub fn list_pending_candidates(&self) -> DbResult<Vec<DuplicateCandidate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM duplicate_candidates \
             WHERE status = 'pending' \
             ORDER BY score DESC, created_at"
        ))?;

        let rows = stmt.query_map([], CandidateRow::from_row)?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?.try_into()?);
        }
        Ok(candidates)
    }

    /// Pending candidates that involve a contact.
    pub fn list_pending_candidates_for_contact(
        &self,
        contact_id: &str,
    ) -> DbResult<Vec<DuplicateCandidate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM duplicate_candidates \
             WHERE status = 'pending' AND (contact_a = ?1 OR contact_b = ?1) \
             ORDER BY score DESC, created_at"
        ))?;

        let rows = stmt.query_map([contact_id], CandidateRow::from_row)?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?.try_into()?);
        }
        Ok(candidates)
    }

    /// Resolve a candidate. Only pending candidates change.
    pub fn resolve_candidate(&self, id: &str, status: CandidateStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE duplicate_candidates SET status = ?2, resolved_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
            params![id, status.as_str(), chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct CandidateRow {
    id: String,
    contact_a: String,
    contact_b: String,
    score: f64,
    matched_fields: String,
    level: String,
    status: String,
    created_at: String,
    resolved_at: Option<String>,
}

impl CandidateRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact_a: row.get(1)?,
            contact_b: row.get(2)?,
            score: row.get(3)?,
            matched_fields: row.get(4)?,
            level: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            resolved_at: row.get(8)?,
        })
    }
}

impl TryFrom<CandidateRow> for DuplicateCandidate {
    type Error = DbError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let matched_fields: Vec<MatchField> = serde_json::from_str(&row.matched_fields)?;
        let level = DuplicateLevel::parse(&row.level)
            .ok_or_else(|| DbError::Constraint(format!("Unknown duplicate level: {}", row.level)))?;
        let status = CandidateStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown candidate status: {}", row.status)))?;

        Ok(DuplicateCandidate {
            id: row.id,
            contact_a: row.contact_a,
            contact_b: row.contact_b,
            score: row.score,
            matched_fields,
            level,
            status,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}
