//! Error taxonomy surfaced to callers of the core.

use thiserror::Error;

use crate::db::DbError;
use crate::models::AppointmentStatus;

/// Which invariant a conflicting request ran into.
///
/// Slot-creation conflicts (`SlotExists`), "this time is taken" booking
/// conflicts (`SlotTaken`, `SlotUnavailable`, `ProviderOverlap`) and "you
/// already have an appointment" conflicts (`PatientOverlap`) are distinct so
/// the surrounding layer can word them differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("an active slot already exists for provider {provider_id} on {date} at {time}")]
    SlotExists {
        provider_id: String,
        date: String,
        time: String,
    },

    #[error("slot {slot_id} is occupied by appointment {appointment_id}")]
    SlotOccupied {
        slot_id: String,
        appointment_id: String,
    },

    #[error("slot {slot_id} is already booked")]
    SlotTaken { slot_id: String },

    #[error("slot {slot_id} is not open for booking")]
    SlotUnavailable { slot_id: String },

    #[error("patient already has appointment {appointment_id} overlapping this time")]
    PatientOverlap { appointment_id: String },

    #[error("provider already has appointment {appointment_id} overlapping this time")]
    ProviderOverlap { appointment_id: String },

    #[error("document {document} belongs to another active patient")]
    DocumentInUse { document: String },

    #[error("contact is already registered as patient {patient_id}")]
    ContactAlreadyRegistered { patient_id: String },
}

impl ConflictKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::SlotExists { .. } => "slot_exists",
            ConflictKind::SlotOccupied { .. } => "slot_occupied",
            ConflictKind::SlotTaken { .. } => "slot_taken",
            ConflictKind::SlotUnavailable { .. } => "slot_unavailable",
            ConflictKind::PatientOverlap { .. } => "patient_overlap",
            ConflictKind::ProviderOverlap { .. } => "provider_overlap",
            ConflictKind::DocumentInUse { .. } => "document_in_use",
            ConflictKind::ContactAlreadyRegistered { .. } => "contact_already_registered",
        }
    }
}

/// Core errors.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or missing input; the caller must fix it and retry.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An invariant would be violated; the caller must pick another resource.
    #[error("Conflict: {0}")]
    Conflict(ConflictKind),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: cannot {requested} an appointment in state {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        requested: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Coarse error category, one per variant of [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    InvalidTransition,
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Storage => "storage",
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CoreError::Database(_) => ErrorKind::Storage,
        }
    }

    pub fn conflict(&self) -> Option<&ConflictKind> {
        match self {
            CoreError::Conflict(kind) => Some(kind),
            _ => None,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub(crate) fn not_found(what: &str, id: &str) -> Self {
        CoreError::NotFound(format!("{what} {id}"))
    }
}

impl From<ConflictKind> for CoreError {
    fn from(kind: ConflictKind) -> Self {
        CoreError::Conflict(kind)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
