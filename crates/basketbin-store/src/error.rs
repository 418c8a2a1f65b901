//! Error taxonomy for the persistence layer

use sea_orm::DbErr;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by basket and request operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A basket with this name already exists
    #[error("Basket already exists: {0}")]
    Conflict(String),

    /// Basket (or token) absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Basket already carries an ownership token
    #[error("Basket already claimed: {0}")]
    AlreadyClaimed(String),

    /// Presented token does not own the basket
    #[error("Token does not grant access to basket: {0}")]
    Forbidden(String),

    #[error("Invalid basket name: {0}")]
    InvalidName(String),

    /// Generated token already belongs to another basket
    #[error("Token already in use")]
    TokenCollision,

    /// Storage rejected a write
    #[error("Storage rejected {op}: {source}")]
    Persistence {
        op: &'static str,
        #[source]
        source: DbErr,
    },

    /// Unexpected storage fault during a read
    #[error("Storage fault during {op}: {source}")]
    Internal {
        op: &'static str,
        #[source]
        source: DbErr,
    },
}

impl StoreError {
    pub(crate) fn persistence(op: &'static str) -> impl FnOnce(DbErr) -> Self {
        move |source| StoreError::Persistence { op, source }
    }

    pub(crate) fn internal(op: &'static str) -> impl FnOnce(DbErr) -> Self {
        move |source| StoreError::Internal { op, source }
    }

    /// Short machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Conflict(_) => "BASKET_EXISTS",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::AlreadyClaimed(_) => "ALREADY_CLAIMED",
            StoreError::Forbidden(_) => "FORBIDDEN",
            StoreError::InvalidName(_) => "INVALID_NAME",
            StoreError::TokenCollision => "TOKEN_COLLISION",
            StoreError::Persistence { .. } => "PERSISTENCE_ERROR",
            StoreError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

/// Result of a best-effort cleanup step
///
/// Deletion paths never return `Err`: a failed step is reported here with
/// its cause so the caller can decide whether to continue.
#[derive(Debug)]
pub enum CleanupOutcome {
    /// Step ran; `rows_affected` may be zero
    Done { rows_affected: u64 },
    /// Step was not attempted because an earlier step aborted the flow
    Skipped,
    Failed { cause: StoreError },
}

impl CleanupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CleanupOutcome::Done { .. })
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            CleanupOutcome::Done { rows_affected } => *rows_affected,
            _ => 0,
        }
    }

    pub fn cause(&self) -> Option<&StoreError> {
        match self {
            CleanupOutcome::Failed { cause } => Some(cause),
            _ => None,
        }
    }
}
