//! Transfer Error Types

use thiserror::Error;

use crate::idempotency::IdempotencyError;
use crate::ledger::{AccountId, MinorUnits};

/// Transfer error types
///
/// Every variant maps to one API error code and one HTTP status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Invalid request: {0}")]
    Validation(String),

    // === Account Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: MinorUnits,
        requested: MinorUnits,
    },

    // === Idempotency Errors ===
    #[error("Duplicate request (idempotency key already used)")]
    Duplicate,

    // === System Errors ===
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "VALIDATION_ERROR",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::Duplicate => "DUPLICATE_REQUEST",
            TransferError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            TransferError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_) => 400,
            TransferError::AccountNotFound(_) => 404,
            TransferError::Duplicate => 409,
            TransferError::InsufficientFunds { .. } => 422,
            TransferError::Storage(_) => 500,
            TransferError::Unavailable(_) => 503,
        }
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Storage(e.to_string())
    }
}

impl From<IdempotencyError> for TransferError {
    fn from(e: IdempotencyError) -> Self {
        match e {
            IdempotencyError::EmptyKey => {
                TransferError::Validation("X-Idempotency-Key header is required".to_string())
            }
            IdempotencyError::Unavailable(msg) => TransferError::Unavailable(msg),
        }
    }
}
