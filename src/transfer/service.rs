//! Transfer Service
//!
//! Request-level entry point: validate, pass the idempotency gate, then run
//! the engine. The gate is consulted before any ledger access, so a
//! duplicate or an unreachable lock service never reaches the database.

use tracing::{info, warn};

use super::engine::TransferEngine;
use super::error::TransferError;
use super::types::{TransferReceipt, TransferRequest};
use crate::idempotency::{Admission, IdempotencyGate};

pub struct TransferService {
    gate: IdempotencyGate,
    engine: TransferEngine,
}

impl TransferService {
    pub fn new(gate: IdempotencyGate, engine: TransferEngine) -> Self {
        Self { gate, engine }
    }

    /// Submit a client transfer under `idempotency_key`.
    ///
    /// An admitted key stays consumed even if the transfer then fails; a
    /// retry with the same key is rejected as a duplicate until the key
    /// expires.
    pub async fn submit(
        &self,
        idempotency_key: &str,
        req: TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        req.validate()?;

        match self.gate.admit(idempotency_key).await? {
            Admission::Admitted => {}
            Admission::Duplicate => {
                info!(key = idempotency_key, "Rejected duplicate transfer request");
                return Err(TransferError::Duplicate);
            }
        }

        self.engine
            .execute_transfer(req.from_account_id, req.to_account_id, req.amount)
            .await
            .inspect_err(|e| {
                warn!(
                    key = idempotency_key,
                    code = e.code(),
                    error = %e,
                    "Transfer failed after idempotency key was admitted"
                )
            })
    }
}
