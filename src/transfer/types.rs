//! Transfer request/receipt types

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::ledger::{AccountId, MinorUnits, TransactionId};
use crate::payout::TaskId;

/// Transfer request as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Minor units, must be positive
    pub amount: MinorUnits,
}

impl TransferRequest {
    pub fn new(from: AccountId, to: AccountId, amount: MinorUnits) -> Self {
        Self {
            from_account_id: from,
            to_account_id: to,
            amount,
        }
    }

    /// Shape checks that need no storage access
    pub fn validate(&self) -> Result<(), TransferError> {
        validate_amount(self.amount)
    }
}

pub(crate) fn validate_amount(amount: MinorUnits) -> Result<(), TransferError> {
    if amount <= 0 {
        return Err(TransferError::Validation(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    Ok(())
}

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transaction_id: TransactionId,
    pub task_id: TaskId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: MinorUnits,
}
