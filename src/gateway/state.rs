use std::sync::Arc;

use crate::ledger::LedgerAudit;
use crate::transfer::TransferService;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Idempotency gate + transfer engine
    pub transfers: Arc<TransferService>,
    /// Read-only ledger checks for health and audit
    pub audit: Arc<LedgerAudit>,
}

impl AppState {
    pub fn new(transfers: Arc<TransferService>, audit: Arc<LedgerAudit>) -> Self {
        Self { transfers, audit }
    }
}
