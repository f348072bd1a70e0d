//! HTTP handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::Serialize;

use super::state::AppState;
use super::types::{ApiError, ApiResult, ok};
use crate::ledger::{AuditReport, MinorUnits};
use crate::transfer::{TransferReceipt, TransferRequest};

/// Header carrying the client-supplied idempotency key
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub system: &'static str,
    /// Sum of all ledger entries; anything but 0 means corruption
    pub ledger_integrity_sum: MinorUnits,
}

/// Create transfer endpoint
///
/// POST /api/v1/transfer
///
/// Requires the `X-Idempotency-Key` header. A repeated key is rejected with
/// 409 and the transfer is not executed again.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransferReceipt> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match state.transfers.submit(key, req).await {
        Ok(receipt) => ok(receipt),
        Err(e) => {
            if e.http_status() >= 500 {
                tracing::error!(code = e.code(), error = %e, "Transfer failed");
            }
            Err(e.into())
        }
    }
}

/// Health check endpoint
///
/// GET /api/v1/health
///
/// - Healthy: 200 OK + {system: "healthy", ledger_integrity_sum}
/// - Ledger unreachable: 500
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let sum = state.audit.global_entry_sum().await.map_err(|e| {
        tracing::error!("[HEALTH] Ledger integrity check failed: {}", e);
        ApiError::internal("Ledger integrity check failed")
    })?;

    if sum != 0 {
        tracing::error!(ledger_integrity_sum = sum, "[HEALTH] Ledger is not zero-sum");
    }

    ok(HealthResponse {
        system: "healthy",
        ledger_integrity_sum: sum,
    })
}

/// Reconciliation audit endpoint
///
/// GET /api/v1/audit
pub async fn run_audit(State(state): State<Arc<AppState>>) -> ApiResult<AuditReport> {
    match state.audit.run().await {
        Ok(report) => ok(report),
        Err(e) => {
            tracing::error!("[AUDIT] Reconciliation failed: {}", e);
            Err(ApiError::internal("Reconciliation failed"))
        }
    }
}
