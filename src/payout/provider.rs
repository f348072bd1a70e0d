//! Payout Providers
//!
//! The external payout rail is a capability: pass/fail plus error text.
//! Errors carry a kind so a retry policy can be layered on later without
//! reshaping the task state machine.

use async_trait::async_trait;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::types::PayoutDestination;
use crate::ledger::MinorUnits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Timeout, connectivity, upstream 5xx: a later attempt may succeed
    Retryable,
    /// Rejected by the provider: retrying will not help
    Terminal,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Retryable => "RETRYABLE",
            ProviderErrorKind::Terminal => "TERMINAL",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Retryable,
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Terminal,
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::Retryable
    }
}

/// External payout rail
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Send `amount` minor units to `destination`.
    ///
    /// May be slow. Callers impose their own timeout.
    async fn send_payout(
        &self,
        amount: MinorUnits,
        destination: &PayoutDestination,
    ) -> Result<(), ProviderError>;
}

// ============================================================================
// HTTP provider (production)
// ============================================================================

#[derive(Debug, Serialize)]
struct PayoutRequestBody<'a> {
    amount: MinorUnits,
    account_id: String,
    owner: &'a str,
}

/// Posts payouts as JSON to a bank gateway endpoint
pub struct HttpPayoutProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpPayoutProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PayoutProvider for HttpPayoutProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send_payout(
        &self,
        amount: MinorUnits,
        destination: &PayoutDestination,
    ) -> Result<(), ProviderError> {
        let body = PayoutRequestBody {
            amount,
            account_id: destination.account_id.to_string(),
            owner: &destination.owner,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::retryable(format!("payout request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        let message = format!("payout rejected with HTTP {}: {}", status.as_u16(), detail);
        if status.is_server_error() || status.as_u16() == 429 {
            Err(ProviderError::retryable(message))
        } else {
            Err(ProviderError::terminal(message))
        }
    }
}

// ============================================================================
// Simulated providers
// ============================================================================

/// Simulated bank: fixed latency and a random failure rate
pub struct MockPayoutProvider {
    latency: Duration,
    failure_rate: f64,
}

impl MockPayoutProvider {
    pub fn new(latency: Duration, failure_rate: f64) -> Self {
        Self {
            latency,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for MockPayoutProvider {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 0.1)
    }
}

#[async_trait]
impl PayoutProvider for MockPayoutProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send_payout(
        &self,
        _amount: MinorUnits,
        _destination: &PayoutDestination,
    ) -> Result<(), ProviderError> {
        tokio::time::sleep(self.latency).await;

        if rand::random::<f64>() < self.failure_rate {
            return Err(ProviderError::retryable("external bank gateway timeout"));
        }
        Ok(())
    }
}

/// Always fails with the configured error
pub struct FailingPayoutProvider {
    error: ProviderError,
}

impl FailingPayoutProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl PayoutProvider for FailingPayoutProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send_payout(
        &self,
        _amount: MinorUnits,
        _destination: &PayoutDestination,
    ) -> Result<(), ProviderError> {
        Err(self.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AccountId;

    fn destination() -> PayoutDestination {
        PayoutDestination {
            account_id: AccountId::new(),
            owner: "bob".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_never_fails_at_zero_rate() {
        let provider = MockPayoutProvider::new(Duration::ZERO, 0.0);
        for _ in 0..50 {
            assert!(provider.send_payout(100, &destination()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_mock_always_fails_at_full_rate() {
        let provider = MockPayoutProvider::new(Duration::ZERO, 1.0);
        let err = provider.send_payout(100, &destination()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "external bank gateway timeout");
    }

    #[test]
    fn test_mock_clamps_failure_rate() {
        let provider = MockPayoutProvider::new(Duration::ZERO, 7.0);
        assert_eq!(provider.failure_rate, 1.0);
    }

    #[tokio::test]
    async fn test_failing_provider_returns_configured_error() {
        let provider = FailingPayoutProvider::new(ProviderError::terminal("account closed"));
        let err = provider.send_payout(1, &destination()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Terminal);
        assert_eq!(err.message, "account closed");
    }

    #[test]
    fn test_provider_error_is_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(ProviderError::terminal("iban rejected"));
        assert_eq!(err.to_string(), "iban rejected");
    }

    #[tokio::test]
    async fn test_http_provider_unreachable_is_retryable() {
        // Port 9 (discard) is closed on any sane test host
        let provider =
            HttpPayoutProvider::new("http://127.0.0.1:9/payouts", Duration::from_secs(1)).unwrap();
        let err = provider.send_payout(100, &destination()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
