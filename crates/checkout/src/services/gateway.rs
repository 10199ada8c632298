//! Payment gateway status-check client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::CheckoutError;

/// Parameters of a status lookup, passed through exactly as received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusQuery<'a> {
    pub product_code: &'a str,
    pub total_amount: &'a str,
    pub transaction_uuid: &'a str,
}

/// The gateway's answer to a status lookup.
///
/// `status` is left as text because the gateway may answer with a value
/// outside the known set, or with only an `error_message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GatewayStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl GatewayStatus {
    /// A response carrying just a status.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

/// Trait for looking up authoritative transaction status.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetches the current status of a transaction.
    ///
    /// Network failures, timeouts, non-2xx responses and unparseable bodies
    /// all fail with `GatewayUnavailable`.
    async fn transaction_status(
        &self,
        query: StatusQuery<'_>,
    ) -> Result<GatewayStatus, CheckoutError>;
}

/// Status-check client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    status_url: String,
}

impl HttpGateway {
    /// Creates a client for the gateway at `base_url`. Every request is
    /// bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CheckoutError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            status_url: format!(
                "{}/api/epay/transaction/status/",
                base_url.trim_end_matches('/')
            ),
        })
    }

    async fn fetch(&self, query: StatusQuery<'_>) -> Result<GatewayStatus, CheckoutError> {
        let response = self
            .client
            .get(&self.status_url)
            .query(&[
                ("product_code", query.product_code),
                ("total_amount", query.total_amount),
                ("transaction_uuid", query.transaction_uuid),
            ])
            .send()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckoutError::GatewayUnavailable(format!(
                "status check returned HTTP {status}"
            )));
        }

        response
            .json::<GatewayStatus>()
            .await
            .map_err(|e| CheckoutError::GatewayUnavailable(format!("unreadable response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    #[tracing::instrument(skip(self))]
    async fn transaction_status(
        &self,
        query: StatusQuery<'_>,
    ) -> Result<GatewayStatus, CheckoutError> {
        let start = Instant::now();
        let result = self.fetch(query).await;
        metrics::histogram!("gateway_status_check_seconds").record(start.elapsed().as_secs_f64());
        result
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    statuses: HashMap<String, GatewayStatus>,
    unavailable: bool,
    calls: usize,
}

/// In-memory gateway for testing.
///
/// Unknown transactions answer `NOT_FOUND`, like the real gateway.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the response for a transaction identifier.
    pub fn set_status(&self, transaction_uuid: impl Into<String>, status: GatewayStatus) {
        self.lock().statuses.insert(transaction_uuid.into(), status);
    }

    /// Configures the gateway to fail every lookup.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Returns the number of lookups made.
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn transaction_status(
        &self,
        query: StatusQuery<'_>,
    ) -> Result<GatewayStatus, CheckoutError> {
        let mut state = self.lock();
        state.calls += 1;

        if state.unavailable {
            return Err(CheckoutError::GatewayUnavailable(
                "connection refused".to_string(),
            ));
        }

        Ok(state
            .statuses
            .get(query.transaction_uuid)
            .cloned()
            .unwrap_or_else(|| GatewayStatus::with_status("NOT_FOUND")))
    }
}
