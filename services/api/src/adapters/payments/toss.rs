//! services/api/src/adapters/payments/toss.rs
//!
//! The confirm-then-credit payment adapter. It implements the
//! `PaymentConfirmService` port: the client obtains a payment handle from
//! the provider's widget, and the server confirms amount and order here
//! before any coins are credited.

use arcana_core::ports::{PaymentConfirmService, PortError, PortResult};
use async_trait::async_trait;
use serde::Deserialize;

const CONFIRM_URL: &str = "https://api.tosspayments.com/v1/payments/confirm";

/// A Toss Payments adapter that implements the `PaymentConfirmService` port.
#[derive(Clone)]
pub struct TossConfirmAdapter {
    http: reqwest::Client,
    secret_key: String,
}

impl TossConfirmAdapter {
    /// Creates a new `TossConfirmAdapter`.
    pub fn new(http: reqwest::Client, secret_key: String) -> Self {
        Self { http, secret_key }
    }
}

#[derive(Deserialize)]
struct TossErrorBody {
    message: Option<String>,
}

#[async_trait]
impl PaymentConfirmService for TossConfirmAdapter {
    async fn confirm(&self, payment_key: &str, order_id: &str, amount: u32) -> PortResult<()> {
        let body = serde_json::json!({
            "paymentKey": payment_key,
            "orderId": order_id,
            "amount": amount,
        });

        let response = self
            .http
            .post(CONFIRM_URL)
            .basic_auth(&self.secret_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        // The provider explains declines in the response body.
        let status = response.status();
        let message = response
            .json::<TossErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("confirm endpoint returned {status}"));
        Err(PortError::Rejected(message))
    }
}
