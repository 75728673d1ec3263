//! services/api/src/adapters/payments/stripe.rs
//!
//! The hosted-checkout payment adapter. It implements the `CheckoutService`
//! port: create a checkout session at the provider, send the buyer to its
//! hosted page, and later confirm completion from the provider's webhook by
//! reading the session back over the API rather than trusting the payload.

use arcana_core::ledger::CoinPack;
use arcana_core::ports::{
    CheckoutService, CheckoutSession, CompletedPayment, PortError, PortResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A Stripe adapter that implements the `CheckoutService` port.
#[derive(Clone)]
pub struct StripeCheckoutAdapter {
    http: reqwest::Client,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl StripeCheckoutAdapter {
    /// Creates a new `StripeCheckoutAdapter`.
    pub fn new(
        http: reqwest::Client,
        secret_key: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http,
            secret_key,
            success_url,
            cancel_url,
        }
    }

    async fn fetch_session(&self, session_id: &str) -> PortResult<CheckoutSessionObject> {
        let response = self
            .http
            .get(format!("{CHECKOUT_SESSIONS_URL}/{session_id}"))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "checkout session lookup returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct CheckoutSessionObject {
    id: String,
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Deserialize, Default)]
struct SessionMetadata {
    user_id: Option<String>,
    coins: Option<String>,
}

#[derive(Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    data: WebhookData,
}

#[derive(Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Deserialize)]
struct WebhookObject {
    id: String,
}

//=========================================================================================
// `CheckoutService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CheckoutService for StripeCheckoutAdapter {
    async fn create_checkout(&self, user_id: Uuid, pack: &CoinPack) -> PortResult<CheckoutSession> {
        // Stripe's API is form-encoded; nested fields use bracket notation.
        let form = [
            ("mode", "payment".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "krw".to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                pack.price.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Arcana coin pack: {}", pack.id),
            ),
            ("metadata[user_id]", user_id.to_string()),
            ("metadata[coins]", pack.coins.to_string()),
        ];

        let response = self
            .http
            .post(CHECKOUT_SESSIONS_URL)
            .basic_auth(&self.secret_key, Some(""))
            .form(&form)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "checkout session create returned {}",
                response.status()
            )));
        }

        let session: CheckoutSessionObject = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let redirect_url = session.url.ok_or_else(|| {
            PortError::Unexpected("checkout session carried no redirect url".to_string())
        })?;

        Ok(CheckoutSession {
            payment_id: session.id,
            redirect_url,
        })
    }

    async fn verify_webhook(&self, payload: &[u8]) -> PortResult<Option<CompletedPayment>> {
        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| PortError::Unexpected(format!("unreadable webhook payload: {e}")))?;

        if event.kind != "checkout.session.completed" {
            return Ok(None);
        }

        // Read the session back from the API so a forged payload cannot
        // credit coins.
        let session = self.fetch_session(&event.data.object.id).await?;
        if session.payment_status.as_deref() != Some("paid") {
            return Err(PortError::Rejected(format!(
                "checkout session {} is not paid",
                session.id
            )));
        }

        let user_id = session
            .metadata
            .user_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                PortError::Unexpected("checkout session metadata lacks a user id".to_string())
            })?;
        let coins = session
            .metadata
            .coins
            .as_deref()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| {
                PortError::Unexpected("checkout session metadata lacks a coin amount".to_string())
            })?;

        Ok(Some(CompletedPayment {
            payment_id: session.id,
            user_id,
            coins,
        }))
    }
}
