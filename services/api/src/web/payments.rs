//! services/api/src/web/payments.rs
//!
//! Axum handlers for the two payment flows: the hosted-checkout provider
//! (create session -> redirect -> webhook credits) and the confirm-then-credit
//! provider. Both share one idempotent crediting path keyed by the
//! provider-assigned payment identifier.

use crate::web::state::AppState;
use arcana_core::ledger::{self, coin_pack};
use arcana_core::ports::{CompletedPayment, PortError, PortResult};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use arcana_core::domain::Identity;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub pack_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub redirect_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ConfirmRequest {
    pub payment_key: String,
    pub order_id: String,
    pub amount: u32,
    pub pack_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct ConfirmResponse {
    /// False when this payment identifier had already been credited.
    pub credited: bool,
    pub coins: u32,
}

//=========================================================================================
// Idempotent Crediting
//=========================================================================================

/// Credits a completed payment exactly once. The store's insert on the
/// payment identifier arbitrates replays: only the first caller proceeds to
/// move coins.
pub async fn credit_coins(
    app: &AppState,
    payment: &CompletedPayment,
    provider: &str,
) -> PortResult<bool> {
    let newly_recorded = app
        .profiles
        .record_payment(&payment.payment_id, payment.user_id, payment.coins, provider)
        .await?;
    if !newly_recorded {
        info!(
            "Ignoring replayed {provider} payment {}.",
            payment.payment_id
        );
        return Ok(false);
    }

    let mut profile = app
        .profiles
        .fetch(payment.user_id)
        .await?
        .unwrap_or_default();
    ledger::earn(&mut profile, payment.coins);
    app.profiles.upsert(payment.user_id, &profile).await?;
    info!(
        "Credited {} coins to {} for {provider} payment {}.",
        payment.coins, payment.user_id, payment.payment_id
    );
    Ok(true)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /payments/checkout - Create a hosted checkout session for a coin pack.
#[utoipa::path(
    post,
    path = "/payments/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Unknown coin pack"),
        (status = 401, description = "Purchases require a signed-in account"),
        (status = 500, description = "Provider error")
    )
)]
pub async fn create_checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(user_id) = identity.account_id() else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Sign in to purchase coins".to_string(),
        ));
    };
    let pack = coin_pack(&req.pack_id)
        .ok_or((StatusCode::BAD_REQUEST, "Unknown coin pack".to_string()))?;

    let session = state
        .checkout
        .create_checkout(user_id, pack)
        .await
        .map_err(|e| {
            error!("Failed to create checkout session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create checkout session".to_string(),
            )
        })?;

    Ok(Json(CheckoutResponse {
        redirect_url: session.redirect_url,
    }))
}

/// POST /payments/stripe/webhook - Provider callback confirming a checkout.
///
/// Replays of the same payment identifier are acknowledged without crediting
/// again. This route sits outside the identity middleware; the provider does
/// not send our headers.
#[utoipa::path(
    post,
    path = "/payments/stripe/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Unverifiable payload"),
        (status = 500, description = "Crediting failed")
    )
)]
pub async fn stripe_webhook_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> StatusCode {
    let completed = match state.checkout.verify_webhook(&body).await {
        Ok(Some(completed)) => completed,
        Ok(None) => return StatusCode::OK,
        Err(e) => {
            error!("Rejected checkout webhook: {:?}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match credit_coins(&state, &completed, "stripe").await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            error!("Failed to credit checkout payment: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// POST /payments/confirm - Confirm-then-credit flow.
///
/// The server verifies the amount against the chosen pack and confirms with
/// the provider before any coins move; a declined confirmation surfaces as a
/// failed transaction with nothing credited.
#[utoipa::path(
    post,
    path = "/payments/confirm",
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Payment confirmed and credited", body = ConfirmResponse),
        (status = 400, description = "Unknown pack or amount mismatch"),
        (status = 401, description = "Purchases require a signed-in account"),
        (status = 402, description = "The provider declined the payment"),
        (status = 500, description = "Crediting failed")
    )
)]
pub async fn confirm_payment_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(user_id) = identity.account_id() else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Sign in to purchase coins".to_string(),
        ));
    };
    let pack = coin_pack(&req.pack_id)
        .ok_or((StatusCode::BAD_REQUEST, "Unknown coin pack".to_string()))?;
    if pack.price != req.amount {
        return Err((
            StatusCode::BAD_REQUEST,
            "Amount does not match the selected pack".to_string(),
        ));
    }

    state
        .payment_confirm
        .confirm(&req.payment_key, &req.order_id, req.amount)
        .await
        .map_err(|e| match e {
            PortError::Rejected(message) => (StatusCode::PAYMENT_REQUIRED, message),
            other => {
                error!("Payment confirmation failed: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Payment confirmation failed".to_string(),
                )
            }
        })?;

    let completed = CompletedPayment {
        payment_id: req.payment_key.clone(),
        user_id,
        coins: pack.coins,
    };
    let credited = credit_coins(&state, &completed, "toss").await.map_err(|e| {
        error!("Failed to credit confirmed payment: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to credit payment".to_string(),
        )
    })?;

    Ok(Json(ConfirmResponse {
        credited,
        coins: pack.coins,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use arcana_core::domain::{DeviceRecord, UserProfile};
    use arcana_core::ports::{
        CardImageService, CheckoutService, CheckoutSession, InterpretationRequest,
        InterpretationService, LocalSnapshot, LocalStore, PaymentConfirmService, ProfileStore,
    };
    use arcana_core::CoinPack;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeProfileStore {
        profiles: Mutex<HashMap<Uuid, UserProfile>>,
        payments: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl ProfileStore for FakeProfileStore {
        async fn fetch(&self, user_id: Uuid) -> PortResult<Option<UserProfile>> {
            Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
        }
        async fn upsert(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()> {
            self.profiles.lock().unwrap().insert(user_id, profile.clone());
            Ok(())
        }
        async fn record_payment(
            &self,
            payment_id: &str,
            _user_id: Uuid,
            _coins: u32,
            _provider: &str,
        ) -> PortResult<bool> {
            Ok(self.payments.lock().unwrap().insert(payment_id.to_string()))
        }
    }

    struct NullLocalStore;
    impl LocalStore for NullLocalStore {
        fn load_snapshot(&self, _owner: &str) -> PortResult<Option<LocalSnapshot>> {
            Ok(None)
        }
        fn save_snapshot(&self, _owner: &str, _snapshot: &LocalSnapshot) -> PortResult<()> {
            Ok(())
        }
        fn load_device(&self, _device_id: &str) -> PortResult<Option<DeviceRecord>> {
            Ok(None)
        }
        fn save_device(&self, _record: &DeviceRecord) -> PortResult<()> {
            Ok(())
        }
    }

    struct NullInterpreter;
    #[async_trait]
    impl InterpretationService for NullInterpreter {
        async fn interpret(&self, _request: &InterpretationRequest) -> PortResult<String> {
            Ok(String::new())
        }
    }

    struct NullImages;
    #[async_trait]
    impl CardImageService for NullImages {
        async fn generate(&self, _card: &arcana_core::TarotCard) -> PortResult<String> {
            Ok(String::new())
        }
    }

    struct NullCheckout;
    #[async_trait]
    impl CheckoutService for NullCheckout {
        async fn create_checkout(
            &self,
            _user_id: Uuid,
            _pack: &CoinPack,
        ) -> PortResult<CheckoutSession> {
            Err(PortError::Unexpected("unused".to_string()))
        }
        async fn verify_webhook(&self, _payload: &[u8]) -> PortResult<Option<CompletedPayment>> {
            Ok(None)
        }
    }

    struct NullConfirm;
    #[async_trait]
    impl PaymentConfirmService for NullConfirm {
        async fn confirm(&self, _key: &str, _order: &str, _amount: u32) -> PortResult<()> {
            Ok(())
        }
    }

    fn test_app(profiles: Arc<FakeProfileStore>) -> AppState {
        AppState {
            config: Arc::new(test_config()),
            profiles,
            local: Arc::new(NullLocalStore),
            interpreter: Arc::new(NullInterpreter),
            card_images: Arc::new(NullImages),
            checkout: Arc::new(NullCheckout),
            payment_confirm: Arc::new(NullConfirm),
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            data_dir: std::env::temp_dir(),
            openai_api_key: None,
            interpreter_model: String::new(),
            image_model: String::new(),
            stripe_secret_key: None,
            stripe_success_url: String::new(),
            stripe_cancel_url: String::new(),
            toss_secret_key: None,
            cors_origin: String::new(),
        }
    }

    #[tokio::test]
    async fn a_replayed_payment_credits_exactly_once() {
        let profiles = Arc::new(FakeProfileStore::default());
        let app = test_app(profiles.clone());
        let user_id = Uuid::new_v4();
        let payment = CompletedPayment {
            payment_id: "pay_123".to_string(),
            user_id,
            coins: 800,
        };

        assert!(credit_coins(&app, &payment, "stripe").await.unwrap());
        assert!(!credit_coins(&app, &payment, "stripe").await.unwrap());

        let profile = profiles.fetch(user_id).await.unwrap().unwrap();
        assert_eq!(profile.coins, UserProfile::default().coins + 800);
    }

    #[tokio::test]
    async fn distinct_payments_each_credit() {
        let profiles = Arc::new(FakeProfileStore::default());
        let app = test_app(profiles.clone());
        let user_id = Uuid::new_v4();

        for payment_id in ["pay_a", "pay_b"] {
            let payment = CompletedPayment {
                payment_id: payment_id.to_string(),
                user_id,
                coins: 300,
            };
            assert!(credit_coins(&app, &payment, "toss").await.unwrap());
        }

        let profile = profiles.fetch(user_id).await.unwrap().unwrap();
        assert_eq!(profile.coins, UserProfile::default().coins + 600);
    }
}
