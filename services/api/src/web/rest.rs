//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::{AppState, SessionState};
use arcana_core::domain::Identity;
use arcana_core::tier::effective_tier;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_profile_handler,
        crate::web::payments::create_checkout_handler,
        crate::web::payments::confirm_payment_handler,
        crate::web::payments::stripe_webhook_handler,
    ),
    components(
        schemas(
            ProfileResponse,
            crate::web::payments::CheckoutRequest,
            crate::web::payments::CheckoutResponse,
            crate::web::payments::ConfirmRequest,
            crate::web::payments::ConfirmResponse,
        )
    ),
    tags(
        (name = "Arcana API", description = "Session, economy and payment endpoints for the tarot reader.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The reconciled, rolled-over view of the caller's profile.
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    coins: u32,
    tier: String,
    streak_day: u8,
    daily_readings: u8,
    /// Remaining readings today; absent for unlimited tiers.
    daily_quota: Option<u8>,
    readings_recorded: usize,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Fetch the caller's profile.
///
/// Runs the same session-start sequence as the WebSocket flow: local/remote
/// reconciliation followed by the daily/monthly rollover.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The reconciled profile", body = ProfileResponse),
        (status = 401, description = "Neither x-user-id nor x-device-id was sent"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Option<String>, Header, description = "Gateway-injected account id."),
        ("x-device-id" = Option<String>, Header, description = "Client-supplied guest device id.")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    let (session, _rollover) = SessionState::initialize(&app_state, identity, today)
        .await
        .map_err(|e| {
            error!("Failed to load profile: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load profile".to_string(),
            )
        })?;

    let tier = effective_tier(&session.profile, &session.identity);
    let response = ProfileResponse {
        coins: session.profile.coins,
        tier: format!("{tier:?}").to_lowercase(),
        streak_day: session.profile.streak_day,
        daily_readings: session.profile.daily_readings,
        daily_quota: tier.daily_quota(),
        readings_recorded: session.profile.history.len(),
    };
    Ok(Json(response))
}
