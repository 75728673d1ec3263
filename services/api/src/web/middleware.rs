//! services/api/src/web/middleware.rs
//!
//! Identity extraction middleware. Authentication itself is delegated to the
//! upstream identity provider: the gateway injects `x-user-id` for signed-in
//! accounts, and clients supply `x-device-id` for guest sessions.

use arcana_core::domain::Identity;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Middleware that resolves the acting identity and inserts it into request
/// extensions for handlers to use.
///
/// Requests carrying neither header are rejected with 401.
pub async fn require_identity(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = req.headers();

    let identity = if let Some(user_id) = headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
        let user_id = Uuid::parse_str(user_id).map_err(|_| StatusCode::BAD_REQUEST)?;
        let email = headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Identity::Account { user_id, email }
    } else if let Some(device_id) = headers.get("x-device-id").and_then(|v| v.to_str().ok()) {
        Identity::Guest {
            device_id: device_id.to_string(),
        }
    } else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
