//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        card_image::OpenAiImageAdapter,
        db::PgProfileStore,
        interpreter_llm::{OpenAiInterpreterAdapter, RetryPolicy},
        local::JsonFileStore,
        payments::{StripeCheckoutAdapter, TossConfirmAdapter},
    },
    config::Config,
    error::ApiError,
    web::{
        confirm_payment_handler, create_checkout_handler, get_profile_handler, require_identity,
        rest::ApiDoc, state::AppState, stripe_webhook_handler, ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let profile_store = Arc::new(PgProfileStore::new(db_pool.clone()));
    info!("Running database migrations...");
    profile_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let local_store = Arc::new(JsonFileStore::new(config.data_dir.clone())?);

    let openai_api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?;
    let openai_config = OpenAIConfig::new().with_api_key(openai_api_key.clone());
    let openai_client = Client::with_config(openai_config);

    let interpreter = Arc::new(OpenAiInterpreterAdapter::new(
        openai_client,
        config.interpreter_model.clone(),
        RetryPolicy::default(),
    ));

    let http = reqwest::Client::new();
    let card_images = Arc::new(OpenAiImageAdapter::new(
        http.clone(),
        openai_api_key,
        config.image_model.clone(),
    ));

    let stripe_secret = config
        .stripe_secret_key
        .clone()
        .ok_or_else(|| ApiError::Internal("STRIPE_SECRET_KEY is required".to_string()))?;
    let checkout = Arc::new(StripeCheckoutAdapter::new(
        http.clone(),
        stripe_secret,
        config.stripe_success_url.clone(),
        config.stripe_cancel_url.clone(),
    ));

    let toss_secret = config
        .toss_secret_key
        .clone()
        .ok_or_else(|| ApiError::Internal("TOSS_SECRET_KEY is required".to_string()))?;
    let payment_confirm = Arc::new(TossConfirmAdapter::new(http, toss_secret));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        profiles: profile_store,
        local: local_store,
        interpreter,
        card_images,
        checkout,
        payment_confirm,
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Routes that act on behalf of an identity (account or guest device).
    let identity_routes = Router::new()
        .route("/profile", get(get_profile_handler))
        .route("/ws", get(ws_handler))
        .route("/payments/checkout", post(create_checkout_handler))
        .route("/payments/confirm", post(confirm_payment_handler))
        .layer(axum_middleware::from_fn(require_identity));

    // The provider posts webhooks without our identity headers.
    let webhook_routes =
        Router::new().route("/payments/stripe/webhook", post(stripe_webhook_handler));

    let api_router = Router::new()
        .merge(identity_routes)
        .merge(webhook_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
