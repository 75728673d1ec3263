pub mod middleware;
pub mod payments;
pub mod protocol;
pub mod reading_task;
pub mod rest;
pub mod snapshot;
pub mod state;
pub mod ws_handler;

// Re-export the main handlers to make them easily accessible
// to the binary that will build the web server router.
pub use middleware::require_identity;
pub use payments::{confirm_payment_handler, create_checkout_handler, stripe_webhook_handler};
pub use rest::get_profile_handler;
pub use ws_handler::ws_handler;
