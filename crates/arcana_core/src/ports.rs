//! crates/arcana_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases,
//! payment providers or generative backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DeviceRecord, SeekerInfo, TarotCard, UserProfile};
use crate::flow::{Category, ReadingSession};
use crate::ledger::CoinPack;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Payment rejected: {0}")]
    Rejected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence Ports
//=========================================================================================

/// The authoritative remote store: one opaque JSON row per user, plus the
/// idempotency ledger for payment credits.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, user_id: Uuid) -> PortResult<Option<UserProfile>>;

    async fn upsert(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()>;

    /// Records a payment credit keyed by the provider-assigned payment id.
    /// Returns `true` when the id was newly recorded; `false` on a replay.
    async fn record_payment(
        &self,
        payment_id: &str,
        user_id: Uuid,
        coins: u32,
        provider: &str,
    ) -> PortResult<bool>;
}

/// The full aggregate plus the last active flow state, as persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    pub profile: UserProfile,
    pub session: ReadingSession,
}

/// The fast local store. Writes are synchronous; a failure is logged by the
/// caller and otherwise swallowed.
pub trait LocalStore: Send + Sync {
    fn load_snapshot(&self, owner: &str) -> PortResult<Option<LocalSnapshot>>;

    fn save_snapshot(&self, owner: &str, snapshot: &LocalSnapshot) -> PortResult<()>;

    /// The device record lives under its own key, outside the main blob.
    fn load_device(&self, device_id: &str) -> PortResult<Option<DeviceRecord>>;

    fn save_device(&self, record: &DeviceRecord) -> PortResult<()>;
}

//=========================================================================================
// Generative Backend Ports
//=========================================================================================

/// Everything the interpreter needs to compose a reading.
#[derive(Debug, Clone)]
pub struct InterpretationRequest {
    pub category: Category,
    pub question: Option<String>,
    pub seeker: Option<SeekerInfo>,
    pub cards: Vec<TarotCard>,
}

#[async_trait]
pub trait InterpretationService: Send + Sync {
    /// Produces the free-text interpretation for a finished spread.
    async fn interpret(&self, request: &InterpretationRequest) -> PortResult<String>;
}

#[async_trait]
pub trait CardImageService: Send + Sync {
    /// Generates artwork for one drawn card, returning its URL.
    async fn generate(&self, card: &TarotCard) -> PortResult<String>;
}

//=========================================================================================
// Payment Ports
//=========================================================================================

/// A hosted checkout session created at the provider.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub payment_id: String,
    pub redirect_url: String,
}

/// A confirmed payment extracted from a provider callback.
#[derive(Debug, Clone)]
pub struct CompletedPayment {
    pub payment_id: String,
    pub user_id: Uuid,
    pub coins: u32,
}

/// The hosted-checkout provider: create a session, redirect the buyer, and
/// confirm completion from the provider's webhook.
#[async_trait]
pub trait CheckoutService: Send + Sync {
    async fn create_checkout(&self, user_id: Uuid, pack: &CoinPack) -> PortResult<CheckoutSession>;

    /// Inspects a webhook payload. Returns `Ok(None)` for event types that
    /// carry no completed payment.
    async fn verify_webhook(&self, payload: &[u8]) -> PortResult<Option<CompletedPayment>>;
}

/// The confirm-then-credit provider: the client obtains a payment handle and
/// the server confirms amount and order before any coins move.
#[async_trait]
pub trait PaymentConfirmService: Send + Sync {
    async fn confirm(&self, payment_key: &str, order_id: &str, amount: u32) -> PortResult<()>;
}
