//! crates/arcana_core/src/domain.rs
//!
//! Defines the core data structures for the session & economy controller.
//! These structs are independent of any database or serialization backend;
//! the remote store persists the whole aggregate as an opaque JSON blob.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::Category;
use crate::tier::Tier;

/// Coins granted to a freshly created profile.
pub const STARTING_COINS: u32 = 100;

/// How many past readings the aggregate keeps, most recent first.
pub const HISTORY_LIMIT: usize = 50;

/// The acting identity behind a session.
///
/// Guests are pinned to the top tier and exempt from coin deduction, but are
/// limited to a single lifetime trial reading tracked in [`DeviceRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Guest { device_id: String },
    Account { user_id: Uuid, email: Option<String> },
}

impl Identity {
    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest { .. })
    }

    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            Identity::Account { user_id, .. } => Some(*user_id),
            Identity::Guest { .. } => None,
        }
    }

    /// Stable key naming the local snapshot for this identity.
    pub fn owner_key(&self) -> String {
        match self {
            Identity::Guest { device_id } => format!("guest-{device_id}"),
            Identity::Account { user_id, .. } => user_id.to_string(),
        }
    }
}

/// The per-user aggregate. All session mutations go through the reducers in
/// `ledger`, `flow` and `rollover`; nothing else writes these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub coins: u32,
    /// Lifetime spend, never reset.
    pub total_spent: u32,
    /// Spend within the current calendar month; reset at monthly rollover.
    pub monthly_spent: u32,
    pub tier: Tier,
    /// Attendance streak position, 0 before the first login.
    pub streak_day: u8,
    pub last_login: Option<NaiveDate>,
    /// Readings taken today; reset at daily rollover.
    pub daily_readings: u8,
    pub last_reading: Option<NaiveDate>,
    /// Owned cosmetic customization ids.
    pub customizations: Vec<String>,
    /// Reading history, most recent first, capped at [`HISTORY_LIMIT`].
    pub history: Vec<ReadingResult>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            coins: STARTING_COINS,
            total_spent: 0,
            monthly_spent: 0,
            tier: Tier::Bronze,
            streak_day: 0,
            last_login: None,
            daily_readings: 0,
            last_reading: None,
            customizations: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl UserProfile {
    /// Appends a finished reading to the front of the history.
    pub fn record_reading(&mut self, result: ReadingResult) {
        self.history.insert(0, result);
        self.history.truncate(HISTORY_LIMIT);
    }
}

/// An immutable record of one finished reading. Appended to history; only
/// the card image fields may be filled in after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub category: Category,
    pub question: Option<String>,
    pub cards: Vec<TarotCard>,
    pub interpretation: String,
}

/// One drawn card. Created at card-selection time; `image_url` is populated
/// asynchronously and non-blockingly afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TarotCard {
    /// Index into the fixed 78-entry deck.
    pub index: u8,
    pub name: String,
    /// Randomized independently per draw.
    pub reversed: bool,
    /// Generated artwork, if and when image generation succeeds.
    pub image_url: Option<String>,
}

impl TarotCard {
    /// The static placeholder artwork shown until generation completes.
    pub fn placeholder_image(&self) -> String {
        format!("/assets/cards/{:02}.png", self.index)
    }
}

/// What the seeker tells us on the info screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekerInfo {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
}

/// Per-device record tracking the guest lifetime trial. Persisted under its
/// own key, outside the main profile blob, so clearing the profile does not
/// also clear the trial counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub trial_used: bool,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            trial_used: false,
        }
    }
}
