//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the reading flow.

use arcana_core::domain::TarotCard;
use arcana_core::flow::{Category, Screen};
use arcana_core::tier::Tier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Leaves the welcome screen.
    Begin,

    /// Submits the seeker's name and birth data from the info screen.
    SubmitInfo {
        name: String,
        birth_date: Option<NaiveDate>,
    },

    /// Picks a reading category from the category select.
    SelectCategory { category: Category },

    /// Submits the chosen question and starts the reading (question flow).
    SubmitQuestion { question: String },

    /// Confirms the face photo and starts the reading. The upload itself is
    /// handled out of band.
    SubmitFace,

    /// Starts the life reading from the life-input screen.
    SubmitLife,

    /// Submits the partner's name and starts the compatibility reading.
    SubmitPartner { partner_name: String },

    /// Ends the shuffle animation.
    FinishShuffle,

    /// Asks the server to draw the spread for the chosen category.
    PickCards,

    /// Returns to the category select from the result or an input screen.
    BackToCategories,

    EnterChatRoom,

    LeaveChatRoom,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms session start after reconciliation and rollover. Carries the
    /// resumed screen and the rollover's attendance reward, if any.
    SessionInitialized {
        screen: Screen,
        coins: u32,
        tier: Tier,
        streak_day: u8,
        streak_reward: u32,
        daily_readings: u8,
    },

    /// A committed transition. Carries the balance so the coin display stays
    /// in sync with deductions.
    ScreenChanged { screen: Screen, coins: u32 },

    /// A dismissable notice: quota reached, not enough coins, tier too low.
    Notice { message: String },

    /// The attempted category needs a signed-in account; the UI should show
    /// the auth prompt instead of transitioning.
    AuthPrompt { message: String },

    /// The drawn spread, sent alongside the transition to the result screen.
    CardsDrawn { cards: Vec<TarotCard> },

    /// The generated (or fallback) interpretation for a finished reading.
    InterpretationReady {
        reading_id: Uuid,
        interpretation: String,
    },

    /// Generated artwork for one card slot of the current spread.
    CardImageReady { slot: usize, image_url: String },

    /// Reports a fatal error to the client, which should display an error message.
    Error { message: String },
}
