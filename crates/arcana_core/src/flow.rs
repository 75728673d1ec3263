//! crates/arcana_core/src/flow.rs
//!
//! The screen state machine driving one reading session, with the guards
//! that gate category entry (tier, account) and the reading-producing
//! transition (daily quota, guest trial, coin deduction).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DeviceRecord, Identity, SeekerInfo, TarotCard, UserProfile};
use crate::ledger::{self, SpendOutcome};
use crate::tier::{effective_tier, Tier};

/// The screens a session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Welcome,
    InputInfo,
    CategorySelect,
    QuestionSelect,
    FaceUpload,
    LifeInput,
    PartnerInput,
    Shuffling,
    CardSelect,
    Result,
    ChatRoom,
}

/// Reading categories and their static gating metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Love,
    Career,
    Fortune,
    Face,
    Life,
    Partner,
}

impl Category {
    /// The input screen this category routes to from the category select.
    pub fn input_screen(self) -> Screen {
        match self {
            Category::Love | Category::Career | Category::Fortune => Screen::QuestionSelect,
            Category::Face => Screen::FaceUpload,
            Category::Life => Screen::LifeInput,
            Category::Partner => Screen::PartnerInput,
        }
    }

    /// Coin cost of one reading in this category.
    pub fn coin_cost(self) -> u32 {
        match self {
            Category::Love | Category::Career | Category::Fortune => 30,
            Category::Partner => 40,
            Category::Face | Category::Life => 50,
        }
    }

    /// Minimum tier required to enter this category.
    pub fn min_tier(self) -> Tier {
        match self {
            Category::Life | Category::Partner => Tier::Silver,
            _ => Tier::Bronze,
        }
    }

    /// Whether this category is gated behind a signed-in account.
    pub fn requires_account(self) -> bool {
        matches!(self, Category::Face | Category::Partner)
    }

    /// How many cards the spread for this category holds.
    pub fn draw_count(self) -> usize {
        match self {
            Category::Face => 1,
            Category::Partner => 2,
            Category::Love | Category::Career | Category::Fortune => 3,
            Category::Life => 5,
        }
    }
}

/// A guard rejection. None of these mutate the session or the profile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Not enough coins: need {needed}, have {have}")]
    InsufficientCoins { needed: u32, have: u32 },
    #[error("Daily reading limit of {limit} reached")]
    DailyQuotaExceeded { limit: u8 },
    #[error("The free trial reading has already been used")]
    TrialExhausted,
    #[error("This category requires the {required:?} tier or above")]
    TierTooLow { required: Tier },
    #[error("Sign in to use this category")]
    AccountRequired,
    #[error("Cannot {action} from the {from:?} screen")]
    InvalidTransition { from: Screen, action: &'static str },
}

/// Transient state for one reading flow. Snapshotted opportunistically so a
/// reconnect can resume mid-flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSession {
    pub screen: Screen,
    pub seeker: Option<SeekerInfo>,
    pub category: Option<Category>,
    pub question: Option<String>,
    pub cards: Vec<TarotCard>,
    /// Identifies the in-flight reading so late async results can find it.
    pub reading_id: Option<Uuid>,
}

impl Default for ReadingSession {
    fn default() -> Self {
        Self {
            screen: Screen::Welcome,
            seeker: None,
            category: None,
            question: None,
            cards: Vec::new(),
            reading_id: None,
        }
    }
}

impl ReadingSession {
    fn expect(&self, want: Screen, action: &'static str) -> Result<(), FlowError> {
        if self.screen == want {
            Ok(())
        } else {
            Err(FlowError::InvalidTransition {
                from: self.screen,
                action,
            })
        }
    }

    /// Welcome -> InputInfo.
    pub fn begin(&mut self) -> Result<Screen, FlowError> {
        self.expect(Screen::Welcome, "begin")?;
        self.screen = Screen::InputInfo;
        Ok(self.screen)
    }

    /// InputInfo -> CategorySelect.
    pub fn submit_info(&mut self, seeker: SeekerInfo) -> Result<Screen, FlowError> {
        self.expect(Screen::InputInfo, "submit info")?;
        self.seeker = Some(seeker);
        self.screen = Screen::CategorySelect;
        Ok(self.screen)
    }

    /// CategorySelect -> the category's input screen, gated on tier and
    /// account requirements. A rejection leaves the screen unchanged.
    pub fn select_category(
        &mut self,
        category: Category,
        profile: &UserProfile,
        identity: &Identity,
    ) -> Result<Screen, FlowError> {
        self.expect(Screen::CategorySelect, "select a category")?;
        if category.requires_account() && identity.is_guest() {
            return Err(FlowError::AccountRequired);
        }
        let required = category.min_tier();
        if effective_tier(profile, identity) < required {
            return Err(FlowError::TierTooLow { required });
        }
        self.category = Some(category);
        self.screen = category.input_screen();
        Ok(self.screen)
    }

    /// Input screen -> Shuffling: the reading-producing transition.
    ///
    /// Consults the tier-dependent daily quota and the guest lifetime trial
    /// (whichever is tighter blocks), then deducts the category's coin cost.
    /// If any gate rejects, nothing is mutated and the screen stays put; on
    /// success the counters advance and the transition commits.
    pub fn begin_reading(
        &mut self,
        question: Option<String>,
        profile: &mut UserProfile,
        device: &mut DeviceRecord,
        identity: &Identity,
        today: NaiveDate,
    ) -> Result<Screen, FlowError> {
        let category = self.category.ok_or(FlowError::InvalidTransition {
            from: self.screen,
            action: "begin a reading",
        })?;
        self.expect(category.input_screen(), "begin a reading")?;

        let readings_today = if profile.last_reading == Some(today) {
            profile.daily_readings
        } else {
            0
        };
        if let Some(limit) = effective_tier(profile, identity).daily_quota() {
            if readings_today >= limit {
                return Err(FlowError::DailyQuotaExceeded { limit });
            }
        }
        if identity.is_guest() && device.trial_used {
            return Err(FlowError::TrialExhausted);
        }

        let cost = category.coin_cost();
        if let SpendOutcome::InsufficientFunds = ledger::spend(profile, identity, cost) {
            return Err(FlowError::InsufficientCoins {
                needed: cost,
                have: profile.coins,
            });
        }

        profile.daily_readings = readings_today + 1;
        profile.last_reading = Some(today);
        if identity.is_guest() {
            device.trial_used = true;
        }

        self.question = question;
        self.reading_id = Some(Uuid::new_v4());
        self.screen = Screen::Shuffling;
        Ok(self.screen)
    }

    /// Shuffling -> CardSelect.
    pub fn finish_shuffle(&mut self) -> Result<Screen, FlowError> {
        self.expect(Screen::Shuffling, "finish shuffling")?;
        self.screen = Screen::CardSelect;
        Ok(self.screen)
    }

    /// CardSelect -> Result, committing the drawn spread.
    pub fn reveal_cards(&mut self, cards: Vec<TarotCard>) -> Result<Screen, FlowError> {
        self.expect(Screen::CardSelect, "reveal cards")?;
        self.cards = cards;
        self.screen = Screen::Result;
        Ok(self.screen)
    }

    /// Result (or a cancelled input screen) -> CategorySelect, clearing the
    /// in-flight reading state.
    pub fn back_to_categories(&mut self) -> Result<Screen, FlowError> {
        match self.screen {
            Screen::Result
            | Screen::QuestionSelect
            | Screen::FaceUpload
            | Screen::LifeInput
            | Screen::PartnerInput => {
                self.category = None;
                self.question = None;
                self.cards.clear();
                self.reading_id = None;
                self.screen = Screen::CategorySelect;
                Ok(self.screen)
            }
            from => Err(FlowError::InvalidTransition {
                from,
                action: "return to categories",
            }),
        }
    }

    /// CategorySelect -> ChatRoom.
    pub fn enter_chat_room(&mut self) -> Result<Screen, FlowError> {
        self.expect(Screen::CategorySelect, "enter the chat room")?;
        self.screen = Screen::ChatRoom;
        Ok(self.screen)
    }

    /// ChatRoom -> CategorySelect.
    pub fn leave_chat_room(&mut self) -> Result<Screen, FlowError> {
        self.expect(Screen::ChatRoom, "leave the chat room")?;
        self.screen = Screen::CategorySelect;
        Ok(self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck;

    fn account() -> Identity {
        Identity::Account {
            user_id: Uuid::new_v4(),
            email: Some("seeker@example.com".to_string()),
        }
    }

    fn guest() -> Identity {
        Identity::Guest {
            device_id: "device-1".to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn at_category_select() -> ReadingSession {
        let mut session = ReadingSession::default();
        session.begin().unwrap();
        session
            .submit_info(SeekerInfo {
                name: "Mina".to_string(),
                birth_date: None,
            })
            .unwrap();
        session
    }

    #[test]
    fn happy_path_walks_every_screen() {
        let identity = account();
        let mut profile = UserProfile::default();
        let mut device = DeviceRecord::new("device-1");
        let mut session = at_category_select();

        session
            .select_category(Category::Love, &profile, &identity)
            .unwrap();
        assert_eq!(session.screen, Screen::QuestionSelect);

        session
            .begin_reading(
                Some("Will it work out?".to_string()),
                &mut profile,
                &mut device,
                &identity,
                today(),
            )
            .unwrap();
        assert_eq!(session.screen, Screen::Shuffling);
        assert!(session.reading_id.is_some());
        assert_eq!(profile.coins, 70);
        assert_eq!(profile.daily_readings, 1);

        session.finish_shuffle().unwrap();
        let cards = deck::draw(&mut rand::thread_rng(), Category::Love.draw_count());
        session.reveal_cards(cards).unwrap();
        assert_eq!(session.screen, Screen::Result);

        session.back_to_categories().unwrap();
        assert_eq!(session.screen, Screen::CategorySelect);
        assert!(session.category.is_none());
        assert!(session.cards.is_empty());
    }

    #[test]
    fn invalid_transitions_are_rejected_without_state_change() {
        let mut session = ReadingSession::default();
        let err = session.finish_shuffle().unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { .. }));
        assert_eq!(session.screen, Screen::Welcome);
    }

    #[test]
    fn tier_gate_blocks_category_entry() {
        let identity = account();
        let profile = UserProfile::default(); // Bronze
        let mut session = at_category_select();

        let err = session
            .select_category(Category::Life, &profile, &identity)
            .unwrap_err();
        assert_eq!(
            err,
            FlowError::TierTooLow {
                required: Tier::Silver
            }
        );
        assert_eq!(session.screen, Screen::CategorySelect);
    }

    #[test]
    fn account_gate_redirects_guests() {
        let identity = guest();
        let profile = UserProfile::default();
        let mut session = at_category_select();

        let err = session
            .select_category(Category::Face, &profile, &identity)
            .unwrap_err();
        assert_eq!(err, FlowError::AccountRequired);
        assert_eq!(session.screen, Screen::CategorySelect);
    }

    #[test]
    fn guest_tier_pinning_opens_tier_gated_categories() {
        let identity = guest();
        let profile = UserProfile::default();
        let mut session = at_category_select();

        // Life requires Silver; a guest's effective tier is Diamond.
        session
            .select_category(Category::Life, &profile, &identity)
            .unwrap();
        assert_eq!(session.screen, Screen::LifeInput);
    }

    #[test]
    fn daily_quota_blocks_the_fourth_reading() {
        let identity = account();
        let mut profile = UserProfile::default();
        profile.coins = 1_000;
        let mut device = DeviceRecord::new("device-1");

        for n in 1..=3 {
            let mut session = at_category_select();
            session
                .select_category(Category::Career, &profile, &identity)
                .unwrap();
            session
                .begin_reading(None, &mut profile, &mut device, &identity, today())
                .unwrap();
            assert_eq!(profile.daily_readings, n);
        }

        let mut session = at_category_select();
        session
            .select_category(Category::Career, &profile, &identity)
            .unwrap();
        let err = session
            .begin_reading(None, &mut profile, &mut device, &identity, today())
            .unwrap_err();
        assert!(matches!(err, FlowError::DailyQuotaExceeded { limit: 3 }));
        assert_eq!(session.screen, Screen::QuestionSelect);
    }

    #[test]
    fn quota_resets_on_a_new_day() {
        let identity = account();
        let mut profile = UserProfile::default();
        profile.coins = 1_000;
        profile.daily_readings = 3;
        profile.last_reading = Some(today());
        let mut device = DeviceRecord::new("device-1");

        let tomorrow = today().succ_opt().unwrap();
        let mut session = at_category_select();
        session
            .select_category(Category::Love, &profile, &identity)
            .unwrap();
        session
            .begin_reading(None, &mut profile, &mut device, &identity, tomorrow)
            .unwrap();
        assert_eq!(profile.daily_readings, 1);
        assert_eq!(profile.last_reading, Some(tomorrow));
    }

    #[test]
    fn guest_trial_is_single_use() {
        let identity = guest();
        let mut profile = UserProfile::default();
        let mut device = DeviceRecord::new("device-1");

        let mut session = at_category_select();
        session
            .select_category(Category::Love, &profile, &identity)
            .unwrap();
        session
            .begin_reading(None, &mut profile, &mut device, &identity, today())
            .unwrap();
        assert!(device.trial_used);
        // Guests never pay.
        assert_eq!(profile.coins, UserProfile::default().coins);

        let mut second = at_category_select();
        second
            .select_category(Category::Love, &profile, &identity)
            .unwrap();
        let err = second
            .begin_reading(None, &mut profile, &mut device, &identity, today())
            .unwrap_err();
        assert_eq!(err, FlowError::TrialExhausted);
        assert_eq!(second.screen, Screen::QuestionSelect);
    }

    #[test]
    fn failed_deduction_aborts_the_transition() {
        let identity = account();
        let mut profile = UserProfile::default();
        profile.coins = 10;
        let mut device = DeviceRecord::new("device-1");

        let mut session = at_category_select();
        session
            .select_category(Category::Love, &profile, &identity)
            .unwrap();
        let err = session
            .begin_reading(None, &mut profile, &mut device, &identity, today())
            .unwrap_err();

        assert_eq!(
            err,
            FlowError::InsufficientCoins {
                needed: 30,
                have: 10
            }
        );
        assert_eq!(session.screen, Screen::QuestionSelect);
        assert_eq!(profile.coins, 10);
        assert_eq!(profile.daily_readings, 0);
        assert!(session.reading_id.is_none());
    }

    #[test]
    fn chat_room_is_reachable_and_exitable_from_category_select() {
        let mut session = at_category_select();
        session.enter_chat_room().unwrap();
        assert_eq!(session.screen, Screen::ChatRoom);
        session.leave_chat_room().unwrap();
        assert_eq!(session.screen, Screen::CategorySelect);
    }
}
