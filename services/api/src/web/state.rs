//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states, plus the
//! persistence side-channels every mutation flows through.

use crate::config::Config;
use arcana_core::domain::{DeviceRecord, Identity, UserProfile};
use arcana_core::flow::ReadingSession;
use arcana_core::ports::{
    CardImageService, CheckoutService, InterpretationService, LocalSnapshot, LocalStore,
    PaymentConfirmService, PortResult, ProfileStore,
};
use arcana_core::reconcile;
use arcana_core::rollover::{self, RolloverOutcome};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profiles: Arc<dyn ProfileStore>,
    pub local: Arc<dyn LocalStore>,
    pub interpreter: Arc<dyn InterpretationService>,
    pub card_images: Arc<dyn CardImageService>,
    pub checkout: Arc<dyn CheckoutService>,
    pub payment_confirm: Arc<dyn PaymentConfirmService>,
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active connection: one logical actor, mutated
/// synchronously and persisted through the side-channels below.
pub struct SessionState {
    pub identity: Identity,
    pub profile: UserProfile,
    pub device: DeviceRecord,
    pub flow: ReadingSession,
    /// Card slot -> correlation id of the pending image request. A result
    /// is applied only while its id is still the registered one, so a stale
    /// response can never overwrite a newer draw.
    pub pending_images: HashMap<usize, Uuid>,
}

impl SessionState {
    /// Builds the session by reconciling the local snapshot with the remote
    /// profile (remote wins when present) and running the daily/monthly
    /// rollover against today's date.
    pub async fn initialize(
        app: &AppState,
        identity: Identity,
        today: NaiveDate,
    ) -> PortResult<(Self, RolloverOutcome)> {
        let owner = identity.owner_key();

        let local_snapshot = match app.local.load_snapshot(&owner) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to load local snapshot for {owner}: {e}");
                None
            }
        };
        let (local_profile, local_session) = match local_snapshot {
            Some(snapshot) => (Some(snapshot.profile), Some(snapshot.session)),
            None => (None, None),
        };

        let remote_profile = match identity.account_id() {
            Some(user_id) => match app.profiles.fetch(user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    // Degrade to the local snapshot rather than dead-ending
                    // the session.
                    error!("Failed to fetch remote profile for {user_id}: {e}");
                    None
                }
            },
            None => None,
        };

        let reconciled = reconcile::reconcile(local_profile, remote_profile);
        let mut profile = reconciled.profile;
        let outcome = rollover::run(&mut profile, today);

        let device = match &identity {
            Identity::Guest { device_id } => app
                .local
                .load_device(device_id)
                .unwrap_or_else(|e| {
                    warn!("Failed to load device record for {device_id}: {e}");
                    None
                })
                .unwrap_or_else(|| DeviceRecord::new(device_id.clone())),
            Identity::Account { .. } => DeviceRecord::new(owner),
        };

        let state = Self {
            identity,
            profile,
            device,
            flow: local_session.unwrap_or_default(),
            pending_images: HashMap::new(),
        };

        // The rollover mutated the record; this also promotes a local or
        // fresh profile remotely when no remote row existed yet.
        persist(app, &state);
        Ok((state, outcome))
    }

    /// The blob the local store keeps: the full aggregate plus the last
    /// active flow state.
    pub fn snapshot(&self) -> LocalSnapshot {
        LocalSnapshot {
            profile: self.profile.clone(),
            session: self.flow.clone(),
        }
    }

    /// Applies a finished card image, gated on the correlation id. Returns
    /// whether the result was applied or discarded as stale.
    pub fn apply_card_image(&mut self, slot: usize, correlation_id: Uuid, url: &str) -> bool {
        match self.pending_images.get(&slot) {
            Some(pending) if *pending == correlation_id => {}
            _ => return false,
        }
        self.pending_images.remove(&slot);

        if let Some(card) = self.flow.cards.get_mut(slot) {
            card.image_url = Some(url.to_string());
        }
        if let Some(reading_id) = self.flow.reading_id {
            if let Some(entry) = self.profile.history.iter_mut().find(|r| r.id == reading_id) {
                if let Some(card) = entry.cards.get_mut(slot) {
                    card.image_url = Some(url.to_string());
                }
            }
        }
        true
    }
}

//=========================================================================================
// Persistence Side-Channels
//=========================================================================================

/// Writes the in-memory record to the local store synchronously and to the
/// remote store in a spawned, best-effort task. Neither failure interrupts
/// the caller or rolls back the mutation.
pub fn persist(app: &AppState, session: &SessionState) {
    if let Err(e) = app
        .local
        .save_snapshot(&session.identity.owner_key(), &session.snapshot())
    {
        warn!("Local snapshot write failed: {e}");
    }

    if let Some(user_id) = session.identity.account_id() {
        let profiles = app.profiles.clone();
        let profile = session.profile.clone();
        tokio::spawn(async move {
            if let Err(e) = profiles.upsert(user_id, &profile).await {
                error!("Remote profile write failed for {user_id}: {e}");
            }
        });
    }
}

/// Writes the guest device record (trial counter) to its own local key.
pub fn persist_device(app: &AppState, session: &SessionState) {
    if session.identity.is_guest() {
        if let Err(e) = app.local.save_device(&session.device) {
            warn!("Device record write failed: {e}");
        }
    }
}
