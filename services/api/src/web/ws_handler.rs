//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It hosts the session's state machine and fires the persistence
//! side-channels after every committed mutation.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    reading_task::reading_process,
    snapshot::snapshot_debounce_task,
    state::{self, AppState, SessionState},
};
use arcana_core::deck;
use arcana_core::domain::{Identity, SeekerInfo};
use arcana_core::flow::{Category, FlowError};
use arcana_core::tier::effective_tier;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    info!(
        "New WebSocket connection established for {}",
        identity.owner_key()
    );

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase: reconcile, roll over, resume ---
    let today = Utc::now().date_naive();
    let (session, rollover) = match SessionState::initialize(&app_state, identity, today).await {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to initialize session state: {:?}", e);
            send_to_client(
                &ws_sender,
                &ServerMessage::Error {
                    message: "Failed to load session data.".to_string(),
                },
            )
            .await;
            return;
        }
    };

    let init_msg = ServerMessage::SessionInitialized {
        screen: session.flow.screen,
        coins: session.profile.coins,
        tier: effective_tier(&session.profile, &session.identity),
        streak_day: session.profile.streak_day,
        streak_reward: rollover.streak_reward,
        daily_readings: session.profile.daily_readings,
    };
    send_to_client(&ws_sender, &init_msg).await;

    let session_lock = Arc::new(Mutex::new(session));

    // The debounce task coalesces rapid navigation changes into one write.
    let snapshot_notify = Arc::new(Notify::new());
    let cancellation_token = CancellationToken::new();
    let snapshot_task = tokio::spawn(snapshot_debounce_task(
        app_state.local.clone(),
        session_lock.clone(),
        snapshot_notify.clone(),
        cancellation_token.clone(),
    ));

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(
                    text.to_string(),
                    &app_state,
                    &session_lock,
                    &ws_sender,
                    &snapshot_notify,
                )
                .await;
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    cancellation_token.cancel();
    let _ = snapshot_task.await;
    {
        let session = session_lock.lock().await;
        state::persist(&app_state, &session);
    }
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
    snapshot_notify: &Arc<Notify>,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    let today = Utc::now().date_naive();
    let mut responses: Vec<ServerMessage> = Vec::new();
    let mut spawn_reading = false;
    let mut committed = false;

    {
        let mut guard = session_lock.lock().await;
        let session = &mut *guard;
        let mut draw_happened = false;

        let result = match client_msg {
            ClientMessage::Begin => session.flow.begin(),
            ClientMessage::SubmitInfo { name, birth_date } => {
                session.flow.submit_info(SeekerInfo { name, birth_date })
            }
            ClientMessage::SelectCategory { category } => {
                session
                    .flow
                    .select_category(category, &session.profile, &session.identity)
            }
            ClientMessage::SubmitQuestion { question } => session.flow.begin_reading(
                Some(question),
                &mut session.profile,
                &mut session.device,
                &session.identity,
                today,
            ),
            ClientMessage::SubmitFace => session.flow.begin_reading(
                None,
                &mut session.profile,
                &mut session.device,
                &session.identity,
                today,
            ),
            ClientMessage::SubmitLife => session.flow.begin_reading(
                None,
                &mut session.profile,
                &mut session.device,
                &session.identity,
                today,
            ),
            ClientMessage::SubmitPartner { partner_name } => session.flow.begin_reading(
                Some(format!("Compatibility with {partner_name}")),
                &mut session.profile,
                &mut session.device,
                &session.identity,
                today,
            ),
            ClientMessage::FinishShuffle => session.flow.finish_shuffle(),
            ClientMessage::PickCards => {
                let count = session
                    .flow
                    .category
                    .map(Category::draw_count)
                    .unwrap_or(3);
                let cards = deck::draw(&mut rand::thread_rng(), count);
                match session.flow.reveal_cards(cards) {
                    Ok(screen) => {
                        draw_happened = true;
                        Ok(screen)
                    }
                    err => err,
                }
            }
            ClientMessage::BackToCategories => {
                let result = session.flow.back_to_categories();
                if result.is_ok() {
                    session.pending_images.clear();
                }
                result
            }
            ClientMessage::EnterChatRoom => session.flow.enter_chat_room(),
            ClientMessage::LeaveChatRoom => session.flow.leave_chat_room(),
        };

        match result {
            Ok(screen) => {
                committed = true;
                state::persist(app_state, session);
                state::persist_device(app_state, session);
                responses.push(ServerMessage::ScreenChanged {
                    screen,
                    coins: session.profile.coins,
                });
                if draw_happened {
                    responses.push(ServerMessage::CardsDrawn {
                        cards: session.flow.cards.clone(),
                    });
                    spawn_reading = true;
                }
            }
            // The auth-gated categories redirect to the auth prompt instead
            // of transitioning.
            Err(FlowError::AccountRequired) => responses.push(ServerMessage::AuthPrompt {
                message: FlowError::AccountRequired.to_string(),
            }),
            // Everything else is a dismissable notice; the screen stays put.
            Err(e) => responses.push(ServerMessage::Notice {
                message: e.to_string(),
            }),
        }
    }

    if committed {
        snapshot_notify.notify_one();
    }
    for msg in &responses {
        send_to_client(ws_sender, msg).await;
    }
    if spawn_reading {
        tokio::spawn(reading_process(
            app_state.clone(),
            session_lock.clone(),
            ws_sender.clone(),
        ));
    }
}

/// Serializes and sends one server message, logging rather than failing when
/// the client has gone away.
pub(crate) async fn send_to_client(
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
    msg: &ServerMessage,
) {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {e}");
            return;
        }
    };
    if ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_err()
    {
        warn!("Failed to send server message. Client may have disconnected.");
    }
}
