//! services/api/src/web/reading_task.rs
//!
//! This module contains the asynchronous "worker" functions that finish a
//! reading after the spread is drawn: the interpretation call and one image
//! generation per card, none of which block the state machine.

use crate::web::{
    protocol::ServerMessage,
    state::{self, AppState, SessionState},
    ws_handler::send_to_client,
};
use arcana_core::domain::{ReadingResult, TarotCard};
use arcana_core::flow::Category;
use arcana_core::ports::InterpretationRequest;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::stream::SplitSink;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shown when the upstream generation fails outright, so the flow is never
/// dead-ended.
pub const FALLBACK_READING: &str = "The cards are quiet right now, and I will not \
put words in their mouths. Please take a breath and draw again in a little while; \
the spread sometimes needs a moment before it speaks.";

/// The main asynchronous task for one drawn spread.
///
/// Registers a correlation id per card slot and spawns the per-card image
/// workers, then produces the interpretation and appends the finished
/// reading to the history.
pub async fn reading_process(
    app: Arc<AppState>,
    session_lock: Arc<Mutex<SessionState>>,
    ws_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    let (request, reading_id, image_jobs) = {
        let mut session = session_lock.lock().await;
        let Some(reading_id) = session.flow.reading_id else {
            warn!("Reading task started with no reading in flight.");
            return;
        };
        let request = InterpretationRequest {
            category: session.flow.category.unwrap_or(Category::Fortune),
            question: session.flow.question.clone(),
            seeker: session.flow.seeker.clone(),
            cards: session.flow.cards.clone(),
        };

        // Fresh correlation ids supersede anything left over from an
        // earlier draw.
        session.pending_images.clear();
        let cards = session.flow.cards.clone();
        let mut jobs = Vec::with_capacity(cards.len());
        for (slot, card) in cards.into_iter().enumerate() {
            let correlation_id = Uuid::new_v4();
            session.pending_images.insert(slot, correlation_id);
            jobs.push((slot, correlation_id, card));
        }
        (request, reading_id, jobs)
    };

    for (slot, correlation_id, card) in image_jobs {
        tokio::spawn(card_image_process(
            app.clone(),
            session_lock.clone(),
            ws_sender.clone(),
            slot,
            correlation_id,
            card,
        ));
    }

    let interpretation = match app.interpreter.interpret(&request).await {
        Ok(text) => text,
        Err(e) => {
            error!("Interpretation generation failed: {e}");
            FALLBACK_READING.to_string()
        }
    };

    {
        let mut session = session_lock.lock().await;
        // Prefer the live cards so any artwork that already landed is kept.
        let cards = if session.flow.reading_id == Some(reading_id) {
            session.flow.cards.clone()
        } else {
            request.cards.clone()
        };
        session.profile.record_reading(ReadingResult {
            id: reading_id,
            created_at: Utc::now(),
            category: request.category,
            question: request.question.clone(),
            cards,
            interpretation: interpretation.clone(),
        });
        state::persist(&app, &session);
    }

    let msg = ServerMessage::InterpretationReady {
        reading_id,
        interpretation,
    };
    send_to_client(&ws_sender, &msg).await;
    info!("Reading {reading_id} finished.");
}

/// A fire-and-forget worker generating artwork for one card slot. The result
/// is applied only while its correlation id is still the registered pending
/// request for that slot; each completion touches only its own slot, so
/// out-of-order arrivals are safe.
async fn card_image_process(
    app: Arc<AppState>,
    session_lock: Arc<Mutex<SessionState>>,
    ws_sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    slot: usize,
    correlation_id: Uuid,
    card: TarotCard,
) {
    match app.card_images.generate(&card).await {
        Ok(url) => {
            let applied = {
                let mut session = session_lock.lock().await;
                let applied = session.apply_card_image(slot, correlation_id, &url);
                if applied {
                    state::persist(&app, &session);
                }
                applied
            };
            if applied {
                send_to_client(
                    &ws_sender,
                    &ServerMessage::CardImageReady {
                        slot,
                        image_url: url,
                    },
                )
                .await;
            } else {
                info!("Discarded a stale card image for slot {slot}.");
            }
        }
        Err(e) => {
            // The placeholder artwork stays in place.
            warn!("Card image generation failed for '{}': {e}", card.name);
        }
    }
}
