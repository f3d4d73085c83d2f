//! Per-event routing.
//!
//! Events are handled one at a time in payload order. Nothing in here fails
//! the request: every error is logged and the event degrades to an empty
//! result or no reply, and the next event is processed.

use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::AppState;
use crate::card::{self, NameCard};
use crate::config::BotMode;
use crate::line::event::{
    Event, MediaMessage, MessageContent, MessageEvent, Source, TextMessage,
};
use crate::llm::{Content, prompts};
use crate::reply::{self, CardStyle};
use crate::session::Turn;

/// Used when the content endpoint does not report a type.
const FALLBACK_IMAGE_MIME: &str = "image/png";

/// What became of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was sent (or attempted).
    Replied,
    /// The event kind needs no action.
    Ignored,
    /// A step failed; the event was dropped after logging.
    Degraded,
}

/// Handle `events` strictly in order.
pub async fn handle_events(state: &AppState, events: Vec<Event>) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(events.len());
    for (index, event) in events.into_iter().enumerate() {
        let span = info_span!("event", index, kind = event.kind());
        let outcome = handle_event(state, event).instrument(span).await;
        outcomes.push(outcome);
    }
    outcomes
}

/// Handle a single event.
pub async fn handle_event(state: &AppState, event: Event) -> Outcome {
    match event {
        Event::Message(message) => handle_message(state, message).await,
        Event::Follow(e) => {
            info!(user_id = ?sender(e.source.as_ref()), "Got follow event");
            Outcome::Ignored
        }
        Event::Postback(e) => {
            info!(user_id = ?sender(e.source.as_ref()), data = %e.postback.data, "Got postback");
            Outcome::Ignored
        }
        Event::Beacon(e) => {
            info!(
                user_id = ?sender(e.source.as_ref()),
                hwid = %e.beacon.hwid,
                beacon_type = %e.beacon.kind,
                "Got beacon"
            );
            Outcome::Ignored
        }
        Event::Unknown => {
            info!("Unhandled event type");
            Outcome::Ignored
        }
    }
}

async fn handle_message(state: &AppState, event: MessageEvent) -> Outcome {
    let user_id = event.user_id().map(ToString::to_string);
    match &event.message {
        MessageContent::Text(text) => match state.config.bot.mode {
            BotMode::Search => handle_search_text(state, &event, user_id.as_deref(), text).await,
            BotMode::Conversation => {
                handle_conversation_text(state, &event, user_id.as_deref(), text).await
            }
        },
        MessageContent::Image(image) => {
            handle_image(state, &event, user_id.as_deref(), image).await
        }
        MessageContent::Video(video) => {
            info!(message_id = %video.id, "Got video message");
            Outcome::Ignored
        }
        MessageContent::Unknown => {
            info!("Unhandled message type");
            Outcome::Ignored
        }
    }
}

fn sender(source: Option<&Source>) -> Option<&str> {
    source.and_then(Source::user_id)
}

fn style(state: &AppState) -> CardStyle {
    CardStyle::from(&state.config.bot)
}

/// All cards saved by `user_id`; read failures degrade to none.
async fn load_cards(state: &AppState, user_id: Option<&str>) -> Vec<NameCard> {
    let Some(user_id) = user_id else {
        return Vec::new();
    };
    let path = card::collection_path(user_id);
    let value = match state.database.get(&path).await {
        Ok(v) => v,
        Err(e) => {
            error!(path = %path, error = %e, "Failed to load saved cards");
            return Vec::new();
        }
    };
    card::cards_from_collection(value).unwrap_or_else(|e| {
        error!(path = %path, error = %e, "Saved cards are not readable");
        Vec::new()
    })
}

async fn handle_search_text(
    state: &AppState,
    event: &MessageEvent,
    user_id: Option<&str>,
    message: &TextMessage,
) -> Outcome {
    let saved = load_cards(state, user_id).await;
    debug!(user_id = ?user_id, saved = saved.len(), "Loaded saved cards");

    if message.text == state.config.bot.list_command {
        let text = format!("You have {} saved card(s).", saved.len());
        let composed = reply::compose(text, &saved, &style(state));
        reply::send(state.messaging.as_ref(), &event.reply_token, composed).await;
        return Outcome::Replied;
    }

    let saved_json = serde_json::to_string(&saved).unwrap_or_else(|_| "[]".to_string());
    let prompt = prompts::card_search_prompt(&saved_json, &message.text);

    let answer = match state.extractor.generate(&[Content::user_text(prompt)]).await {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, model = state.extractor.model(), "Card search failed");
            return Outcome::Degraded;
        }
    };

    let found = card::parse_cards(&answer).unwrap_or_else(|e| {
        warn!(error = %e, answer = %answer, "Search answer is not card JSON");
        Vec::new()
    });
    info!(found = found.len(), "Card search answered");

    let composed = reply::compose(answer, &found, &style(state));
    reply::send(state.messaging.as_ref(), &event.reply_token, composed).await;
    Outcome::Replied
}

async fn handle_conversation_text(
    state: &AppState,
    event: &MessageEvent,
    user_id: Option<&str>,
    message: &TextMessage,
) -> Outcome {
    let user_turn = Turn::user(&message.text);

    let conversation = match user_id {
        Some(uid) => match state.conversations.load(uid).await {
            Ok(c) => Some(c),
            Err(e) => {
                error!(user_id = uid, error = %e, "Failed to load conversation, answering without history");
                None
            }
        },
        None => None,
    };

    let contents = conversation.as_ref().map_or_else(
        || vec![user_turn.to_content()],
        |c| c.contents_with(&user_turn),
    );

    let answer = match state.extractor.generate(&contents).await {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, model = state.extractor.model(), "Conversation turn failed");
            return Outcome::Degraded;
        }
    };

    if let Some(conversation) = conversation {
        let turns = [user_turn, Turn::model(&answer)];
        match state.conversations.append(conversation, &turns).await {
            Ok(history) => debug!(turns = history.len(), "Conversation saved"),
            Err(e) => error!(error = %e, "Failed to save conversation"),
        }
    }

    let composed = reply::compose(answer, &[], &style(state));
    reply::send(state.messaging.as_ref(), &event.reply_token, composed).await;
    Outcome::Replied
}

async fn handle_image(
    state: &AppState,
    event: &MessageEvent,
    user_id: Option<&str>,
    image: &MediaMessage,
) -> Outcome {
    info!(message_id = %image.id, "Got image message");

    let blob = match state.messaging.get_message_content(&image.id).await {
        Ok(blob) => blob,
        Err(e) => {
            error!(message_id = %image.id, error = %e, "Failed to fetch image content");
            return Outcome::Degraded;
        }
    };

    let mime_type = blob
        .content_type
        .as_deref()
        .filter(|t| t.starts_with("image/"))
        .unwrap_or(FALLBACK_IMAGE_MIME)
        .to_string();
    let contents = [Content::user_image(prompts::CARD_IMAGE_PROMPT, mime_type, blob.data)];

    let answer = match state.extractor.generate(&contents).await {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, model = state.extractor.model(), "Card reading failed");
            return Outcome::Degraded;
        }
    };
    debug!(answer = %answer, "Card reading answered");

    let json = card::strip_wrapping_lines(&answer);
    let parsed = card::parse_card(&json);

    let record = match parsed {
        Ok(record) => {
            save_card(state, user_id, &record).await;
            record
        }
        Err(e) => {
            warn!(error = %e, json = %json, "Card reading is not card JSON");
            NameCard::default()
        }
    };

    let composed = reply::compose(json, std::slice::from_ref(&record), &style(state));
    reply::send(state.messaging.as_ref(), &event.reply_token, composed).await;
    Outcome::Replied
}

async fn save_card(state: &AppState, user_id: Option<&str>, record: &NameCard) {
    let Some(user_id) = user_id else {
        warn!("Source has no user id, card not saved");
        return;
    };
    let path = card::collection_path(user_id);
    let value = match serde_json::to_value(record) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "Failed to encode card");
            return;
        }
    };
    match state.database.push(&path, &value).await {
        Ok(key) => info!(path = %path, key = %key, "Card saved"),
        Err(e) => error!(path = %path, error = %e, "Failed to save card"),
    }
}
