//! Inbound webhook event model.
//!
//! Each kind the platform reports is a variant; kinds this bot does not act on
//! land in an `Unknown` variant instead of failing the whole payload.

use serde::Deserialize;

/// Body of a webhook request.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackRequest {
    /// Bot user id the events are addressed to.
    #[serde(default)]
    pub destination: Option<String>,
    /// Events in delivery order.
    pub events: Vec<Event>,
}

/// One unit of inbound activity.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Message(MessageEvent),
    Follow(FollowEvent),
    Postback(PostbackEvent),
    Beacon(BeaconEvent),
    #[serde(other)]
    Unknown,
}

impl Event {
    /// Short name used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Follow(_) => "follow",
            Self::Postback(_) => "postback",
            Self::Beacon(_) => "beacon",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub reply_token: String,
    #[serde(default)]
    pub source: Option<Source>,
    pub message: MessageContent,
}

impl MessageEvent {
    /// Sender's user id, if the source exposes one.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.source.as_ref().and_then(Source::user_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEvent {
    #[serde(default)]
    pub source: Option<Source>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackEvent {
    #[serde(default)]
    pub source: Option<Source>,
    pub postback: Postback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconEvent {
    #[serde(default)]
    pub source: Option<Source>,
    pub beacon: Beacon,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Beacon {
    pub hwid: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Payload of a message event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text(TextMessage),
    Image(MediaMessage),
    Video(MediaMessage),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextMessage {
    pub text: String,
}

/// Image or video; the bytes are fetched separately by `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaMessage {
    pub id: String,
}

/// Where an event came from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl Source {
    /// User id of the sender. Group and room events omit it when the user has
    /// not consented to sharing their profile.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } => Some(user_id.as_str()),
            Self::Group { user_id, .. } | Self::Room { user_id, .. } => user_id.as_deref(),
        }
    }
}
