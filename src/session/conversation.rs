//! Per-user conversation history stored in the database.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{Content, Role};
use crate::persistence::{Database, DbError};

/// Database collection holding every user's conversation.
pub const CONVERSATION_COLLECTION: &str = "conversation";

/// Attempts at the read-append-write cycle before giving up.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Turns kept per user; older turns are dropped on write. Even, so a
/// history trimmed from whole exchanges still opens with a user turn.
pub const MAX_HISTORY_TURNS: usize = 40;

/// One remembered turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn to_content(&self) -> Content {
        match self.role {
            Role::User => Content::user_text(&self.text),
            Role::Model => Content::model_text(&self.text),
        }
    }
}

/// A user's history as read, with the ETag needed to write it back.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub user_id: String,
    pub turns: Vec<Turn>,
    etag: String,
}

impl Conversation {
    /// History plus `next` as model input.
    #[must_use]
    pub fn contents_with(&self, next: &Turn) -> Vec<Content> {
        self.turns
            .iter()
            .chain(std::iter::once(next))
            .map(Turn::to_content)
            .collect()
    }
}

/// Reads and appends conversation turns with optimistic concurrency.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    db: Arc<dyn Database>,
}

impl ConversationStore {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    fn path(user_id: &str) -> String {
        format!("{CONVERSATION_COLLECTION}/{user_id}")
    }

    /// Load a user's history. A missing or unreadable history is empty.
    pub async fn load(&self, user_id: &str) -> Result<Conversation, DbError> {
        let versioned = self.db.get_versioned(&Self::path(user_id)).await?;
        let turns = if versioned.value.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(versioned.value).unwrap_or_else(|e| {
                tracing::warn!(user_id, error = %e, "Discarding unreadable conversation history");
                Vec::new()
            })
        };
        Ok(Conversation {
            user_id: user_id.to_string(),
            turns,
            etag: versioned.etag,
        })
    }

    /// Append `new_turns` to `conversation` and write it back, keeping only
    /// the most recent [`MAX_HISTORY_TURNS`].
    ///
    /// If another request wrote in between, the history is re-read and the
    /// turns appended to the fresh copy, up to a fixed number of attempts.
    /// Returns the history as written.
    pub async fn append(
        &self,
        mut conversation: Conversation,
        new_turns: &[Turn],
    ) -> Result<Vec<Turn>, DbError> {
        let path = Self::path(&conversation.user_id);

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut turns = conversation.turns;
            turns.extend_from_slice(new_turns);
            if turns.len() > MAX_HISTORY_TURNS {
                turns.drain(..turns.len() - MAX_HISTORY_TURNS);
            }
            let value = serde_json::to_value(&turns)?;

            match self.db.set_if_match(&path, &value, &conversation.etag).await {
                Ok(()) => return Ok(turns),
                Err(DbError::Conflict(_)) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(path = %path, attempt, "Conversation changed concurrently, retrying");
                    conversation = self.load(&conversation.user_id).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::Conflict(path))
    }
}
