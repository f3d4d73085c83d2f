//! Generative-model client used to extract card data.
//!
//! The [`Extractor`] trait is the seam between the dispatcher and the model
//! provider: it takes a conversation of [`Content`] turns (text and inline
//! images) and returns the model's answer as plain text. Parsing the answer is
//! the caller's job.
//!
//! # Example
//!
//! ```rust,ignore
//! use namecard_bot::llm::{Content, Extractor, GeminiClient};
//!
//! let client = GeminiClient::new(settings)?;
//! let text = client.generate(&[Content::user_text("Hello")]).await?;
//! ```

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One piece of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw image bytes; encoded by the provider client.
    Image { mime_type: String, data: Vec<u8> },
}

/// A single turn sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    #[must_use]
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Image followed by the instruction text, as one user turn.
    #[must_use]
    pub fn user_image(prompt: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            role: Role::User,
            parts: vec![
                Part::Image {
                    mime_type: mime_type.into(),
                    data,
                },
                Part::Text(prompt.into()),
            ],
        }
    }
}

/// Errors from the extraction service.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API.
    #[error("model API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The prompt was rejected by the provider's safety filters.
    #[error("prompt blocked: {0}")]
    Blocked(String),
}

/// A text-completion model.
#[async_trait]
pub trait Extractor: Send + Sync + std::fmt::Debug {
    /// Generate a reply to `contents` and return all returned text concatenated.
    async fn generate(&self, contents: &[Content]) -> Result<String, ExtractionError>;

    /// Model identifier for logging.
    fn model(&self) -> &str;
}
