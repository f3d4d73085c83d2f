//! LINE business-card bot
//!
//! A webhook service that reads business cards from photos with a generative
//! model, saves them per user, and answers with Flex carousels.
//!
//! # Architecture
//!
//! - **Server**: Axum router exposing the signed webhook endpoint
//! - **Dispatcher**: routes each webhook event by kind, in payload order
//! - **Reply composer**: turns cards into text plus a Flex carousel
//! - **Clients**: LINE Messaging API, Gemini, Realtime Database, each behind a
//!   trait so tests can substitute fakes
//!
//! # Modules
//!
//! - [`line`]: webhook events, signature checks, outbound messages, API client
//! - [`llm`]: extraction model client and prompts
//! - [`persistence`]: path-addressed storage providers
//! - [`card`]: the card record and parsing of model output
//! - [`reply`]: card rendering
//! - [`session`]: per-user conversation memory
//! - [`dispatch`]: event routing

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod card;
pub mod config;
pub mod dispatch;
pub mod line;
pub mod llm;
pub mod persistence;
pub mod reply;
pub mod server;
pub mod session;
pub mod telemetry;

use std::sync::Arc;

use crate::config::AppConfig;
use line::MessagingApi;
use llm::Extractor;
use persistence::Database;
use session::ConversationStore;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Reply and content-fetch operations.
    pub messaging: Arc<dyn MessagingApi>,
    /// Model used to read and search cards.
    pub extractor: Arc<dyn Extractor>,
    /// Card and conversation storage.
    pub database: Arc<dyn Database>,
    /// Per-user conversation memory on top of `database`.
    pub conversations: ConversationStore,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        messaging: Arc<dyn MessagingApi>,
        extractor: Arc<dyn Extractor>,
        database: Arc<dyn Database>,
    ) -> Self {
        Self {
            conversations: ConversationStore::new(Arc::clone(&database)),
            messaging,
            extractor,
            database,
            config,
        }
    }
}
