//! LINE Messaging API integration.
//!
//! # Modules
//!
//! - [`event`]: inbound webhook events as sum types
//! - [`webhook`]: signature validation and request parsing
//! - [`message`]: outbound text and Flex messages
//! - [`client`]: reply and content-fetch operations

pub mod client;
pub mod event;
pub mod message;
pub mod webhook;

pub use client::{LineClient, LineError, MessageBlob, MessagingApi};
pub use event::{CallbackRequest, Event, MessageContent, MessageEvent, Source};
pub use message::Message;
pub use webhook::{WebhookError, parse_request};
