//! Path-addressed hierarchical storage.
//!
//! Paths are slash-separated (`namecard/U123`). Reads of missing paths return
//! JSON `null`. Conditional writes use opaque ETags: read with
//! [`Database::get_versioned`], then write with [`Database::set_if_match`];
//! a concurrent change in between surfaces as [`DbError::Conflict`].
//!
//! # Providers
//!
//! - [`FirebaseDb`]: Firebase Realtime Database REST API
//! - [`MemoryDb`]: in-process tree, for local runs and tests

pub mod auth;
pub mod providers;

pub use auth::{Credentials, ServiceAccountKey};
pub use providers::{firebase::FirebaseDb, memory::MemoryDb};

use async_trait::async_trait;
use serde_json::Value;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The ETag passed to a conditional write no longer matches.
    #[error("conditional write conflict at {0}")]
    Conflict(String),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("authentication error: {0}")]
    Auth(String),
}

/// A value together with the ETag it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub value: Value,
    pub etag: String,
}

#[async_trait]
pub trait Database: Send + Sync + std::fmt::Debug {
    /// Read the subtree at `path`.
    async fn get(&self, path: &str) -> Result<Value, DbError>;

    /// Read the subtree at `path` with its ETag.
    async fn get_versioned(&self, path: &str) -> Result<Versioned, DbError>;

    /// Replace the subtree at `path` if it is still at `etag`.
    async fn set_if_match(&self, path: &str, value: &Value, etag: &str) -> Result<(), DbError>;

    /// Append `value` as a new child of `path` and return the generated key.
    ///
    /// Keys sort in insertion order.
    async fn push(&self, path: &str, value: &Value) -> Result<String, DbError>;
}

/// Split a path into non-empty segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
