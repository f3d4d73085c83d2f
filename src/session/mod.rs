//! Conversation memory.
//!
//! Each user's turns live in the database under `conversation/<userId>`, so
//! concurrent requests and separate instances share one history per user.
//! Writes are conditional on the ETag read at the start of the request.
//!
//! # Example
//!
//! ```rust,ignore
//! use namecard_bot::session::{ConversationStore, Turn};
//!
//! let store = ConversationStore::new(db);
//! let conversation = store.load("U123").await?;
//! let history = store
//!     .append(conversation, &[Turn::user("Hello"), Turn::model("Hi!")])
//!     .await?;
//! ```

mod conversation;

pub use conversation::{CONVERSATION_COLLECTION, Conversation, ConversationStore, Turn};
