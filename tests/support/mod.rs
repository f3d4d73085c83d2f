//! Fakes and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use namecard_bot::AppState;
use namecard_bot::config::{
    AppConfig, BotConfig, BotMode, GeminiConfig, LineConfig, PersistenceConfig, ServerConfig,
};
use namecard_bot::line::webhook::{SIGNATURE_HEADER, sign};
use namecard_bot::line::{LineError, Message, MessageBlob, MessagingApi};
use namecard_bot::llm::{Content, ExtractionError, Extractor};
use namecard_bot::persistence::{Database, DbError, MemoryDb, Versioned};
use namecard_bot::server::build_router;

pub const SECRET: &str = "test-channel-secret";

/// Records reply attempts and serves canned message content.
#[derive(Debug, Default)]
pub struct FakeMessaging {
    /// Every reply attempt, including the ones made to fail.
    pub replies: Mutex<Vec<(String, Vec<Message>)>>,
    pub content: Mutex<HashMap<String, MessageBlob>>,
    failing_tokens: Mutex<HashSet<String>>,
}

impl FakeMessaging {
    /// Replies using `reply_token` are rejected by the API.
    pub fn failing_reply(self, reply_token: &str) -> Self {
        self.failing_tokens
            .lock()
            .unwrap()
            .insert(reply_token.to_string());
        self
    }

    pub fn with_image(self, message_id: &str, data: &[u8]) -> Self {
        self.content.lock().unwrap().insert(
            message_id.to_string(),
            MessageBlob {
                data: data.to_vec(),
                content_type: Some("image/jpeg".to_string()),
            },
        );
        self
    }

    pub fn reply_tokens(&self) -> Vec<String> {
        self.replies
            .lock()
            .unwrap()
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Replies as JSON, the way they go over the wire.
    pub fn reply_json(&self, index: usize) -> serde_json::Value {
        let replies = self.replies.lock().unwrap();
        serde_json::to_value(&replies[index].1).unwrap()
    }
}

#[async_trait]
impl MessagingApi for FakeMessaging {
    async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<Message>,
    ) -> Result<(), LineError> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), messages));
        if self.failing_tokens.lock().unwrap().contains(reply_token) {
            return Err(LineError::Api {
                status: 400,
                body: "Invalid reply token".to_string(),
            });
        }
        Ok(())
    }

    async fn get_message_content(&self, message_id: &str) -> Result<MessageBlob, LineError> {
        self.content
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .ok_or_else(|| LineError::Api {
                status: 404,
                body: format!("no content for {message_id}"),
            })
    }
}

/// Answers from a script, one per call, and records what it was asked.
#[derive(Debug, Default)]
pub struct FakeExtractor {
    answers: Mutex<VecDeque<Result<String, u16>>>,
    pub calls: Mutex<Vec<Vec<Content>>>,
}

impl FakeExtractor {
    pub fn answering<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::default();
        fake.answers
            .lock()
            .unwrap()
            .extend(answers.into_iter().map(|a| Ok(a.into())));
        fake
    }

    /// Queue a failing call with the given HTTP status.
    pub fn then_fail(self, status: u16) -> Self {
        self.answers.lock().unwrap().push_back(Err(status));
        self
    }

    /// Queue a failing call ahead of the scripted answers.
    pub fn fail_first(self, status: u16) -> Self {
        self.answers.lock().unwrap().push_front(Err(status));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn generate(&self, contents: &[Content]) -> Result<String, ExtractionError> {
        self.calls.lock().unwrap().push(contents.to_vec());
        match self.answers.lock().unwrap().pop_front() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(status)) => Err(ExtractionError::Api {
                status,
                body: "scripted failure".to_string(),
            }),
            None => Err(ExtractionError::Api {
                status: 500,
                body: "no scripted answer".to_string(),
            }),
        }
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// In-memory database whose operations can be switched to fail.
#[derive(Debug, Default)]
pub struct FlakyDb {
    inner: MemoryDb,
    pub fail_reads: AtomicBool,
    pub fail_pushes: AtomicBool,
    /// Every conditional write reports a concurrent change.
    pub always_conflict: AtomicBool,
    pub conditional_writes: AtomicUsize,
}

impl FlakyDb {
    fn unavailable() -> DbError {
        DbError::Status {
            status: 503,
            body: "database unavailable".to_string(),
        }
    }
}

#[async_trait]
impl Database for FlakyDb {
    async fn get(&self, path: &str) -> Result<Value, DbError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get(path).await
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, DbError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get_versioned(path).await
    }

    async fn set_if_match(&self, path: &str, value: &Value, etag: &str) -> Result<(), DbError> {
        self.conditional_writes.fetch_add(1, Ordering::SeqCst);
        if self.always_conflict.load(Ordering::SeqCst) {
            return Err(DbError::Conflict(path.to_string()));
        }
        self.inner.set_if_match(path, value, etag).await
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, DbError> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.push(path, value).await
    }
}

pub fn test_config(mode: BotMode) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            webhook_path: "/callback".to_string(),
        },
        line: LineConfig {
            channel_secret: SECRET.to_string(),
            channel_access_token: "token".to_string(),
            api_base: "http://line.invalid".to_string(),
            data_api_base: "http://line-data.invalid".to_string(),
        },
        gemini: GeminiConfig {
            api_key: "key".to_string(),
            model: "fake-model".to_string(),
            base_url: "http://gemini.invalid".to_string(),
        },
        persistence: PersistenceConfig {
            provider: "memory".to_string(),
            database_url: String::new(),
            credentials: None,
            database_secret: None,
        },
        bot: BotConfig {
            mode,
            list_command: "list".to_string(),
            logo_url: "https://example.com/logo.jpeg".to_string(),
            more_info_url: "https://example.com/about".to_string(),
        },
    }
}

/// Everything a test needs to drive the router and inspect side effects.
pub struct Harness {
    pub app: Router,
    pub messaging: Arc<FakeMessaging>,
    pub extractor: Arc<FakeExtractor>,
    pub db: Arc<FlakyDb>,
}

impl Harness {
    pub fn new(mode: BotMode, messaging: FakeMessaging, extractor: FakeExtractor) -> Self {
        let messaging = Arc::new(messaging);
        let extractor = Arc::new(extractor);
        let db = Arc::new(FlakyDb::default());
        let state = AppState::new(
            Arc::new(test_config(mode)),
            messaging.clone(),
            extractor.clone(),
            db.clone(),
        );
        Self {
            app: build_router(state),
            messaging,
            extractor,
            db,
        }
    }

    pub fn fail_reads(&self) {
        self.db.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_pushes(&self) {
        self.db.fail_pushes.store(true, Ordering::SeqCst);
    }

    pub fn conflict_on_every_write(&self) {
        self.db.always_conflict.store(true, Ordering::SeqCst);
    }

    /// POST a correctly signed body to the webhook.
    pub async fn deliver(&self, body: &str) -> StatusCode {
        let signature = sign(SECRET, body.as_bytes());
        self.post(body, Some(&signature)).await
    }

    pub async fn post(&self, body: &str, signature: Option<&str>) -> StatusCode {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/callback")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.app.clone().oneshot(request).await.unwrap().status()
    }
}

pub fn text_event(reply_token: &str, user_id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "replyToken": reply_token,
        "timestamp": 1_700_000_000_000_i64,
        "mode": "active",
        "source": {"type": "user", "userId": user_id},
        "message": {"type": "text", "id": format!("m-{reply_token}"), "text": text}
    })
}

pub fn image_event(reply_token: &str, user_id: &str, message_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "replyToken": reply_token,
        "timestamp": 1_700_000_000_000_i64,
        "source": {"type": "user", "userId": user_id},
        "message": {"type": "image", "id": message_id, "contentProvider": {"type": "line"}}
    })
}

pub fn payload(events: Vec<serde_json::Value>) -> String {
    serde_json::json!({"destination": "Ubot", "events": events}).to_string()
}
