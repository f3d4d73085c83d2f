//! Messaging API client.

use async_trait::async_trait;
use serde::Serialize;

use super::message::Message;

/// Errors from the messaging platform.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("LINE API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Binary content attached to a message.
#[derive(Debug, Clone)]
pub struct MessageBlob {
    pub data: Vec<u8>,
    /// `Content-Type` reported by the content endpoint.
    pub content_type: Option<String>,
}

/// Outbound operations the bot needs from the platform.
#[async_trait]
pub trait MessagingApi: Send + Sync + std::fmt::Debug {
    /// Reply using the one-time token from an event.
    async fn reply_message(&self, reply_token: &str, messages: Vec<Message>)
    -> Result<(), LineError>;

    /// Download the content of an image, video, audio or file message.
    async fn get_message_content(&self, message_id: &str) -> Result<MessageBlob, LineError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyMessageRequest<'a> {
    reply_token: &'a str,
    messages: Vec<Message>,
}

/// [`MessagingApi`] backed by the LINE REST endpoints.
#[derive(Clone)]
pub struct LineClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
    data_api_base: String,
}

impl std::fmt::Debug for LineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineClient")
            .field("api_base", &self.api_base)
            .field("data_api_base", &self.data_api_base)
            .finish()
    }
}

impl LineClient {
    pub fn new(
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        data_api_base: impl Into<String>,
    ) -> Result<Self, LineError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("namecard-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            access_token: access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            data_api_base: data_api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, LineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LineError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MessagingApi for LineClient {
    async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<Message>,
    ) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyMessageRequest {
            reply_token,
            messages,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_message_content(&self, message_id: &str) -> Result<MessageBlob, LineError> {
        let url = format!("{}/v2/bot/message/{message_id}/content", self.data_api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let data = response.bytes().await?.to_vec();

        Ok(MessageBlob { data, content_type })
    }
}
