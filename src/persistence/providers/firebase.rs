use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::persistence::{Credentials, Database, DbError, Versioned, segments};

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";

/// Realtime Database over its REST API (`{url}/{path}.json`).
#[derive(Debug)]
pub struct FirebaseDb {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseDb {
    pub fn new(database_url: &str, credentials: Credentials) -> Result<Self, DbError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: database_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        let path = segments(path).collect::<Vec<_>>().join("/");
        format!("{}/{path}.json", self.base_url)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, DbError> {
        let mut rb = self.http.request(method, self.url(path));
        if let Some((name, value)) = self.credentials.query_param(&self.http).await? {
            rb = rb.query(&[(name, value)]);
        }
        Ok(rb)
    }

    async fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response, DbError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::PRECONDITION_FAILED {
            return Err(DbError::Conflict(path.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(DbError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Database for FirebaseDb {
    async fn get(&self, path: &str) -> Result<Value, DbError> {
        let response = self.request(Method::GET, path).await?.send().await?;
        let response = Self::check(path, response).await?;
        Ok(response.json().await?)
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, DbError> {
        let response = self
            .request(Method::GET, path)
            .await?
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let response = Self::check(path, response).await?;

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| DbError::Status {
                status: response.status().as_u16(),
                body: format!("no ETag returned for {path}"),
            })?;
        let value = response.json().await?;
        Ok(Versioned { value, etag })
    }

    async fn set_if_match(&self, path: &str, value: &Value, etag: &str) -> Result<(), DbError> {
        let response = self
            .request(Method::PUT, path)
            .await?
            .header(reqwest::header::IF_MATCH, etag)
            .json(value)
            .send()
            .await?;
        Self::check(path, response).await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, DbError> {
        let response = self
            .request(Method::POST, path)
            .await?
            .json(value)
            .send()
            .await?;
        let response = Self::check(path, response).await?;
        let pushed: PushResponse = response.json().await?;
        Ok(pushed.name)
    }
}
