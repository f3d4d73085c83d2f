use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::{Instrument, info};

use crate::AppState;
use crate::config::{AppConfig, PersistenceConfig};
use crate::dispatch;
use crate::line::{LineClient, WebhookError, parse_request};
use crate::llm::GeminiClient;
use crate::persistence::{
    Credentials, Database, FirebaseDb, MemoryDb, ServiceAccountKey, auth::ServiceAccountAuth,
};

/// Build the storage provider named in the config.
pub fn build_database(config: &PersistenceConfig) -> anyhow::Result<Arc<dyn Database>> {
    match config.provider.as_str() {
        "memory" => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryDb::new()))
        }
        "firebase" => {
            let credentials = if let Some(raw) = config.credentials.as_deref().filter(|s| !s.trim().is_empty()) {
                // Either the key JSON itself or a path to the key file.
                let json = if raw.trim_start().starts_with('{') {
                    raw.to_string()
                } else {
                    std::fs::read_to_string(raw)?
                };
                let key = ServiceAccountKey::from_json(&json)?;
                info!(client_email = %key.client_email, "Using service account credentials");
                Credentials::ServiceAccount(ServiceAccountAuth::new(key)?)
            } else if let Some(secret) = config.database_secret.clone().filter(|s| !s.is_empty()) {
                Credentials::DatabaseSecret(secret)
            } else {
                tracing::warn!("No database credentials configured");
                Credentials::None
            };
            Ok(Arc::new(FirebaseDb::new(&config.database_url, credentials)?))
        }
        other => anyhow::bail!("Unknown persistence provider: {other}"),
    }
}

/// Router with the webhook and health endpoints.
pub fn build_router(state: AppState) -> Router {
    let webhook_path = state.config.server.webhook_path.clone();

    Router::new()
        .route(&webhook_path, post(line_webhook))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB limit
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
///
/// Any failure to construct a client is returned and ends the process.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let messaging = Arc::new(LineClient::new(
        &config.line.channel_access_token,
        &config.line.api_base,
        &config.line.data_api_base,
    )?);
    let extractor = Arc::new(GeminiClient::new(config.gemini.clone())?);
    let database = build_database(&config.persistence)?;

    info!(
        name: "clients.ready",
        model = %config.gemini.model,
        persistence = %config.persistence.provider,
        mode = config.bot.mode.as_str(),
        "Clients initialized"
    );

    let state = AppState::new(Arc::clone(&config), messaging, extractor, database);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        webhook_path = %config.server.webhook_path,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST <webhook_path> - Validate and process a webhook delivery.
async fn line_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let callback = parse_request(&state.config.line.channel_secret, &headers, &body)
        .inspect_err(|e| tracing::warn!(error = %e, "Rejected webhook request"))?;

    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("webhook", request_id = %request_id, events = callback.events.len());

    let outcomes = dispatch::handle_events(&state, callback.events)
        .instrument(span)
        .await;

    tracing::debug!(request_id = %request_id, ?outcomes, "Webhook processed");
    Ok(StatusCode::OK)
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}
