//! LINE business-card bot server
//!
//! Entry point for the webhook service.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;
use namecard_bot::{config::AppConfig, server, telemetry};

#[tokio::main]
async fn main() {
    // Load .env (if present)
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED)
    telemetry::init();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        std::process::exit(1);
    }

    if let Err(e) = server::start_server(Arc::new(config)).await {
        tracing::error!(error = ?e, "Server failed");
        std::process::exit(1);
    }
}
