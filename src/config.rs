use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Deployment variables read as-is, mapped onto config keys.
const CONVENTIONAL_ENV: &[(&str, &str)] = &[
    ("ChannelSecret", "line.channel_secret"),
    ("ChannelAccessToken", "line.channel_access_token"),
    ("GOOGLE_GEMINI_API_KEY", "gemini.api_key"),
    ("FIREBASE_URL", "persistence.database_url"),
    ("GOOGLE_APPLICATION_CREDENTIALS", "persistence.credentials"),
    ("FIREBASE_DATABASE_SECRET", "persistence.database_secret"),
];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// How plain text messages are handled
    #[arg(long, env = "BOT_MODE", value_enum)]
    pub mode: Option<BotMode>,
}

/// Text-message behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    /// `list` shows saved cards; anything else searches them.
    #[default]
    Search,
    /// Free conversation with the model, remembered per user.
    Conversation,
}

impl BotMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Conversation => "conversation",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub line: LineConfig,
    pub gemini: GeminiConfig,
    pub persistence: PersistenceConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub webhook_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub api_base: String,
    pub data_api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    /// `firebase` or `memory`.
    pub provider: String,
    pub database_url: String,
    /// Service-account key: the JSON itself or a path to it.
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub database_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub mode: BotMode,
    pub list_command: String,
    pub logo_url: String,
    pub more_info_url: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.webhook_path", "/callback")?
            .set_default("line.channel_secret", "")?
            .set_default("line.channel_access_token", "")?
            .set_default("line.api_base", "https://api.line.me")?
            .set_default("line.data_api_base", "https://api-data.line.me")?
            .set_default("gemini.api_key", "")?
            .set_default("gemini.model", "gemini-2.0-flash")?
            .set_default("gemini.base_url", "https://generativelanguage.googleapis.com")?
            .set_default("persistence.provider", "firebase")?
            .set_default("persistence.database_url", "")?
            .set_default("bot.mode", BotMode::default().as_str())?
            .set_default("bot.list_command", "list")?
            .set_default(
                "bot.logo_url",
                "https://raw.githubusercontent.com/kkdai/linebot-smart-namecard/main/img/logo.jpeg",
            )?
            .set_default(
                "bot.more_info_url",
                "https://github.com/kkdai/linebot-smart-namecard",
            )?;

        // 2. Config file: explicit path, else ./config.yaml when present
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config.yaml").required(false));
        }

        // 3. Prefixed environment, e.g. NAMECARD_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix("NAMECARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Conventional deployment variables
        for (var, key) in CONVENTIONAL_ENV {
            if let Ok(val) = env::var(var)
                && !val.trim().is_empty()
            {
                builder = builder.set_override(*key, val)?;
            }
        }

        // 5. CLI flags (and their env fallbacks) win
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(mode) = cli.mode {
            builder = builder.set_override("bot.mode", mode.as_str())?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    /// Check the settings every deployment needs.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("line.channel_secret (ChannelSecret)", &self.line.channel_secret),
            (
                "line.channel_access_token (ChannelAccessToken)",
                &self.line.channel_access_token,
            ),
            ("gemini.api_key (GOOGLE_GEMINI_API_KEY)", &self.gemini.api_key),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("Missing required setting: {name}"));
            }
        }

        if self.persistence.provider == "firebase" && self.persistence.database_url.trim().is_empty() {
            return Err("Missing required setting: persistence.database_url (FIREBASE_URL)".to_string());
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(format!(
                "server.webhook_path must start with '/': {}",
                self.server.webhook_path
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_mode_round_trips_through_str() {
        for mode in [BotMode::Search, BotMode::Conversation] {
            let parsed: BotMode = serde_json::from_value(serde_json::json!(mode.as_str())).unwrap();
            assert_eq!(parsed, mode);
        }
    }
}
