use std::fmt;
use url::Url;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is missing or empty.
    MissingVar(&'static str),
    /// A variable is present but malformed.
    InvalidVar { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(name) => {
                write!(f, "missing required environment variable {name}")
            }
            Self::InvalidVar { name, reason } => write!(f, "invalid {name}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Process configuration, resolved from the environment once at startup and
/// passed by reference from then on.
pub struct Config {
    pub telegram_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Full webhook URL registered with Telegram at startup
    /// (externally-visible base URL + the bot token as path).
    pub webhook_url: Url,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_token = require(&lookup, "TELEGRAM_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::InvalidVar {
                name: "TELEGRAM_TOKEN",
                reason: "token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            });
        }

        let gemini_api_key = require(&lookup, "GEMINI_API_KEY")?;

        let public_raw = require(&lookup, "PUBLIC_URL")?;
        let public_url = Url::parse(&public_raw).map_err(|e| ConfigError::InvalidVar {
            name: "PUBLIC_URL",
            reason: e.to_string(),
        })?;
        if !matches!(public_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidVar {
                name: "PUBLIC_URL",
                reason: format!("unsupported scheme '{}'", public_url.scheme()),
            });
        }

        let webhook_raw = format!("{}/{}", public_raw.trim_end_matches('/'), telegram_token);
        let webhook_url = Url::parse(&webhook_raw).map_err(|e| ConfigError::InvalidVar {
            name: "PUBLIC_URL",
            reason: format!("cannot build webhook URL from it: {e}"),
        })?;

        let port = match lookup("PORT") {
            Some(raw) if !raw.is_empty() => {
                raw.parse::<u16>().map_err(|_| ConfigError::InvalidVar {
                    name: "PORT",
                    reason: format!("'{raw}' is not a valid port number"),
                })?
            }
            _ => DEFAULT_PORT,
        };

        let gemini_model = lookup("GEMINI_MODEL")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            telegram_token,
            gemini_api_key,
            gemini_model,
            webhook_url,
            port,
        })
    }
}

fn require<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
