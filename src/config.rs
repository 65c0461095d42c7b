//! Application settings read from the environment.

use reqwest::Url;
use std::net::SocketAddr;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime settings of the bot backend
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub telegram_bot_token: String,
    /// PostgreSQL connection string; the in-memory store is used when absent
    pub database_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    /// Public URL for webhook mode; long polling when absent
    pub webhook_url: Option<Url>,
    pub log_level: String,
    pub log_json: bool,
    pub debug: bool,
}

fn parse_flag(name: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => {
            Ok(true)
        }
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => {
            Ok(false)
        }
        Some(v) => Err(ConfigError::InvalidValue {
            name,
            value: v.to_string(),
        }),
    }
}

/// Treats empty values as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Creates settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TELEGRAM_BOT_TOKEN` is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_bot_token = non_empty(lookup("TELEGRAM_BOT_TOKEN"))
            .ok_or(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN"))?;

        let server_port = match non_empty(lookup("SERVER_PORT")) {
            Some(port) => port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "SERVER_PORT",
                value: port,
            })?,
            None => DEFAULT_PORT,
        };

        let webhook_url = match non_empty(lookup("WEBHOOK_URL")) {
            Some(url) => Some(Url::parse(url.trim()).map_err(|_| ConfigError::InvalidValue {
                name: "WEBHOOK_URL",
                value: url,
            })?),
            None => None,
        };

        let log_json = non_empty(lookup("LOG_FORMAT"))
            .map(|format| format.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            database_url: non_empty(lookup("DATABASE_URL")),
            server_host: non_empty(lookup("SERVER_HOST")).unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            server_port,
            webhook_url,
            log_level: non_empty(lookup("LOG_LEVEL"))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            log_json,
            debug: parse_flag("DEBUG", lookup("DEBUG"))?,
        })
    }

    /// Address the HTTP server binds to
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server_host, self.server_port);
        addr.parse().map_err(|_| ConfigError::InvalidValue {
            name: "SERVER_HOST",
            value: addr,
        })
    }

    /// Filter directive for the tracing subscriber; `DEBUG` also turns on SQL logging
    pub fn log_filter(&self) -> String {
        if self.debug {
            format!("{},sqlx=debug", self.log_level)
        } else {
            format!("{},sqlx=warn", self.log_level)
        }
    }
}
