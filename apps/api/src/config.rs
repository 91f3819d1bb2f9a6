use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only `DATABASE_URL` is required; every capability degrades when its settings are absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// When unset the language model is treated as unavailable and fallbacks are used.
    pub anthropic_api_key: Option<String>,
    /// OpenAI-compatible embeddings endpoint. Unset means the local hashing embedder.
    pub embedding_url: Option<String>,
    pub mail_enabled: bool,
    pub mail_sender: Option<String>,
    pub mail_webhook_url: Option<String>,
    pub company_name: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            embedding_url: optional_env("EMBEDDING_URL"),
            mail_enabled: optional_env("MAIL_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            mail_sender: optional_env("MAIL_SENDER"),
            mail_webhook_url: optional_env("MAIL_WEBHOOK_URL"),
            company_name: optional_env("COMPANY_NAME").unwrap_or_else(|| "HireFlow".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Mail goes out only when explicitly enabled and both relay settings are present.
    pub fn mail_configured(&self) -> bool {
        self.mail_enabled && self.mail_sender.is_some() && self.mail_webhook_url.is_some()
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_accepts_common_truthy_values() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_flag(v), "{v} should be truthy");
        }
        for v in ["0", "false", "no", "off", ""] {
            assert!(!parse_flag(v), "{v} should be falsy");
        }
    }

    #[test]
    fn test_mail_configured_requires_all_settings() {
        let mut config = Config {
            database_url: "postgres://localhost/hireflow".to_string(),
            anthropic_api_key: None,
            embedding_url: None,
            mail_enabled: true,
            mail_sender: Some("recruiting@example.com".to_string()),
            mail_webhook_url: None,
            company_name: "HireFlow".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
        };
        assert!(!config.mail_configured());

        config.mail_webhook_url = Some("http://relay.local/send".to_string());
        assert!(config.mail_configured());

        config.mail_enabled = false;
        assert!(!config.mail_configured());
    }
}
