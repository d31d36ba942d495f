//! Minimal transport config: token, API URL, log path, loaded from the
//! environment.

use anyhow::Result;
use std::env;

/// Telegram connectivity and logging config.
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: Option<String>,
    pub log_file: Option<String>,
}

impl TelegramConfig {
    /// Loads from environment variables: BOT_TOKEN required,
    /// TELEGRAM_API_URL and LOG_FILE optional.
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").map_err(|_| anyhow::anyhow!("BOT_TOKEN not set"))?;
        let api_url = env::var("TELEGRAM_API_URL").ok();
        let log_file = env::var("LOG_FILE").ok();
        Ok(Self {
            bot_token,
            api_url,
            log_file,
        })
    }

    /// Loads from the environment; an explicit token overrides BOT_TOKEN.
    pub fn load(token: Option<String>) -> Result<Self> {
        match token {
            Some(bot_token) => Ok(Self {
                bot_token,
                api_url: env::var("TELEGRAM_API_URL").ok(),
                log_file: env::var("LOG_FILE").ok(),
            }),
            None => Self::from_env(),
        }
    }

    /// Uses the given token; everything else unset.
    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            api_url: None,
            log_file: None,
        }
    }
}
