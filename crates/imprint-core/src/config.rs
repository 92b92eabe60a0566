//! Configuration module
//!
//! Session configuration is read from the environment (after loading `.env`),
//! with defaults for everything. Without `IMPRINT_API_URL` the session runs in
//! preview-only mode and never contacts an ingestion endpoint.

use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

// Common constants
const MAX_FILE_SIZE_MB: u64 = 10;
const INGEST_PATH: &str = "/ingest";
const INGEST_TIMEOUT_SECS: u64 = 60;
const TRAINING_TICK_MS: u64 = 300;
const TRAINING_MIN_INCREMENT: u8 = 5;
const TRAINING_MAX_INCREMENT: u8 = 20;
const CHAT_RESPONSE_DELAY_MS: u64 = 1500;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub environment: String,
    // Ingestion endpoint
    pub api_url: Option<String>,
    pub ingest_path: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub ingest_timeout_secs: u64,
    // Validation
    pub max_file_size_bytes: u64,
    // Training simulation
    pub training_tick_ms: u64,
    pub training_min_increment: u8,
    pub training_max_increment: u8,
    // Chat
    pub chat_response_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            api_url: None,
            ingest_path: INGEST_PATH.to_string(),
            api_key: None,
            bearer_token: None,
            ingest_timeout_secs: INGEST_TIMEOUT_SECS,
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            training_tick_ms: TRAINING_TICK_MS,
            training_min_increment: TRAINING_MIN_INCREMENT,
            training_max_increment: TRAINING_MAX_INCREMENT,
            chat_response_delay_ms: CHAT_RESPONSE_DELAY_MS,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_file_size_mb = get("MAX_FILE_SIZE_MB")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(MAX_FILE_SIZE_MB);
        let max_file_size_bytes = max_file_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                anyhow::anyhow!("MAX_FILE_SIZE_MB ({}) is too large", max_file_size_mb)
            })?;

        let config = SessionConfig {
            environment: get("ENVIRONMENT")
                .or_else(|| get("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            api_url: get("IMPRINT_API_URL")
                .or_else(|| get("API_URL"))
                .map(|url| url.trim().trim_end_matches('/').to_string()),
            ingest_path: get("IMPRINT_INGEST_PATH").unwrap_or_else(|| INGEST_PATH.to_string()),
            api_key: get("IMPRINT_API_KEY"),
            bearer_token: get("IMPRINT_BEARER_TOKEN"),
            ingest_timeout_secs: get("INGEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(INGEST_TIMEOUT_SECS),
            max_file_size_bytes,
            training_tick_ms: get("TRAINING_TICK_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(TRAINING_TICK_MS),
            training_min_increment: get("TRAINING_MIN_INCREMENT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(TRAINING_MIN_INCREMENT),
            training_max_increment: get("TRAINING_MAX_INCREMENT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(TRAINING_MAX_INCREMENT),
            chat_response_delay_ms: get("CHAT_RESPONSE_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CHAT_RESPONSE_DELAY_MS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.training_tick_ms == 0 {
            return Err(anyhow::anyhow!("TRAINING_TICK_MS must be greater than 0"));
        }

        if self.training_min_increment == 0 {
            return Err(anyhow::anyhow!(
                "TRAINING_MIN_INCREMENT must be at least 1"
            ));
        }

        if self.training_min_increment > self.training_max_increment {
            return Err(anyhow::anyhow!(
                "TRAINING_MIN_INCREMENT ({}) must not exceed TRAINING_MAX_INCREMENT ({})",
                self.training_min_increment,
                self.training_max_increment
            ));
        }

        if self.training_max_increment > 100 {
            return Err(anyhow::anyhow!("TRAINING_MAX_INCREMENT must be at most 100"));
        }

        if let Some(url) = &self.api_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "IMPRINT_API_URL must be an http:// or https:// URL"
                ));
            }
        }

        if !self.ingest_path.starts_with('/') {
            return Err(anyhow::anyhow!("IMPRINT_INGEST_PATH must start with '/'"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn ingestion_enabled(&self) -> bool {
        self.api_url.is_some()
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.training_tick_ms)
    }

    pub fn increment_range(&self) -> RangeInclusive<u8> {
        self.training_min_increment..=self.training_max_increment
    }

    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.chat_response_delay_ms)
    }
}
