use std::ops::RangeInclusive;

use crate::domain::errors::ConfigError;

/// Runtime configuration of the sync sidecar.
///
/// Endpoint, credential and account mapping are owned by the deployment
/// environment; the core only consumes them as plain values.
#[derive(Clone)]
pub struct SyncConfig {
    /// Base URL of the remote ledger API.
    pub base_url: String,
    /// Long-lived access credential traded for short-lived bearer tokens.
    pub access_token: String,
    /// Accounts to reconcile, one pass each per interval.
    pub account_ids: Vec<String>,
    /// Directory holding one canonical transaction file per account.
    pub source_dir: String,
    pub sync_interval_seconds: u64,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_pause_ms: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_seconds: u64,
    pub token_ttl_seconds: u64,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .field("account_ids", &self.account_ids)
            .field("source_dir", &self.source_dir)
            .field("sync_interval_seconds", &self.sync_interval_seconds)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_pause_ms", &self.retry_pause_ms)
            .field("breaker_failure_threshold", &self.breaker_failure_threshold)
            .field("breaker_cooldown_seconds", &self.breaker_cooldown_seconds)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl SyncConfig {
    /// Defaults for everything except the endpoint and credential, which have
    /// no sensible default and must come from the environment.
    pub fn defaults(base_url: &str, access_token: &str) -> SyncConfig {
        SyncConfig {
            base_url: base_url.to_string(),
            access_token: access_token.to_string(),
            account_ids: Vec::new(),
            source_dir: "./data".to_string(),
            sync_interval_seconds: 3600,
            request_timeout_ms: 10_000,
            max_retries: 3,
            retry_pause_ms: 1000,
            breaker_failure_threshold: 3,
            breaker_cooldown_seconds: 60,
            token_ttl_seconds: 1800,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `FOLIOSYNC_BASE_URL` and `FOLIOSYNC_ACCESS_TOKEN` are required; every
    /// tuning knob falls back to its default when unset or out of range, with
    /// a warning rather than a hard failure.
    pub fn from_env() -> Result<SyncConfig, ConfigError> {
        let base_url = std::env::var("FOLIOSYNC_BASE_URL")
            .map_err(|_| ConfigError::MissingVariable("FOLIOSYNC_BASE_URL"))?;
        let access_token = std::env::var("FOLIOSYNC_ACCESS_TOKEN")
            .map_err(|_| ConfigError::MissingVariable("FOLIOSYNC_ACCESS_TOKEN"))?;

        let mut config = SyncConfig::defaults(&base_url, &access_token);

        if let Ok(accounts) = std::env::var("FOLIOSYNC_ACCOUNTS") {
            config.account_ids = parse_account_ids(&accounts);
        }
        if config.account_ids.is_empty() {
            tracing::warn!("FOLIOSYNC_ACCOUNTS is empty, no accounts will be synchronized");
        }

        if let Ok(dir) = std::env::var("FOLIOSYNC_SOURCE_DIR") {
            if !dir.trim().is_empty() {
                config.source_dir = dir;
            }
        }

        config.sync_interval_seconds = read_u64(
            "FOLIOSYNC_INTERVAL_SECONDS",
            60..=86_400,
            config.sync_interval_seconds,
        );
        config.request_timeout_ms = read_u64(
            "FOLIOSYNC_REQUEST_TIMEOUT_MS",
            1000..=60_000,
            config.request_timeout_ms,
        );
        config.max_retries = read_u32("FOLIOSYNC_MAX_RETRIES", 1..=10, config.max_retries);
        config.retry_pause_ms = read_u64(
            "FOLIOSYNC_RETRY_PAUSE_MS",
            100..=30_000,
            config.retry_pause_ms,
        );
        config.breaker_failure_threshold = read_u32(
            "FOLIOSYNC_BREAKER_THRESHOLD",
            1..=20,
            config.breaker_failure_threshold,
        );
        config.breaker_cooldown_seconds = read_u64(
            "FOLIOSYNC_BREAKER_COOLDOWN_SECONDS",
            5..=3600,
            config.breaker_cooldown_seconds,
        );
        config.token_ttl_seconds = read_u64(
            "FOLIOSYNC_TOKEN_TTL_SECONDS",
            60..=86_400,
            config.token_ttl_seconds,
        );

        Ok(config)
    }
}

fn parse_account_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn read_u64(name: &str, range: RangeInclusive<u64>, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(value) if range.contains(&value) => value,
            Ok(value) => {
                tracing::warn!(
                    "{} value {} outside {:?}, using default {}",
                    name,
                    value,
                    range,
                    default
                );
                default
            }
            Err(e) => {
                tracing::warn!("failed to parse {} '{}': {}, using default {}", name, raw, e, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn read_u32(name: &str, range: RangeInclusive<u32>, default: u32) -> u32 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(value) if range.contains(&value) => value,
            Ok(value) => {
                tracing::warn!(
                    "{} value {} outside {:?}, using default {}",
                    name,
                    value,
                    range,
                    default
                );
                default
            }
            Err(e) => {
                tracing::warn!("failed to parse {} '{}': {}, using default {}", name, raw, e, default);
                default
            }
        },
        Err(_) => default,
    }
}
