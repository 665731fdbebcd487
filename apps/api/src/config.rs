use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_CHAT_URL, DEFAULT_MODEL};
use crate::queue::{DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_INTERVAL};
use crate::reply::fallback::DEFAULT_FALLBACK_COMMENTS;

/// Application configuration loaded from environment variables.
///
/// Missing credentials are NOT a startup error: the pipeline falls back and
/// logs the misconfiguration. Malformed numbers are.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_keys: Vec<String>,
    pub chat_url: String,
    pub chat_model: String,
    pub fallback_comments: Vec<String>,
    pub max_concurrent_requests: usize,
    pub min_request_interval: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_concurrent_requests =
            parse_env("MAX_CONCURRENT_REQUESTS", DEFAULT_MAX_CONCURRENT)?;
        if max_concurrent_requests == 0 {
            anyhow::bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }

        let default_interval_ms = u64::try_from(DEFAULT_MIN_INTERVAL.as_millis())?;

        Ok(Config {
            api_keys: collect_api_keys(
                optional_env("DEEPSEEK_API_KEYS").as_deref(),
                optional_env("DEEPSEEK_API_KEY").as_deref(),
            ),
            chat_url: optional_env("DEEPSEEK_CHAT_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            chat_model: optional_env("CHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            fallback_comments: optional_env("FALLBACK_COMMENTS")
                .map(|raw| split_fallback_comments(&raw))
                .unwrap_or_else(|| {
                    DEFAULT_FALLBACK_COMMENTS
                        .iter()
                        .map(|c| (*c).to_string())
                        .collect()
                }),
            max_concurrent_requests,
            min_request_interval: Duration::from_millis(parse_env(
                "MIN_REQUEST_INTERVAL_MS",
                default_interval_ms,
            )?),
            port: parse_env("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Credential used by the direct (non-queued) pipeline.
    pub fn primary_api_key(&self) -> Option<String> {
        self.api_keys.first().cloned()
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

/// Comma-separated pool first, then the single key if it is not already in it.
fn collect_api_keys(pool: Option<&str>, single: Option<&str>) -> Vec<String> {
    let mut keys: Vec<String> = pool
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(single) = single.map(str::trim).filter(|k| !k.is_empty()) {
        if !keys.iter().any(|k| k == single) {
            keys.push(single.to_string());
        }
    }
    keys
}

fn split_fallback_comments(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
