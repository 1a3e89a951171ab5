/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Client configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::offline_queue::DrainPolicy;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_STORE_DIR: &str = ".roast-store";
pub const DEFAULT_STORE_SCOPE: &str = "roast";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_REPLAY_ATTEMPTS: u32 = 3;

/// Configuration for a [`RoastClient`](crate::RoastClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL relative request paths are resolved against.
    pub api_base_url: String,
    /// Bearer token attached to every request, if set.
    pub api_token: Option<String>,
    /// Root directory of the file store.
    pub store_dir: PathBuf,
    /// Namespace inside `store_dir`.
    pub store_scope: String,
    /// Deadline for each detail fetch.
    pub fetch_timeout: Duration,
    pub drain_policy: DrainPolicy,
    /// Periodic retry of the offline queue. `None` disables it.
    pub sync_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            store_scope: DEFAULT_STORE_SCOPE.to_string(),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            drain_policy: DrainPolicy::default(),
            sync_interval: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional
    /// - `ROAST_API_BASE_URL` (default: `"http://localhost:8080"`)
    /// - `ROAST_API_TOKEN`
    /// - `ROAST_STORE_DIR` (default: `".roast-store"`)
    /// - `ROAST_STORE_SCOPE` (default: `"roast"`)
    /// - `ROAST_FETCH_TIMEOUT_MS` (default: `"15000"`)
    /// - `ROAST_DRAIN_POLICY`: `fire-and-clear` (default) or `retry-failed`
    /// - `ROAST_MAX_REPLAY_ATTEMPTS` (default: `"3"`, only for `retry-failed`)
    /// - `ROAST_SYNC_INTERVAL_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let fetch_timeout = match var("ROAST_FETCH_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_positive(
                "ROAST_FETCH_TIMEOUT_MS",
                &raw,
            )?),
            None => defaults.fetch_timeout,
        };

        let max_attempts = match var("ROAST_MAX_REPLAY_ATTEMPTS") {
            Some(raw) => u32::try_from(parse_positive("ROAST_MAX_REPLAY_ATTEMPTS", &raw)?)
                .map_err(|_| invalid("ROAST_MAX_REPLAY_ATTEMPTS", "a positive integer", &raw))?,
            None => DEFAULT_MAX_REPLAY_ATTEMPTS,
        };

        let drain_policy = match var("ROAST_DRAIN_POLICY") {
            Some(raw) => parse_drain_policy(&raw, max_attempts)?,
            None => defaults.drain_policy,
        };

        let sync_interval = var("ROAST_SYNC_INTERVAL_MS")
            .map(|raw| parse_positive("ROAST_SYNC_INTERVAL_MS", &raw).map(Duration::from_millis))
            .transpose()?;

        let store_scope = var("ROAST_STORE_SCOPE").unwrap_or(defaults.store_scope);

        Ok(Self {
            api_base_url: var("ROAST_API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_token: var("ROAST_API_TOKEN"),
            store_dir: var("ROAST_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            store_scope,
            fetch_timeout,
            drain_policy,
            sync_interval,
        })
    }
}

/// Parse `fire-and-clear` or `retry-failed`.
pub fn parse_drain_policy(raw: &str, max_attempts: u32) -> Result<DrainPolicy, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "fire-and-clear" => Ok(DrainPolicy::FireAndClear),
        "retry-failed" => Ok(DrainPolicy::RetryFailed { max_attempts }),
        _ => Err(invalid(
            "ROAST_DRAIN_POLICY",
            "'fire-and-clear' or 'retry-failed'",
            raw,
        )),
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(invalid(name, "a positive integer", raw)),
    }
}

fn invalid(name: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        expected,
        value: value.to_string(),
    }
}
