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

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use roast_client::{
    parse_drain_policy, ClientConfig, ConfigError, DrainPolicy, DEFAULT_MAX_REPLAY_ATTEMPTS,
};
use roast_types::{HttpMethod, TemperatureUnit};

/// Roast CLI
///
/// Resample roast logs into chart-ready series and manage the queue of
/// writes that could not reach the server.
///
/// Store location, API endpoint and replay policy default to the `ROAST_*`
/// environment variables; flags override them.
#[derive(Parser, Debug)]
#[clap(name = "roast")]
pub struct Opt {
    #[clap(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Resample raw roast events and print a summary per series.
    Series(Series),

    /// Inspect, fill or replay the offline request queue.
    Queue(Queue),
}

#[derive(Args, Debug, Clone)]
pub struct Series {
    /// JSON file: an object mapping series name to an array of raw events,
    /// or a bare array for a single series named after the file.
    #[clap(long = "input", short = 'i')]
    pub input: PathBuf,

    /// Output temperature unit, `F` or `C`.
    #[clap(long = "unit", short = 'u', default_value = "F")]
    pub unit: TemperatureUnit,

    /// Print every derived point as JSON instead of a summary.
    #[clap(long = "json")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct Queue {
    #[clap(flatten)]
    pub client: ClientArgs,

    #[clap(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// List queued requests in replay order.
    List,

    /// Send a request, or queue it when the server is unreachable.
    Submit(Submit),

    /// Replay every queued request now.
    Drain,

    /// Show requests the retry policy gave up on.
    DeadLetters {
        /// Delete them after printing.
        #[clap(long = "clear")]
        clear: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Submit {
    /// Absolute URL, or a path starting with `/` resolved against the API base URL.
    #[clap(long = "url")]
    pub url: String,

    #[clap(long = "method", short = 'X', default_value = "POST")]
    pub method: HttpMethod,

    /// JSON request body.
    #[clap(long = "body", short = 'd')]
    pub body: Option<String>,

    /// Queue without trying the network.
    #[clap(long = "offline")]
    pub offline: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
    /// Overrides `ROAST_STORE_DIR`.
    #[clap(long = "store-dir")]
    pub store_dir: Option<PathBuf>,

    /// Overrides `ROAST_STORE_SCOPE`.
    #[clap(long = "scope")]
    pub scope: Option<String>,

    /// Overrides `ROAST_API_BASE_URL`.
    #[clap(long = "api-base-url")]
    pub api_base_url: Option<String>,

    /// `fire-and-clear` or `retry-failed`. Overrides `ROAST_DRAIN_POLICY`.
    #[clap(long = "policy")]
    pub policy: Option<String>,

    /// Attempts before `retry-failed` dead-letters a request.
    #[clap(long = "max-attempts")]
    pub max_attempts: Option<u32>,
}

impl ClientArgs {
    /// Apply these flags on top of `config`.
    pub fn apply(&self, mut config: ClientConfig) -> Result<ClientConfig, ConfigError> {
        if let Some(dir) = &self.store_dir {
            config.store_dir = dir.clone();
        }
        if let Some(scope) = &self.scope {
            config.store_scope = scope.clone();
        }
        if let Some(url) = &self.api_base_url {
            config.api_base_url = url.clone();
        }

        let max_attempts = self.max_attempts.unwrap_or(match config.drain_policy {
            DrainPolicy::RetryFailed { max_attempts } => max_attempts,
            DrainPolicy::FireAndClear => DEFAULT_MAX_REPLAY_ATTEMPTS,
        });
        if let Some(policy) = &self.policy {
            config.drain_policy = parse_drain_policy(policy, max_attempts)?;
        } else if let DrainPolicy::RetryFailed { .. } = config.drain_policy {
            config.drain_policy = DrainPolicy::RetryFailed { max_attempts };
        }
        Ok(config)
    }
}
