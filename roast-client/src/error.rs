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

//! Error types for the roast client.

use thiserror::Error;

/// Failures of the durable key/value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying medium refused the operation.
    #[error("Storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A key or scope the store cannot represent.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// A stored value could not be encoded or decoded as JSON.
    #[error("Corrupt value under '{key}': {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server could not be reached (DNS, connect, TLS, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered, but the exchange could not be completed
    /// (redirect loop, undecodable response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The request could not be built (bad URL, invalid header).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The auth token provider failed.
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl TransportError {
    /// Whether this failure means "unreachable" rather than "rejected".
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else if err.is_redirect() || err.is_decode() || err.is_status() {
            TransportError::Protocol(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Errors returned by [`OfflineRequestQueue`](crate::OfflineRequestQueue).
#[derive(Debug, Error)]
pub enum QueueError {
    /// The pending list could not be read or written.
    #[error("Offline queue storage failed: {0}")]
    Store(#[from] StoreError),

    /// The request failed for a reason queuing cannot fix.
    #[error("Request failed: {0}")]
    Transport(TransportError),
}

/// Invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Errors raised while assembling a [`RoastClient`](crate::RoastClient).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] TransportError),
}
