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

//! Outbound request records, as sent directly or persisted for later replay.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(ParseError::UnknownMethod(other.to_string())),
        }
    }
}

/// Everything needed to issue a request besides its URL.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn delete() -> Self {
        Self::new(HttpMethod::Delete)
    }

    pub fn post_json(body: Value) -> Self {
        Self::new(HttpMethod::Post).with_body(body)
    }

    pub fn put_json(body: Value) -> Self {
        Self::new(HttpMethod::Put).with_body(body)
    }

    pub fn patch_json(body: Value) -> Self {
        Self::new(HttpMethod::Patch).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach `Authorization: Bearer <token>`.
    ///
    /// The token is captured at build time, so a request replayed much later
    /// carries the token that was current when it was submitted.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Whether the request changes server state and may be queued offline.
    pub fn is_mutation(&self) -> bool {
        self.method != HttpMethod::Get
    }
}

/// A mutation waiting for connectivity.
///
/// `url`, `options` and `timestamp` are fixed once the entry is persisted.
/// `failed_attempts` only moves when a retrying drain re-queues the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub url: String,
    pub options: RequestOptions,
    /// Unix time in milliseconds when the request was first submitted.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failed_attempts: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl PendingRequest {
    pub fn new(url: impl Into<String>, options: RequestOptions, timestamp: u64) -> Self {
        Self {
            url: url.into(),
            options,
            timestamp,
            failed_attempts: 0,
        }
    }

    /// Copy of this entry with one more failed replay recorded.
    pub fn with_failed_attempt(&self) -> Self {
        Self {
            failed_attempts: self.failed_attempts.saturating_add(1),
            ..self.clone()
        }
    }
}
