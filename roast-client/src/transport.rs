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

//! HTTP transport used for direct sends and queue replay.
//!
//! The transport reports two kinds of outcome and callers rely on telling
//! them apart:
//!
//! - `Ok(HttpResponse)` for anything the server answered, including 4xx/5xx.
//! - `Err(TransportError::Network)` when the server could not be reached.
//!
//! Once a status line has arrived the request counts as delivered: a body
//! that breaks off mid-read still yields `Ok`, with whatever could be read
//! discarded.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use roast_types::{HttpMethod, RequestOptions};

use crate::error::TransportError;

/// A response the server actually produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one request.
pub trait HttpTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        url: &'a str,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;
}

/// Supplies bearer tokens for authenticated calls. Opaque to the queue:
/// callers apply it while building [`RequestOptions`].
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> BoxFuture<'_, Result<String, TransportError>>;
}

/// A fixed token, e.g. from `ROAST_API_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> BoxFuture<'_, Result<String, TransportError>> {
        let token = self.0.clone();
        async move { Ok(token) }.boxed()
    }
}

/// Attach a fresh bearer token from `provider` to `options`.
pub async fn authorized(
    provider: &dyn TokenProvider,
    options: RequestOptions,
) -> Result<RequestOptions, TransportError> {
    let token = provider.token().await?;
    Ok(options.with_bearer(&token))
}

/// Wraps a transport and attaches a fresh bearer token to every send.
///
/// Queued requests are persisted without credentials; the token is looked
/// up when a request actually goes out.
pub struct AuthenticatedTransport {
    inner: Arc<dyn HttpTransport>,
    provider: Arc<dyn TokenProvider>,
}

impl AuthenticatedTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, provider: Arc<dyn TokenProvider>) -> Self {
        Self { inner, provider }
    }
}

impl HttpTransport for AuthenticatedTransport {
    fn send<'a>(
        &'a self,
        url: &'a str,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        async move {
            let options = authorized(self.provider.as_ref(), options.clone()).await?;
            self.inner.send(url, &options).await
        }
        .boxed()
    }
}

/// [`HttpTransport`] backed by [`reqwest`].
///
/// Relative URLs (starting with `/`) are resolved against the base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    /// Create a transport pointing at the given API base URL.
    ///
    /// * `base_url` - e.g. `"https://api.example.com"`
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: Some(base_url.trim_end_matches('/').to_string()),
            http: reqwest::Client::new(),
        }
    }

    fn resolve(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if url.starts_with('/') => format!("{base}{url}"),
            _ => url.to_string(),
        }
    }

    async fn execute(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse, TransportError> {
        let url = self.resolve(url);
        let mut builder = self.http.request(method(options.method), &url);
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("{} {url} -> {status}, body unreadable: {err}", options.method);
                String::new()
            }
        };
        debug!("{} {url} -> {status}", options.method);
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        url: &'a str,
        options: &'a RequestOptions,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        self.execute(url, options).boxed()
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
