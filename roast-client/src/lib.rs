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

//! Client-side plumbing for a roast logging app: durable local storage,
//! lazy per-item detail loading driven by viewport visibility, and an offline
//! queue that replays writes once the network is back.
//!
//! The crate makes no assumptions about the UI. Hosts report visibility and
//! connectivity; everything else is driven from here.
//!
//! # Outline of usage
//!
//! ## Client creation:
//! ```ignore
//! let config = ClientConfig::from_env()?;
//! let mut client = RoastClient::create(config, true)?;
//! client.start_sync();
//! ```
//!
//! ## Offline writes:
//! ```ignore
//! let outcome = client
//!     .queue()
//!     .submit("/roasts", RequestOptions::post_json(body))
//!     .await?;
//! if outcome.is_stored() {
//!     // shown as "saved offline"
//! }
//!
//! // later, from the platform's network callback
//! client.monitor().set_connected(true);
//! ```
//!
//! ## Lazy detail:
//! ```ignore
//! let loader = client.viewport_loader(fetch_roast_detail, ObserverOptions::default());
//! loader.on_visibility("roast-42", true).await;
//! let view = loader.view("roast-42");
//! ```

mod client;
mod config;
mod connectivity;
mod error;
pub mod loader;
mod offline_queue;
pub mod storage;
mod sync_service;
mod transport;

pub use client::RoastClient;
pub use config::{
    parse_drain_policy, ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_FETCH_TIMEOUT_MS,
    DEFAULT_MAX_REPLAY_ATTEMPTS, DEFAULT_STORE_DIR, DEFAULT_STORE_SCOPE,
};
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivityProbe};
pub use error::{ClientError, ConfigError, QueueError, StoreError, TransportError};
pub use loader::{
    DetailFetcher, ItemView, LoadState, LoadStatus, LoaderEvent, LoaderOptions, ObserverOptions,
    Rect, TriggerOutcome, ViewportLoader,
};
pub use offline_queue::{
    DrainPolicy, DrainReport, OfflineRequestQueue, SubmitOutcome, DEAD_LETTER_KEY,
    PENDING_REQUESTS_KEY,
};
pub use storage::{FileStore, LocalStore, LocalStoreExt, MemoryStore};
pub use sync_service::{SyncHandle, SyncService};
pub use transport::{
    authorized, AuthenticatedTransport, HttpResponse, HttpTransport, ReqwestTransport,
    StaticToken, TokenProvider,
};

pub use roast_types::{HttpMethod, PendingRequest, RequestOptions};
