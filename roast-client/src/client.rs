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

use std::sync::Arc;

use log::info;
use roast_diagnostics::{DiagEvent, DiagnosticsContext};

use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::ClientError;
use crate::loader::{DetailFetcher, LoaderOptions, ObserverOptions, ViewportLoader};
use crate::offline_queue::OfflineRequestQueue;
use crate::storage::{FileStore, LocalStore};
use crate::sync_service::{SyncHandle, SyncService};
use crate::transport::{AuthenticatedTransport, HttpTransport, ReqwestTransport, StaticToken};

/// The client-side pieces wired together from a [`ClientConfig`].
///
/// Owns the diagnostics context; [`shutdown`](Self::shutdown) stops the sync
/// service and returns any diagnostics nobody consumed.
pub struct RoastClient {
    config: ClientConfig,
    store: Arc<dyn LocalStore>,
    transport: Arc<dyn HttpTransport>,
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<OfflineRequestQueue>,
    diagnostics: Arc<DiagnosticsContext>,
    sync: Option<SyncHandle>,
}

impl RoastClient {
    /// Open the file store and build the transport and queue.
    pub fn create(config: ClientConfig, initially_connected: bool) -> Result<Self, ClientError> {
        let store: Arc<dyn LocalStore> =
            Arc::new(FileStore::open(&config.store_dir, &config.store_scope)?);

        let base: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::with_base_url(&config.api_base_url));
        let transport: Arc<dyn HttpTransport> = match &config.api_token {
            Some(token) => Arc::new(AuthenticatedTransport::new(
                base,
                Arc::new(StaticToken(token.clone())),
            )),
            None => base,
        };

        Ok(Self::with_parts(config, store, transport, initially_connected))
    }

    /// Assemble from caller-provided store and transport.
    pub fn with_parts(
        config: ClientConfig,
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn HttpTransport>,
        initially_connected: bool,
    ) -> Self {
        let diagnostics = DiagnosticsContext::create();
        let monitor = Arc::new(ConnectivityMonitor::new(initially_connected));
        let queue = Arc::new(
            OfflineRequestQueue::new(
                Arc::clone(&store),
                Arc::clone(&transport),
                monitor.clone(),
                Arc::clone(&diagnostics),
            )
            .with_policy(config.drain_policy),
        );
        info!(
            "roast client ready (api {}, policy {:?})",
            config.api_base_url, config.drain_policy
        );

        Self {
            config,
            store,
            transport,
            monitor,
            queue,
            diagnostics,
            sync: None,
        }
    }

    /// Start replaying the queue on reconnect. Needs a tokio runtime.
    pub fn start_sync(&mut self) {
        if self.sync.is_none() {
            self.sync = Some(SyncService::start(
                Arc::clone(&self.queue),
                &self.monitor,
                self.config.sync_interval,
            ));
        }
    }

    /// A loader using the configured fetch deadline.
    pub fn viewport_loader<D>(
        &self,
        fetcher: impl DetailFetcher<D> + 'static,
        observer: ObserverOptions,
    ) -> ViewportLoader<D>
    where
        D: Clone + Send + Sync + 'static,
    {
        let options = LoaderOptions {
            fetch_timeout: self.config.fetch_timeout,
            observer,
        };
        ViewportLoader::new(fetcher, options).with_diagnostics(Arc::clone(&self.diagnostics))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn queue(&self) -> &Arc<OfflineRequestQueue> {
        &self.queue
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsContext> {
        &self.diagnostics
    }

    pub fn shutdown(mut self) -> Vec<DiagEvent> {
        if let Some(sync) = self.sync.take() {
            sync.shutdown();
        }
        self.diagnostics.shutdown()
    }
}
