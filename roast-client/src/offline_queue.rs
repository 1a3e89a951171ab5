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
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Durable FIFO of mutating requests that could not reach the server.
//!
//! [`OfflineRequestQueue::submit`] sends a request right away when the
//! network is reachable and otherwise persists it under
//! [`PENDING_REQUESTS_KEY`]. [`OfflineRequestQueue::drain`] replays the
//! persisted list in arrival order, one request at a time.
//!
//! All read-modify-write cycles on the list run under one in-process lock.
//! A drain snapshots the list, replays it without holding the lock and then
//! removes exactly the replayed prefix, so a `submit` racing with a drain is
//! never lost.

use std::sync::Arc;

use log::{debug, error, info, warn};
use roast_diagnostics::{metric, now_ms, DiagnosticsContext};
use roast_types::{PendingRequest, RequestOptions};
use tokio::sync::Mutex;

use crate::connectivity::ConnectivityProbe;
use crate::error::{QueueError, StoreError};
use crate::storage::{LocalStore, LocalStoreExt};
use crate::transport::{HttpResponse, HttpTransport};

/// Store key holding the JSON list of [`PendingRequest`].
pub const PENDING_REQUESTS_KEY: &str = "offline_requests";

/// Store key holding requests the retrying policy gave up on.
pub const DEAD_LETTER_KEY: &str = "offline_requests_dead_letter";

const DIAG_SUBSYSTEM: &str = "offline_queue";

/// What a drain does with entries that fail to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Attempt every entry once, then drop the whole batch.
    #[default]
    FireAndClear,
    /// Keep entries that hit a network failure, ahead of newer submissions,
    /// until they have failed `max_attempts` times. Entries the server
    /// rejects, and entries out of attempts, move to the dead-letter list.
    RetryFailed { max_attempts: u32 },
}

/// Result of [`OfflineRequestQueue::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server answered. Non-2xx answers are returned as-is.
    Sent(HttpResponse),
    /// The request was persisted for a later drain.
    Stored { pending: usize },
}

impl SubmitOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SubmitOutcome::Stored { .. })
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            SubmitOutcome::Sent(response) => Some(response),
            SubmitOutcome::Stored { .. } => None,
        }
    }
}

/// Tally of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed entries kept for the next drain.
    pub requeued: usize,
    /// Failed entries moved to the dead-letter list.
    pub dead_lettered: usize,
}

enum ReplayFailure {
    Unreachable,
    Rejected,
}

pub struct OfflineRequestQueue {
    store: Arc<dyn LocalStore>,
    transport: Arc<dyn HttpTransport>,
    probe: Arc<dyn ConnectivityProbe>,
    diagnostics: Arc<DiagnosticsContext>,
    policy: DrainPolicy,
    list_lock: Mutex<()>,
    drain_gate: Mutex<()>,
}

impl OfflineRequestQueue {
    pub fn new(
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn HttpTransport>,
        probe: Arc<dyn ConnectivityProbe>,
        diagnostics: Arc<DiagnosticsContext>,
    ) -> Self {
        Self {
            store,
            transport,
            probe,
            diagnostics,
            policy: DrainPolicy::default(),
            list_lock: Mutex::new(()),
            drain_gate: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: DrainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }

    pub fn is_online(&self) -> bool {
        self.probe.is_connected()
    }

    /// Send `options` to `url`, or persist it for later if the network is
    /// unreachable.
    ///
    /// While older entries are still waiting, a new request is queued behind
    /// them even when online, so writes reach the server in submission order.
    pub async fn submit(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<SubmitOutcome, QueueError> {
        if self.probe.is_connected() {
            if self.pending_len().await? == 0 {
                match self.transport.send(url, &options).await {
                    Ok(response) => {
                        debug!("{} {url} sent directly ({})", options.method, response.status);
                        self.diagnostics.record(
                            DIAG_SUBSYSTEM,
                            Some(url.to_string()),
                            vec![metric!("submit", "sent"), metric!("status", response.status as u64)],
                        );
                        return Ok(SubmitOutcome::Sent(response));
                    }
                    Err(err) if err.is_network() => {
                        warn!("{} {url} unreachable, queueing: {err}", options.method);
                    }
                    Err(err) => return Err(QueueError::Transport(err)),
                }
            } else {
                debug!("{} {url} queued behind pending requests", options.method);
            }
        } else {
            debug!("offline, queueing {} {url}", options.method);
        }

        let pending = self
            .append(PendingRequest::new(url, options, now_ms()))
            .await?;
        info!("stored {url} for later sync ({pending} pending)");
        self.diagnostics.record(
            DIAG_SUBSYSTEM,
            Some(url.to_string()),
            vec![metric!("submit", "stored"), metric!("pending", pending)],
        );
        Ok(SubmitOutcome::Stored { pending })
    }

    /// Replay every persisted request in arrival order.
    ///
    /// A failing entry is logged and does not stop the batch. What happens to
    /// failed entries afterwards depends on the [`DrainPolicy`].
    pub async fn drain(&self) -> Result<DrainReport, QueueError> {
        let _gate = self.drain_gate.lock().await;

        let batch = {
            let _guard = self.list_lock.lock().await;
            self.load(PENDING_REQUESTS_KEY)?
        };
        if batch.is_empty() {
            return Ok(DrainReport::default());
        }
        info!("replaying {} queued requests", batch.len());

        let mut report = DrainReport::default();
        let mut requeue = Vec::new();
        let mut dead = Vec::new();

        for request in &batch {
            report.attempted += 1;
            let failure = match self.transport.send(&request.url, &request.options).await {
                Ok(response) if response.is_success() => None,
                Ok(response) => {
                    warn!(
                        "replay of {} {} rejected with {}: {}",
                        request.options.method, request.url, response.status, response.body
                    );
                    Some(ReplayFailure::Rejected)
                }
                Err(err) => {
                    warn!(
                        "replay of {} {} failed: {err}",
                        request.options.method, request.url
                    );
                    Some(if err.is_network() {
                        ReplayFailure::Unreachable
                    } else {
                        ReplayFailure::Rejected
                    })
                }
            };

            let Some(failure) = failure else {
                report.succeeded += 1;
                continue;
            };
            report.failed += 1;

            if let DrainPolicy::RetryFailed { max_attempts } = self.policy {
                let retried = request.with_failed_attempt();
                match failure {
                    ReplayFailure::Unreachable if retried.failed_attempts < max_attempts => {
                        requeue.push(retried)
                    }
                    _ => dead.push(retried),
                }
            }
        }

        report.requeued = requeue.len();
        report.dead_lettered = dead.len();
        self.commit(batch.len(), requeue, dead).await?;

        info!(
            "drain finished: {} ok, {} failed, {} requeued, {} dead-lettered",
            report.succeeded, report.failed, report.requeued, report.dead_lettered
        );
        self.diagnostics.record(
            DIAG_SUBSYSTEM,
            None,
            vec![
                metric!("drain_attempted", report.attempted),
                metric!("drain_succeeded", report.succeeded),
                metric!("drain_failed", report.failed),
                metric!("drain_requeued", report.requeued),
            ],
        );
        Ok(report)
    }

    /// Snapshot of the persisted list.
    pub async fn pending(&self) -> Result<Vec<PendingRequest>, QueueError> {
        let _guard = self.list_lock.lock().await;
        Ok(self.load(PENDING_REQUESTS_KEY)?)
    }

    pub async fn pending_len(&self) -> Result<usize, QueueError> {
        Ok(self.pending().await?.len())
    }

    pub async fn dead_letters(&self) -> Result<Vec<PendingRequest>, QueueError> {
        let _guard = self.list_lock.lock().await;
        Ok(self.load(DEAD_LETTER_KEY)?)
    }

    pub async fn clear_dead_letters(&self) -> Result<usize, QueueError> {
        let _guard = self.list_lock.lock().await;
        let count = self.load(DEAD_LETTER_KEY)?.len();
        self.store.remove(DEAD_LETTER_KEY)?;
        Ok(count)
    }

    async fn append(&self, request: PendingRequest) -> Result<usize, StoreError> {
        let _guard = self.list_lock.lock().await;
        let mut pending = self.load(PENDING_REQUESTS_KEY)?;
        pending.push(request);
        self.save(PENDING_REQUESTS_KEY, &pending)?;
        Ok(pending.len())
    }

    /// Drop the replayed prefix, keeping requeued entries first and anything
    /// submitted during the drain after them.
    async fn commit(
        &self,
        replayed: usize,
        requeue: Vec<PendingRequest>,
        dead: Vec<PendingRequest>,
    ) -> Result<(), StoreError> {
        let _guard = self.list_lock.lock().await;

        let current = self.load(PENDING_REQUESTS_KEY)?;
        let arrived_during_drain = current.get(replayed..).unwrap_or_default();

        let mut remaining = requeue;
        remaining.extend_from_slice(arrived_during_drain);
        self.save(PENDING_REQUESTS_KEY, &remaining)?;

        if !dead.is_empty() {
            let mut letters = self.load(DEAD_LETTER_KEY)?;
            letters.extend(dead);
            self.save(DEAD_LETTER_KEY, &letters)?;
        }
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<PendingRequest>, StoreError> {
        self.store
            .get_json::<Vec<PendingRequest>>(key)
            .map(Option::unwrap_or_default)
            .inspect_err(|err| error!("failed to load {key}: {err}"))
    }

    fn save(&self, key: &str, requests: &[PendingRequest]) -> Result<(), StoreError> {
        let result = if requests.is_empty() {
            self.store.remove(key)
        } else {
            self.store.set_json(key, requests)
        };
        result.inspect_err(|err| error!("failed to persist {key}: {err}"))
    }
}

impl std::fmt::Debug for OfflineRequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineRequestQueue")
            .field("policy", &self.policy)
            .field("online", &self.is_online())
            .finish()
    }
}
