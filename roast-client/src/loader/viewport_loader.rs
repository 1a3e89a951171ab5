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

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use roast_diagnostics::{metric, DiagnosticsContext};
use tokio::task::JoinHandle;

use super::state::{LoadState, LoadStatus};
use super::visibility::{is_intersecting, ObserverOptions, Rect};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const EVENT_CHANNEL_CAPACITY: usize = 64;
const DIAG_SUBSYSTEM: &str = "viewport_loader";

/// Loads the detail payload for one item id.
pub trait DetailFetcher<D>: Send + Sync {
    fn fetch(&self, id: &str) -> BoxFuture<'static, Result<D, String>>;
}

impl<D, F, Fut> DetailFetcher<D> for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<D, String>> + Send + 'static,
{
    fn fetch(&self, id: &str) -> BoxFuture<'static, Result<D, String>> {
        self(id.to_string()).boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoaderOptions {
    pub fetch_timeout: Duration,
    pub observer: ObserverOptions,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            observer: ObserverOptions::default(),
        }
    }
}

/// What a visibility report led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The item was reported as not intersecting.
    NotVisible,
    /// Nothing to do, the item was already in this state.
    Skipped(LoadStatus),
    /// A fetch ran and succeeded.
    Loaded,
    /// A fetch ran and failed or timed out.
    Failed(String),
    /// A fetch ran but the item was reset or forgotten meanwhile.
    Superseded,
}

/// Per-item snapshot for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView<D> {
    pub state: LoadStatus,
    pub detail: Option<D>,
    pub error: Option<String>,
}

impl<D> Default for ItemView<D> {
    fn default() -> Self {
        Self {
            state: LoadStatus::Unloaded,
            detail: None,
            error: None,
        }
    }
}

/// Broadcast on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderEvent {
    pub id: String,
    pub status: LoadStatus,
}

struct Entry<D> {
    state: LoadState<D>,
    // Generation of the fetch in flight, 0 when none.
    generation: u64,
}

impl<D> Default for Entry<D> {
    fn default() -> Self {
        Self {
            state: LoadState::Unloaded,
            generation: 0,
        }
    }
}

/// Fetches item detail once per id, the first time the item becomes visible.
///
/// Duplicate triggers while a fetch is in flight collapse into that fetch.
/// Failures are kept until [`reset`](Self::reset); they are never retried
/// automatically. Dropping an [`on_visibility`](Self::on_visibility) future
/// mid-fetch abandons that fetch and leaves the item `Unloaded`.
pub struct ViewportLoader<D> {
    fetcher: Arc<dyn DetailFetcher<D>>,
    options: LoaderOptions,
    entries: Mutex<HashMap<String, Entry<D>>>,
    next_generation: AtomicU64,
    events: Sender<LoaderEvent>,
    _events_keepalive: InactiveReceiver<LoaderEvent>,
    diagnostics: Arc<DiagnosticsContext>,
}

impl<D> ViewportLoader<D>
where
    D: Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: impl DetailFetcher<D> + 'static, options: LoaderOptions) -> Self {
        Self::from_arc(Arc::new(fetcher), options)
    }

    pub fn from_arc(fetcher: Arc<dyn DetailFetcher<D>>, options: LoaderOptions) -> Self {
        let (mut events, receiver) = broadcast(EVENT_CHANNEL_CAPACITY);
        events.set_overflow(true);
        Self {
            fetcher,
            options,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            events,
            _events_keepalive: receiver.deactivate(),
            diagnostics: DiagnosticsContext::disabled(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticsContext>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Start tracking `id` as `Unloaded`. No-op if already tracked.
    pub fn track(&self, id: &str) {
        self.entries().entry(id.to_string()).or_default();
    }

    /// Report whether `id` currently intersects the viewport. Starts and
    /// awaits the fetch when this is the first visibility of an unloaded
    /// item; tracks `id` if needed.
    pub async fn on_visibility(&self, id: &str, intersecting: bool) -> TriggerOutcome {
        if !intersecting {
            return TriggerOutcome::NotVisible;
        }

        let generation = {
            let mut entries = self.entries();
            let entry = entries.entry(id.to_string()).or_default();
            let (next, should_fetch) = std::mem::take(&mut entry.state).on_visible();
            entry.state = next;
            if !should_fetch {
                return TriggerOutcome::Skipped(entry.state.status());
            }
            entry.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            entry.generation
        };
        self.publish(id, LoadStatus::Loading);
        debug!("fetching detail for {id}");

        let mut in_flight = InFlight {
            entries: &self.entries,
            events: &self.events,
            id,
            generation,
            settled: false,
        };
        let started = Instant::now();
        let result = match tokio::time::timeout(self.options.fetch_timeout, self.fetcher.fetch(id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(format!(
                "fetch timed out after {}ms",
                self.options.fetch_timeout.as_millis()
            )),
        };
        in_flight.settled = true;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = {
            let mut entries = self.entries();
            match entries.get_mut(id) {
                Some(entry) if entry.generation == generation => {
                    entry.generation = 0;
                    let current = std::mem::take(&mut entry.state);
                    match result {
                        Ok(detail) => {
                            entry.state = current.on_resolved(detail);
                            TriggerOutcome::Loaded
                        }
                        Err(message) => {
                            entry.state = current.on_rejected(message.clone());
                            TriggerOutcome::Failed(message)
                        }
                    }
                }
                _ => TriggerOutcome::Superseded,
            }
        };

        match &outcome {
            TriggerOutcome::Loaded => {
                debug!("detail for {id} loaded in {elapsed_ms}ms");
                self.publish(id, LoadStatus::Loaded);
            }
            TriggerOutcome::Failed(message) => {
                warn!("detail for {id} failed: {message}");
                self.publish(id, LoadStatus::Error);
            }
            _ => debug!("discarding stale detail result for {id}"),
        }
        self.diagnostics.record(
            DIAG_SUBSYSTEM,
            Some(id.to_string()),
            vec![
                metric!("fetch_ms", elapsed_ms),
                metric!("ok", matches!(outcome, TriggerOutcome::Loaded) as u64),
            ],
        );
        outcome
    }

    /// Like [`on_visibility`](Self::on_visibility), computing the signal from
    /// element and viewport geometry with the configured observer options.
    pub async fn on_geometry(&self, id: &str, element: Rect, viewport: Rect) -> TriggerOutcome {
        let visible = is_intersecting(&element, &viewport, &self.options.observer);
        self.on_visibility(id, visible).await
    }

    /// Fire-and-forget variant of [`on_visibility`](Self::on_visibility) for
    /// hosts that report visibility from synchronous callbacks.
    pub fn notify_visibility(
        self: &Arc<Self>,
        id: &str,
        intersecting: bool,
    ) -> JoinHandle<TriggerOutcome> {
        let loader = Arc::clone(self);
        let id = id.to_string();
        tokio::spawn(async move { loader.on_visibility(&id, intersecting).await })
    }

    pub fn state(&self, id: &str) -> Option<LoadState<D>> {
        self.entries().get(id).map(|entry| entry.state.clone())
    }

    /// Render snapshot. Untracked ids read as `Unloaded`.
    pub fn view(&self, id: &str) -> ItemView<D> {
        let entries = self.entries();
        let Some(entry) = entries.get(id) else {
            return ItemView::default();
        };
        ItemView {
            state: entry.state.status(),
            detail: entry.state.detail().cloned(),
            error: entry.state.error().map(str::to_string),
        }
    }

    /// Re-arm `id` so the next visibility fetches again. A fetch still in
    /// flight for it will have its result discarded.
    pub fn reset(&self, id: &str) {
        let changed = {
            let mut entries = self.entries();
            match entries.get_mut(id) {
                Some(entry) => {
                    entry.state = std::mem::take(&mut entry.state).on_reset();
                    entry.generation = 0;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.publish(id, LoadStatus::Unloaded);
        }
    }

    /// Stop tracking `id` and drop its cached detail.
    pub fn forget(&self, id: &str) -> Option<LoadState<D>> {
        self.entries().remove(id).map(|entry| entry.state)
    }

    pub fn tracked_count(&self) -> usize {
        self.entries().len()
    }

    pub fn loaded_count(&self) -> usize {
        self.entries()
            .values()
            .filter(|entry| entry.state.status() == LoadStatus::Loaded)
            .count()
    }

    pub fn subscribe(&self) -> Receiver<LoaderEvent> {
        self.events.new_receiver()
    }

    fn publish(&self, id: &str, status: LoadStatus) {
        publish(&self.events, id, status);
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry<D>>> {
        lock(&self.entries)
    }
}

fn publish(events: &Sender<LoaderEvent>, id: &str, status: LoadStatus) {
    let event = LoaderEvent {
        id: id.to_string(),
        status,
    };
    if let Err(err) = events.try_broadcast(event) {
        debug!("loader event not delivered: {err:?}");
    }
}

fn lock<D>(entries: &Mutex<HashMap<String, Entry<D>>>) -> MutexGuard<'_, HashMap<String, Entry<D>>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Puts an item back to `Unloaded` when the future awaiting its fetch is
/// dropped before the fetch settles, so the next visibility retries.
struct InFlight<'a, D> {
    entries: &'a Mutex<HashMap<String, Entry<D>>>,
    events: &'a Sender<LoaderEvent>,
    id: &'a str,
    generation: u64,
    settled: bool,
}

impl<D> Drop for InFlight<'_, D> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let rearmed = match lock(self.entries).get_mut(self.id) {
            Some(entry) if entry.generation == self.generation => {
                entry.generation = 0;
                entry.state = std::mem::take(&mut entry.state).on_reset();
                true
            }
            _ => false,
        };
        if rearmed {
            debug!("fetch for {} cancelled, back to unloaded", self.id);
            publish(self.events, self.id, LoadStatus::Unloaded);
        }
    }
}

impl<D> std::fmt::Debug for ViewportLoader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportLoader")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
