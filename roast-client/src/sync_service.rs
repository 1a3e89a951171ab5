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

//! Replays the offline queue when connectivity comes back.

use std::sync::Arc;
use std::time::Duration;

use async_broadcast::RecvError;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::offline_queue::OfflineRequestQueue;

pub struct SyncService;

impl SyncService {
    /// Drain `queue` now if online, on every offline to online transition
    /// reported by `monitor`, and every `retry_interval` while online with
    /// requests pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        queue: Arc<OfflineRequestQueue>,
        monitor: &ConnectivityMonitor,
        retry_interval: Option<Duration>,
    ) -> SyncHandle {
        let mut events = monitor.subscribe();

        let listener_queue = Arc::clone(&queue);
        let listener = tokio::spawn(async move {
            if listener_queue.is_online() {
                drain(&listener_queue, "startup").await;
            }
            loop {
                match events.recv().await {
                    Ok(ConnectivityEvent::Online) => drain(&listener_queue, "reconnect").await,
                    Ok(ConnectivityEvent::Offline) => debug!("offline, holding queued requests"),
                    Err(RecvError::Overflowed(missed)) => {
                        warn!("missed {missed} connectivity events");
                        if listener_queue.is_online() {
                            drain(&listener_queue, "reconnect").await;
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("connectivity channel closed, sync listener exiting");
                        break;
                    }
                }
            }
        });

        let retry = retry_interval.map(|period| {
            info!("periodic queue retry every {}ms", period.as_millis());
            tokio::spawn(retry_loop(queue, period))
        });

        SyncHandle {
            listener: Some(listener),
            retry,
        }
    }
}

/// Drains on every tick while online with requests pending. A slow drain
/// delays the next tick instead of overlapping it.
async fn retry_loop(queue: Arc<OfflineRequestQueue>, period: Duration) {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks.tick().await;
    loop {
        ticks.tick().await;
        if !queue.is_online() {
            continue;
        }
        match queue.pending_len().await {
            Ok(0) => {}
            Ok(_) => drain(&queue, "retry").await,
            Err(err) => error!("periodic retry could not read queue: {err}"),
        }
    }
}

async fn drain(queue: &OfflineRequestQueue, reason: &str) {
    match queue.drain().await {
        Ok(report) if report.attempted > 0 => {
            info!(
                "{reason} drain: {}/{} replayed",
                report.succeeded, report.attempted
            );
        }
        Ok(_) => debug!("{reason} drain: nothing queued"),
        Err(err) => error!("{reason} drain failed: {err}"),
    }
}

/// Stops the sync service when shut down or dropped.
#[derive(Debug)]
pub struct SyncHandle {
    listener: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn is_running(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
