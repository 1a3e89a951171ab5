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

//! Lightweight diagnostics event bus for the roast telemetry pipeline.
//!
//! There is no process-wide bus. A host creates one [`DiagnosticsContext`],
//! hands clones of the `Arc` to the components that report metrics, and calls
//! [`DiagnosticsContext::shutdown`] when it tears them down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

// === Diagnostic data structures ===

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagEvent {
    /// Sub-system that produced this event (e.g. "offline_queue", "loader").
    pub subsystem: &'static str,
    /// Optional identifier of the item or request the metrics refer to.
    pub stream_id: Option<String>,
    /// Unix time in milliseconds when the metric was captured.
    pub ts_ms: u64,
    /// Arbitrary key/value metrics.
    pub metrics: Vec<Metric>,
}

impl DiagEvent {
    pub fn new(subsystem: &'static str, stream_id: Option<String>, metrics: Vec<Metric>) -> Self {
        Self {
            subsystem,
            stream_id,
            ts_ms: now_ms(),
            metrics,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.value)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Metric {
    pub name: &'static str,
    pub value: MetricValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum MetricValue {
    I64(i64),
    U64(u64),
    F64(f64),
    Text(String),
}

// === Context-owned bus ===

/// Events a context holds before it starts evicting the oldest.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Owner of one diagnostics stream.
///
/// Receivers returned by [`subscribe`](Self::subscribe) share a single queue:
/// each event is delivered to exactly one of them. The queue is bounded; when
/// nobody keeps up, the oldest events are dropped.
#[derive(Debug)]
pub struct DiagnosticsContext {
    sender: Sender<DiagEvent>,
    receiver: Receiver<DiagEvent>,
    active: AtomicBool,
    dropped: AtomicU64,
}

impl DiagnosticsContext {
    /// Create an active context holding up to [`DEFAULT_CAPACITY`] events.
    pub fn create() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = flume::bounded(capacity.max(1));
        Arc::new(Self {
            sender,
            receiver,
            active: AtomicBool::new(cfg!(feature = "diagnostics")),
            dropped: AtomicU64::new(0),
        })
    }

    /// A context that drops everything it is given.
    pub fn disabled() -> Arc<Self> {
        let context = Self::with_capacity(1);
        context.active.store(false, Ordering::Release);
        context
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Publish an event. Silently ignored once the context is shut down.
    pub fn emit(&self, mut event: DiagEvent) {
        if !self.is_active() {
            return;
        }
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if self.receiver.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    event = rejected;
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::debug!("diagnostics bus closed, dropping event");
                    return;
                }
            }
        }
    }

    /// Events evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shorthand for `emit(DiagEvent::new(..))`.
    pub fn record(&self, subsystem: &'static str, stream_id: Option<String>, metrics: Vec<Metric>) {
        if self.is_active() {
            self.emit(DiagEvent::new(subsystem, stream_id, metrics));
        }
    }

    /// Subscribe to the diagnostics stream.
    pub fn subscribe(&self) -> Receiver<DiagEvent> {
        self.receiver.clone()
    }

    /// Stop accepting events and return whatever nobody consumed yet.
    pub fn shutdown(&self) -> Vec<DiagEvent> {
        self.active.store(false, Ordering::Release);
        self.receiver.drain().collect()
    }
}

// === Helper utilities ===

/// Current wall-clock time in milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// === metric! helper macro ===

/// Shorthand for constructing a [`Metric`].
#[macro_export]
macro_rules! metric {
    ($name:expr, $value:expr) => {
        $crate::Metric {
            name: $name,
            value: $crate::MetricValue::from($value),
        }
    };
}

// Implement `From` conversions so `metric!("pending", 3u64)` works for common types.
impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::I64(v)
    }
}
impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::U64(v)
    }
}
impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::U64(v as u64)
    }
}
impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::F64(v)
    }
}
impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}
impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}
