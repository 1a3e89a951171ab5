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

//! Connectivity probe and change signal.
//!
//! The host (platform network callbacks, a health check, a test) feeds the
//! [`ConnectivityMonitor`] with the current reachability. Components poll it
//! synchronously through [`ConnectivityProbe`], and the sync service listens
//! for [`ConnectivityEvent::Online`] to replay queued writes.
//!
//! # Example
//!
//! ```ignore
//! let monitor = ConnectivityMonitor::new(false);
//! let mut rx = monitor.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         if event == ConnectivityEvent::Online {
//!             // replay queued writes
//!         }
//!     }
//! });
//!
//! monitor.set_connected(true);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};
use log::{debug, info};

/// Capacity of the connectivity channel. Only transitions are sent, so a
/// subscriber lagging this far behind only needs the latest state.
const CONNECTIVITY_CHANNEL_CAPACITY: usize = 16;

/// Answers "can we reach the network right now?".
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

impl<F> ConnectivityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_connected(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Last known reachability plus a broadcast of its transitions.
pub struct ConnectivityMonitor {
    connected: AtomicBool,
    sender: Sender<ConnectivityEvent>,
    // Keeps the channel open while nobody is subscribed.
    _keepalive: InactiveReceiver<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(initially_connected: bool) -> Self {
        let (mut sender, receiver) = broadcast(CONNECTIVITY_CHANNEL_CAPACITY);
        sender.set_overflow(true);
        Self {
            connected: AtomicBool::new(initially_connected),
            sender,
            _keepalive: receiver.deactivate(),
        }
    }

    /// Record the current reachability. Subscribers are notified only when
    /// the value changes. Returns whether it changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        let previous = self.connected.swap(connected, Ordering::AcqRel);
        if previous == connected {
            return false;
        }

        let event = if connected {
            info!("connectivity restored");
            ConnectivityEvent::Online
        } else {
            info!("connectivity lost");
            ConnectivityEvent::Offline
        };

        if let Err(err) = self.sender.try_broadcast(event) {
            debug!("no active connectivity subscribers: {err:?}");
        }
        true
    }

    /// Receive all future transitions.
    pub fn subscribe(&self) -> Receiver<ConnectivityEvent> {
        self.sender.new_receiver()
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("connected", &self.is_connected())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl ConnectivityProbe for ConnectivityMonitor {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
