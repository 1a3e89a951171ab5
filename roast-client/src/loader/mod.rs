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

//! Viewport-triggered lazy loading of per-item detail.

mod state;
mod viewport_loader;
mod visibility;

pub use state::{LoadState, LoadStatus};
pub use viewport_loader::{
    DetailFetcher, ItemView, LoaderEvent, LoaderOptions, TriggerOutcome, ViewportLoader,
    DEFAULT_FETCH_TIMEOUT,
};
pub use visibility::{is_intersecting, visible_fraction, ObserverOptions, Rect};
