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

//! Shared data model for the roast telemetry pipeline.
//!
//! This crate defines the records exchanged between the instrumentation
//! source, the series processor, the lazy detail loader and the offline
//! request queue. It is intentionally free of I/O and async runtimes.

pub mod error;
pub mod events;
pub mod requests;
pub mod series;

pub use error::ParseError;
pub use events::{parse_events, EventKind, RawEvent};
pub use requests::{HttpMethod, PendingRequest, RequestOptions};
pub use series::{DerivedPoint, TemperatureUnit};
