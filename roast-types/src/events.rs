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

//! Raw instrumentation events recorded during a roast.
//!
//! Events come from an external source whose payloads are loosely shaped.
//! [`parse_events`] is the boundary: anything that survives it is a typed
//! [`RawEvent`], and anything malformed is either dropped or degraded to a
//! missing temperature. Parsing never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag of a raw event. Only `SET` events carry temperature samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Set,
    #[serde(other)]
    Other,
}

/// A single instrumentation sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    /// Seconds since the start of the roast.
    pub t_offset_sec: f64,
    /// Bean temperature in degrees Fahrenheit, when the event carries one.
    #[serde(default)]
    pub temp_f: Option<f64>,
}

impl RawEvent {
    pub fn new(kind: EventKind, t_offset_sec: f64, temp_f: Option<f64>) -> Self {
        Self {
            kind,
            t_offset_sec,
            temp_f,
        }
    }

    /// A `SET` event carrying a temperature reading.
    pub fn set(t_offset_sec: f64, temp_f: f64) -> Self {
        Self::new(EventKind::Set, t_offset_sec, Some(temp_f))
    }

    /// A non-temperature event (fan change, first crack marker, ...).
    pub fn other(t_offset_sec: f64) -> Self {
        Self::new(EventKind::Other, t_offset_sec, None)
    }

    /// Returns the Fahrenheit reading if this event is a usable temperature
    /// sample: a `SET` event with a finite, non-zero temperature taken at a
    /// finite, non-negative offset.
    pub fn temperature_sample(&self) -> Option<f64> {
        if self.kind != EventKind::Set {
            return None;
        }
        if !self.t_offset_sec.is_finite() || self.t_offset_sec < 0.0 {
            return None;
        }
        self.temp_f.filter(|t| t.is_finite() && *t != 0.0)
    }

    pub fn is_valid_sample(&self) -> bool {
        self.temperature_sample().is_some()
    }
}

/// Parse a JSON array of loosely shaped event objects.
///
/// Accepted field aliases: `kind`/`type`, `t_offset_sec`/`time`,
/// `temp_f`/`temp`. Numbers may be encoded as strings. Events without a
/// usable time offset are dropped; unreadable temperatures become `None`.
/// Anything other than an array yields an empty list.
pub fn parse_events(value: &Value) -> Vec<RawEvent> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_event).collect(),
        _ => Vec::new(),
    }
}

fn parse_event(value: &Value) -> Option<RawEvent> {
    let object = value.as_object()?;

    let kind = match field(object, &["kind", "type"]).and_then(Value::as_str) {
        Some(tag) if tag.trim().eq_ignore_ascii_case("set") => EventKind::Set,
        _ => EventKind::Other,
    };

    let t_offset_sec = field(object, &["t_offset_sec", "time"])
        .and_then(number)
        .filter(|t| *t >= 0.0)?;

    let temp_f = field(object, &["temp_f", "temp"]).and_then(number);

    Some(RawEvent::new(kind, t_offset_sec, temp_f))
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}
