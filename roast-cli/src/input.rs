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

//! Reading roast logs from disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use roast_types::{parse_events, RawEvent};
use serde_json::Value;

/// Load `path` as named series of raw events.
///
/// Accepts an object of `name -> [events]`, or a bare `[events]` which is
/// named after the file stem.
pub fn load_series(path: &Path) -> anyhow::Result<BTreeMap<String, Vec<RawEvent>>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let fallback = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("series");
    series_from_value(&value, fallback)
}

pub fn series_from_value(
    value: &Value,
    fallback_name: &str,
) -> anyhow::Result<BTreeMap<String, Vec<RawEvent>>> {
    match value {
        Value::Array(_) => Ok(BTreeMap::from([(
            fallback_name.to_string(),
            parse_events(value),
        )])),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(name, events)| (name.clone(), parse_events(events)))
            .collect()),
        other => bail!("expected an object of series or an array of events, got {other}"),
    }
}
