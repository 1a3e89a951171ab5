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

//! Turns raw roast events into chart-ready series.
//!
//! Every compared series is resampled onto one shared grid running from 0 to
//! the latest valid sample of any series. A grid point takes the reading of
//! the nearest valid sample when one lies within the tolerance, and is empty
//! otherwise; there is no interpolation across sensor gaps. Each point also
//! carries the rate of rise since the previous grid point.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use roast_series::TimeSeriesProcessor;
//! use roast_types::{RawEvent, TemperatureUnit};
//!
//! let mut series = BTreeMap::new();
//! series.insert("bean".to_string(), vec![RawEvent::set(0.0, 200.0), RawEvent::set(60.0, 230.0)]);
//!
//! let derived = TimeSeriesProcessor::default().process(&series, TemperatureUnit::Fahrenheit);
//! assert_eq!(derived["bean"].len(), 3);
//! ```

mod summary;

pub use summary::SeriesSummary;

use std::collections::BTreeMap;

use log::{debug, warn};
use roast_types::{DerivedPoint, RawEvent, TemperatureUnit};

/// Grid spacing in minutes.
pub const DEFAULT_STEP_MINUTES: f64 = 0.5;

/// Maximum distance in seconds between a grid point and the sample it takes.
pub const DEFAULT_TOLERANCE_SEC: f64 = 30.0;

/// Samples later than this are treated as malformed.
pub const MAX_HORIZON_MINUTES: f64 = 24.0 * 60.0;

/// Upper bound on the number of points one grid may hold.
pub const MAX_GRID_POINTS: usize = 1 << 16;

// Absorbs float error when the horizon is an exact multiple of the step.
const GRID_EPSILON: f64 = 1e-9;

/// A valid temperature reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time_sec: f64,
    pub temp_f: f64,
}

/// Keep only usable temperature samples, ordered by time.
///
/// Samples sharing a timestamp keep their recorded order. Samples beyond
/// [`MAX_HORIZON_MINUTES`] are dropped.
pub fn valid_samples(events: &[RawEvent]) -> Vec<Sample> {
    let mut samples: Vec<Sample> = events
        .iter()
        .filter(|e| e.t_offset_sec <= MAX_HORIZON_MINUTES * 60.0)
        .filter_map(|e| {
            e.temperature_sample().map(|temp_f| Sample {
                time_sec: e.t_offset_sec,
                temp_f,
            })
        })
        .collect();
    samples.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec));
    samples
}

/// Latest valid sample time, in minutes, across all series. 0 when no series
/// has a valid sample.
pub fn horizon_minutes<K, V>(series: impl IntoIterator<Item = (K, V)>) -> f64
where
    V: AsRef<[RawEvent]>,
{
    series
        .into_iter()
        .filter_map(|(_, events)| valid_samples(events.as_ref()).last().copied())
        .map(|s| s.time_sec / 60.0)
        .fold(0.0, f64::max)
}

/// Grid `0, 0.5, 1.0, ..` up to and including `max_minutes`.
pub fn time_grid(max_minutes: f64) -> Vec<f64> {
    TimeSeriesProcessor::default().grid(max_minutes)
}

/// Resampler configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesProcessor {
    step_minutes: f64,
    tolerance_sec: f64,
}

impl Default for TimeSeriesProcessor {
    fn default() -> Self {
        Self {
            step_minutes: DEFAULT_STEP_MINUTES,
            tolerance_sec: DEFAULT_TOLERANCE_SEC,
        }
    }
}

impl TimeSeriesProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the grid spacing. Non-positive or non-finite values are
    /// ignored.
    pub fn with_step_minutes(mut self, step_minutes: f64) -> Self {
        if step_minutes.is_finite() && step_minutes > 0.0 {
            self.step_minutes = step_minutes;
        } else {
            warn!("ignoring invalid grid step {step_minutes} min");
        }
        self
    }

    /// Override the nearest-sample tolerance. Negative or non-finite values
    /// are ignored.
    pub fn with_tolerance_sec(mut self, tolerance_sec: f64) -> Self {
        if tolerance_sec.is_finite() && tolerance_sec >= 0.0 {
            self.tolerance_sec = tolerance_sec;
        } else {
            warn!("ignoring invalid sample tolerance {tolerance_sec} s");
        }
        self
    }

    pub fn step_minutes(&self) -> f64 {
        self.step_minutes
    }

    pub fn tolerance_sec(&self) -> f64 {
        self.tolerance_sec
    }

    /// Resample every named series onto one shared grid.
    ///
    /// Series without valid samples come back empty. When no series has a
    /// valid sample past t=0 the mapping itself is empty.
    pub fn process<K, V>(
        &self,
        series: impl IntoIterator<Item = (K, V)>,
        unit: TemperatureUnit,
    ) -> BTreeMap<String, Vec<DerivedPoint>>
    where
        K: AsRef<str>,
        V: AsRef<[RawEvent]>,
    {
        let prepared: Vec<(String, Vec<Sample>)> = series
            .into_iter()
            .map(|(name, events)| (name.as_ref().to_string(), valid_samples(events.as_ref())))
            .collect();

        let horizon = prepared
            .iter()
            .filter_map(|(_, samples)| samples.last())
            .map(|s| s.time_sec / 60.0)
            .fold(0.0, f64::max);

        if horizon <= 0.0 {
            debug!("no valid samples across {} series", prepared.len());
            return BTreeMap::new();
        }

        let grid = self.grid(horizon);
        debug!(
            "resampling {} series onto {} points ({horizon:.2} min)",
            prepared.len(),
            grid.len()
        );

        prepared
            .into_iter()
            .map(|(name, samples)| {
                let points = if samples.is_empty() {
                    Vec::new()
                } else {
                    self.derive(&samples, &grid, unit)
                };
                (name, points)
            })
            .collect()
    }

    /// Resample a single series onto its own grid.
    pub fn process_one(&self, events: &[RawEvent], unit: TemperatureUnit) -> Vec<DerivedPoint> {
        self.process([("series", events)], unit)
            .remove("series")
            .unwrap_or_default()
    }

    /// Grid points from 0 up to and including `max_minutes`. Empty when the
    /// grid would exceed [`MAX_GRID_POINTS`].
    pub fn grid(&self, max_minutes: f64) -> Vec<f64> {
        if !max_minutes.is_finite() || max_minutes < 0.0 {
            return Vec::new();
        }
        let steps = (max_minutes / self.step_minutes + GRID_EPSILON).floor();
        if steps >= MAX_GRID_POINTS as f64 {
            warn!(
                "refusing a {steps}-step grid over {max_minutes} min (limit {MAX_GRID_POINTS})"
            );
            return Vec::new();
        }
        let steps = steps as usize;
        (0..=steps).map(|i| i as f64 * self.step_minutes).collect()
    }

    fn derive(&self, samples: &[Sample], grid: &[f64], unit: TemperatureUnit) -> Vec<DerivedPoint> {
        let temperatures: Vec<Option<f64>> = grid
            .iter()
            .map(|minute| {
                nearest_within(samples, minute * 60.0, self.tolerance_sec)
                    .map(|temp_f| unit.from_fahrenheit(temp_f))
            })
            .collect();

        let (min_rate, max_rate) = unit.rate_bounds();

        grid.iter()
            .enumerate()
            .map(|(i, &time_min)| {
                let rate_of_change = if i == 0 {
                    0.0
                } else {
                    match (temperatures[i - 1], temperatures[i]) {
                        (Some(prev), Some(curr)) => {
                            let dt = time_min - grid[i - 1];
                            ((curr - prev) / dt).clamp(min_rate, max_rate)
                        }
                        _ => 0.0,
                    }
                };
                DerivedPoint {
                    time_min,
                    temperature: temperatures[i],
                    rate_of_change,
                }
            })
            .collect()
    }
}

/// Reading of the sample closest to `target_sec`, if it lies within
/// `tolerance_sec`. Ties go to the earlier sample. `samples` must be sorted.
fn nearest_within(samples: &[Sample], target_sec: f64, tolerance_sec: f64) -> Option<f64> {
    let idx = samples.partition_point(|s| s.time_sec < target_sec);

    let before = idx.checked_sub(1).and_then(|i| samples.get(i));
    let after = samples.get(idx);

    let best = match (before, after) {
        (Some(b), Some(a)) => {
            if (target_sec - b.time_sec) <= (a.time_sec - target_sec) {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    ((best.time_sec - target_sec).abs() <= tolerance_sec).then_some(best.temp_f)
}
