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

use roast_types::DerivedPoint;
use serde::Serialize;

/// One-line overview of a derived series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub points: usize,
    /// Grid points that resolved to a reading.
    pub populated: usize,
    pub peak_temperature: Option<f64>,
    /// Time of the last populated grid point, in minutes.
    pub duration_min: Option<f64>,
    pub peak_rate: Option<f64>,
    /// Mean rate over grid steps where both ends have a reading.
    pub mean_rate: Option<f64>,
}

impl SeriesSummary {
    pub fn from_points(points: &[DerivedPoint]) -> Self {
        let populated: Vec<&DerivedPoint> =
            points.iter().filter(|p| p.temperature.is_some()).collect();

        let peak_temperature = populated
            .iter()
            .filter_map(|p| p.temperature)
            .reduce(f64::max);

        let rates: Vec<f64> = points
            .windows(2)
            .filter(|w| w[0].temperature.is_some() && w[1].temperature.is_some())
            .map(|w| w[1].rate_of_change)
            .collect();

        let mean_rate = if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        };

        Self {
            points: points.len(),
            populated: populated.len(),
            peak_temperature,
            duration_min: populated.last().map(|p| p.time_min),
            peak_rate: rates.iter().copied().reduce(f64::max),
            mean_rate,
        }
    }

    pub fn missing(&self) -> usize {
        self.points - self.populated
    }
}
