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

//! Chart-ready series types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Unit in which derived temperatures and rates are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    /// Convert a Fahrenheit reading into this unit.
    pub fn from_fahrenheit(self, temp_f: f64) -> f64 {
        match self {
            TemperatureUnit::Fahrenheit => temp_f,
            TemperatureUnit::Celsius => (temp_f - 32.0) * 5.0 / 9.0,
        }
    }

    /// Plausible rate-of-change range in degrees per minute.
    ///
    /// Anything outside is sensor noise and gets clamped.
    pub fn rate_bounds(self) -> (f64, f64) {
        match self {
            TemperatureUnit::Fahrenheit => (-20.0, 80.0),
            TemperatureUnit::Celsius => (-11.0, 44.0),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Celsius => "°C",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            other => Err(ParseError::UnknownUnit(other.to_string())),
        }
    }
}

/// One point of a resampled series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedPoint {
    /// Grid time in minutes since the start of the roast.
    pub time_min: f64,
    /// Temperature in the requested unit, `None` when no sample was close
    /// enough to the grid point.
    pub temperature: Option<f64>,
    /// Degrees per minute in the requested unit.
    pub rate_of_change: f64,
}
