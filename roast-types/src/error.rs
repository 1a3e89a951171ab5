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

//! Errors raised when parsing textual forms of the shared types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Temperature unit other than Fahrenheit or Celsius.
    #[error("unknown temperature unit: {0}")]
    UnknownUnit(String),

    /// HTTP method the queue does not know how to replay.
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),
}
