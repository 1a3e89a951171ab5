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

use std::fmt;

/// Detail-loading state of one tracked item.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<D> {
    /// Tracked, never requested (or re-armed by a reset)
    Unloaded,

    /// A fetch is in flight
    Loading,

    /// The fetch succeeded
    Loaded(D),

    /// The fetch failed or timed out. Stays here until reset.
    Error(String),
}

/// [`LoadState`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadStatus {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Error,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStatus::Unloaded => "unloaded",
            LoadStatus::Loading => "loading",
            LoadStatus::Loaded => "loaded",
            LoadStatus::Error => "error",
        };
        f.write_str(name)
    }
}

impl<D> fmt::Display for LoadState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Error(message) => write!(f, "error: {message}"),
            other => write!(f, "{}", other.status()),
        }
    }
}

impl<D> Default for LoadState<D> {
    fn default() -> Self {
        LoadState::Unloaded
    }
}

impl<D> LoadState<D> {
    pub fn status(&self) -> LoadStatus {
        match self {
            LoadState::Unloaded => LoadStatus::Unloaded,
            LoadState::Loading => LoadStatus::Loading,
            LoadState::Loaded(_) => LoadStatus::Loaded,
            LoadState::Error(_) => LoadStatus::Error,
        }
    }

    pub fn detail(&self) -> Option<&D> {
        match self {
            LoadState::Loaded(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }

    /// The item became visible. Returns the next state and whether a fetch
    /// must be started. Only `Unloaded` moves.
    pub fn on_visible(self) -> (Self, bool) {
        match self {
            LoadState::Unloaded => (LoadState::Loading, true),
            other => (other, false),
        }
    }

    /// The in-flight fetch produced `detail`. Ignored unless `Loading`.
    pub fn on_resolved(self, detail: D) -> Self {
        match self {
            LoadState::Loading => LoadState::Loaded(detail),
            other => other,
        }
    }

    /// The in-flight fetch failed. Ignored unless `Loading`.
    pub fn on_rejected(self, message: impl Into<String>) -> Self {
        match self {
            LoadState::Loading => LoadState::Error(message.into()),
            other => other,
        }
    }

    /// Re-arm for another fetch on the next visibility.
    pub fn on_reset(self) -> Self {
        LoadState::Unloaded
    }
}
