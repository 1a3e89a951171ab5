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

//! Intersection geometry for hosts without a browser intersection observer.
//!
//! The viewport is grown by `root_margin_px` on every side so items start
//! loading shortly before they scroll into view. An item counts as
//! intersecting once the visible share of its area reaches `threshold`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverOptions {
    /// Early-trigger margin added around the viewport, in pixels.
    pub root_margin_px: f64,
    /// Minimum visible fraction of the element, `0.0..=1.0`.
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin_px: 200.0,
            threshold: 0.1,
        }
    }
}

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    fn right(&self) -> f64 {
        self.x + self.width
    }

    fn bottom(&self) -> f64 {
        self.y + self.height
    }

    fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Grow by `margin` on every side. Negative margins shrink.
    fn expand(&self, margin: f64) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Overlap with `other`, `None` when they are disjoint.
    fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Share of `element` inside the margin-expanded `viewport`.
///
/// A zero-area element counts as fully visible when it touches the viewport.
pub fn visible_fraction(element: &Rect, viewport: &Rect, options: &ObserverOptions) -> f64 {
    let root = viewport.expand(options.root_margin_px);
    let Some(overlap) = element.intersection(&root) else {
        return 0.0;
    };
    let area = element.area();
    if area <= 0.0 {
        return 1.0;
    }
    (overlap.area() / area).clamp(0.0, 1.0)
}

/// The boolean the loader consumes.
pub fn is_intersecting(element: &Rect, viewport: &Rect, options: &ObserverOptions) -> bool {
    let root = viewport.expand(options.root_margin_px);
    if element.intersection(&root).is_none() {
        return false;
    }
    let fraction = visible_fraction(element, viewport, options);
    if options.threshold <= 0.0 {
        return true;
    }
    fraction >= options.threshold.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 400.0,
        height: 800.0,
    };

    fn no_margin(threshold: f64) -> ObserverOptions {
        ObserverOptions {
            root_margin_px: 0.0,
            threshold,
        }
    }

    #[test]
    fn test_fully_inside_is_fully_visible() {
        let card = Rect::new(10.0, 10.0, 100.0, 100.0);
        assert_eq!(visible_fraction(&card, &VIEWPORT, &no_margin(0.5)), 1.0);
        assert!(is_intersecting(&card, &VIEWPORT, &no_margin(1.0)));
    }

    #[test]
    fn test_threshold_on_partial_overlap() {
        // A quarter of the card pokes into the viewport from below.
        let card = Rect::new(0.0, 775.0, 100.0, 100.0);
        let fraction = visible_fraction(&card, &VIEWPORT, &no_margin(0.0));
        assert!((fraction - 0.25).abs() < 1e-9);
        assert!(is_intersecting(&card, &VIEWPORT, &no_margin(0.2)));
        assert!(!is_intersecting(&card, &VIEWPORT, &no_margin(0.3)));
    }

    #[test]
    fn test_margin_triggers_early() {
        let below = Rect::new(0.0, 900.0, 100.0, 100.0);
        assert!(!is_intersecting(&below, &VIEWPORT, &no_margin(0.0)));

        let options = ObserverOptions {
            root_margin_px: 200.0,
            threshold: 0.1,
        };
        assert!(is_intersecting(&below, &VIEWPORT, &options));
    }

    #[test]
    fn test_disjoint_and_degenerate() {
        let far = Rect::new(0.0, 5000.0, 100.0, 100.0);
        assert_eq!(visible_fraction(&far, &VIEWPORT, &ObserverOptions::default()), 0.0);

        let line = Rect::new(10.0, 10.0, 0.0, 0.0);
        assert!(is_intersecting(&line, &VIEWPORT, &no_margin(1.0)));
    }
}
