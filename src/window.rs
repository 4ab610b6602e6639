/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Event-time timestamp, in milliseconds.
pub type Timestamp = i64;

/// A contiguous event-time interval that groups records for aggregation.
///
/// Equality and hashing are by bounds alone, per the data model: two windows
/// with the same `start`/`end` are the same window even if constructed
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Window {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Window { start, end }
    }

    /// The distinguished singleton window used by the default windowing
    /// strategy. Represented as the widest possible interval rather than a
    /// separate type, since equality is bounds-based anyway.
    pub fn global() -> Self {
        Window {
            start: Timestamp::MIN,
            end: Timestamp::MAX,
        }
    }

    pub fn is_global(&self) -> bool {
        *self == Window::global()
    }

    /// Whether `other` overlaps this window (half-open `[start, end)`).
    pub fn intersects(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The smallest window covering both `self` and `other`.
    pub fn span(&self, other: &Window) -> Window {
        Window {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A payload plus its event-time timestamp and the windows it currently
/// occupies. Produced upstream by a `WindowFn` before entering the driver.
#[derive(Debug, Clone)]
pub struct WindowedValue<V> {
    pub value: V,
    pub timestamp: Timestamp,
    pub windows: Vec<Window>,
}

impl<V> WindowedValue<V> {
    pub fn new(value: V, timestamp: Timestamp, windows: Vec<Window>) -> Self {
        WindowedValue {
            value,
            timestamp,
            windows,
        }
    }

    pub fn in_global_window(value: V, timestamp: Timestamp) -> Self {
        WindowedValue {
            value,
            timestamp,
            windows: vec![Window::global()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_window_is_stable_singleton() {
        assert_eq!(Window::global(), Window::global());
        assert!(Window::global().is_global());
        assert!(!Window::new(0, 10).is_global());
    }

    #[test]
    fn equality_is_bounds_only() {
        assert_eq!(Window::new(0, 10), Window::new(0, 10));
        assert_ne!(Window::new(0, 10), Window::new(0, 11));
    }

    #[test]
    fn span_covers_both() {
        let a = Window::new(0, 10);
        let b = Window::new(5, 15);
        assert_eq!(a.span(&b), Window::new(0, 15));
    }

    #[test]
    fn intersects_half_open() {
        assert!(Window::new(0, 10).intersects(&Window::new(5, 15)));
        assert!(!Window::new(0, 10).intersects(&Window::new(10, 20)));
    }
}
