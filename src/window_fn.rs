/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::window::{Timestamp, Window};

/// Collects `(sources, dest)` merge decisions reported by a `WindowFn` during
/// `merge`. The driver supplies the concrete collector; a `WindowFn` never
/// sees the state backend directly — `merge` is its sole side-effect channel.
pub trait MergeContext {
    fn merge(&mut self, sources: Vec<Window>, dest: Window);
}

/// A plain collecting `MergeContext`, used by the driver to gather a
/// `WindowFn`'s merge decisions before applying them to state.
#[derive(Debug, Default)]
pub struct MergeCollector {
    pub decisions: Vec<(Vec<Window>, Window)>,
}

impl MergeContext for MergeCollector {
    fn merge(&mut self, sources: Vec<Window>, dest: Window) {
        self.decisions.push((sources, dest));
    }
}

/// Assigns values to windows and, for mergeable strategies, folds
/// overlapping windows into a single covering window.
pub trait WindowFn<V>: Send + Sync {
    fn assign(&self, value: &V, timestamp: Timestamp) -> Vec<Window>;

    fn is_merging(&self) -> bool {
        false
    }

    /// Whether this is the single distinguished default/global windowing
    /// (every value lands in `Window::global()`), as opposed to merely being
    /// non-mergeable. Only `GlobalWindowFn` answers `true` — a non-mergeable
    /// `FixedWindows` or `Sessions` still assigns values to distinct windows
    /// and must never be routed through the default-global-batch fast path.
    fn is_default_window(&self) -> bool {
        false
    }

    /// Given the full universe of currently-known windows, report merge
    /// decisions through `ctx`. The default implementation reports no merges
    /// and is correct for any non-mergeable `WindowFn`.
    fn merge(&self, _all_windows: &[Window], _ctx: &mut dyn MergeContext) {}
}

/// The default windowing strategy: every value lands in the single global
/// window. Never mergeable — there is nothing to merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalWindowFn;

impl<V> WindowFn<V> for GlobalWindowFn {
    fn assign(&self, _value: &V, _timestamp: Timestamp) -> Vec<Window> {
        vec![Window::global()]
    }

    fn is_default_window(&self) -> bool {
        true
    }
}

/// Tumbling windows of fixed size, aligned to the epoch.
#[derive(Debug, Clone, Copy)]
pub struct FixedWindows {
    pub size: Timestamp,
}

impl FixedWindows {
    pub fn new(size: Timestamp) -> Self {
        assert!(size > 0, "FixedWindows size must be positive");
        FixedWindows { size }
    }
}

impl<V> WindowFn<V> for FixedWindows {
    fn assign(&self, _value: &V, timestamp: Timestamp) -> Vec<Window> {
        let start = timestamp.div_euclid(self.size) * self.size;
        vec![Window::new(start, start + self.size)]
    }
}

/// Session windows: each element starts its own `[ts, ts + gap)` window;
/// overlapping windows merge into their span. The only mergeable strategy
/// the original implementation drives its merge tests against.
#[derive(Debug, Clone, Copy)]
pub struct Sessions {
    pub gap: Timestamp,
}

impl Sessions {
    pub fn new(gap: Timestamp) -> Self {
        assert!(gap > 0, "Sessions gap must be positive");
        Sessions { gap }
    }
}

impl<V> WindowFn<V> for Sessions {
    fn assign(&self, _value: &V, timestamp: Timestamp) -> Vec<Window> {
        vec![Window::new(timestamp, timestamp + self.gap)]
    }

    fn is_merging(&self) -> bool {
        true
    }

    fn merge(&self, all_windows: &[Window], ctx: &mut dyn MergeContext) {
        let mut sorted: Vec<Window> = all_windows.to_vec();
        sorted.sort_by_key(|w| (w.start, w.end));

        let mut cluster: Vec<Window> = Vec::new();
        let mut span = None::<Window>;

        for w in sorted {
            match span {
                None => {
                    span = Some(w);
                    cluster.push(w);
                }
                Some(s) if s.intersects(&w) || s.end == w.start => {
                    span = Some(s.span(&w));
                    cluster.push(w);
                }
                Some(s) => {
                    flush_cluster(&cluster, s, ctx);
                    cluster.clear();
                    span = Some(w);
                    cluster.push(w);
                }
            }
        }
        if let Some(s) = span {
            flush_cluster(&cluster, s, ctx);
        }
    }
}

fn flush_cluster(cluster: &[Window], dest: Window, ctx: &mut dyn MergeContext) {
    if cluster.len() > 1 || (cluster.len() == 1 && cluster[0] != dest) {
        ctx.merge(cluster.to_vec(), dest);
    }
}
