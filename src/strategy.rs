/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use crate::trigger::Trigger;
use crate::window_fn::WindowFn;

/// Whether a pane holds only elements accumulated since the last firing
/// (`Discarding`), or every element seen so far (`Accumulating`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationMode {
    Discarding,
    Accumulating,
}

/// A `(WindowFn, TriggerFn, AccumulationMode)` triple, assembled once and
/// handed to `TriggerDriver::for_strategy` to produce a runnable driver —
/// mirroring the builder-then-engine split the corpus uses for its own
/// window/query assembly.
pub struct WindowingStrategy<V> {
    pub window_fn: Arc<dyn WindowFn<V>>,
    pub trigger: Trigger,
    pub mode: AccumulationMode,
}

impl<V> WindowingStrategy<V> {
    pub fn new(window_fn: Arc<dyn WindowFn<V>>, trigger: Trigger, mode: AccumulationMode) -> Self {
        WindowingStrategy {
            window_fn,
            trigger,
            mode,
        }
    }

    pub fn is_merging(&self) -> bool {
        self.window_fn.is_merging()
    }

    /// Whether this is the default strategy: global windowing with the
    /// default trigger. The driver factory fast-paths this combination,
    /// when the input is bounded, into a single eager pane per call rather
    /// than running the general state machine. Requires the window function
    /// to be specifically the default/global one — merely non-mergeable
    /// (e.g. `FixedWindows`) is not enough, since `DefaultGlobalBatch`
    /// ignores each value's assigned windows and would silently merge
    /// distinct windows into one bogus global pane.
    pub fn is_default(&self) -> bool {
        matches!(self.trigger, Trigger::Default) && self.window_fn.is_default_window()
    }
}
