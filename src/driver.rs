/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

#[cfg(not(test))]
use log::{debug, trace};
#[cfg(test)]
use std::{println as debug, println as trace};

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::context::WindowContext;
use crate::error::{Result, TriggerError};
use crate::merge_adapter::MergingStateBackend;
use crate::state_backend::{StateBackend, StateInput, StateOutput};
use crate::state_tag::{StateTag, SumCombineFn};
use crate::strategy::{AccumulationMode, WindowingStrategy};
use crate::trigger::Trigger;
use crate::window::{Timestamp, Window, WindowedValue};
use crate::window_fn::{MergeCollector, WindowFn};

fn elements_tag() -> StateTag {
    StateTag::list("ELEMENTS")
}

fn tombstone_tag() -> StateTag {
    StateTag::combining("TOMBSTONE", Arc::new(SumCombineFn))
}

fn is_tombstoned<V: Clone>(window: Window, state: &mut dyn StateBackend<V>) -> Result<bool> {
    match state.get_state(window, &tombstone_tag())? {
        StateOutput::Combining(v) => Ok(v != 0),
        _ => Ok(false),
    }
}

/// A single emission of a window's accumulated contents at one firing.
#[derive(Debug, Clone)]
pub struct Pane<V> {
    pub window: Window,
    pub values: Vec<V>,
    pub finished: bool,
}

/// Reads back a window's elements and applies the post-firing bookkeeping
/// the accumulation mode and finish state dictate.
fn output<V: Clone>(
    window: Window,
    finished: bool,
    mode: AccumulationMode,
    state: &mut dyn StateBackend<V>,
) -> Result<Pane<V>> {
    let values = match state.get_state(window, &elements_tag())? {
        StateOutput::List(v) => v,
        _ => Vec::new(),
    };
    if finished {
        state.clear_state(window, None);
        state.add_state(window, &tombstone_tag(), StateInput::CombiningInput(1))?;
        debug!("window {window:?} finished and tombstoned");
    } else if mode == AccumulationMode::Discarding {
        state.clear_state(window, Some(&elements_tag()));
    }
    Ok(Pane {
        window,
        values,
        finished,
    })
}

/// Selected when the windowing is the default strategy and the input is
/// bounded: every value lands in one eager, immediately-finished pane.
/// `process_timer` is unreachable — default-global-batch windowing never
/// schedules timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGlobalBatch;

impl DefaultGlobalBatch {
    pub fn process_elements<V>(&self, values: Vec<WindowedValue<V>>) -> Vec<Pane<V>> {
        let all: Vec<V> = values.into_iter().map(|wv| wv.value).collect();
        if all.is_empty() {
            return Vec::new();
        }
        vec![Pane {
            window: Window::global(),
            values: all,
            finished: true,
        }]
    }

    pub fn process_timer(&self) -> Result<()> {
        Err(TriggerError::TimerInDefaultBatchDriver)
    }
}

/// The general driver: holds the window function, trigger, and accumulation
/// mode for any windowing that isn't the bounded default-global case.
pub struct GeneralDriver<V> {
    window_fn: Arc<dyn WindowFn<V>>,
    trigger: Trigger,
    mode: AccumulationMode,
    is_merging: bool,
}

impl<V: Clone> GeneralDriver<V> {
    pub fn new(window_fn: Arc<dyn WindowFn<V>>, trigger: Trigger, mode: AccumulationMode) -> Self {
        let is_merging = window_fn.is_merging();
        GeneralDriver {
            window_fn,
            trigger,
            mode,
            is_merging,
        }
    }

    pub fn process_elements(
        &self,
        values: Vec<WindowedValue<V>>,
        backend: &mut dyn StateBackend<V>,
    ) -> Result<Vec<Pane<V>>> {
        let mut owned_adapter;
        let state: &mut dyn StateBackend<V> = if self.is_merging {
            owned_adapter = MergingStateBackend::new(backend);
            &mut owned_adapter
        } else {
            backend
        };

        let mut order: Vec<Window> = Vec::new();
        let mut buckets: FxHashMap<Window, Vec<V>> = FxHashMap::default();
        for wv in values {
            for w in &wv.windows {
                if !buckets.contains_key(w) {
                    order.push(*w);
                }
                buckets.entry(*w).or_default().push(wv.value.clone());
            }
        }

        if self.is_merging {
            let mut universe: Vec<Window> = state.known_windows();
            for w in &order {
                if !universe.contains(w) {
                    universe.push(*w);
                }
            }

            let mut collector = MergeCollector::default();
            self.window_fn.merge(&universe, &mut collector);

            let mut redirect: FxHashMap<Window, Window> = FxHashMap::default();
            for (sources, dest) in collector.decisions {
                for src in &sources {
                    if *src != dest {
                        redirect.insert(*src, dest);
                    }
                }
                state.merge(sources.clone(), dest)?;
                let mut ctx = WindowContext::new(state, dest);
                self.trigger.on_merge(&sources, &mut ctx)?;
                trace!("merged {sources:?} into {dest:?}");
            }

            let resolve = |mut w: Window| -> Window {
                let mut guard = 0;
                while let Some(&next) = redirect.get(&w) {
                    w = next;
                    guard += 1;
                    if guard > redirect.len() + 1 {
                        break;
                    }
                }
                w
            };

            let mut new_order: Vec<Window> = Vec::new();
            let mut new_buckets: FxHashMap<Window, Vec<V>> = FxHashMap::default();
            for w in order {
                let dest = resolve(w);
                if !new_buckets.contains_key(&dest) {
                    new_order.push(dest);
                }
                if let Some(vs) = buckets.remove(&w) {
                    new_buckets.entry(dest).or_default().extend(vs);
                }
            }
            order = new_order;
            buckets = new_buckets;
        }

        let mut panes = Vec::new();
        for window in order {
            let Some(values) = buckets.remove(&window) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            if is_tombstoned(window, state)? {
                debug!("dropping {} element(s) for tombstoned window {window:?}", values.len());
                continue;
            }

            for value in values {
                state.add_state(window, &elements_tag(), StateInput::ListItem(value))?;
                let mut ctx = WindowContext::new(state, window);
                self.trigger.on_element(&mut ctx)?;
            }

            let mut ctx = WindowContext::new(state, window);
            if self.trigger.should_fire(Timestamp::MIN, &mut ctx)? {
                let finished = self.trigger.on_fire(Timestamp::MIN, &mut ctx)?;
                panes.push(output(window, finished, self.mode, state)?);
            }
        }

        Ok(panes)
    }

    pub fn process_timer(
        &self,
        timer_id: Window,
        timestamp: Timestamp,
        backend: &mut dyn StateBackend<V>,
    ) -> Result<Option<Pane<V>>> {
        let mut owned_adapter;
        let state: &mut dyn StateBackend<V> = if self.is_merging {
            owned_adapter = MergingStateBackend::new(backend);
            &mut owned_adapter
        } else {
            backend
        };

        let window = match state.get_window(timer_id) {
            Ok(w) => w,
            Err(_) => {
                trace!("dropping orphaned timer for {timer_id:?}");
                return Ok(None);
            }
        };

        if is_tombstoned(window, state)? {
            return Ok(None);
        }
        if self.is_merging && !state.known_windows().contains(&window) {
            return Ok(None);
        }

        let mut ctx = WindowContext::new(state, window);
        if self.trigger.should_fire(timestamp, &mut ctx)? {
            let finished = self.trigger.on_fire(timestamp, &mut ctx)?;
            Ok(Some(output(window, finished, self.mode, state)?))
        } else {
            Ok(None)
        }
    }
}

/// Top-level driver selected by `for_strategy`. Holds no state of its own;
/// every call is handed the backing state backend explicitly.
pub enum TriggerDriver<V> {
    DefaultGlobalBatch(DefaultGlobalBatch),
    General(GeneralDriver<V>),
}

impl<V: Clone> TriggerDriver<V> {
    pub fn for_strategy(strategy: WindowingStrategy<V>, bounded: bool) -> Self {
        if strategy.is_default() && bounded {
            TriggerDriver::DefaultGlobalBatch(DefaultGlobalBatch)
        } else {
            TriggerDriver::General(GeneralDriver::new(
                strategy.window_fn,
                strategy.trigger,
                strategy.mode,
            ))
        }
    }

    pub fn process_elements(
        &self,
        values: Vec<WindowedValue<V>>,
        backend: &mut dyn StateBackend<V>,
    ) -> Result<Vec<Pane<V>>> {
        match self {
            TriggerDriver::DefaultGlobalBatch(d) => Ok(d.process_elements(values)),
            TriggerDriver::General(g) => g.process_elements(values, backend),
        }
    }

    pub fn process_timer(
        &self,
        timer_id: Window,
        timestamp: Timestamp,
        backend: &mut dyn StateBackend<V>,
    ) -> Result<Option<Pane<V>>> {
        match self {
            TriggerDriver::DefaultGlobalBatch(d) => d.process_timer().map(|_| None),
            TriggerDriver::General(g) => g.process_timer(timer_id, timestamp, backend),
        }
    }
}
