/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use rustc_hash::FxHashMap;

use crate::error::{Result, TriggerError};
use crate::state_backend::{StateBackend, StateInput, StateOutput};
use crate::state_tag::StateTag;
use crate::window::{Timestamp, Window};

/// The window-id map: for each currently-known (destination) window, the
/// ordered list of internal ids whose underlying state must be unioned to
/// read that window. An id is itself a `Window` — the window as originally
/// assigned, before any merge folded it into a wider one — so no separate
/// synthetic id type is needed. A window absent from the map is its own
/// singleton id-list; the map only grows entries once a merge has touched
/// a window or a read/write has forced it to be recorded as known.
///
/// This is the only truly shared, cross-call structure in the core; it is
/// persisted in the wrapped backend's global area under a well-known key
/// rather than kept in driver-local memory, so it survives across the
/// separate `process_elements`/`process_timer` invocations that share a
/// grouping key.
#[derive(Debug, Clone, Default)]
pub struct WindowIdMapState {
    pub map: FxHashMap<Window, Vec<Window>>,
}

impl WindowIdMapState {
    fn ids_of(&self, window: Window) -> Vec<Window> {
        self.map.get(&window).cloned().unwrap_or_else(|| vec![window])
    }

    fn ensure_known(&mut self, window: Window) {
        self.map.entry(window).or_insert_with(|| vec![window]);
    }
}

/// Wraps an unmerged state backend and exposes the same interface, indirecting
/// every window through the window-id map so that state from merged windows
/// can be unioned without physically copying it.
pub struct MergingStateBackend<'a, E: Clone> {
    inner: &'a mut dyn StateBackend<E>,
    id_map: WindowIdMapState,
}

impl<'a, E: Clone> MergingStateBackend<'a, E> {
    pub fn new(inner: &'a mut dyn StateBackend<E>) -> Self {
        let id_map = inner.get_global_window_id_map();
        MergingStateBackend { inner, id_map }
    }

    fn persist(&mut self) {
        self.inner.set_global_window_id_map(self.id_map.clone());
    }

    fn first_id(&mut self, window: Window) -> Window {
        self.id_map.ensure_known(window);
        self.id_map.map[&window][0]
    }
}

impl<'a, E: Clone> StateBackend<E> for MergingStateBackend<'a, E> {
    fn set_timer(&mut self, window: Window, tag: &str, ts: Timestamp) {
        let id = self.first_id(window);
        self.persist();
        self.inner.set_timer(id, tag, ts);
    }

    fn clear_timer(&mut self, window: Window, tag: &str) {
        let id = self.first_id(window);
        self.persist();
        self.inner.clear_timer(id, tag);
    }

    fn get_window(&self, timer_id: Window) -> Result<Window> {
        for (&dest, ids) in self.id_map.map.iter() {
            if ids.contains(&timer_id) {
                return Ok(dest);
            }
        }
        Err(TriggerError::OrphanedTimer)
    }

    fn add_state(&mut self, window: Window, tag: &StateTag, input: StateInput<E>) -> Result<()> {
        if matches!(tag, StateTag::Value(_)) {
            return Err(TriggerError::ValueTagOnMergingBackend {
                tag: tag.name().to_string(),
            });
        }
        let id = self.first_id(window);
        self.persist();
        self.inner.add_state(id, tag, input)
    }

    fn get_state(&self, window: Window, tag: &StateTag) -> Result<StateOutput<E>> {
        match tag {
            StateTag::Value(_) => Err(TriggerError::ValueTagOnMergingBackend {
                tag: tag.name().to_string(),
            }),
            StateTag::List(_) => {
                let mut out = Vec::new();
                for id in self.id_map.ids_of(window) {
                    if let StateOutput::List(mut vs) = self.inner.get_state(id, tag)? {
                        out.append(&mut vs);
                    }
                }
                Ok(StateOutput::List(out))
            }
            StateTag::Combining(_, combine_fn) => {
                let ids = self.id_map.ids_of(window);
                let mut raw = Vec::with_capacity(ids.len());
                for id in ids {
                    if let StateOutput::Combining(v) = self.inner.get_state(id, tag)? {
                        raw.push(v);
                    }
                }
                let merged = combine_fn.merge_accumulators(&raw);
                Ok(StateOutput::Combining(combine_fn.extract_output(merged)))
            }
        }
    }

    fn clear_state(&mut self, window: Window, tag: Option<&StateTag>) {
        let ids = self.id_map.ids_of(window);
        match tag {
            None => {
                for id in ids {
                    self.inner.clear_state(id, None);
                }
                self.id_map.map.remove(&window);
                self.persist();
            }
            Some(t) => {
                for id in ids {
                    self.inner.clear_state(id, Some(t));
                }
            }
        }
    }

    fn get_global_window_id_map(&self) -> WindowIdMapState {
        // The merge adapter owns the map; nothing above it should read it.
        self.inner.get_global_window_id_map()
    }

    fn set_global_window_id_map(&mut self, map: WindowIdMapState) {
        self.inner.set_global_window_id_map(map);
    }

    fn get_and_clear_timers(&mut self, watermark: Timestamp) -> Vec<(Window, String, Timestamp)> {
        self.inner.get_and_clear_timers(watermark)
    }

    fn known_windows(&self) -> Vec<Window> {
        self.id_map.map.keys().copied().collect()
    }

    fn merge(&mut self, sources: Vec<Window>, dest: Window) -> Result<()> {
        let mut dest_ids = self.id_map.ids_of(dest);
        for src in sources {
            if src == dest {
                continue;
            }
            match self.id_map.map.remove(&src) {
                Some(mut src_ids) => dest_ids.append(&mut src_ids),
                None => dest_ids.push(src),
            }
        }
        self.id_map.map.insert(dest, dest_ids);
        self.persist();
        Ok(())
    }
}
