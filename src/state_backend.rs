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
use crate::merge_adapter::WindowIdMapState;
use crate::state_tag::StateTag;
use crate::window::{Timestamp, Window};

/// What to write into a state cell; shape depends on the tag's variant.
#[derive(Debug, Clone)]
pub enum StateInput<E> {
    Value(E),
    ListItem(E),
    CombiningInput(i64),
}

/// What a state cell reads back as; shape depends on the tag's variant.
#[derive(Debug, Clone)]
pub enum StateOutput<E> {
    Value(Option<E>),
    List(Vec<E>),
    Combining(i64),
}

/// A keyed map of per-window, tagged mutable cells plus per-window timer
/// tables and a small global area reserved for the merge adapter's id map.
///
/// Operations are total: reading an absent cell returns the empty/default
/// for its variant rather than erroring.
pub trait StateBackend<E: Clone> {
    fn set_timer(&mut self, window: Window, tag: &str, ts: Timestamp);
    fn clear_timer(&mut self, window: Window, tag: &str);

    /// Resolves a timer id back to its current window. For a plain backend
    /// there is no re-homing layer, so this always succeeds with the id
    /// itself; the merge adapter overrides it to chase re-homed windows and
    /// report orphaned timers.
    fn get_window(&self, timer_id: Window) -> Result<Window> {
        Ok(timer_id)
    }

    fn add_state(&mut self, window: Window, tag: &StateTag, input: StateInput<E>) -> Result<()>;
    fn get_state(&self, window: Window, tag: &StateTag) -> Result<StateOutput<E>>;

    /// Clearing with `tag = None` deletes all state for that window.
    fn clear_state(&mut self, window: Window, tag: Option<&StateTag>);

    fn get_global_window_id_map(&self) -> WindowIdMapState;
    fn set_global_window_id_map(&mut self, map: WindowIdMapState);

    /// All timers with `timestamp <= watermark`, removed from the backend.
    fn get_and_clear_timers(&mut self, watermark: Timestamp) -> Vec<(Window, String, Timestamp)>;

    fn known_windows(&self) -> Vec<Window>;

    /// No-op by default; only a backend that indirects through internal ids
    /// (the merge adapter) needs a real implementation.
    fn merge(&mut self, _sources: Vec<Window>, _dest: Window) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Cell {
    window: Window,
    tag: String,
}

/// The mandatory in-memory backend, used standalone for non-mergeable
/// windowings and as the inner backend wrapped by the merge adapter for
/// mergeable ones.
pub struct InMemoryStateBackend<E> {
    defensive_copy: bool,
    values: FxHashMap<Cell, E>,
    lists: FxHashMap<Cell, Vec<E>>,
    combining: FxHashMap<Cell, i64>,
    timers: FxHashMap<(Window, String), Timestamp>,
    known: FxHashMap<Window, ()>,
    global_window_id_map: WindowIdMapState,
}

impl<E> Default for InMemoryStateBackend<E> {
    fn default() -> Self {
        InMemoryStateBackend {
            defensive_copy: true,
            values: FxHashMap::default(),
            lists: FxHashMap::default(),
            combining: FxHashMap::default(),
            timers: FxHashMap::default(),
            known: FxHashMap::default(),
            global_window_id_map: WindowIdMapState::default(),
        }
    }
}

impl<E: Clone> InMemoryStateBackend<E> {
    pub fn new(defensive_copy: bool) -> Self {
        InMemoryStateBackend {
            defensive_copy,
            ..Self::default()
        }
    }

    fn mark_known(&mut self, window: Window) {
        self.known.insert(window, ());
    }
}

impl<E: Clone> StateBackend<E> for InMemoryStateBackend<E> {
    fn set_timer(&mut self, window: Window, tag: &str, ts: Timestamp) {
        self.mark_known(window);
        self.timers.insert((window, tag.to_string()), ts);
    }

    fn clear_timer(&mut self, window: Window, tag: &str) {
        self.timers.remove(&(window, tag.to_string()));
    }

    fn add_state(&mut self, window: Window, tag: &StateTag, input: StateInput<E>) -> Result<()> {
        self.mark_known(window);
        let cell = Cell {
            window,
            tag: tag.name().to_string(),
        };
        match (tag, input) {
            (StateTag::Value(_), StateInput::Value(v)) => {
                let stored = if self.defensive_copy { v.clone() } else { v };
                self.values.insert(cell, stored);
            }
            (StateTag::List(_), StateInput::ListItem(v)) => {
                let stored = if self.defensive_copy { v.clone() } else { v };
                self.lists.entry(cell).or_default().push(stored);
            }
            (StateTag::Combining(_, combine_fn), StateInput::CombiningInput(v)) => {
                let acc = self.combining.entry(cell).or_insert_with(|| combine_fn.empty());
                *acc = combine_fn.combine(*acc, v);
            }
            (tag, _) => {
                return Err(TriggerError::TagVariantMismatch {
                    tag: tag.name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn get_state(&self, window: Window, tag: &StateTag) -> Result<StateOutput<E>> {
        let cell = Cell {
            window,
            tag: tag.name().to_string(),
        };
        match tag {
            StateTag::Value(_) => {
                let v = self.values.get(&cell).cloned();
                Ok(StateOutput::Value(v))
            }
            StateTag::List(_) => {
                let v = self.lists.get(&cell).cloned().unwrap_or_default();
                Ok(StateOutput::List(v))
            }
            StateTag::Combining(_, combine_fn) => {
                let acc = self.combining.get(&cell).copied().unwrap_or_else(|| combine_fn.empty());
                Ok(StateOutput::Combining(combine_fn.extract_output(acc)))
            }
        }
    }

    fn clear_state(&mut self, window: Window, tag: Option<&StateTag>) {
        match tag {
            None => {
                self.values.retain(|c, _| c.window != window);
                self.lists.retain(|c, _| c.window != window);
                self.combining.retain(|c, _| c.window != window);
                self.timers.retain(|(w, _), _| *w != window);
                self.known.remove(&window);
            }
            Some(tag) => {
                let cell = Cell {
                    window,
                    tag: tag.name().to_string(),
                };
                self.values.remove(&cell);
                self.lists.remove(&cell);
                self.combining.remove(&cell);
            }
        }
    }

    fn get_global_window_id_map(&self) -> WindowIdMapState {
        self.global_window_id_map.clone()
    }

    fn set_global_window_id_map(&mut self, map: WindowIdMapState) {
        self.global_window_id_map = map;
    }

    fn get_and_clear_timers(&mut self, watermark: Timestamp) -> Vec<(Window, String, Timestamp)> {
        let due: Vec<(Window, String)> = self
            .timers
            .iter()
            .filter(|(_, &ts)| ts <= watermark)
            .map(|(k, _)| k.clone())
            .collect();
        let mut out = Vec::with_capacity(due.len());
        for key in due {
            if let Some(ts) = self.timers.remove(&key) {
                out.push((key.0, key.1, ts));
            }
        }
        out
    }

    fn known_windows(&self) -> Vec<Window> {
        self.known.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_tag::SumCombineFn;
    use std::sync::Arc;

    #[test]
    fn value_tag_overwrites() {
        let mut be = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let tag = StateTag::value("V");
        be.add_state(w, &tag, StateInput::Value(1)).unwrap();
        be.add_state(w, &tag, StateInput::Value(2)).unwrap();
        match be.get_state(w, &tag).unwrap() {
            StateOutput::Value(Some(v)) => assert_eq!(v, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn list_tag_appends_in_order() {
        let mut be = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let tag = StateTag::list("ELEMENTS");
        for v in [1, 2, 3] {
            be.add_state(w, &tag, StateInput::ListItem(v)).unwrap();
        }
        match be.get_state(w, &tag).unwrap() {
            StateOutput::List(vs) => assert_eq!(vs, vec![1, 2, 3]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn combining_tag_folds() {
        let mut be = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let tag = StateTag::combining("COUNT", Arc::new(SumCombineFn));
        for _ in 0..3 {
            be.add_state(w, &tag, StateInput::CombiningInput(1)).unwrap();
        }
        match be.get_state(w, &tag).unwrap() {
            StateOutput::Combining(v) => assert_eq!(v, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn absent_cell_reads_as_empty() {
        let be = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        match be.get_state(w, &StateTag::list("ELEMENTS")).unwrap() {
            StateOutput::List(vs) => assert!(vs.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn clear_state_none_wipes_window() {
        let mut be = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let tag = StateTag::list("ELEMENTS");
        be.add_state(w, &tag, StateInput::ListItem(1)).unwrap();
        be.set_timer(w, "T", 100);
        be.clear_state(w, None);
        match be.get_state(w, &tag).unwrap() {
            StateOutput::List(vs) => assert!(vs.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        assert!(be.get_and_clear_timers(1000).is_empty());
        assert!(!be.known_windows().contains(&w));
    }

    #[test]
    fn get_and_clear_timers_is_threshold_and_destructive() {
        let mut be = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        be.set_timer(w, "END", 10);
        assert!(be.get_and_clear_timers(5).is_empty());
        let fired = be.get_and_clear_timers(10);
        assert_eq!(fired, vec![(w, "END".to_string(), 10)]);
        assert!(be.get_and_clear_timers(100).is_empty());
    }

    #[test]
    fn reads_are_independently_owned_regardless_of_defensive_copy() {
        for flag in [true, false] {
            let mut be = InMemoryStateBackend::<Vec<i32>>::new(flag);
            let w = Window::new(0, 10);
            let tag = StateTag::list("L");
            be.add_state(w, &tag, StateInput::ListItem(vec![1, 2])).unwrap();
            let first = match be.get_state(w, &tag).unwrap() {
                StateOutput::List(mut vs) => {
                    vs.push(vec![99]);
                    vs
                }
                _ => unreachable!(),
            };
            // Mutating the read-out copy must never affect backend storage.
            let second = match be.get_state(w, &tag).unwrap() {
                StateOutput::List(vs) => vs,
                _ => unreachable!(),
            };
            assert_eq!(first.len(), 2);
            assert_eq!(second.len(), 1);
        }
    }
}
