/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::error::Result;
use crate::state_backend::{StateBackend, StateInput, StateOutput};
use crate::state_tag::StateTag;
use crate::window::{Timestamp, Window};

/// The window-scoped view over state that trigger functions manipulate.
/// Triggers never see the backend directly, and never touch anything but
/// `Combining` tags and timers — the `ELEMENTS` list is driver-owned.
pub trait TriggerContext<V: Clone> {
    fn window(&self) -> Window;
    fn set_timer(&mut self, tag: &str, ts: Timestamp);
    fn clear_timer(&mut self, tag: &str);
    fn add_state(&mut self, tag: &StateTag, delta: i64) -> Result<()>;
    fn get_state(&self, tag: &StateTag) -> Result<i64>;
    fn clear_state(&mut self, tag: Option<&StateTag>);
}

/// Binds a window directly to a state backend.
pub struct WindowContext<'a, V: Clone> {
    backend: &'a mut dyn StateBackend<V>,
    window: Window,
}

impl<'a, V: Clone> WindowContext<'a, V> {
    pub fn new(backend: &'a mut dyn StateBackend<V>, window: Window) -> Self {
        WindowContext { backend, window }
    }
}

impl<'a, V: Clone> TriggerContext<V> for WindowContext<'a, V> {
    fn window(&self) -> Window {
        self.window
    }

    fn set_timer(&mut self, tag: &str, ts: Timestamp) {
        self.backend.set_timer(self.window, tag, ts);
    }

    fn clear_timer(&mut self, tag: &str) {
        self.backend.clear_timer(self.window, tag);
    }

    fn add_state(&mut self, tag: &StateTag, delta: i64) -> Result<()> {
        self.backend
            .add_state(self.window, tag, StateInput::CombiningInput(delta))?;
        Ok(())
    }

    fn get_state(&self, tag: &StateTag) -> Result<i64> {
        match self.backend.get_state(self.window, tag)? {
            StateOutput::Combining(v) => Ok(v),
            _ => Ok(0),
        }
    }

    fn clear_state(&mut self, tag: Option<&StateTag>) {
        self.backend.clear_state(self.window, tag);
    }
}

/// Forwards every operation to `outer` after prefixing the tag name and the
/// timer key, so composite triggers can share a single context's address
/// space without their sub-triggers' state colliding.
///
/// Nested contexts compose by direct wrapping: a `NestedContext` over a
/// `NestedContext` doubly prefixes, rather than flattening the prefix chain
/// at construction. This trades a small, constant-depth indirection (depth
/// equals trigger nesting depth, which is shallow in practice) for a
/// context that never needs to special-case its own nesting.
pub struct NestedContext<'a, V: Clone> {
    outer: &'a mut dyn TriggerContext<V>,
    prefix: String,
}

impl<'a, V: Clone> NestedContext<'a, V> {
    pub fn new(outer: &'a mut dyn TriggerContext<V>, prefix: impl Into<String>) -> Self {
        NestedContext {
            outer,
            prefix: prefix.into(),
        }
    }

    fn prefixed_timer(&self, tag: &str) -> String {
        format!("{}{}", self.prefix, tag)
    }
}

impl<'a, V: Clone> TriggerContext<V> for NestedContext<'a, V> {
    fn window(&self) -> Window {
        self.outer.window()
    }

    fn set_timer(&mut self, tag: &str, ts: Timestamp) {
        self.outer.set_timer(&self.prefixed_timer(tag), ts);
    }

    fn clear_timer(&mut self, tag: &str) {
        self.outer.clear_timer(&self.prefixed_timer(tag));
    }

    fn add_state(&mut self, tag: &StateTag, delta: i64) -> Result<()> {
        self.outer.add_state(&tag.with_prefix(&self.prefix), delta)
    }

    fn get_state(&self, tag: &StateTag) -> Result<i64> {
        self.outer.get_state(&tag.with_prefix(&self.prefix))
    }

    fn clear_state(&mut self, tag: Option<&StateTag>) {
        match tag {
            Some(t) => {
                let prefixed = t.with_prefix(&self.prefix);
                self.outer.clear_state(Some(&prefixed));
            }
            None => self.outer.clear_state(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_backend::InMemoryStateBackend;
    use crate::state_tag::SumCombineFn;
    use std::sync::Arc;

    #[test]
    fn nested_context_prefixes_state_tags() {
        let mut backend = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let mut root = WindowContext::new(&mut backend, w);
        let tag = StateTag::combining("COUNT", Arc::new(SumCombineFn));

        {
            let mut nested = NestedContext::new(&mut root, "0/");
            nested.add_state(&tag, 5).unwrap();
        }
        assert_eq!(root.get_state(&tag.with_prefix("0/")).unwrap(), 5);
        assert_eq!(root.get_state(&tag).unwrap(), 0);
    }

    #[test]
    fn double_nesting_is_observationally_equal_to_combined_prefix() {
        let mut backend_a = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let tag = StateTag::combining("COUNT", Arc::new(SumCombineFn));

        let via_chain = {
            let mut root = WindowContext::new(&mut backend_a, w);
            let mut outer = NestedContext::new(&mut root, "a/");
            let mut inner = NestedContext::new(&mut outer, "b/");
            inner.add_state(&tag, 7).unwrap();
            root.get_state(&tag.with_prefix("a/b/")).unwrap()
        };

        let mut backend_b = InMemoryStateBackend::<i32>::new(true);
        let via_direct = {
            let mut root = WindowContext::new(&mut backend_b, w);
            root.add_state(&tag.with_prefix("a/b/"), 7).unwrap();
            root.get_state(&tag.with_prefix("a/b/")).unwrap()
        };

        assert_eq!(via_chain, via_direct);
    }

    #[test]
    fn nested_context_prefixes_timers() {
        let mut backend = InMemoryStateBackend::<i32>::new(true);
        let w = Window::new(0, 10);
        let mut root = WindowContext::new(&mut backend, w);
        {
            let mut nested = NestedContext::new(&mut root, "early/");
            nested.set_timer("END", 100);
        }
        let fired = backend.get_and_clear_timers(1000);
        assert_eq!(fired, vec![(w, "early/END".to_string(), 100)]);
    }
}
