/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;
use std::sync::Arc;

/// How a `Combining` tag folds newly-added values into its accumulator and
/// extracts a readable output from it. Every built-in trigger's combining
/// state (counters, index-selectors, or-flags) is integer-representable, so
/// the accumulator type is fixed to `i64` rather than made generic — this
/// keeps `StateTag` a plain, comparable value instead of needing a type
/// parameter threaded through the whole backend.
pub trait CombineFn: fmt::Debug + Send + Sync {
    fn empty(&self) -> i64;
    fn combine(&self, acc: i64, value: i64) -> i64;
    fn merge_accumulators(&self, accs: &[i64]) -> i64 {
        accs.iter().fold(self.empty(), |acc, &v| self.combine(acc, v))
    }
    fn extract_output(&self, acc: i64) -> i64 {
        acc
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SumCombineFn;

impl CombineFn for SumCombineFn {
    fn empty(&self) -> i64 {
        0
    }
    fn combine(&self, acc: i64, value: i64) -> i64 {
        acc + value
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxCombineFn;

impl CombineFn for MaxCombineFn {
    fn empty(&self) -> i64 {
        i64::MIN
    }
    fn combine(&self, acc: i64, value: i64) -> i64 {
        acc.max(value)
    }
}

/// Folds 0/1 values with logical OR; used for "has this ever happened" flags
/// (`AfterWatermark`'s `LATE` flag, `AfterAll`'s per-child has-fired flags).
#[derive(Debug, Clone, Copy, Default)]
pub struct OrCombineFn;

impl CombineFn for OrCombineFn {
    fn empty(&self) -> i64 {
        0
    }
    fn combine(&self, acc: i64, value: i64) -> i64 {
        if acc != 0 || value != 0 {
            1
        } else {
            0
        }
    }
}

/// A typed identifier selecting a cell in per-window state, with a specific
/// write/read discipline. Tags are comparable by `(variant, name)`; two tags
/// constructed separately with the same name and variant refer to the same
/// cell.
#[derive(Debug, Clone)]
pub enum StateTag {
    /// Overwrites on write; reads return the last written value.
    Value(String),
    /// Appends on write; reads return the ordered list.
    List(String),
    /// Folds into an accumulator on write; reads extract the output.
    Combining(String, Arc<dyn CombineFn>),
}

impl StateTag {
    pub fn value(name: impl Into<String>) -> Self {
        StateTag::Value(name.into())
    }

    pub fn list(name: impl Into<String>) -> Self {
        StateTag::List(name.into())
    }

    pub fn combining(name: impl Into<String>, combine_fn: Arc<dyn CombineFn>) -> Self {
        StateTag::Combining(name.into(), combine_fn)
    }

    pub fn name(&self) -> &str {
        match self {
            StateTag::Value(n) | StateTag::List(n) | StateTag::Combining(n, _) => n,
        }
    }

    /// Returns a new tag whose name is `prefix + name` and whose semantics
    /// are unchanged.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let prefixed = format!("{prefix}{}", self.name());
        match self {
            StateTag::Value(_) => StateTag::Value(prefixed),
            StateTag::List(_) => StateTag::List(prefixed),
            StateTag::Combining(_, f) => StateTag::Combining(prefixed, f.clone()),
        }
    }

    fn variant_tag(&self) -> u8 {
        match self {
            StateTag::Value(_) => 0,
            StateTag::List(_) => 1,
            StateTag::Combining(_, _) => 2,
        }
    }
}

impl PartialEq for StateTag {
    fn eq(&self, other: &Self) -> bool {
        self.variant_tag() == other.variant_tag() && self.name() == other.name()
    }
}

impl Eq for StateTag {}

impl std::hash::Hash for StateTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.variant_tag().hash(state);
        self.name().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_preserves_variant() {
        let t = StateTag::list("ELEMENTS");
        let p = t.with_prefix("early/");
        assert_eq!(p.name(), "early/ELEMENTS");
        assert!(matches!(p, StateTag::List(_)));
    }

    #[test]
    fn double_prefix_accumulates() {
        let t = StateTag::value("COUNT");
        let p = t.with_prefix("b/").with_prefix("a/");
        assert_eq!(p.name(), "a/b/COUNT");
    }

    #[test]
    fn equality_ignores_combine_fn_identity() {
        let a = StateTag::combining("COUNT", Arc::new(SumCombineFn));
        let b = StateTag::combining("COUNT", Arc::new(SumCombineFn));
        assert_eq!(a, b);
    }

    #[test]
    fn same_name_different_variant_not_equal() {
        let a = StateTag::value("X");
        let b = StateTag::list("X");
        assert_ne!(a, b);
    }

    #[test]
    fn sum_combine_fn_folds() {
        let f = SumCombineFn;
        assert_eq!(f.merge_accumulators(&[1, 2, 3]), 6);
    }

    #[test]
    fn or_combine_fn_is_sticky() {
        let f = OrCombineFn;
        assert_eq!(f.combine(0, 0), 0);
        assert_eq!(f.combine(0, 1), 1);
        assert_eq!(f.combine(1, 0), 1);
    }
}
