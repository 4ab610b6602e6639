/*
 * Copyright © 2025 Volodymyr Kadzhaia
 * Copyright © 2025 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Windowing-and-triggering core for a streaming pipeline runtime.
//!
//! Given an unbounded or bounded stream of timestamped records, this crate
//! decides which windows each record belongs to, when a window's current
//! pane should fire, and what that pane carries. See [`driver::TriggerDriver`]
//! for the entry point.

pub mod context;
pub mod driver;
pub mod error;
pub mod merge_adapter;
pub mod state_backend;
pub mod state_tag;
pub mod strategy;
pub mod trigger;
pub mod window;
pub mod window_fn;

pub use context::{NestedContext, TriggerContext, WindowContext};
pub use driver::{DefaultGlobalBatch, GeneralDriver, Pane, TriggerDriver};
pub use error::{Result, TriggerError};
pub use merge_adapter::{MergingStateBackend, WindowIdMapState};
pub use state_backend::{InMemoryStateBackend, StateBackend, StateInput, StateOutput};
pub use state_tag::{CombineFn, MaxCombineFn, OrCombineFn, StateTag, SumCombineFn};
pub use strategy::{AccumulationMode, WindowingStrategy};
pub use trigger::{combining_tag_checked, Trigger};
pub use window::{Timestamp, Window, WindowedValue};
pub use window_fn::{FixedWindows, GlobalWindowFn, MergeContext, Sessions, WindowFn};
