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

/// Errors raised by the state backend, merge adapter, contexts, and driver.
///
/// These are all programmer errors or benign races explicitly called out by
/// the design: there is no error path for "normal" trigger evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// A `Value` tag was used against a mergeable state backend.
    ValueTagOnMergingBackend { tag: String },
    /// `get_window` was asked about a timer id that no longer maps to a window
    /// (merged away, or the window-id map otherwise lost track of it).
    OrphanedTimer,
    /// A `Combining` tag was constructed without a combine function.
    EmptyCombineFn { tag: String },
    /// The default-global-batch driver was handed a timer to process.
    TimerInDefaultBatchDriver,
    /// Two tags with the same name but different variants collided in the
    /// same state backend cell.
    TagVariantMismatch { tag: String },
}

impl fmt::Display for TriggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerError::ValueTagOnMergingBackend { tag } => write!(
                f,
                "merging requested for non-mergeable tag '{tag}': Value tags may only be used on non-mergeable windowings"
            ),
            TriggerError::OrphanedTimer => {
                write!(f, "timer references a window that no longer exists")
            }
            TriggerError::EmptyCombineFn { tag } => {
                write!(f, "Combining tag '{tag}' constructed without a combine function")
            }
            TriggerError::TimerInDefaultBatchDriver => write!(
                f,
                "the default-global-batch driver never schedules timers; process_timer is unreachable"
            ),
            TriggerError::TagVariantMismatch { tag } => write!(
                f,
                "tag '{tag}' was used with two different variants against the same backend"
            ),
        }
    }
}

impl std::error::Error for TriggerError {}

pub type Result<T> = std::result::Result<T, TriggerError>;
