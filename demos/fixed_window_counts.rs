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

use trigger_core::{
    AccumulationMode, FixedWindows, InMemoryStateBackend, Trigger, TriggerDriver, WindowedValue,
    WindowingStrategy,
};

/// Counts words falling into 60-unit fixed windows, firing once the
/// watermark passes each window's end.
fn main() {
    let strategy = WindowingStrategy::new(
        Arc::new(FixedWindows::new(60)),
        Trigger::after_watermark(None, None),
        AccumulationMode::Discarding,
    );
    let driver: TriggerDriver<&str> = TriggerDriver::for_strategy(strategy, false);
    let mut backend = InMemoryStateBackend::<&str>::new(true);

    let words: [(&str, i64); 4] = [("the", 5), ("quick", 12), ("fox", 58), ("jumps", 61)];
    let windowed: Vec<_> = words
        .iter()
        .map(|(w, ts)| {
            let window = trigger_core::Window::new((ts / 60) * 60, (ts / 60) * 60 + 60);
            WindowedValue::new(*w, *ts, vec![window])
        })
        .collect();

    driver.process_elements(windowed, &mut backend).unwrap();

    let ticks: [(trigger_core::Window, i64); 2] =
        [(trigger_core::Window::new(0, 60), 60), (trigger_core::Window::new(60, 120), 120)];
    for (window, watermark) in ticks {
        if let Some(pane) = driver.process_timer(window, watermark, &mut backend).unwrap() {
            println!("{:?} -> {:?} (finished={})", pane.window, pane.values, pane.finished);
        }
    }
}
