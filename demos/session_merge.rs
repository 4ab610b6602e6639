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
    AccumulationMode, InMemoryStateBackend, Sessions, Trigger, TriggerDriver, Window,
    WindowedValue, WindowingStrategy,
};

/// Shows out-of-order session-window merging: four events with a gap of 10
/// arrive and fold into two session windows, with no firing until each
/// session accumulates three elements.
fn main() {
    let strategy = WindowingStrategy::new(
        Arc::new(Sessions::new(10)),
        Trigger::after_count(3),
        AccumulationMode::Accumulating,
    );
    let driver: TriggerDriver<&str> = TriggerDriver::for_strategy(strategy, false);
    let mut backend = InMemoryStateBackend::<&str>::new(true);

    let events: [(&str, i64); 4] = [("a", 0), ("b", 5), ("c", 20), ("d", 7)];
    let windowed: Vec<_> = events
        .iter()
        .map(|(v, ts)| WindowedValue::new(*v, *ts, vec![Window::new(*ts, *ts + 10)]))
        .collect();

    let panes = driver.process_elements(windowed, &mut backend).unwrap();
    for pane in panes {
        println!("{:?} -> {:?} (finished={})", pane.window, pane.values, pane.finished);
    }
}
