//! Source behaviors: zero-argument `forward` methods driving the graph.

use crate::export_methods;
use crate::node::FlowControl;
use crate::tuples::register_tuple_type;

/// Integer sequence source. Emits `start`, `start + step`, … while the
/// value stays below `max`, then requests a cooperative stop.
pub struct Counter {
    current: i64,
    max: i64,
    step: i64,
    control: FlowControl,
}

impl Counter {
    #[must_use]
    pub fn new(start: i64, max: i64, step: i64) -> Self {
        Self {
            current: start,
            max,
            step,
            control: FlowControl::default(),
        }
    }

    fn forward(&mut self) -> Option<i64> {
        if self.current >= self.max {
            self.control.stop();
            return None;
        }
        let value = self.current;
        self.current += self.step;
        Some(value)
    }
}

export_methods!(Counter, "Counter", control = control, {
    fn forward() -> Option<i64>;
});

/// Pair source: emits `(n, "value_n")` for `start..=max`, then requests a
/// cooperative stop.
pub struct PairEmitter {
    current: i64,
    max: i64,
    control: FlowControl,
}

impl PairEmitter {
    #[must_use]
    pub fn new(start: i64, max: i64) -> Self {
        register_tuple_type::<(i64, String)>();
        Self {
            current: start,
            max,
            control: FlowControl::default(),
        }
    }

    fn forward(&mut self) -> Option<(i64, String)> {
        if self.current > self.max {
            self.control.stop();
            return None;
        }
        let value = self.current;
        self.current += 1;
        Some((value, format!("value_{value}")))
    }
}

export_methods!(PairEmitter, "PairEmitter", control = control, {
    fn forward() -> Option<(i64, String)>;
});
