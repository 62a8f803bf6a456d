//! Shared test behaviors.

use easywork::export_methods;
use easywork::node::FlowControl;

/// Emits one string, then requests a stop on the following pass.
pub struct StrOnce {
    text: String,
    fired: bool,
    control: FlowControl,
}

impl StrOnce {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fired: false,
            control: FlowControl::default(),
        }
    }

    fn forward(&mut self) -> Option<String> {
        if self.fired {
            self.control.stop();
            return None;
        }
        self.fired = true;
        Some(self.text.clone())
    }
}

export_methods!(StrOnce, "StrOnce", control = control, {
    fn forward() -> Option<String>;
});

/// Emits one integer, then requests a stop on the following pass.
pub struct IntOnce {
    value: i64,
    fired: bool,
    control: FlowControl,
}

impl IntOnce {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            fired: false,
            control: FlowControl::default(),
        }
    }

    fn forward(&mut self) -> Option<i64> {
        if self.fired {
            self.control.stop();
            return None;
        }
        self.fired = true;
        Some(self.value)
    }
}

export_methods!(IntOnce, "IntOnce", control = control, {
    fn forward() -> Option<i64>;
});

/// Pass-through that requests a stop once it sees `threshold`.
pub struct StopAfter {
    threshold: i64,
    control: FlowControl,
}

impl StopAfter {
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold,
            control: FlowControl::default(),
        }
    }

    fn forward(&mut self, input: i64) -> i64 {
        if input == self.threshold {
            self.control.stop();
        }
        input
    }
}

export_methods!(StopAfter, "StopAfter", control = control, {
    fn forward(i64) -> i64;
});

/// Two-input adder, the smallest multi-port join.
pub struct Sum2;

impl Sum2 {
    fn forward(&mut self, a: i64, b: i64) -> i64 {
        a + b
    }
}

export_methods!(Sum2, "Sum2", {
    fn forward(i64, i64) -> i64;
});

/// Consumes floats; used to probe numeric coercion across a connection.
pub struct Half;

impl Half {
    fn forward(&mut self, value: f64) -> f64 {
        value / 2.0
    }
}

export_methods!(Half, "Half", {
    fn forward(f64) -> f64;
});
