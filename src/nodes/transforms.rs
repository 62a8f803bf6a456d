//! Stateless and configurable transform behaviors.

use crate::export_methods;

/// Multiplies integer input by a constant factor.
pub struct Multiply {
    factor: i64,
}

impl Multiply {
    #[must_use]
    pub fn new(factor: i64) -> Self {
        Self { factor }
    }

    fn forward(&mut self, input: i64) -> i64 {
        input * self.factor
    }
}

export_methods!(Multiply, "Multiply", {
    fn forward(i64) -> i64;
});

/// Converts integer input to its decimal text form.
pub struct ToText;

impl ToText {
    fn forward(&mut self, input: i64) -> String {
        input.to_string()
    }
}

export_methods!(ToText, "ToText", {
    fn forward(i64) -> String;
});

/// Prepends a fixed prefix to string input.
pub struct Prefix {
    prefix: String,
}

impl Prefix {
    #[must_use]
    pub fn new(prefix: String) -> Self {
        Self { prefix }
    }

    fn forward(&mut self, input: String) -> String {
        format!("{}{}", self.prefix, input)
    }
}

export_methods!(Prefix, "Prefix", {
    fn forward(String) -> String;
});

/// Joins a number and a string back into `text:number` form.
pub struct JoinBack;

impl JoinBack {
    fn forward(&mut self, number: i64, text: String) -> String {
        format!("{text}:{number}")
    }
}

export_methods!(JoinBack, "JoinBack", {
    fn forward(i64, String) -> String;
});

/// Heterogeneous-signature example: a data method, a configuration
/// method, and a two-argument computation.
///
/// `forward` returns its input plus the length of the last configured
/// string, so a pass where both ports have data demonstrates the
/// control-before-forward ordering guarantee.
#[derive(Default)]
pub struct Mixed {
    length: i64,
    set_calls: u64,
}

impl Mixed {
    /// How many times `set_string` has fired (introspection for tests).
    #[must_use]
    pub fn set_calls(&self) -> u64 {
        self.set_calls
    }

    fn forward(&mut self, input: i64) -> i64 {
        input + self.length
    }

    fn set_string(&mut self, text: String) {
        self.set_calls += 1;
        self.length = text.len() as i64;
    }

    fn compute_ratio(&mut self, a: i64, b: i64) -> f64 {
        if b == 0 {
            return 0.0;
        }
        a as f64 / b as f64
    }
}

export_methods!(Mixed, "Mixed", {
    fn forward(i64) -> i64;
    fn set_string(String) -> ();
    fn compute_ratio(i64, i64) -> f64;
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::typesys::Packet;

    #[test]
    fn multiply_and_totext_compose_eagerly() {
        let gain = Node::create(Multiply::new(10));
        let text = Node::create(ToText);
        let out = gain
            .invoke("forward", &[Packet::carrying(4_i64)])
            .and_then(|p| text.invoke("forward", &[p]))
            .unwrap();
        assert_eq!(out.cast::<String>().unwrap(), "40");
    }

    #[test]
    fn mixed_forward_sees_configured_length() {
        let node = Node::create(Mixed::default());
        node.invoke("set_string", &[Packet::carrying(String::from("abc"))])
            .unwrap();
        let out = node.invoke("forward", &[Packet::carrying(5_i64)]).unwrap();
        assert_eq!(out.cast::<i64>().unwrap(), 8);
    }

    #[test]
    fn compute_ratio_guards_division_by_zero() {
        let node = Node::create(Mixed::default());
        let out = node
            .invoke("compute_ratio", &[Packet::carrying(1_i64), Packet::carrying(0_i64)])
            .unwrap();
        assert_eq!(out.cast::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn set_string_returns_an_empty_packet() {
        let node = Node::create(Mixed::default());
        let out = node
            .invoke("set_string", &[Packet::carrying(String::from("xy"))])
            .unwrap();
        assert!(!out.has_value());
    }

    #[test]
    fn prefix_keeps_configured_text() {
        let node = Node::create(Prefix::new(String::from("> ")));
        let out = node
            .invoke("forward", &[Packet::carrying(String::from("hi"))])
            .unwrap();
        assert_eq!(out.cast::<String>().unwrap(), "> hi");
    }
}
