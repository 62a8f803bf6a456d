//! The per-pass dispatch engine.
//!
//! [`Node::dispatch`] runs once per executor pass inside the node's task.
//! It decides what to execute, with what inputs, and in what order:
//!
//! 1. **Buffer inputs.** Each port reads its upstream's output slot and
//!    appends non-empty packets to its FIFO, honoring the method's
//!    `max_queue` bound (oldest dropped).
//! 2. **Attempt methods in order.** The effective order is the observed
//!    connection order (or the explicit override), with `forward` always
//!    last. Per method: arity check (port count must equal declared
//!    arity), availability check (every port non-empty), sync check
//!    (equal front timestamps, dropping the earliest fronts once), then
//!    collect one packet per port, invoke, and stamp the result with the
//!    maximum input timestamp (or the current time for zero-input
//!    methods with unstamped results).
//! 3. **Emit.** The last produced value lands in the output slot; if no
//!    method produced output this pass, the slot is empty.
//!
//! A node whose `forward` declares zero arguments needs no connections
//! for the checks to pass, which is exactly the source behavior: the
//! forward invoker runs every pass and its result is stamped on emit.
//! A valueless result means nothing is produced this pass; a source that
//! wants the graph to end calls
//! [`FlowControl::stop`](crate::node::FlowControl::stop).
//!
//! Ordering is the implicit-serialization guarantee: with both a control
//! method and `forward` eligible in the same pass, the control method
//! fires first, so `forward` observes the new configuration without
//! locks.
//!
//! Conversion failures and invocation panics are logged with node and
//! method context, counted on the node's statistics, and demoted to an
//! empty output slot; they never reach the executor.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::node::{Node, Wiring};
use crate::types::{MethodId, ID_FORWARD};
use crate::typesys::Packet;

impl Node {
    /// Run one dispatch pass. A no-op (with a warning) while the node is
    /// idle.
    pub fn dispatch(&self) {
        if !self.is_opened_relaxed() {
            tracing::warn!(node = self.class_name(), "dispatch on an idle node");
            return;
        }
        self.stats.record_pass();

        let mut wiring = self.wiring.lock();
        self.buffer_inputs(&mut wiring);
        let order = effective_order(&wiring, self.registry().contains(ID_FORWARD));

        let mut produced: Option<Packet> = None;
        for method in order {
            if let Some(packet) = self.attempt(&mut wiring, method) {
                produced = Some(packet);
            }
        }

        *self.output.write() = produced.unwrap_or_else(Packet::empty);
    }

    /// Pull one packet per port from the upstream output slots.
    fn buffer_inputs(&self, wiring: &mut Wiring) {
        for i in 0..wiring.upstreams.len() {
            let (port, method, incoming) = {
                let conn = &wiring.upstreams[i];
                (conn.port, conn.method, conn.upstream.output())
            };
            if !incoming.has_value() {
                continue;
            }
            let max_queue = wiring.policy(method).max_queue;
            let buffer = &mut wiring.buffers[port];
            buffer.push_back(incoming);
            if max_queue > 0 {
                while buffer.len() > max_queue {
                    buffer.pop_front();
                    self.stats.record_dropped(1);
                }
            }
        }
    }

    /// Try one method; returns its output packet when it fired and
    /// produced a value.
    fn attempt(&self, wiring: &mut Wiring, method: MethodId) -> Option<Packet> {
        let registry = self.registry().clone();
        let Some(meta) = registry.get(method) else {
            // Lazily-detected assembly mismatch: a connection or a custom
            // order references a method the class never exported.
            tracing::warn!(
                node = self.class_name(),
                %method,
                "no exported method under this id; skipping"
            );
            return None;
        };

        let ports: Vec<usize> = wiring
            .upstreams
            .iter()
            .filter(|conn| conn.method == method)
            .map(|conn| conn.port)
            .collect();

        if ports.len() != meta.arity() {
            tracing::debug!(
                node = self.class_name(),
                method = meta.name,
                ports = ports.len(),
                arity = meta.arity(),
                "skipping method: port count does not match declared arity"
            );
            return None;
        }
        if ports.iter().any(|&p| wiring.buffers[p].is_empty()) {
            return None;
        }
        if wiring.policy(method).sync && !self.align_fronts(wiring, &ports) {
            return None;
        }

        let mut inputs = Vec::with_capacity(ports.len());
        for &port in &ports {
            match wiring.buffers[port].pop_front() {
                Some(packet) => inputs.push(packet),
                None => return None,
            }
        }
        let max_input_ts = inputs.iter().map(Packet::timestamp).max();

        let result = {
            let mut behavior = self.behavior.lock();
            catch_unwind(AssertUnwindSafe(|| {
                (meta.invoker)(behavior.as_any_mut(), &inputs)
            }))
        };

        match result {
            Ok(Ok(packet)) => {
                self.stats.record_invocation();
                if !packet.has_value() {
                    return None;
                }
                let stamp = match max_input_ts {
                    Some(ts) => ts,
                    None if packet.timestamp() == 0 => Packet::now_ns(),
                    None => packet.timestamp(),
                };
                Some(packet.stamped(stamp))
            }
            Ok(Err(err)) => {
                if err.is_conversion() {
                    self.stats.record_conversion_failure();
                } else {
                    self.stats.record_invocation_failure();
                }
                tracing::warn!(
                    node = self.class_name(),
                    method = meta.name,
                    error = %err,
                    "invocation failed; output empty for this pass"
                );
                None
            }
            Err(_) => {
                self.stats.record_invocation_failure();
                tracing::error!(
                    node = self.class_name(),
                    method = meta.name,
                    "invocation panicked; output empty for this pass"
                );
                None
            }
        }
    }

    /// Timestamp alignment for sync-enabled methods. Drops the fronts
    /// carrying the earliest timestamp (at most once per pass) and
    /// reports whether the surviving fronts are aligned and available.
    fn align_fronts(&self, wiring: &mut Wiring, ports: &[usize]) -> bool {
        let Some((t_min, t_max)) = front_span(wiring, ports) else {
            return false;
        };
        if t_min == t_max {
            return true;
        }
        for &port in ports {
            let drop_front = wiring.buffers[port]
                .front()
                .is_some_and(|packet| packet.timestamp() == t_min);
            if drop_front {
                wiring.buffers[port].pop_front();
                self.stats.record_dropped(1);
            }
        }
        match front_span(wiring, ports) {
            Some((lo, hi)) => lo == hi,
            None => false,
        }
    }
}

/// Min and max front timestamps across the ports; `None` when any port is
/// empty.
fn front_span(wiring: &Wiring, ports: &[usize]) -> Option<(i64, i64)> {
    let mut lo = i64::MAX;
    let mut hi = i64::MIN;
    for &port in ports {
        let ts = wiring.buffers[port].front()?.timestamp();
        lo = lo.min(ts);
        hi = hi.max(ts);
    }
    Some((lo, hi))
}

/// Attempt order for a pass: observed-or-custom order with `forward`
/// always last (and always present when the class exports it).
fn effective_order(wiring: &Wiring, has_forward: bool) -> Vec<MethodId> {
    let mut order: Vec<MethodId> = match &wiring.custom_order {
        Some(custom) => custom.clone(),
        None => wiring
            .observed_order
            .iter()
            .copied()
            .filter(|id| *id != ID_FORWARD)
            .collect(),
    };
    if has_forward {
        order.push(ID_FORWARD);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_methods;
    use crate::node::Node;

    struct Echo;

    impl Echo {
        fn forward(&mut self, input: i64) -> i64 {
            input
        }
    }

    export_methods!(Echo, "Echo", {
        fn forward(i64) -> i64;
    });

    struct Join;

    impl Join {
        fn forward(&mut self, a: i64, b: i64) -> i64 {
            a + b
        }
    }

    export_methods!(Join, "Join", {
        fn forward(i64, i64) -> i64;
    });

    #[test]
    fn dispatch_while_idle_is_a_noop() {
        let node = Node::create(Echo);
        node.dispatch();
        assert_eq!(node.stats().passes, 0);
        assert!(!node.output().has_value());
    }

    #[test]
    fn empty_upstream_output_is_not_buffered() {
        let up = Node::create(Echo);
        let down = Node::create(Echo);
        down.add_upstream(&up, "forward");
        down.open(&[]).unwrap();
        down.dispatch();
        assert!(!down.output().has_value());
        assert_eq!(down.stats().invocations, 0);
    }

    #[test]
    fn forward_fires_on_buffered_input_and_stamps_from_input() {
        let up = Node::create(Echo);
        let down = Node::create(Echo);
        down.add_upstream(&up, "");
        down.open(&[]).unwrap();

        up.set_output(Packet::from(7_i64, 123));
        down.dispatch();

        let out = down.output();
        assert_eq!(out.cast::<i64>().unwrap(), 7);
        assert_eq!(out.timestamp(), 123);
    }

    #[test]
    fn output_slot_clears_when_nothing_fires() {
        let up = Node::create(Echo);
        let down = Node::create(Echo);
        down.add_upstream(&up, "");
        down.open(&[]).unwrap();

        up.set_output(Packet::from(7_i64, 1));
        down.dispatch();
        assert!(down.output().has_value());

        up.set_output(Packet::empty());
        down.dispatch();
        assert!(!down.output().has_value());
    }

    #[test]
    fn max_queue_keeps_most_recent() {
        // Only one of forward's two ports is connected, so the arity check
        // skips it every pass and the port buffer accumulates arrivals.
        let up = Node::create(Echo);
        let down = Node::create(Join);
        down.add_upstream(&up, "forward");
        down.set_method_queue_size("forward", 2);
        down.open(&[]).unwrap();

        for value in 1_i64..=3 {
            up.set_output(Packet::from(value, value));
            down.dispatch();
        }

        assert_eq!(down.stats().packets_dropped, 1);
        let kept: Vec<i64> = down
            .buffered(0)
            .iter()
            .map(|p| p.cast::<i64>().unwrap())
            .collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[test]
    fn unknown_target_method_is_skipped_with_warning() {
        let up = Node::create(Echo);
        let down = Node::create(Echo);
        down.add_upstream(&up, "no_such_method");
        down.open(&[]).unwrap();
        up.set_output(Packet::from(1_i64, 1));
        down.dispatch();
        assert!(!down.output().has_value());
    }
}
