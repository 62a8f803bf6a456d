//! The runtime node: behavior object, connections, buffers, policies, and
//! lifecycle.
//!
//! A [`Node`] is a vertex in the execution graph. It owns a type-erased
//! behavior object (any type implementing [`NodeClass`], normally via
//! [`export_methods!`](crate::export_methods)), the list of upstream
//! connections with one FIFO packet buffer per port, the per-method
//! dispatch policies, a single output slot, and the opened flag.
//!
//! # Lifecycle
//!
//! ```text
//! idle --open--> opened --close--> idle
//! opened --dispatch (many)--> opened
//! ```
//!
//! Illegal transitions (dispatch while idle, double open, double close) are
//! warn-level no-ops.
//!
//! # Examples
//!
//! ```rust
//! use easywork::export_methods;
//! use easywork::node::Node;
//! use easywork::typesys::Packet;
//!
//! struct Adder {
//!     offset: i64,
//! }
//!
//! impl Adder {
//!     fn forward(&mut self, input: i64) -> i64 {
//!         input + self.offset
//!     }
//! }
//!
//! export_methods!(Adder, "Adder", {
//!     fn forward(i64) -> i64;
//! });
//!
//! let node = Node::create(Adder { offset: 10 });
//! // Eager, out-of-graph invocation:
//! let out = node.invoke("forward", &[Packet::carrying(5_i64)]).unwrap();
//! assert_eq!(out.cast::<i64>().unwrap(), 15);
//! ```

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::methods::{InvokeError, MethodRegistry};
use crate::stats::{DispatchStats, StatsSnapshot};
use crate::types::{resolve_method_name, MethodId, ID_CLOSE, ID_OPEN};
use crate::typesys::{ConverterRegistry, Packet, TypeDesc};

/// Handle to a node's slot in the assembled task graph. Allocated by the
/// build phase, consumed by connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Cooperative-stop handle bound into nodes at build time.
///
/// `stop()` clears the owning graph's keep-running flag; the executor exits
/// after the pass in flight completes. A default (unbound) control ignores
/// `stop()`, which keeps behaviors usable in eager, out-of-graph calls.
#[derive(Clone, Default)]
pub struct FlowControl {
    keep_running: Option<Arc<AtomicBool>>,
}

impl FlowControl {
    pub(crate) fn bound(keep_running: Arc<AtomicBool>) -> Self {
        Self {
            keep_running: Some(keep_running),
        }
    }

    /// Request cooperative stop. In-flight passes always run to completion.
    pub fn stop(&self) {
        match &self.keep_running {
            Some(flag) => flag.store(false, Ordering::Relaxed),
            None => tracing::debug!("stop() on an unbound FlowControl is a no-op"),
        }
    }

    /// `true` once this control is attached to a graph.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.keep_running.is_some()
    }
}

impl fmt::Debug for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FlowControl({})",
            if self.is_bound() { "bound" } else { "unbound" }
        )
    }
}

/// A node behavior: the user-defined object whose methods the engine
/// dispatches.
///
/// Implemented by [`export_methods!`](crate::export_methods); implement it
/// by hand only for classes whose registry must be built per instance
/// (the tuple projection nodes do this).
pub trait NodeClass: Send + 'static {
    /// Public class name, used in factory registration and reports.
    fn class_name(&self) -> &'static str;

    /// The class-level method registry.
    fn registry(&self) -> Arc<MethodRegistry>;

    /// Called at build time with the graph's stop handle. The default
    /// ignores it; classes that need [`FlowControl::stop`] store it.
    fn bind_control(&mut self, _control: FlowControl) {}

    /// Downcast access for the type-erased invokers.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One upstream connection: which node feeds this port, and which of this
/// node's methods the port belongs to.
#[derive(Clone)]
pub struct UpstreamConnection {
    /// The producing node.
    pub upstream: Arc<Node>,
    /// Target method on the owning node.
    pub method: MethodId,
    /// Position in the owning node's connection list.
    pub port: usize,
}

/// Per-method dispatch policy. Settable at any time; changes take effect
/// at the next pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MethodPolicy {
    /// Require equal front timestamps across all of the method's ports.
    pub sync: bool,
    /// Port buffer bound for this method's ports; 0 means unbounded.
    pub max_queue: usize,
}

/// Connection and policy state, guarded by one lock because every field is
/// read and written together by the dispatch pass.
pub(crate) struct Wiring {
    pub(crate) upstreams: Vec<UpstreamConnection>,
    pub(crate) buffers: Vec<VecDeque<Packet>>,
    pub(crate) policies: FxHashMap<MethodId, MethodPolicy>,
    /// Distinct method ids in the order connections first referenced them.
    pub(crate) observed_order: Vec<MethodId>,
    /// Explicit override from `set_method_order`; survives
    /// `clear_upstreams`.
    pub(crate) custom_order: Option<Vec<MethodId>>,
}

impl Wiring {
    fn new() -> Self {
        Self {
            upstreams: Vec::new(),
            buffers: Vec::new(),
            policies: FxHashMap::default(),
            observed_order: Vec::new(),
            custom_order: None,
        }
    }

    pub(crate) fn policy(&self, method: MethodId) -> MethodPolicy {
        self.policies.get(&method).copied().unwrap_or_default()
    }
}

/// A vertex in the execution graph.
pub struct Node {
    class_name: &'static str,
    registry: Arc<MethodRegistry>,
    pub(crate) behavior: Mutex<Box<dyn NodeClass>>,
    pub(crate) wiring: Mutex<Wiring>,
    pub(crate) output: RwLock<Packet>,
    opened: AtomicBool,
    task: Mutex<Option<TaskHandle>>,
    control: Mutex<FlowControl>,
    pub(crate) stats: DispatchStats,
}

impl Node {
    /// Wrap a behavior into a runtime node.
    #[must_use]
    pub fn create<C: NodeClass>(behavior: C) -> Arc<Node> {
        Self::from_behavior(Box::new(behavior))
    }

    /// Wrap an already-boxed behavior (the factory path).
    #[must_use]
    pub fn from_behavior(behavior: Box<dyn NodeClass>) -> Arc<Node> {
        let class_name = behavior.class_name();
        let registry = behavior.registry();
        Arc::new(Node {
            class_name,
            registry,
            behavior: Mutex::new(behavior),
            wiring: Mutex::new(Wiring::new()),
            output: RwLock::new(Packet::empty()),
            opened: AtomicBool::new(false),
            task: Mutex::new(None),
            control: Mutex::new(FlowControl::default()),
            stats: DispatchStats::default(),
        })
    }

    /// Public class name.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// The class-level method registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Connect an upstream node to one of this node's methods. An empty
    /// method name (or `"forward"`) targets the canonical data method.
    /// The new port's index is the position in the connection list.
    pub fn add_upstream(&self, upstream: &Arc<Node>, method: &str) {
        let id = resolve_method_name(method);
        let mut wiring = self.wiring.lock();
        let port = wiring.upstreams.len();
        wiring.upstreams.push(UpstreamConnection {
            upstream: Arc::clone(upstream),
            method: id,
            port,
        });
        wiring.buffers.push(VecDeque::new());
        if !wiring.observed_order.contains(&id) {
            wiring.observed_order.push(id);
        }
    }

    /// Drop all connections and buffered packets. A customized method
    /// order set via [`set_method_order`](Self::set_method_order) survives.
    pub fn clear_upstreams(&self) {
        let mut wiring = self.wiring.lock();
        wiring.upstreams.clear();
        wiring.buffers.clear();
        wiring.observed_order.clear();
    }

    /// The upstream nodes, in port order.
    #[must_use]
    pub fn upstreams(&self) -> Vec<Arc<Node>> {
        self.wiring
            .lock()
            .upstreams
            .iter()
            .map(|conn| Arc::clone(&conn.upstream))
            .collect()
    }

    /// Snapshot of the connections (upstream, target method, port).
    #[must_use]
    pub fn connections(&self) -> Vec<UpstreamConnection> {
        self.wiring.lock().upstreams.clone()
    }

    /// Buffered packet count per port, in port order. Introspection for
    /// tools and tests.
    #[must_use]
    pub fn buffer_depths(&self) -> Vec<usize> {
        self.wiring
            .lock()
            .buffers
            .iter()
            .map(VecDeque::len)
            .collect()
    }

    /// Clone of one port's buffered packets, oldest first.
    #[must_use]
    pub fn buffered(&self, port: usize) -> Vec<Packet> {
        self.wiring
            .lock()
            .buffers
            .get(port)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------

    /// Override the per-pass method attempt order. `forward` is forced
    /// last regardless of its position in `names`.
    pub fn set_method_order(&self, names: &[&str]) {
        let ids: Vec<MethodId> = names
            .iter()
            .map(|name| resolve_method_name(name))
            .filter(|id| *id != crate::types::ID_FORWARD)
            .collect();
        self.wiring.lock().custom_order = Some(ids);
    }

    /// Enable or disable timestamp alignment for a method's ports.
    pub fn set_method_sync(&self, method: &str, enabled: bool) {
        let id = resolve_method_name(method);
        let mut wiring = self.wiring.lock();
        wiring.policies.entry(id).or_default().sync = enabled;
    }

    /// Bound the FIFO buffers of a method's ports; 0 means unbounded.
    /// When full, the oldest packet is dropped.
    pub fn set_method_queue_size(&self, method: &str, max_queue: usize) {
        let id = resolve_method_name(method);
        let mut wiring = self.wiring.lock();
        wiring.policies.entry(id).or_default().max_queue = max_queue;
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the node. Invokes the `Open` hook when the class exports one
    /// (a missing hook is not an error). Opening an already-open node is a
    /// warn-level no-op.
    pub fn open(&self, args: &[Packet]) -> Result<(), InvokeError> {
        if self.opened.load(Ordering::Acquire) {
            tracing::warn!(node = self.class_name, "open() on an already-open node");
            return Ok(());
        }
        if self.registry.contains(ID_OPEN) {
            self.invoke_id(ID_OPEN, args)?;
        }
        self.opened.store(true, Ordering::Release);
        Ok(())
    }

    /// Close the node. Invokes the `Close` hook when present. Closing an
    /// idle node is a warn-level no-op.
    pub fn close(&self, args: &[Packet]) -> Result<(), InvokeError> {
        if !self.opened.load(Ordering::Acquire) {
            tracing::warn!(node = self.class_name, "close() on a node that is not open");
            return Ok(());
        }
        if self.registry.contains(ID_CLOSE) {
            self.invoke_id(ID_CLOSE, args)?;
        }
        self.opened.store(false, Ordering::Release);
        Ok(())
    }

    /// `true` between `open()` and `close()`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Set the graph's cooperative-stop flag.
    pub fn stop(&self) {
        self.control.lock().stop();
    }

    // ------------------------------------------------------------------
    // Invocation
    // ------------------------------------------------------------------

    /// Public type-erased call by method name. Used by open/close, tools,
    /// tests, and eager front-ends.
    pub fn invoke(&self, method: &str, args: &[Packet]) -> Result<Packet, InvokeError> {
        let id = resolve_method_name(method);
        if !self.registry.contains(id) {
            return Err(InvokeError::UnknownMethod {
                class: self.class_name.to_string(),
                method: method.to_string(),
            });
        }
        self.invoke_id(id, args)
    }

    /// Public type-erased call by method id.
    pub fn invoke_id(&self, id: MethodId, args: &[Packet]) -> Result<Packet, InvokeError> {
        let meta = self
            .registry
            .get(id)
            .ok_or_else(|| InvokeError::UnknownMethod {
                class: self.class_name.to_string(),
                method: id.to_string(),
            })?;
        let mut behavior = self.behavior.lock();
        (meta.invoker)(behavior.as_any_mut(), args)
    }

    /// Eager call with external (JSON) values. Arguments are stamped with
    /// the current time and converted to the declared parameter types by
    /// the invoker; the return value is marshalled back through the
    /// converter registry. A valueless return maps to `null`.
    pub fn invoke_external(
        &self,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, InvokeError> {
        let now = Packet::now_ns();
        let packets: Vec<Packet> = args
            .iter()
            .map(|value| Packet::from(value.clone(), now))
            .collect();
        let result = self.invoke(method, &packets)?;
        if !result.has_value() {
            return Ok(serde_json::Value::Null);
        }
        let target = TypeDesc::of::<serde_json::Value>();
        if result.type_desc() == &target {
            return Ok(result.cast::<serde_json::Value>().unwrap_or_default());
        }
        ConverterRegistry::global()
            .convert(result.value(), &target)
            .and_then(|boxed| boxed.cast::<serde_json::Value>().ok())
            .ok_or_else(|| InvokeError::NoExternalRepresentation {
                method: method.to_string(),
                type_name: result.type_desc().name(),
            })
    }

    // ------------------------------------------------------------------
    // Output slot and reports
    // ------------------------------------------------------------------

    /// The current output slot.
    #[must_use]
    pub fn output(&self) -> Packet {
        self.output.read().clone()
    }

    /// Overwrite the output slot. The dispatcher owns this slot during
    /// execution; external writes are for tools and tests.
    pub fn set_output(&self, packet: Packet) {
        *self.output.write() = packet;
    }

    /// Dispatch statistics for this node.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Serializable description of the class: name, exposed methods, and
    /// per-method signatures.
    #[must_use]
    pub fn type_info(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            class_name: self.class_name.to_string(),
            exposed_methods: self
                .registry
                .exposed_methods()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            methods: self
                .registry
                .iter()
                .map(|(id, meta)| MethodTypeInfo {
                    id: id.raw(),
                    name: meta.name.to_string(),
                    arg_types: meta.arg_types.iter().map(TypeDesc::name).collect(),
                    return_type: meta.return_type.name(),
                })
                .collect(),
        }
    }

    // ------------------------------------------------------------------
    // Graph binding (build phase)
    // ------------------------------------------------------------------

    pub(crate) fn bind_to_graph(&self, control: FlowControl, task: TaskHandle) {
        self.behavior.lock().bind_control(control.clone());
        *self.control.lock() = control;
        *self.task.lock() = Some(task);
    }

    pub(crate) fn clear_task(&self) {
        *self.task.lock() = None;
    }

    pub(crate) fn task(&self) -> Option<TaskHandle> {
        *self.task.lock()
    }

    pub(crate) fn is_opened_relaxed(&self) -> bool {
        self.opened.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("class", &self.class_name)
            .field("open", &self.is_open())
            .field("ports", &self.wiring.lock().upstreams.len())
            .finish()
    }
}

/// Serializable signature report for one method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodTypeInfo {
    /// Stable method id (FNV-1a of the name).
    pub id: u64,
    /// Declared name.
    pub name: String,
    /// Argument type names, positional order.
    pub arg_types: Vec<String>,
    /// Return type name (`()` for unit returns).
    pub return_type: String,
}

/// Serializable description of a node class.
#[derive(Debug, Clone, Serialize)]
pub struct NodeTypeInfo {
    /// Public class name.
    pub class_name: String,
    /// Exported method names in declaration order.
    pub exposed_methods: Vec<String>,
    /// Per-method signatures.
    pub methods: Vec<MethodTypeInfo>,
}

impl NodeTypeInfo {
    /// Signature lookup by method name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodTypeInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}
