//! The execution graph and its two-phase assembly.

use miette::Diagnostic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::node::{FlowControl, Node, TaskHandle};

use super::plan::ExecutionPlan;

/// Errors raised while wiring tasks together.
#[derive(Debug, Error, Diagnostic)]
pub enum AssemblyError {
    /// `connect()` was called before `build()`.
    #[error("connect() called before build()")]
    #[diagnostic(
        code(easywork::graphs::connect_before_build),
        help("Drive the two phases in order: reset, build, connect.")
    )]
    ConnectBeforeBuild,

    /// A registered node has no task; it was added after `build()` ran.
    #[error("node '{node}' has no task; it was added after build()")]
    #[diagnostic(
        code(easywork::graphs::node_not_built),
        help("Re-run assemble() (or build() then connect()) after adding nodes.")
    )]
    NodeNotBuilt { node: String },

    /// A connection references a node with no task, either because build
    /// has not run for it or because it was never added to the graph.
    #[error("upstream '{upstream}' of '{node}' has no task; was it added to the graph before build()?")]
    #[diagnostic(code(easywork::graphs::upstream_not_built))]
    UpstreamNotBuilt { node: String, upstream: String },

    /// The connection set contains a cycle; feedback requires an explicit
    /// buffered indirection node.
    #[error("the graph contains a cycle through '{node}'")]
    #[diagnostic(
        code(easywork::graphs::cycle),
        help("The task graph must be acyclic. Materialize feedback with a delay node.")
    )]
    Cycle { node: String },
}

/// The assembled task graph: registered nodes, the precedence plan, and
/// the cooperative-stop flag.
///
/// # Examples
///
/// ```rust
/// use easywork::export_methods;
/// use easywork::graphs::ExecutionGraph;
/// use easywork::node::{FlowControl, Node};
///
/// struct Once {
///     fired: bool,
///     control: FlowControl,
/// }
///
/// impl Once {
///     fn forward(&mut self) -> Option<i64> {
///         if self.fired {
///             self.control.stop();
///             return None;
///         }
///         self.fired = true;
///         Some(1)
///     }
/// }
///
/// export_methods!(Once, "Once", control = control, {
///     fn forward() -> Option<i64>;
/// });
///
/// let source = Node::create(Once { fired: false, control: FlowControl::default() });
/// let mut graph = ExecutionGraph::new();
/// graph.add_node(&source);
/// graph.build();
/// graph.connect().unwrap();
/// ```
pub struct ExecutionGraph {
    nodes: Vec<Arc<Node>>,
    plan: Option<ExecutionPlan>,
    keep_running: Arc<AtomicBool>,
    built: bool,
}

impl Default for ExecutionGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionGraph {
    /// An empty graph with the stop flag armed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            plan: None,
            keep_running: Arc::new(AtomicBool::new(true)),
            built: false,
        }
    }

    /// Register a node. Adding the same node twice is a no-op.
    pub fn add_node(&mut self, node: &Arc<Node>) -> &mut Self {
        if !self.nodes.iter().any(|n| Arc::ptr_eq(n, node)) {
            self.nodes.push(Arc::clone(node));
        }
        self
    }

    /// Registered nodes, in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Clear tasks, edges, and the plan, and re-arm the stop flag. The
    /// node set and their upstream lists are preserved.
    pub fn reset(&mut self) {
        for node in &self.nodes {
            node.clear_task();
        }
        self.plan = None;
        self.built = false;
        self.keep_running.store(true, Ordering::Relaxed);
    }

    /// Phase 1: allocate a task per node and bind the stop control into
    /// each node and its behavior. No edges exist yet.
    pub fn build(&mut self) {
        for (index, node) in self.nodes.iter().enumerate() {
            let control = FlowControl::bound(Arc::clone(&self.keep_running));
            node.bind_to_graph(control, TaskHandle(index));
        }
        self.built = true;
        self.plan = None;
    }

    /// Phase 2: install precedence edges from every upstream's task to
    /// its consumer's task, reject cycles, and compute the level plan.
    pub fn connect(&mut self) -> Result<(), AssemblyError> {
        if !self.built {
            return Err(AssemblyError::ConnectBeforeBuild);
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for node in &self.nodes {
            let Some(task) = node.task() else {
                return Err(AssemblyError::NodeNotBuilt {
                    node: node.class_name().to_string(),
                });
            };
            for conn in node.connections() {
                let upstream_task =
                    conn.upstream
                        .task()
                        .ok_or_else(|| AssemblyError::UpstreamNotBuilt {
                            node: node.class_name().to_string(),
                            upstream: conn.upstream.class_name().to_string(),
                        })?;
                edges.push((upstream_task.index(), task.index()));
            }
        }

        let plan = ExecutionPlan::layered(self.nodes.len(), &edges).map_err(|index| {
            AssemblyError::Cycle {
                node: self
                    .nodes
                    .get(index)
                    .map(|n| n.class_name().to_string())
                    .unwrap_or_default(),
            }
        })?;
        self.plan = Some(plan);
        Ok(())
    }

    /// Reset → build → connect in one call; safe to drive repeatedly.
    pub fn assemble(&mut self) -> Result<(), AssemblyError> {
        self.reset();
        self.build();
        self.connect()
    }

    /// The precedence plan, present after a successful `connect`.
    #[must_use]
    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    /// `true` until some node requests a stop.
    #[must_use]
    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::Relaxed)
    }

    /// Set the cooperative-stop flag; the executor exits after the pass
    /// in flight.
    pub fn request_stop(&self) {
        self.keep_running.store(false, Ordering::Relaxed);
    }

    pub(crate) fn arm_stop_flag(&self) {
        self.keep_running.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_methods;

    struct Pass;

    impl Pass {
        fn forward(&mut self, input: i64) -> i64 {
            input
        }
    }

    export_methods!(Pass, "Pass", {
        fn forward(i64) -> i64;
    });

    struct Tick;

    impl Tick {
        fn forward(&mut self) -> Option<i64> {
            Some(0)
        }
    }

    export_methods!(Tick, "Tick", {
        fn forward() -> Option<i64>;
    });

    #[test]
    fn connect_before_build_is_rejected() {
        let mut graph = ExecutionGraph::new();
        graph.add_node(&Node::create(Tick));
        assert!(matches!(
            graph.connect(),
            Err(AssemblyError::ConnectBeforeBuild)
        ));
    }

    #[test]
    fn connect_requires_upstream_tasks() {
        let source = Node::create(Tick);
        let sink = Node::create(Pass);
        sink.add_upstream(&source, "forward");

        // The source was never added to the graph, so it has no task.
        let mut graph = ExecutionGraph::new();
        graph.add_node(&sink);
        graph.build();
        assert!(matches!(
            graph.connect(),
            Err(AssemblyError::UpstreamNotBuilt { .. })
        ));
    }

    #[test]
    fn cycles_are_rejected() {
        let a = Node::create(Pass);
        let b = Node::create(Pass);
        a.add_upstream(&b, "forward");
        b.add_upstream(&a, "forward");

        let mut graph = ExecutionGraph::new();
        graph.add_node(&a).add_node(&b);
        graph.build();
        assert!(matches!(graph.connect(), Err(AssemblyError::Cycle { .. })));
    }

    #[test]
    fn assemble_is_repeatable() {
        let source = Node::create(Tick);
        let sink = Node::create(Pass);
        sink.add_upstream(&source, "forward");

        let mut graph = ExecutionGraph::new();
        graph.add_node(&source).add_node(&sink);

        graph.assemble().unwrap();
        let first: Vec<Vec<usize>> = graph.plan().unwrap().levels().to_vec();
        graph.request_stop();

        graph.assemble().unwrap();
        let second: Vec<Vec<usize>> = graph.plan().unwrap().levels().to_vec();
        assert_eq!(first, second);
        assert!(graph.keep_running());
    }

    #[test]
    fn duplicate_add_node_is_ignored() {
        let node = Node::create(Tick);
        let mut graph = ExecutionGraph::new();
        graph.add_node(&node).add_node(&node);
        assert_eq!(graph.nodes().len(), 1);
    }
}
