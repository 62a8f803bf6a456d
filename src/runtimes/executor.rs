//! Drives repeated passes of an assembled task graph.

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::instrument;

use crate::graphs::ExecutionGraph;
use crate::methods::InvokeError;
use crate::node::Node;

/// Errors from the execution loop.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// The graph has no precedence plan; connect() has not run (or
    /// failed).
    #[error("graph is not assembled; run build() and connect() first")]
    #[diagnostic(
        code(easywork::runtimes::not_assembled),
        help("Call graph.assemble() (or reset/build/connect) before run().")
    )]
    NotAssembled,

    /// A worker task failed to join.
    #[error("node task join error: {0}")]
    #[diagnostic(code(easywork::runtimes::join))]
    Join(#[from] JoinError),

    /// Open or close of a node failed.
    #[error("lifecycle call on '{node}' failed: {source}")]
    #[diagnostic(code(easywork::runtimes::lifecycle))]
    Lifecycle {
        node: String,
        #[source]
        source: InvokeError,
    },
}

/// Pass-looping driver over an assembled [`ExecutionGraph`].
///
/// One iteration runs every task once, honoring precedence: levels run in
/// order, and the nodes inside a level run concurrently. The loop repeats
/// until the graph's cooperative-stop flag is cleared; the pass in flight
/// always completes, so the sink of a pipeline sees every packet emitted
/// before the stop.
///
/// Sources decide termination: one iteration is one tick of the pipeline,
/// and a source that is done calls
/// [`FlowControl::stop`](crate::node::FlowControl::stop).
///
/// # Examples
///
/// ```rust,no_run
/// # async fn demo(mut graph: easywork::graphs::ExecutionGraph,
/// #               nodes: Vec<std::sync::Arc<easywork::node::Node>>) -> miette::Result<()> {
/// use easywork::runtimes::Executor;
///
/// graph.assemble().map_err(|e| miette::Report::new(e))?;
/// let executor = Executor::new();
/// executor.open(&nodes).map_err(|e| miette::Report::new(e))?;
/// executor.run(&graph).await.map_err(|e| miette::Report::new(e))?;
/// executor.close(&nodes).map_err(|e| miette::Report::new(e))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Executor {
    _private: (),
}

impl Executor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open nodes in declared order, forwarding no arguments. Arguments
    /// for `Open` hooks go through [`Node::open`] directly.
    pub fn open(&self, nodes: &[Arc<Node>]) -> Result<(), ExecutorError> {
        for node in nodes {
            node.open(&[]).map_err(|source| ExecutorError::Lifecycle {
                node: node.class_name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Close nodes in reverse order.
    pub fn close(&self, nodes: &[Arc<Node>]) -> Result<(), ExecutorError> {
        for node in nodes.iter().rev() {
            node.close(&[]).map_err(|source| ExecutorError::Lifecycle {
                node: node.class_name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Run the graph until some node requests a stop. Re-arms the stop
    /// flag on entry, so a graph can be run repeatedly.
    #[instrument(skip(self, graph), err)]
    pub async fn run(&self, graph: &ExecutionGraph) -> Result<(), ExecutorError> {
        let plan = graph.plan().ok_or(ExecutorError::NotAssembled)?.clone();
        if plan.levels().is_empty() {
            tracing::warn!("run on an empty graph; nothing to drive");
            return Ok(());
        }
        let nodes: Vec<Arc<Node>> = graph.nodes().to_vec();
        graph.arm_stop_flag();

        let mut passes: u64 = 0;
        loop {
            for level in plan.levels() {
                if level.len() == 1 {
                    nodes[level[0]].dispatch();
                    continue;
                }
                let mut workers: JoinSet<()> = JoinSet::new();
                for &task in level {
                    let node = Arc::clone(&nodes[task]);
                    workers.spawn(async move { node.dispatch() });
                }
                while let Some(joined) = workers.join_next().await {
                    joined?;
                }
            }
            passes += 1;
            if !graph.keep_running() {
                break;
            }
        }
        tracing::debug!(passes, "executor finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_methods;
    use crate::graphs::ExecutionGraph;
    use crate::node::FlowControl;

    struct CountDown {
        remaining: u32,
        control: FlowControl,
    }

    impl CountDown {
        fn forward(&mut self) -> Option<i64> {
            if self.remaining == 0 {
                self.control.stop();
                return None;
            }
            self.remaining -= 1;
            Some(i64::from(self.remaining))
        }
    }

    export_methods!(CountDown, "CountDown", control = control, {
        fn forward() -> Option<i64>;
    });

    #[tokio::test]
    async fn run_requires_an_assembled_graph() {
        let graph = ExecutionGraph::new();
        let executor = Executor::new();
        assert!(matches!(
            executor.run(&graph).await,
            Err(ExecutorError::NotAssembled)
        ));
    }

    #[tokio::test]
    async fn run_exits_when_a_source_stops() {
        let source = Node::create(CountDown {
            remaining: 3,
            control: FlowControl::default(),
        });
        let mut graph = ExecutionGraph::new();
        graph.add_node(&source);
        graph.assemble().unwrap();

        let executor = Executor::new();
        executor.open(&[Arc::clone(&source)]).unwrap();
        executor.run(&graph).await.unwrap();
        executor.close(&[Arc::clone(&source)]).unwrap();

        // Three producing passes plus the stopping pass.
        assert_eq!(source.stats().passes, 4);
        assert!(!source.is_open());
    }
}
