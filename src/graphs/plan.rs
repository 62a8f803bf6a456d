//! The precedence plan: topological levels over the task graph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::toposort;

/// Task indices grouped into precedence levels.
///
/// Level `k` contains every task whose longest chain of predecessors has
/// length `k`. Tasks in the same level share no precedence constraint and
/// may run concurrently; levels run in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    levels: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    /// Layer `task_count` tasks connected by `edges`
    /// (`(upstream, downstream)` pairs). Returns the index of a task on a
    /// cycle on failure.
    pub(crate) fn layered(task_count: usize, edges: &[(usize, usize)]) -> Result<Self, usize> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(task_count, edges.len());
        let indices: Vec<NodeIndex> = (0..task_count).map(|task| graph.add_node(task)).collect();
        for &(from, to) in edges {
            // Parallel edges (several ports on the same pair) collapse into
            // one precedence constraint.
            if !graph.contains_edge(indices[from], indices[to]) {
                graph.add_edge(indices[from], indices[to], ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| graph[cycle.node_id()])?;

        let mut depth = vec![0usize; task_count];
        let mut max_depth = 0usize;
        for index in &sorted {
            let task = graph[*index];
            let level = graph
                .neighbors_directed(*index, petgraph::Direction::Incoming)
                .map(|pred| depth[graph[pred]] + 1)
                .max()
                .unwrap_or(0);
            depth[task] = level;
            max_depth = max_depth.max(level);
        }

        let mut levels = vec![Vec::new(); max_depth + 1];
        for task in 0..task_count {
            levels[depth[task]].push(task);
        }
        levels.retain(|level| !level.is_empty());
        Ok(Self { levels })
    }

    /// The levels, upstream-most first.
    #[must_use]
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    /// Total task count across levels.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}
