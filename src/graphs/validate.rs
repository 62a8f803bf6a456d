//! Connection validation: upstream output types against declared argument
//! types.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::ID_FORWARD;
use crate::typesys::ConverterRegistry;

use super::assembler::ExecutionGraph;

/// One problem found by [`ExecutionGraph::validate`].
#[derive(Debug, Error, Diagnostic)]
pub enum ValidationIssue {
    /// A connection targets a method the class does not export.
    #[error("'{node}' connects port {port} to unknown method {method}")]
    #[diagnostic(code(easywork::graphs::unknown_target_method))]
    UnknownTargetMethod {
        node: String,
        method: String,
        port: usize,
    },

    /// More ports feed a method than it declares arguments.
    #[error("'{node}' method '{method}' has more ports than its {arity} declared argument(s)")]
    #[diagnostic(code(easywork::graphs::too_many_ports))]
    TooManyPorts {
        node: String,
        method: String,
        arity: usize,
    },

    /// The upstream exports no `forward` method, so it produces nothing.
    #[error("upstream '{upstream}' of '{node}' exports no forward method")]
    #[diagnostic(code(easywork::graphs::upstream_not_producer))]
    UpstreamNotProducer { node: String, upstream: String },

    /// Upstream output type is neither equal nor convertible to the
    /// declared argument type.
    #[error(
        "'{node}' method '{method}' port {port} expects {expected}, upstream '{upstream}' produces {actual}"
    )]
    #[diagnostic(
        code(easywork::graphs::type_mismatch),
        help("Register a converter for this pair, or insert an adapting node.")
    )]
    TypeMismatch {
        node: String,
        method: String,
        port: usize,
        expected: String,
        upstream: String,
        actual: String,
    },
}

/// Aggregate of every mismatch found in one validation sweep.
#[derive(Debug, Error, Diagnostic)]
#[error("graph validation failed with {} issue(s)", .issues.len())]
#[diagnostic(code(easywork::graphs::validation))]
pub struct ValidationError {
    #[related]
    pub issues: Vec<ValidationIssue>,
}

impl ExecutionGraph {
    /// Check every connection: the upstream's declared `forward` return
    /// type must be equal or convertible (via the converter registry) to
    /// the target method's declared argument type at that port. All
    /// mismatches are collected before failing.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let converters = ConverterRegistry::global();
        let mut issues = Vec::new();

        for node in self.nodes() {
            let registry = node.registry().clone();
            // Positional argument index per method: the n-th port bound to
            // a method feeds its n-th declared argument.
            let mut arg_cursor: rustc_hash::FxHashMap<crate::types::MethodId, usize> =
                rustc_hash::FxHashMap::default();

            for conn in node.connections() {
                let arg_index = {
                    let cursor = arg_cursor.entry(conn.method).or_insert(0);
                    let current = *cursor;
                    *cursor += 1;
                    current
                };

                let Some(meta) = registry.get(conn.method) else {
                    issues.push(ValidationIssue::UnknownTargetMethod {
                        node: node.class_name().to_string(),
                        method: conn.method.to_string(),
                        port: conn.port,
                    });
                    continue;
                };

                if arg_index >= meta.arity() {
                    issues.push(ValidationIssue::TooManyPorts {
                        node: node.class_name().to_string(),
                        method: meta.name.to_string(),
                        arity: meta.arity(),
                    });
                    continue;
                }

                let Some(producer) = conn.upstream.registry().get(ID_FORWARD) else {
                    issues.push(ValidationIssue::UpstreamNotProducer {
                        node: node.class_name().to_string(),
                        upstream: conn.upstream.class_name().to_string(),
                    });
                    continue;
                };

                let expected = &meta.arg_types[arg_index];
                let actual = &producer.return_type;
                if actual != expected && !converters.has(actual, expected) {
                    issues.push(ValidationIssue::TypeMismatch {
                        node: node.class_name().to_string(),
                        method: meta.name.to_string(),
                        port: conn.port,
                        expected: expected.name(),
                        upstream: conn.upstream.class_name().to_string(),
                        actual: actual.name(),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_methods;
    use crate::node::Node;

    struct IntTick;

    impl IntTick {
        fn forward(&mut self) -> Option<i64> {
            Some(1)
        }
    }

    export_methods!(IntTick, "IntTick", {
        fn forward() -> Option<i64>;
    });

    struct WantsText;

    impl WantsText {
        fn forward(&mut self, text: String) -> String {
            text
        }
    }

    export_methods!(WantsText, "WantsText", {
        fn forward(String) -> String;
    });

    struct WantsFloat;

    impl WantsFloat {
        fn forward(&mut self, value: f64) -> f64 {
            value
        }
    }

    export_methods!(WantsFloat, "WantsFloat", {
        fn forward(f64) -> f64;
    });

    #[test]
    fn equal_and_convertible_types_pass() {
        let source = Node::create(IntTick);
        let coerced = Node::create(WantsFloat);
        coerced.add_upstream(&source, "forward");

        let mut graph = ExecutionGraph::new();
        graph.add_node(&source).add_node(&coerced);
        graph.validate().unwrap();
    }

    #[test]
    fn mismatch_names_node_method_and_port() {
        let source = Node::create(IntTick);
        let sink = Node::create(WantsText);
        sink.add_upstream(&source, "forward");

        let mut graph = ExecutionGraph::new();
        graph.add_node(&source).add_node(&sink);
        let err = graph.validate().unwrap_err();
        assert_eq!(err.issues.len(), 1);
        let text = err.issues[0].to_string();
        assert!(text.contains("WantsText"));
        assert!(text.contains("port 0"));
        assert!(text.contains("String"));
        assert!(text.contains("i64"));
    }

    #[test]
    fn unknown_target_method_is_reported() {
        let source = Node::create(IntTick);
        let sink = Node::create(WantsText);
        sink.add_upstream(&source, "configure");

        let mut graph = ExecutionGraph::new();
        graph.add_node(&source).add_node(&sink);
        let err = graph.validate().unwrap_err();
        assert!(matches!(
            err.issues[0],
            ValidationIssue::UnknownTargetMethod { .. }
        ));
    }

    #[test]
    fn surplus_ports_are_reported() {
        let source = Node::create(IntTick);
        let other = Node::create(IntTick);
        let sink = Node::create(WantsFloat);
        sink.add_upstream(&source, "forward");
        sink.add_upstream(&other, "forward");

        let mut graph = ExecutionGraph::new();
        graph.add_node(&source).add_node(&other).add_node(&sink);
        let err = graph.validate().unwrap_err();
        assert!(matches!(err.issues[0], ValidationIssue::TooManyPorts { .. }));
    }
}
