//! Built-in node library.
//!
//! Small, ready-made behaviors used by the examples and the test suite,
//! all registered with the global [`NodeFactory`](crate::factory::NodeFactory)
//! through [`register_builtin_nodes`].

mod sinks;
mod sources;
mod transforms;

pub use sinks::{Record, RecordTape, Tally, TallyTape};
pub use sources::{Counter, PairEmitter};
pub use transforms::{JoinBack, Mixed, Multiply, Prefix, ToText};

use crate::factory::{FactoryError, NodeFactory, ParamSpec};

/// Register the built-in classes with the global factory. Safe to call
/// more than once; repeat registrations are ignored.
pub fn register_builtin_nodes() {
    let factory = NodeFactory::global();

    let outcomes = [
        factory.register(
            "Counter",
            vec![
                ParamSpec::with_default("start", 0_i64),
                ParamSpec::with_default("max", 10_i64),
                ParamSpec::with_default("step", 1_i64),
            ],
            |params| {
                Ok(Box::new(Counter::new(
                    params.get("start")?,
                    params.get("max")?,
                    params.get("step")?,
                )))
            },
        ),
        factory.register(
            "PairEmitter",
            vec![
                ParamSpec::with_default("start", 0_i64),
                ParamSpec::with_default("max", 5_i64),
            ],
            |params| {
                Ok(Box::new(PairEmitter::new(
                    params.get("start")?,
                    params.get("max")?,
                )))
            },
        ),
        factory.register(
            "Multiply",
            vec![ParamSpec::with_default("factor", 2_i64)],
            |params| Ok(Box::new(Multiply::new(params.get("factor")?))),
        ),
        factory.register("ToText", vec![], |_| Ok(Box::new(ToText))),
        factory.register(
            "Prefix",
            vec![ParamSpec::with_default(
                "prefix",
                String::from("[Prefix] "),
            )],
            |params| Ok(Box::new(Prefix::new(params.get::<String>("prefix")?))),
        ),
        factory.register("JoinBack", vec![], |_| Ok(Box::new(JoinBack))),
        factory.register("Mixed", vec![], |_| Ok(Box::new(Mixed::default()))),
    ];

    for outcome in outcomes {
        match outcome {
            Ok(()) | Err(FactoryError::Duplicate { .. }) => {}
            Err(err) => tracing::warn!(error = %err, "builtin node registration failed"),
        }
    }
}
