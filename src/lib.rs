//! ```text
//! NodeFactory ──► Node (behavior + MethodRegistry)
//!                  │
//!                  │ add_upstream (ports)
//!                  ▼
//! ExecutionGraph ──► build ──► connect ──► ExecutionPlan
//!                  │                        │
//!                  │                        ▼
//!                  │            Executor ─► dispatch pass per node
//!                  │                        │  buffer → order → sync
//!                  │                        │  → convert → invoke
//!                  │                        ▼
//!                  └── FlowControl ◄── output slot / Packet
//! ```
//!
//! EasyWork is a dataflow graph execution engine: typed nodes with
//! heterogeneous method signatures, type-erased packets with timestamp
//! synchronization, per-method dispatch policies, two-phase graph
//! assembly, and a pass-looping executor with cooperative stop. Start
//! with [`node::Node`], [`graphs::ExecutionGraph`], and
//! [`runtimes::Executor`].

pub mod dispatch;
pub mod factory;
pub mod graphs;
pub mod methods;
pub mod node;
pub mod nodes;
pub mod runtimes;
pub mod stats;
pub mod tuples;
pub mod types;
pub mod typesys;
