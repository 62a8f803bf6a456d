//! The type system: runtime type identity, type-erased values, timestamped
//! packets, and the pairwise converter registry.
//!
//! These are the leaves of the engine. Everything above them — invokers,
//! dispatch, validation, the factory — moves data as [`Packet`]s and asks
//! [`ValueBox::cast`] to recover concrete types, so the cast policy defined
//! here (exact match, then registered converter, then numeric coercion) is
//! the single path from erased payloads back to typed values.

pub mod convert;
pub mod descriptor;
pub mod packet;
pub mod value;

pub use convert::ConverterRegistry;
pub use descriptor::TypeDesc;
pub use packet::Packet;
pub use value::{CastError, ValueBox};
