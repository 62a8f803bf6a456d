//! Structured outputs: registered tuple types and synthesized projection
//! nodes.
//!
//! A method that returns a compound value (a tuple) can be destructured by
//! the front-end. The tuple type is registered once; the registry records
//! its arity and a factory that, given an element index, fabricates a
//! projection node whose `forward` takes the tuple and returns that
//! element. The front-end inserts one projection node per extracted index
//! between the producer and each consumer; the engine then treats them as
//! ordinary nodes.
//!
//! # Examples
//!
//! ```rust
//! use easywork::tuples::{create_get_node, register_tuple_type, tuple_size};
//! use easywork::typesys::{Packet, TypeDesc};
//!
//! register_tuple_type::<(i64, String)>();
//! let desc = TypeDesc::of::<(i64, String)>();
//! assert_eq!(tuple_size(&desc).unwrap(), 2);
//!
//! let second = create_get_node(&desc, 1).unwrap();
//! second.open(&[]).unwrap();
//! let out = second
//!     .invoke("forward", &[Packet::carrying((7_i64, String::from("seven")))])
//!     .unwrap();
//! assert_eq!(out.cast::<String>().unwrap(), "seven");
//! ```

use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::methods::{InvokeError, Invoker, MethodRegistry};
use crate::node::{Node, NodeClass};
use crate::typesys::{Packet, TypeDesc, ValueBox};

/// Errors from the tuple registry.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum TupleError {
    /// The compound type was never registered.
    #[error("tuple type {type_name} is not registered")]
    #[diagnostic(
        code(easywork::tuples::unregistered),
        help("Call register_tuple_type::<T>() before destructuring values of T.")
    )]
    Unregistered { type_name: String },

    /// The element index exceeds the tuple's arity.
    #[error("index {index} out of range for {type_name} (arity {arity})")]
    #[diagnostic(code(easywork::tuples::index_out_of_range))]
    IndexOutOfRange {
        type_name: String,
        index: usize,
        arity: usize,
    },
}

/// A compound value the engine can decompose: fixed arity, per-element
/// descriptors, and boxed element extraction.
pub trait TupleValue: Clone + Send + Sync + 'static {
    /// Number of elements.
    const ARITY: usize;

    /// Element descriptors, in positional order.
    fn element_descs() -> Vec<TypeDesc>;

    /// Clone element `index` into a box. Out-of-range indices yield an
    /// empty box; the registry guards the range before nodes are built.
    fn element(&self, index: usize) -> ValueBox;
}

macro_rules! impl_tuple_value {
    ($( $name:ident : $idx:tt ),+) => {
        impl<$($name),+> TupleValue for ($($name,)+)
        where
            $($name: Clone + Send + Sync + 'static),+
        {
            const ARITY: usize = [$( stringify!($name) ),+].len();

            fn element_descs() -> Vec<TypeDesc> {
                vec![$( TypeDesc::of::<$name>() ),+]
            }

            fn element(&self, index: usize) -> ValueBox {
                match index {
                    $( $idx => ValueBox::new(self.$idx.clone()), )+
                    _ => ValueBox::empty(),
                }
            }
        }
    };
}

impl_tuple_value!(A: 0);
impl_tuple_value!(A: 0, B: 1);
impl_tuple_value!(A: 0, B: 1, C: 2);
impl_tuple_value!(A: 0, B: 1, C: 2, D: 3);

/// Projection behavior: `forward` takes the tuple, returns element
/// `index`. Its registry is built per instance because the return
/// descriptor depends on the index.
struct TupleGet<T: TupleValue> {
    registry: Arc<MethodRegistry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TupleValue> TupleGet<T> {
    fn new(index: usize) -> Self {
        let invoker: Invoker = Arc::new(move |_behavior, packets| {
            if packets.len() != 1 {
                return Err(InvokeError::ArityMismatch {
                    method: "forward",
                    expected: 1,
                    got: packets.len(),
                });
            }
            let tuple: T = packets[0].cast::<T>().map_err(|source| InvokeError::Argument {
                method: "forward",
                index: 0,
                source,
            })?;
            Ok(Packet::from_value(tuple.element(index), 0))
        });
        let registry = MethodRegistry::builder("TupleGet")
            .method(
                "forward",
                invoker,
                vec![TypeDesc::of::<T>()],
                T::element_descs()[index].clone(),
            )
            .build();
        Self {
            registry: Arc::new(registry),
            _marker: PhantomData,
        }
    }
}

impl<T: TupleValue> NodeClass for TupleGet<T> {
    fn class_name(&self) -> &'static str {
        "TupleGet"
    }

    fn registry(&self) -> Arc<MethodRegistry> {
        Arc::clone(&self.registry)
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

struct TupleEntry {
    arity: usize,
    type_name: String,
    factory: Arc<dyn Fn(usize) -> Arc<Node> + Send + Sync>,
}

/// Process-global table of registered tuple types.
pub struct TupleRegistry {
    table: RwLock<FxHashMap<TypeId, TupleEntry>>,
}

impl TupleRegistry {
    /// The process-global registry.
    pub fn global() -> &'static TupleRegistry {
        static GLOBAL: OnceLock<TupleRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| TupleRegistry {
            table: RwLock::new(FxHashMap::default()),
        })
    }

    /// Register `T`. Returns `false` when it was already registered.
    pub fn register<T: TupleValue>(&self) -> bool {
        let key = TypeId::of::<T>();
        let mut table = self.table.write();
        if table.contains_key(&key) {
            return false;
        }
        table.insert(
            key,
            TupleEntry {
                arity: T::ARITY,
                type_name: TypeDesc::of::<T>().name(),
                factory: Arc::new(|index| Node::create(TupleGet::<T>::new(index))),
            },
        );
        true
    }

    /// Registered arity of the tuple type behind `desc`.
    pub fn size(&self, desc: &TypeDesc) -> Result<usize, TupleError> {
        self.table
            .read()
            .get(&desc.key())
            .map(|entry| entry.arity)
            .ok_or_else(|| TupleError::Unregistered {
                type_name: desc.name(),
            })
    }

    /// Fabricate a projection node extracting element `index`.
    pub fn create_get_node(&self, desc: &TypeDesc, index: usize) -> Result<Arc<Node>, TupleError> {
        let table = self.table.read();
        let entry = table
            .get(&desc.key())
            .ok_or_else(|| TupleError::Unregistered {
                type_name: desc.name(),
            })?;
        if index >= entry.arity {
            return Err(TupleError::IndexOutOfRange {
                type_name: entry.type_name.clone(),
                index,
                arity: entry.arity,
            });
        }
        Ok((entry.factory)(index))
    }
}

/// Register `T` with the global registry; `false` when already present.
pub fn register_tuple_type<T: TupleValue>() -> bool {
    TupleRegistry::global().register::<T>()
}

/// Arity of a registered tuple type.
pub fn tuple_size(desc: &TypeDesc) -> Result<usize, TupleError> {
    TupleRegistry::global().size(desc)
}

/// Fabricate a projection node from the global registry.
pub fn create_get_node(desc: &TypeDesc, index: usize) -> Result<Arc<Node>, TupleError> {
    TupleRegistry::global().create_get_node(desc, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        // A tuple type no other test registers.
        register_tuple_type::<(u8, i16, u32)>();
        assert!(!register_tuple_type::<(u8, i16, u32)>());
        assert_eq!(tuple_size(&TypeDesc::of::<(u8, i16, u32)>()).unwrap(), 3);
    }

    #[test]
    fn unregistered_tuple_is_a_typed_error() {
        let desc = TypeDesc::of::<(u8, u16, u32, u64)>();
        assert!(matches!(
            tuple_size(&desc),
            Err(TupleError::Unregistered { .. })
        ));
        assert!(matches!(
            create_get_node(&desc, 0),
            Err(TupleError::Unregistered { .. })
        ));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        register_tuple_type::<(i64, f64)>();
        let desc = TypeDesc::of::<(i64, f64)>();
        let err = create_get_node(&desc, 2).unwrap_err();
        assert!(matches!(err, TupleError::IndexOutOfRange { arity: 2, .. }));
    }

    #[test]
    fn projection_node_declares_element_types() {
        register_tuple_type::<(i64, String)>();
        let desc = TypeDesc::of::<(i64, String)>();
        for (index, expected) in [(0, "i64"), (1, "String")] {
            let node = create_get_node(&desc, index).unwrap();
            let info = node.type_info();
            let forward = info.method("forward").unwrap();
            assert_eq!(forward.arg_types, vec!["(i64, String)"]);
            assert_eq!(forward.return_type, expected);
        }
    }

    #[test]
    fn projection_extracts_elements() {
        register_tuple_type::<(i64, String)>();
        let desc = TypeDesc::of::<(i64, String)>();
        let first = create_get_node(&desc, 0).unwrap();
        let out = first
            .invoke("forward", &[Packet::carrying((3_i64, String::from("x")))])
            .unwrap();
        assert_eq!(out.cast::<i64>().unwrap(), 3);
    }
}
