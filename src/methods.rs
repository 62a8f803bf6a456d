//! Per-class method tables and type-erased invokers.
//!
//! Every node class declares its exported methods once through
//! [`export_methods!`]. The macro builds the class's [`MethodRegistry`]:
//! for each method an [`Invoker`] (node pointer + packets in, packet out),
//! the ordered argument [`TypeDesc`]s, and the return descriptor. The
//! registry is immutable and shared by every instance of the class; the
//! dispatcher, the validation pass, and the embedder-facing `type_info`
//! report all read from it.
//!
//! # Invoker contract
//!
//! - Verifies the argument count, failing with a typed error otherwise.
//! - Casts each packet to the declared argument type (the full
//!   [`ValueBox::cast`](crate::typesys::ValueBox::cast) policy), with a
//!   positional error on mismatch.
//! - Invokes the method on the concrete node behavior.
//! - Wraps the return in a [`Packet`]: unit returns become empty packets,
//!   and `Option<T>` returns declare descriptor `T` and map `None` to an
//!   empty packet — the protocol sources use for "nothing this cycle".
//!
//! # Examples
//!
//! ```rust
//! use easywork::export_methods;
//! use easywork::typesys::Packet;
//!
//! #[derive(Default)]
//! struct Doubler {
//!     calls: u64,
//! }
//!
//! impl Doubler {
//!     fn forward(&mut self, input: i64) -> i64 {
//!         self.calls += 1;
//!         input * 2
//!     }
//! }
//!
//! export_methods!(Doubler, "Doubler", {
//!     fn forward(i64) -> i64;
//! });
//!
//! use easywork::node::NodeClass;
//! let mut node = Doubler::default();
//! let registry = node.registry();
//! let meta = registry.get(easywork::types::ID_FORWARD).unwrap();
//! let out = (meta.invoker)(node.as_any_mut(), &[Packet::carrying(21_i64)]).unwrap();
//! assert_eq!(out.cast::<i64>().unwrap(), 42);
//! ```

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

use crate::types::{method_id, MethodId};
use crate::typesys::{CastError, Packet, TypeDesc};

/// Type-erased method invoker: concrete behavior plus input packets in,
/// result packet out.
pub type Invoker =
    Arc<dyn Fn(&mut dyn Any, &[Packet]) -> Result<Packet, InvokeError> + Send + Sync>;

/// Errors raised on the invoke path.
#[derive(Debug, Error, Diagnostic)]
pub enum InvokeError {
    /// The method id is not in the class's registry.
    #[error("{class} has no method named '{method}'")]
    #[diagnostic(
        code(easywork::methods::unknown_method),
        help("Check exposed_methods() on the node's type_info for valid names.")
    )]
    UnknownMethod { class: String, method: String },

    /// Wrong number of packets for the declared signature.
    #[error("method '{method}' expects {expected} argument(s), got {got}")]
    #[diagnostic(code(easywork::methods::arity_mismatch))]
    ArityMismatch {
        method: &'static str,
        expected: usize,
        got: usize,
    },

    /// The behavior object is not an instance of the class the invoker was
    /// generated for.
    #[error("invoker called on a behavior that is not a {expected}")]
    #[diagnostic(code(easywork::methods::wrong_class))]
    WrongClass { expected: &'static str },

    /// One argument could not be converted to its declared type.
    #[error("method '{method}' argument {index}: {source}")]
    #[diagnostic(code(easywork::methods::argument))]
    Argument {
        method: &'static str,
        index: usize,
        #[source]
        source: CastError,
    },

    /// The return value has no registered conversion to the external
    /// (JSON) representation.
    #[error("method '{method}' returned {type_name}, which has no external representation")]
    #[diagnostic(
        code(easywork::methods::external_return),
        help("Register a converter from this type to serde_json::Value.")
    )]
    NoExternalRepresentation { method: String, type_name: String },
}

impl InvokeError {
    /// `true` for failures caused by argument conversion (as opposed to
    /// lookup, arity, or class mismatches).
    #[must_use]
    pub fn is_conversion(&self) -> bool {
        matches!(self, InvokeError::Argument { .. })
    }
}

/// Everything the engine knows about one exported method.
pub struct MethodMeta {
    /// Declared method name.
    pub name: &'static str,
    /// Type-erased invoker honoring the contract above.
    pub invoker: Invoker,
    /// Declared argument descriptors, in positional order.
    pub arg_types: Vec<TypeDesc>,
    /// Declared return descriptor (void for unit returns, the inner type
    /// for `Option` returns).
    pub return_type: TypeDesc,
}

impl MethodMeta {
    /// Declared argument count.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }
}

impl fmt::Debug for MethodMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            self.arg_types
                .iter()
                .map(TypeDesc::name)
                .collect::<Vec<_>>()
                .join(", "),
            self.return_type.name()
        )
    }
}

/// Immutable, class-level table of exported methods keyed by [`MethodId`].
#[derive(Debug)]
pub struct MethodRegistry {
    class_name: &'static str,
    methods: FxHashMap<MethodId, MethodMeta>,
    exposed: Vec<&'static str>,
}

impl MethodRegistry {
    /// Start building a registry for a class.
    #[must_use]
    pub fn builder(class_name: &'static str) -> MethodRegistryBuilder {
        MethodRegistryBuilder {
            class_name,
            methods: FxHashMap::default(),
            exposed: Vec::new(),
        }
    }

    /// Name of the class this registry describes.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Look up a method by id.
    #[must_use]
    pub fn get(&self, id: MethodId) -> Option<&MethodMeta> {
        self.methods.get(&id)
    }

    /// `true` if the id is exported.
    #[must_use]
    pub fn contains(&self, id: MethodId) -> bool {
        self.methods.contains_key(&id)
    }

    /// Exported method names, in declaration order.
    #[must_use]
    pub fn exposed_methods(&self) -> &[&'static str] {
        &self.exposed
    }

    /// Number of exported methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// `true` when no methods are exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Iterate over `(id, meta)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (MethodId, &MethodMeta)> {
        self.exposed.iter().map(move |name| {
            let id = method_id(name);
            (id, &self.methods[&id])
        })
    }
}

/// Builder for [`MethodRegistry`]. Duplicate method names are a
/// registration-time programmer error and panic immediately.
pub struct MethodRegistryBuilder {
    class_name: &'static str,
    methods: FxHashMap<MethodId, MethodMeta>,
    exposed: Vec<&'static str>,
}

impl MethodRegistryBuilder {
    /// Add one exported method.
    #[must_use]
    pub fn method(
        mut self,
        name: &'static str,
        invoker: Invoker,
        arg_types: Vec<TypeDesc>,
        return_type: TypeDesc,
    ) -> Self {
        let id = method_id(name);
        let previous = self.methods.insert(
            id,
            MethodMeta {
                name,
                invoker,
                arg_types,
                return_type,
            },
        );
        assert!(
            previous.is_none(),
            "method '{name}' exported twice on {}",
            self.class_name
        );
        self.exposed.push(name);
        self
    }

    /// Finish the registry.
    #[must_use]
    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            class_name: self.class_name,
            methods: self.methods,
            exposed: self.exposed,
        }
    }
}

// ---------------------------------------------------------------------------
// Return-shape adapters.
//
// The export macro cannot pattern-match on a captured `ty` fragment, so the
// unit and Option return shapes are picked apart with inherent-over-trait
// method resolution: inherent impls on `PacketWrap<()>` / `PacketWrap<Option<T>>`
// win over the blanket trait impl.
// ---------------------------------------------------------------------------

/// Wrapper that turns a method's return value into a [`Packet`].
pub struct PacketWrap<T>(pub T);

impl PacketWrap<()> {
    /// Unit returns produce an empty packet.
    #[must_use]
    pub fn into_packet(self) -> Packet {
        Packet::empty()
    }
}

impl<T: Send + Sync + 'static> PacketWrap<Option<T>> {
    /// `None` means "nothing produced this cycle".
    #[must_use]
    pub fn into_packet(self) -> Packet {
        match self.0 {
            Some(value) => Packet::carrying(value),
            None => Packet::empty(),
        }
    }
}

/// Fallback packet-wrapping for plain value returns.
pub trait DirectPacket {
    fn into_packet(self) -> Packet;
}

impl<T: Send + Sync + 'static> DirectPacket for PacketWrap<T> {
    fn into_packet(self) -> Packet {
        Packet::carrying(self.0)
    }
}

/// Probe that reports the declared return descriptor for a method,
/// unwrapping `Option<T>` to `T`.
pub struct ReturnProbe<T>(PhantomData<fn() -> T>);

impl<T> ReturnProbe<T> {
    #[allow(clippy::new_without_default)]
    #[must_use]
    pub fn new() -> Self {
        ReturnProbe(PhantomData)
    }
}

impl<T: 'static> ReturnProbe<Option<T>> {
    /// `Option<T>` declares descriptor `T`.
    #[must_use]
    pub fn return_desc(&self) -> TypeDesc {
        TypeDesc::of::<T>()
    }
}

/// Fallback return-descriptor probe for plain returns.
pub trait DirectReturn {
    fn return_desc(&self) -> TypeDesc;
}

impl<T: 'static> DirectReturn for ReturnProbe<T> {
    fn return_desc(&self) -> TypeDesc {
        TypeDesc::of::<T>()
    }
}

/// Declare a node class's exported methods.
///
/// Builds the class-level [`MethodRegistry`] and implements
/// [`NodeClass`](crate::node::NodeClass) for the type. The optional
/// `control = field` form binds the graph's
/// [`FlowControl`](crate::node::FlowControl) into the named field at build
/// time, giving the behavior access to cooperative stop.
///
/// ```rust
/// use easywork::export_methods;
/// use easywork::node::FlowControl;
///
/// #[derive(Default)]
/// struct Ticker {
///     remaining: u32,
///     control: FlowControl,
/// }
///
/// impl Ticker {
///     fn forward(&mut self) -> Option<i64> {
///         if self.remaining == 0 {
///             self.control.stop();
///             return None;
///         }
///         self.remaining -= 1;
///         Some(i64::from(self.remaining))
///     }
/// }
///
/// export_methods!(Ticker, "Ticker", control = control, {
///     fn forward() -> Option<i64>;
/// });
/// ```
#[macro_export]
macro_rules! export_methods {
    ($ty:ty, $class:literal, control = $ctrl:ident, { $( fn $m:ident ( $($arg:ty),* ) -> $ret:ty; )+ }) => {
        impl $crate::node::NodeClass for $ty {
            fn class_name(&self) -> &'static str {
                $class
            }

            fn registry(&self) -> ::std::sync::Arc<$crate::methods::MethodRegistry> {
                $crate::export_methods!(@registry $ty, $class, $( $m ( $($arg),* ) -> $ret; )+)
            }

            fn bind_control(&mut self, control: $crate::node::FlowControl) {
                self.$ctrl = control;
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };

    ($ty:ty, $class:literal, { $( fn $m:ident ( $($arg:ty),* ) -> $ret:ty; )+ }) => {
        impl $crate::node::NodeClass for $ty {
            fn class_name(&self) -> &'static str {
                $class
            }

            fn registry(&self) -> ::std::sync::Arc<$crate::methods::MethodRegistry> {
                $crate::export_methods!(@registry $ty, $class, $( $m ( $($arg),* ) -> $ret; )+)
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };

    (@registry $ty:ty, $class:literal, $( $m:ident ( $($arg:ty),* ) -> $ret:ty; )+) => {{
        static REGISTRY: ::std::sync::OnceLock<::std::sync::Arc<$crate::methods::MethodRegistry>> =
            ::std::sync::OnceLock::new();
        ::std::sync::Arc::clone(REGISTRY.get_or_init(|| {
            let mut builder = $crate::methods::MethodRegistry::builder($class);
            $(
                builder = builder.method(
                    stringify!($m),
                    $crate::export_methods!(@invoker $ty, $m $(, $arg)*),
                    vec![$( $crate::typesys::TypeDesc::of::<$arg>() ),*],
                    {
                        #[allow(unused_imports)]
                        use $crate::methods::DirectReturn as _;
                        $crate::methods::ReturnProbe::<$ret>::new().return_desc()
                    },
                );
            )+
            ::std::sync::Arc::new(builder.build())
        }))
    }};

    (@invoker $ty:ty, $m:ident $(, $arg:ty)*) => {
        ::std::sync::Arc::new(
            |behavior: &mut dyn ::std::any::Any,
             packets: &[$crate::typesys::Packet]|
             -> ::std::result::Result<$crate::typesys::Packet, $crate::methods::InvokeError> {
                let behavior = behavior.downcast_mut::<$ty>().ok_or(
                    $crate::methods::InvokeError::WrongClass {
                        expected: ::std::any::type_name::<$ty>(),
                    },
                )?;
                let declared: &[&str] = &[$( stringify!($arg) ),*];
                if packets.len() != declared.len() {
                    return Err($crate::methods::InvokeError::ArityMismatch {
                        method: stringify!($m),
                        expected: declared.len(),
                        got: packets.len(),
                    });
                }
                #[allow(unused_mut)]
                let mut index = 0usize;
                let out = behavior.$m(
                    $({
                        let value: $arg = packets[index].cast::<$arg>().map_err(|source| {
                            $crate::methods::InvokeError::Argument {
                                method: stringify!($m),
                                index,
                                source,
                            }
                        })?;
                        index += 1;
                        value
                    }),*
                );
                let _ = index;
                #[allow(unused_imports)]
                use $crate::methods::DirectPacket as _;
                Ok($crate::methods::PacketWrap(out).into_packet())
            },
        )
    };
}
