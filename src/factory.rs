//! Name-to-constructor registry for dynamic node instantiation.
//!
//! Each registered node class declares an ordered list of named,
//! typed parameters with optional defaults. Creation resolves positional
//! arguments first, then keyword overrides, then defaults; anything left
//! unresolved is a typed error. Values go through the normal
//! [`ValueBox::cast`](crate::typesys::ValueBox::cast) policy, so embedders
//! can pass `serde_json::Value` arguments and rely on the registered
//! external-object converters.
//!
//! # Examples
//!
//! ```rust
//! use easywork::factory::{FactoryArgs, NodeFactory};
//! use easywork::nodes::register_builtin_nodes;
//!
//! register_builtin_nodes();
//! let factory = NodeFactory::global();
//! assert!(factory.is_registered("Counter"));
//!
//! // Counter(start=0, max=3, step=1), keyword override on `max`.
//! let node = factory
//!     .create("Counter", FactoryArgs::new().kwarg("max", 3_i64))
//!     .unwrap();
//! assert_eq!(node.class_name(), "Counter");
//! ```

use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::node::{Node, NodeClass};
use crate::typesys::{CastError, TypeDesc, ValueBox};

/// Errors from node creation and registration.
#[derive(Debug, Error, Diagnostic)]
pub enum FactoryError {
    /// No class registered under the name.
    #[error("unknown node type '{name}'")]
    #[diagnostic(
        code(easywork::factory::unknown_node),
        help("List available classes with NodeFactory::registered_nodes().")
    )]
    UnknownNode { name: String },

    /// The name is already taken.
    #[error("node type '{name}' is already registered")]
    #[diagnostic(code(easywork::factory::duplicate))]
    Duplicate { name: String },

    /// A required parameter was neither supplied nor defaulted.
    #[error("'{class}' is missing required parameter '{param}'")]
    #[diagnostic(code(easywork::factory::missing_parameter))]
    MissingParameter { class: String, param: String },

    /// A keyword argument does not name a declared parameter.
    #[error("'{class}' has no parameter named '{param}'")]
    #[diagnostic(code(easywork::factory::unknown_parameter))]
    UnknownParameter { class: String, param: String },

    /// More positional arguments than declared parameters.
    #[error("'{class}' takes {declared} parameter(s), got {got} positional argument(s)")]
    #[diagnostic(code(easywork::factory::too_many_arguments))]
    TooManyArguments {
        class: String,
        declared: usize,
        got: usize,
    },

    /// A supplied value could not be cast to the declared parameter type.
    #[error("'{class}' parameter '{param}': {source}")]
    #[diagnostic(code(easywork::factory::parameter_type))]
    ParameterType {
        class: String,
        param: String,
        #[source]
        source: CastError,
    },
}

/// Declaration of one constructor parameter.
#[derive(Clone)]
pub struct ParamSpec {
    name: &'static str,
    ty: TypeDesc,
    default: Option<ValueBox>,
}

impl ParamSpec {
    /// A parameter that must be supplied.
    #[must_use]
    pub fn required<T: Send + Sync + 'static>(name: &'static str) -> Self {
        Self {
            name,
            ty: TypeDesc::of::<T>(),
            default: None,
        }
    }

    /// A parameter with a default value.
    #[must_use]
    pub fn with_default<T: Send + Sync + 'static>(name: &'static str, default: T) -> Self {
        Self {
            name,
            ty: TypeDesc::of::<T>(),
            default: Some(ValueBox::new(default)),
        }
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> &TypeDesc {
        &self.ty
    }
}

/// Positional and keyword argument bags for [`NodeFactory::create`].
#[derive(Clone, Default)]
pub struct FactoryArgs {
    positional: Vec<ValueBox>,
    keyword: FxHashMap<String, ValueBox>,
}

impl FactoryArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.positional.push(ValueBox::new(value));
        self
    }

    /// Set a keyword argument.
    #[must_use]
    pub fn kwarg<T: Send + Sync + 'static>(mut self, name: &str, value: T) -> Self {
        self.keyword.insert(name.to_string(), ValueBox::new(value));
        self
    }

    /// Append an already-boxed positional argument.
    #[must_use]
    pub fn arg_boxed(mut self, value: ValueBox) -> Self {
        self.positional.push(value);
        self
    }
}

/// Resolved constructor parameters handed to a creator.
pub struct ResolvedParams {
    class: &'static str,
    values: FxHashMap<&'static str, ValueBox>,
}

impl ResolvedParams {
    /// Extract a parameter as `T` (full cast policy, so JSON arguments
    /// coerce to native types).
    pub fn get<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, FactoryError> {
        let boxed = self
            .values
            .get(name)
            .ok_or_else(|| FactoryError::MissingParameter {
                class: self.class.to_string(),
                param: name.to_string(),
            })?;
        boxed.cast::<T>().map_err(|source| FactoryError::ParameterType {
            class: self.class.to_string(),
            param: name.to_string(),
            source,
        })
    }
}

type Creator = Arc<dyn Fn(&ResolvedParams) -> Result<Box<dyn NodeClass>, FactoryError> + Send + Sync>;

struct FactoryEntry {
    class: &'static str,
    params: Vec<ParamSpec>,
    creator: Creator,
}

/// Process-global name → constructor registry.
pub struct NodeFactory {
    entries: RwLock<FxHashMap<String, FactoryEntry>>,
}

impl NodeFactory {
    /// The process-global factory.
    pub fn global() -> &'static NodeFactory {
        static GLOBAL: OnceLock<NodeFactory> = OnceLock::new();
        GLOBAL.get_or_init(|| NodeFactory {
            entries: RwLock::new(FxHashMap::default()),
        })
    }

    /// Register a class under a public name with its ordered parameter
    /// declarations.
    pub fn register<F>(
        &self,
        name: &'static str,
        params: Vec<ParamSpec>,
        creator: F,
    ) -> Result<(), FactoryError>
    where
        F: Fn(&ResolvedParams) -> Result<Box<dyn NodeClass>, FactoryError> + Send + Sync + 'static,
    {
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Err(FactoryError::Duplicate {
                name: name.to_string(),
            });
        }
        entries.insert(
            name.to_string(),
            FactoryEntry {
                class: name,
                params,
                creator: Arc::new(creator),
            },
        );
        Ok(())
    }

    /// Instantiate a registered class. Resolution order per parameter:
    /// positional, then keyword, then default.
    pub fn create(&self, name: &str, args: FactoryArgs) -> Result<Arc<Node>, FactoryError> {
        let (class, params, creator) = {
            let entries = self.entries.read();
            let entry = entries.get(name).ok_or_else(|| FactoryError::UnknownNode {
                name: name.to_string(),
            })?;
            (entry.class, entry.params.clone(), Arc::clone(&entry.creator))
        };

        if args.positional.len() > params.len() {
            return Err(FactoryError::TooManyArguments {
                class: class.to_string(),
                declared: params.len(),
                got: args.positional.len(),
            });
        }
        for key in args.keyword.keys() {
            if !params.iter().any(|p| p.name == key) {
                return Err(FactoryError::UnknownParameter {
                    class: class.to_string(),
                    param: key.clone(),
                });
            }
        }

        let mut values: FxHashMap<&'static str, ValueBox> = FxHashMap::default();
        for (index, spec) in params.iter().enumerate() {
            let supplied = args
                .positional
                .get(index)
                .or_else(|| args.keyword.get(spec.name))
                .cloned()
                .or_else(|| spec.default.clone());
            match supplied {
                Some(value) => {
                    values.insert(spec.name, value);
                }
                None => {
                    return Err(FactoryError::MissingParameter {
                        class: class.to_string(),
                        param: spec.name.to_string(),
                    });
                }
            }
        }

        let resolved = ResolvedParams { class, values };
        let behavior = creator(&resolved)?;
        Ok(Node::from_behavior(behavior))
    }

    /// Names of every registered class, sorted.
    #[must_use]
    pub fn registered_nodes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// `true` if a class is registered under the name.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }
}
