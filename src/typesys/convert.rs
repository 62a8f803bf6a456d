//! Pairwise type converters.
//!
//! The registry maps `(source type, target type)` to a conversion function.
//! It backs step 2 of the [`ValueBox::cast`](super::ValueBox::cast) policy
//! and the connection validation pass, and it carries the "external object"
//! bridge: converters between [`serde_json::Value`] and the native scalar
//! types let embedders push foreign values through typed methods.
//!
//! The common numeric widenings and the JSON bridge are registered on first
//! access to [`ConverterRegistry::global`]; after initialization the table
//! is effectively read-only.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use super::descriptor::TypeDesc;
use super::value::ValueBox;

/// A conversion function. Returns `None` when the payload is not actually
/// of the source type the converter was registered for.
pub type ConvertFn = Arc<dyn Fn(&ValueBox) -> Option<ValueBox> + Send + Sync>;

/// Process-global table of pairwise converters.
///
/// # Examples
///
/// ```rust
/// use easywork::typesys::{ConverterRegistry, TypeDesc, ValueBox};
///
/// #[derive(Clone)]
/// struct Celsius(f64);
///
/// let reg = ConverterRegistry::global();
/// reg.register(|c: &Celsius| c.0 * 1.8 + 32.0);
/// assert!(reg.has(&TypeDesc::of::<Celsius>(), &TypeDesc::of::<f64>()));
///
/// let boxed = ValueBox::new(Celsius(100.0));
/// assert_eq!(boxed.cast::<f64>().unwrap(), 212.0);
/// ```
pub struct ConverterRegistry {
    table: RwLock<FxHashMap<(TypeId, TypeId), ConvertFn>>,
}

impl ConverterRegistry {
    fn new() -> Self {
        Self {
            table: RwLock::new(FxHashMap::default()),
        }
    }

    /// The process-global registry. Built-in conversions are registered on
    /// first access.
    pub fn global() -> &'static ConverterRegistry {
        static GLOBAL: OnceLock<ConverterRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let registry = ConverterRegistry::new();
            registry.register_numeric_conversions();
            registry.register_json_conversions();
            registry
        })
    }

    /// Register a converter from `From` to `To`. Later registrations for
    /// the same pair replace earlier ones.
    pub fn register<From, To, F>(&self, convert: F)
    where
        From: Send + Sync + 'static,
        To: Send + Sync + 'static,
        F: Fn(&From) -> To + Send + Sync + 'static,
    {
        let entry: ConvertFn = Arc::new(move |value: &ValueBox| {
            let payload = value.payload()?;
            let from = payload.downcast_ref::<From>()?;
            Some(ValueBox::new(convert(from)))
        });
        self.table
            .write()
            .insert((TypeId::of::<From>(), TypeId::of::<To>()), entry);
    }

    /// Remove the converter for a pair, if any. Escape hatch for embedding
    /// scenarios and tests that probe validation behavior.
    pub fn unregister<From: 'static, To: 'static>(&self) -> bool {
        self.table
            .write()
            .remove(&(TypeId::of::<From>(), TypeId::of::<To>()))
            .is_some()
    }

    /// `true` if a converter is registered for the pair.
    #[must_use]
    pub fn has(&self, from: &TypeDesc, to: &TypeDesc) -> bool {
        self.table.read().contains_key(&(from.key(), to.key()))
    }

    /// Convert `value` to the target type. `None` when no converter is
    /// registered or the payload does not match; callers translate absence
    /// into a domain error.
    #[must_use]
    pub fn convert(&self, value: &ValueBox, to: &TypeDesc) -> Option<ValueBox> {
        let entry = {
            let table = self.table.read();
            table.get(&(value.type_desc().key(), to.key())).cloned()
        };
        entry.and_then(|f| f(value))
    }

    /// All ordered pairs among {i32, i64, f32, f64}, `as`-cast semantics.
    fn register_numeric_conversions(&self) {
        self.register(|v: &i32| *v as i64);
        self.register(|v: &i32| *v as f32);
        self.register(|v: &i32| *v as f64);
        self.register(|v: &i64| *v as i32);
        self.register(|v: &i64| *v as f32);
        self.register(|v: &i64| *v as f64);
        self.register(|v: &f32| *v as i32);
        self.register(|v: &f32| *v as i64);
        self.register(|v: &f32| *v as f64);
        self.register(|v: &f64| *v as i32);
        self.register(|v: &f64| *v as i64);
        self.register(|v: &f64| *v as f32);
    }

    /// The external-object bridge: JSON values to native scalars and back.
    fn register_json_conversions(&self) {
        use serde_json::Value;

        self.register(|v: &Value| v.as_i64().unwrap_or_default() as i32);
        self.register(|v: &Value| v.as_i64().unwrap_or_default());
        self.register(|v: &Value| v.as_f64().unwrap_or_default() as f32);
        self.register(|v: &Value| v.as_f64().unwrap_or_default());
        self.register(|v: &Value| v.as_str().map(str::to_owned).unwrap_or_default());
        self.register(|v: &Value| v.as_bool().unwrap_or_default());

        self.register(|v: &i32| Value::from(*v));
        self.register(|v: &i64| Value::from(*v));
        self.register(|v: &f32| Value::from(f64::from(*v)));
        self.register(|v: &f64| Value::from(*v));
        self.register(|v: &String| Value::from(v.clone()));
        self.register(|v: &bool| Value::from(*v));
    }
}
