//! Type-erased value container with safe cast and numeric coercion.

use miette::Diagnostic;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::convert::ConverterRegistry;
use super::descriptor::TypeDesc;

/// Errors produced when recovering a concrete type from a [`ValueBox`].
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum CastError {
    /// The box holds no payload.
    #[error("cannot cast an empty value to {target}")]
    #[diagnostic(
        code(easywork::typesys::empty_cast),
        help("An empty value represents \"no data this cycle\"; check has_value() first.")
    )]
    Empty { target: String },

    /// No exact match, registered converter, or numeric coercion applies.
    #[error("no conversion from {from} to {target}")]
    #[diagnostic(
        code(easywork::typesys::no_conversion),
        help("Register a converter for this pair on the ConverterRegistry.")
    )]
    NoConversion { from: String, target: String },
}

/// Holds a value of unknown static type next to its descriptor.
///
/// The payload lives behind `Arc<dyn Any + Send + Sync>`, so cloning a box
/// (and fanning a packet out to many downstreams) never copies the payload.
/// Large frame-like values stay zero-copy for the same reason.
///
/// [`cast`](Self::cast) is the only path from the payload back to a concrete
/// type. Its policy, in order:
///
/// 1. exact descriptor match — clone the payload out;
/// 2. a converter registered for (payload type → target type);
/// 3. built-in numeric coercion among `{i32, i64, f32, f64}` with `as`-cast
///    semantics;
/// 4. otherwise a [`CastError`] naming both types.
///
/// # Examples
///
/// ```rust
/// use easywork::typesys::ValueBox;
///
/// let v = ValueBox::new(41_i64);
/// assert_eq!(v.cast::<i64>().unwrap(), 41);
/// assert_eq!(v.cast::<f64>().unwrap(), 41.0); // numeric coercion
/// assert!(v.cast::<Vec<u8>>().is_err());
///
/// let empty = ValueBox::empty();
/// assert!(!empty.has_value());
/// assert!(empty.type_desc().is_void());
/// ```
#[derive(Clone)]
pub struct ValueBox {
    payload: Option<Arc<dyn Any + Send + Sync>>,
    desc: TypeDesc,
}

impl ValueBox {
    /// Box a value, capturing its descriptor.
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            payload: Some(Arc::new(value)),
            desc: TypeDesc::of::<T>(),
        }
    }

    /// An empty box. Its descriptor is the void descriptor.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            payload: None,
            desc: TypeDesc::void(),
        }
    }

    /// `true` if a payload is present.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.payload.is_some()
    }

    /// Descriptor of the payload (void when empty).
    #[must_use]
    pub fn type_desc(&self) -> &TypeDesc {
        &self.desc
    }

    /// Recover a `T` from the payload using the ordered cast policy.
    pub fn cast<T: Clone + Send + Sync + 'static>(&self) -> Result<T, CastError> {
        let Some(payload) = &self.payload else {
            return Err(CastError::Empty {
                target: TypeDesc::of::<T>().name(),
            });
        };

        // 1. Exact match.
        if let Some(v) = payload.downcast_ref::<T>() {
            return Ok(v.clone());
        }

        let target = TypeDesc::of::<T>();

        // 2. Registered converter.
        if let Some(converted) = ConverterRegistry::global().convert(self, &target) {
            if let Some(inner) = &converted.payload {
                if let Some(v) = inner.downcast_ref::<T>() {
                    return Ok(v.clone());
                }
            }
        }

        // 3. Built-in numeric coercion.
        if let Some(widened) = self.coerce_numeric(&target) {
            if let Some(inner) = &widened.payload {
                if let Some(v) = inner.downcast_ref::<T>() {
                    return Ok(v.clone());
                }
            }
        }

        Err(CastError::NoConversion {
            from: self.desc.name(),
            target: target.name(),
        })
    }

    /// Coerce between the four built-in numeric types, `as`-cast semantics.
    fn coerce_numeric(&self, target: &TypeDesc) -> Option<ValueBox> {
        fn cast_to<S: Copy + 'static>(value: S, key: TypeId) -> Option<ValueBox>
        where
            S: NumericCast,
        {
            if key == TypeId::of::<i32>() {
                Some(ValueBox::new(value.to_i32()))
            } else if key == TypeId::of::<i64>() {
                Some(ValueBox::new(value.to_i64()))
            } else if key == TypeId::of::<f32>() {
                Some(ValueBox::new(value.to_f32()))
            } else if key == TypeId::of::<f64>() {
                Some(ValueBox::new(value.to_f64()))
            } else {
                None
            }
        }

        let payload = self.payload.as_ref()?;
        let key = target.key();
        if let Some(v) = payload.downcast_ref::<i32>() {
            cast_to(*v, key)
        } else if let Some(v) = payload.downcast_ref::<i64>() {
            cast_to(*v, key)
        } else if let Some(v) = payload.downcast_ref::<f32>() {
            cast_to(*v, key)
        } else if let Some(v) = payload.downcast_ref::<f64>() {
            cast_to(*v, key)
        } else {
            None
        }
    }

    /// Borrow the raw payload for converter functions.
    pub(crate) fn payload(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.payload.as_ref()
    }

    /// Borrow the payload downcast to `T` without cloning (exact match only).
    #[must_use]
    pub fn peek<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

/// `as`-cast projection onto the four built-in numeric types.
trait NumericCast {
    fn to_i32(self) -> i32;
    fn to_i64(self) -> i64;
    fn to_f32(self) -> f32;
    fn to_f64(self) -> f64;
}

macro_rules! impl_numeric_cast {
    ($($src:ty),+) => {
        $(impl NumericCast for $src {
            fn to_i32(self) -> i32 {
                self as i32
            }
            fn to_i64(self) -> i64 {
                self as i64
            }
            fn to_f32(self) -> f32 {
                self as f32
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        })+
    };
}

impl_numeric_cast!(i32, i64, f32, f64);

impl fmt::Debug for ValueBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_value() {
            write!(f, "ValueBox<{}>", self.desc.name())
        } else {
            write!(f, "ValueBox<empty>")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_cast_round_trips() {
        let v = ValueBox::new(String::from("hello"));
        assert_eq!(v.cast::<String>().unwrap(), "hello");
        assert_eq!(v.type_desc(), &TypeDesc::of::<String>());
    }

    #[test]
    fn empty_cast_fails_with_target_name() {
        let err = ValueBox::empty().cast::<i32>().unwrap_err();
        assert!(matches!(err, CastError::Empty { .. }));
        assert!(err.to_string().contains("i32"));
    }

    #[test]
    fn numeric_coercion_follows_as_cast() {
        assert_eq!(ValueBox::new(7_i32).cast::<f64>().unwrap(), 7.0);
        assert_eq!(ValueBox::new(2.9_f64).cast::<i64>().unwrap(), 2);
        assert_eq!(ValueBox::new(1.5_f32).cast::<f64>().unwrap(), 1.5);
        assert_eq!(ValueBox::new(300_i64).cast::<i32>().unwrap(), 300);
    }

    #[test]
    fn mismatch_names_both_types() {
        let err = ValueBox::new(1_u8).cast::<String>().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("u8"));
        assert!(text.contains("String"));
    }

    #[test]
    fn clone_shares_payload() {
        let v = ValueBox::new(vec![1_u8, 2, 3]);
        let w = v.clone();
        assert_eq!(w.cast::<Vec<u8>>().unwrap(), vec![1, 2, 3]);
    }
}
