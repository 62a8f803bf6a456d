//! Runtime type identity.

use serde::Serialize;
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime descriptor of a Rust type.
///
/// A `TypeDesc` pairs the platform's stable type key ([`TypeId`]) with a
/// human-readable name. Equality and hashing use only the key; the name is
/// carried for diagnostics, validation reports, and the embedder-facing
/// `type_info` surface.
///
/// Descriptors are created on first reference via [`TypeDesc::of`] and are
/// immutable. The unit type `()` doubles as the canonical void descriptor:
/// an empty [`ValueBox`](crate::typesys::ValueBox) always reports it.
///
/// # Examples
///
/// ```rust
/// use easywork::typesys::TypeDesc;
///
/// let a = TypeDesc::of::<i64>();
/// let b = TypeDesc::of::<i64>();
/// assert_eq!(a, b);
/// assert_ne!(a, TypeDesc::of::<String>());
/// assert_eq!(TypeDesc::of::<Vec<String>>().name(), "Vec<String>");
/// ```
#[derive(Clone, Debug)]
pub struct TypeDesc {
    key: TypeId,
    name: &'static str,
}

impl TypeDesc {
    /// Descriptor of `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            key: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The canonical void descriptor, reported by empty values.
    #[must_use]
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// Stable key usable as a map key.
    #[must_use]
    pub fn key(&self) -> TypeId {
        self.key
    }

    /// `true` if this is the void descriptor.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.key == TypeId::of::<()>()
    }

    /// Display name with module paths stripped (`alloc::string::String`
    /// renders as `String`).
    #[must_use]
    pub fn name(&self) -> String {
        strip_module_paths(self.name)
    }

    /// The full, unabridged type name.
    #[must_use]
    pub fn full_name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeDesc {}

impl Hash for TypeDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for TypeDesc {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// Remove `path::` qualifiers from a type name, keeping generic structure.
fn strip_module_paths(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            segment.push(ch);
        } else {
            out.push_str(last_path_segment(&segment));
            segment.clear();
            out.push(ch);
        }
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(segment: &str) -> &str {
    segment.rsplit("::").next().unwrap_or(segment)
}
