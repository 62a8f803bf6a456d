//! Core identity types for the EasyWork engine.
//!
//! This module defines [`MethodId`], the stable 64-bit key under which a
//! node method is registered, dispatched, and referenced from connections.
//! Method ids are FNV-1a hashes of the method name, so they are stable
//! across processes and can be computed in `const` context.
//!
//! # Well-known ids
//!
//! Three method names have engine-level meaning:
//!
//! - [`ID_FORWARD`] (`"forward"`): the canonical data method. It is always
//!   attempted last within a dispatch pass, and a node whose `forward`
//!   declares zero arguments is treated as a source.
//! - [`ID_OPEN`] (`"Open"`) and [`ID_CLOSE`] (`"Close"`): optional lifecycle
//!   hooks invoked by [`Node::open`](crate::node::Node::open) and
//!   [`Node::close`](crate::node::Node::close).
//!
//! # Examples
//!
//! ```rust
//! use easywork::types::{method_id, MethodId, ID_FORWARD};
//!
//! assert_eq!(method_id("forward"), ID_FORWARD);
//! assert_ne!(method_id("set_rate"), ID_FORWARD);
//!
//! // Stable across calls and processes.
//! let a: MethodId = method_id("set_rate");
//! let b: MethodId = method_id("set_rate");
//! assert_eq!(a, b);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a node method.
///
/// A `MethodId` is the FNV-1a hash of the method's name. It is the key used
/// by [`MethodRegistry`](crate::methods::MethodRegistry), by upstream
/// connections (which record the target method of each port), and by the
/// per-method dispatch policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub u64);

impl MethodId {
    /// Raw hash value.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Hash a method name into its [`MethodId`] (FNV-1a, 64-bit).
#[must_use]
pub const fn method_id(name: &str) -> MethodId {
    let bytes = name.as_bytes();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        i += 1;
    }
    MethodId(hash)
}

/// Id of the canonical data method, `forward`.
pub const ID_FORWARD: MethodId = method_id("forward");

/// Id of the optional lifecycle hook invoked on open.
pub const ID_OPEN: MethodId = method_id("Open");

/// Id of the optional lifecycle hook invoked on close.
pub const ID_CLOSE: MethodId = method_id("Close");

/// Resolve a user-facing method name, treating the empty string as
/// `forward` (the default target for connections).
#[must_use]
pub fn resolve_method_name(name: &str) -> MethodId {
    if name.is_empty() {
        ID_FORWARD
    } else {
        method_id(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vector() {
        // FNV-1a 64 of the empty string is the offset basis.
        assert_eq!(method_id("").0, 0xcbf2_9ce4_8422_2325);
        // And of "a": (basis ^ 0x61) * prime.
        assert_eq!(method_id("a").0, 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn well_known_ids_are_distinct() {
        assert_ne!(ID_FORWARD, ID_OPEN);
        assert_ne!(ID_FORWARD, ID_CLOSE);
        assert_ne!(ID_OPEN, ID_CLOSE);
    }

    #[test]
    fn empty_name_resolves_to_forward() {
        assert_eq!(resolve_method_name(""), ID_FORWARD);
        assert_eq!(resolve_method_name("forward"), ID_FORWARD);
        assert_ne!(resolve_method_name("Open"), ID_FORWARD);
    }
}
