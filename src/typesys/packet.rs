//! Timestamped, shared-ownership data packets.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use super::descriptor::TypeDesc;
use super::value::{CastError, ValueBox};

/// The unit of data exchange between nodes.
///
/// A `Packet` is a [`ValueBox`] plus a 64-bit nanosecond timestamp from a
/// monotonic clock. Payloads are shared (`Arc` inside the box), so handing
/// the same packet to several downstream ports is zero-copy.
///
/// A packet without a value represents "no data this cycle"; the dispatcher
/// treats it as absence, never as a typed zero.
///
/// # Examples
///
/// ```rust
/// use easywork::typesys::Packet;
///
/// let p = Packet::from(5_i64, 100);
/// assert!(p.has_value());
/// assert_eq!(p.timestamp(), 100);
/// assert_eq!(p.cast::<i64>().unwrap(), 5);
///
/// let empty = Packet::empty();
/// assert!(!empty.has_value());
/// assert_eq!(empty.timestamp(), 0);
/// ```
#[derive(Clone)]
pub struct Packet {
    value: ValueBox,
    timestamp: i64,
}

impl Packet {
    /// A packet with no value and timestamp 0.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            value: ValueBox::empty(),
            timestamp: 0,
        }
    }

    /// Wrap a value with an explicit timestamp.
    #[must_use]
    pub fn from<T: Send + Sync + 'static>(value: T, timestamp: i64) -> Self {
        Self {
            value: ValueBox::new(value),
            timestamp,
        }
    }

    /// Wrap a value with timestamp 0; the engine stamps it on emit.
    #[must_use]
    pub fn carrying<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from(value, 0)
    }

    /// Wrap an already-boxed value.
    #[must_use]
    pub fn from_value(value: ValueBox, timestamp: i64) -> Self {
        Self { value, timestamp }
    }

    /// Monotonic nanosecond stamp, anchored at first use within the process.
    #[must_use]
    pub fn now_ns() -> i64 {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = EPOCH.get_or_init(Instant::now);
        i64::try_from(epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    /// `true` if the packet carries a value.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.has_value()
    }

    /// Descriptor of the carried value (void when empty).
    #[must_use]
    pub fn type_desc(&self) -> &TypeDesc {
        self.value.type_desc()
    }

    /// The nanosecond timestamp.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The carried value.
    #[must_use]
    pub fn value(&self) -> &ValueBox {
        &self.value
    }

    /// Cast the carried value; same policy as [`ValueBox::cast`].
    pub fn cast<T: Clone + Send + Sync + 'static>(&self) -> Result<T, CastError> {
        self.value.cast()
    }

    /// Same packet with a different stamp.
    #[must_use]
    pub fn stamped(self, timestamp: i64) -> Self {
        Self { timestamp, ..self }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet<{} @{}>", self.value.type_desc().name(), self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_packet_has_void_descriptor_and_zero_stamp() {
        let p = Packet::empty();
        assert!(!p.has_value());
        assert!(p.type_desc().is_void());
        assert_eq!(p.timestamp(), 0);
    }

    #[test]
    fn now_ns_is_monotonic() {
        let a = Packet::now_ns();
        let b = Packet::now_ns();
        assert!(b >= a);
        assert!(a >= 0);
    }

    #[test]
    fn stamped_preserves_payload() {
        let p = Packet::carrying(9_i32).stamped(77);
        assert_eq!(p.timestamp(), 77);
        assert_eq!(p.cast::<i32>().unwrap(), 9);
    }

    #[test]
    fn fan_out_clones_share_payload() {
        let p = Packet::from(String::from("shared"), 1);
        let q = p.clone();
        assert_eq!(p.cast::<String>().unwrap(), q.cast::<String>().unwrap());
    }
}
