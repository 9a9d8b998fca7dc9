//! The unit carried through the bus.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Caller-chosen routing discriminator.
pub type Tag = i32;

/// Tag used when the caller does not supply one.
///
/// Reserved: callers should not assign it to their own event families.
pub const TAG_DEFAULT: Tag = -1000;

/// Type-erased, shared event payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// An immutable `(tag, payload)` pair.
///
/// Cloning is cheap: the payload is shared, so every pipeline observes the
/// same value the producer posted.
#[derive(Clone)]
pub struct Envelope {
    tag: Tag,
    payload: Payload,
}

impl Envelope {
    /// Wrap a concrete value.
    pub fn new<T: Any + Send + Sync>(tag: Tag, payload: T) -> Self {
        Self {
            tag,
            payload: Arc::new(payload),
        }
    }

    /// Wrap an already erased payload.
    #[must_use]
    pub fn from_payload(tag: Tag, payload: Payload) -> Self {
        Self { tag, payload }
    }

    /// Routing tag.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Shared payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Concrete type of the payload.
    #[must_use]
    pub fn payload_type_id(&self) -> TypeId {
        Any::type_id(&*self.payload)
    }

    /// Whether the payload is exactly a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("tag", &self.tag)
            .field("payload_type", &self.payload_type_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_keeps_tag_and_type() {
        let envelope = Envelope::new(5, String::from("hello"));
        assert_eq!(envelope.tag(), 5);
        assert!(envelope.is::<String>());
        assert!(!envelope.is::<&str>());
        assert_eq!(envelope.payload_type_id(), TypeId::of::<String>());
    }

    #[test]
    fn test_clone_shares_payload() {
        let envelope = Envelope::new(TAG_DEFAULT, 42_u32);
        let copy = envelope.clone();
        assert!(Arc::ptr_eq(envelope.payload(), copy.payload()));
    }

    #[test]
    fn test_from_payload_does_not_rewrap() {
        let payload: Payload = Arc::new(7_i64);
        let envelope = Envelope::from_payload(1, Arc::clone(&payload));
        assert!(envelope.is::<i64>());
        assert!(Arc::ptr_eq(envelope.payload(), &payload));
    }
}
