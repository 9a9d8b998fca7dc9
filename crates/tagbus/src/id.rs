//! Subscriber and subscription identities.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Identity that owns a group of subscriptions.
///
/// Equality is by identity, never by value: two ids are equal only if they
/// were minted by the same [`SubscriberId::new`] call or taken from the same
/// live allocation with [`SubscriberId::of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Repr);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Minted(Uuid),
    Address(usize),
}

impl SubscriberId {
    /// Mint a fresh identity, unique for the life of the process.
    #[must_use]
    pub fn new() -> Self {
        Self(Repr::Minted(Uuid::new_v4()))
    }

    /// Identity of a shared object, derived from its allocation.
    ///
    /// Clones of the same `Arc` yield the same id. The id stays meaningful
    /// only while the allocation is alive; unregister before dropping the
    /// last reference, or the address may be reused by an unrelated object.
    #[must_use]
    pub fn of<T: ?Sized>(owner: &Arc<T>) -> Self {
        Self(Repr::Address(Arc::as_ptr(owner).cast::<()>().addr()))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Minted(uuid) => write!(f, "subscriber:{uuid}"),
            Repr::Address(addr) => write!(f, "subscriber@{addr:#x}"),
        }
    }
}

/// Identity of a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription:{}", self.0)
    }
}
