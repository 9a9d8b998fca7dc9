//! Subscription registry: subscriptions grouped by owner for bulk teardown.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::envelope::Tag;
use crate::gate::DeliveryGate;
use crate::id::{SubscriberId, SubscriptionId};

const CREATED: u8 = 0;
const ACTIVE: u8 = 1;
const CANCELLED: u8 = 2;

/// Lifecycle of a subscription. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// Registered; its pipeline has not started yet.
    Created,
    /// Its pipeline is consuming envelopes.
    Active,
    /// Cancelled; no callback will start again.
    Cancelled,
}

/// Shared bookkeeping for one subscription, held by the registry and by
/// its pipeline.
pub(crate) struct SubscriptionHandle {
    id: SubscriptionId,
    subscriber: SubscriberId,
    tag: Tag,
    event_type: String,
    state: AtomicU8,
    gate: DeliveryGate,
    token: CancellationToken,
}

impl SubscriptionHandle {
    pub(crate) fn new(subscriber: SubscriberId, tag: Tag, event_type: &str) -> Self {
        Self {
            id: SubscriptionId::new(),
            subscriber,
            tag,
            event_type: event_type.to_owned(),
            state: AtomicU8::new(CREATED),
            gate: DeliveryGate::new(),
            token: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    pub(crate) fn tag(&self) -> Tag {
        self.tag
    }

    pub(crate) fn gate(&self) -> &DeliveryGate {
        &self.gate
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        match self.state.load(Ordering::Acquire) {
            CREATED => SubscriptionState::Created,
            ACTIVE => SubscriptionState::Active,
            _ => SubscriptionState::Cancelled,
        }
    }

    /// `Created → Active`. Fails if the subscription was cancelled first.
    pub(crate) fn activate(&self) -> bool {
        self.state
            .compare_exchange(CREATED, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to `Cancelled`, stop the pipeline and close the gate without
    /// waiting for a running callback. Returns `true` for the call that
    /// cancelled it.
    pub(crate) fn mark_cancelled(&self) -> bool {
        let previous = self.state.swap(CANCELLED, Ordering::AcqRel);
        self.gate.mark_closed();
        self.token.cancel();
        previous != CANCELLED
    }

    /// Wait until a callback that started before cancellation returns.
    pub(crate) fn wait_idle(&self) {
        self.gate.wait_idle();
    }

}

/// Read-only view of a registered subscription.
#[derive(Clone)]
pub struct Subscription {
    handle: Arc<SubscriptionHandle>,
}

impl Subscription {
    pub(crate) fn new(handle: Arc<SubscriptionHandle>) -> Self {
        Self { handle }
    }

    /// Subscription identity.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.handle.id
    }

    /// Owner identity.
    #[must_use]
    pub fn subscriber(&self) -> SubscriberId {
        self.handle.subscriber
    }

    /// Tag the subscription filters on.
    #[must_use]
    pub fn tag(&self) -> Tag {
        self.handle.tag
    }

    /// Name of the expected payload type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.handle.event_type
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.handle.state()
    }

    /// Whether callbacks may still start.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.handle.gate.is_open()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.handle.id)
            .field("subscriber", &self.handle.subscriber)
            .field("tag", &self.handle.tag)
            .field("event_type", &self.handle.event_type)
            .field("state", &self.state())
            .finish()
    }
}

/// Outcome of [`SubscriptionRegistry::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    /// The subscriber had no group before.
    pub(crate) created: bool,
    /// The caller must register the scope hook.
    pub(crate) bind: bool,
}

struct SubscriberGroup {
    subscriptions: Vec<Arc<SubscriptionHandle>>,
    scope_bound: bool,
}

/// Subscriptions keyed by owner, with revoke-all semantics.
///
/// Each owner's group is mutated under its map shard lock, so adding a
/// subscription and cancelling the group never interleave: a subscription
/// is either in the group that gets cancelled or in a fresh group created
/// afterwards.
#[derive(Default)]
pub struct SubscriptionRegistry {
    groups: DashMap<SubscriberId, SubscriberGroup>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriber_count", &self.len())
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Add `handle` to the group of `subscriber`, creating the group if
    /// needed. With `claim_scope`, also claims the group's one scope
    /// binding.
    pub(crate) fn put(
        &self,
        subscriber: SubscriberId,
        handle: Arc<SubscriptionHandle>,
        claim_scope: bool,
    ) -> Placement {
        match self.groups.entry(subscriber) {
            Entry::Occupied(mut group) => {
                let group = group.get_mut();
                group.subscriptions.push(handle);
                let bind = claim_scope && !std::mem::replace(&mut group.scope_bound, true);
                Placement {
                    created: false,
                    bind,
                }
            },
            Entry::Vacant(slot) => {
                slot.insert(SubscriberGroup {
                    subscriptions: vec![handle],
                    scope_bound: claim_scope,
                });
                Placement {
                    created: true,
                    bind: claim_scope,
                }
            },
        }
    }

    /// Mark `subscriber`'s existing group as bound to a host scope.
    /// Returns `false` for an unknown subscriber or an already bound group.
    pub(crate) fn bind_scope(&self, subscriber: SubscriberId) -> bool {
        self.groups
            .get_mut(&subscriber)
            .is_some_and(|mut group| !std::mem::replace(&mut group.scope_bound, true))
    }

    /// Remove `subscriber`'s group and cancel every subscription in it.
    ///
    /// Returns how many subscriptions were cancelled; `0` for an unknown
    /// subscriber. When this returns, none of those callbacks can start,
    /// and callbacks running on other threads have finished.
    pub fn cancel_all(&self, subscriber: SubscriberId) -> usize {
        // Marking happens under the shard lock, so a concurrent caller that
        // finds the group gone also finds every gate closed. Waiting for
        // running callbacks happens after the lock is released, so those
        // callbacks may themselves subscribe or unregister.
        let group = match self.groups.entry(subscriber) {
            Entry::Occupied(group) => {
                for handle in &group.get().subscriptions {
                    handle.mark_cancelled();
                }
                group.remove()
            },
            Entry::Vacant(_) => {
                trace!(subscriber = %subscriber, "No subscriptions to cancel");
                return 0;
            },
        };

        for handle in &group.subscriptions {
            handle.wait_idle();
        }

        debug!(
            subscriber = %subscriber,
            cancelled = group.subscriptions.len(),
            "Subscriber group cancelled"
        );
        group.subscriptions.len()
    }

    /// Cancel every group. Returns how many subscriptions were cancelled.
    pub(crate) fn cancel_everything(&self) -> usize {
        let subscribers: Vec<SubscriberId> = self.groups.iter().map(|g| *g.key()).collect();
        subscribers
            .into_iter()
            .map(|subscriber| self.cancel_all(subscriber))
            .fold(0, usize::saturating_add)
    }

    /// Number of subscribers with a group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no subscriber has a group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether `subscriber` has a group.
    #[must_use]
    pub fn contains(&self, subscriber: SubscriberId) -> bool {
        self.groups.contains_key(&subscriber)
    }

    /// Total live subscriptions across all groups.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.groups
            .iter()
            .map(|group| group.subscriptions.len())
            .fold(0, usize::saturating_add)
    }

    /// Subscriptions currently owned by `subscriber`.
    #[must_use]
    pub fn subscriptions_of(&self, subscriber: SubscriberId) -> Vec<Subscription> {
        self.groups
            .get(&subscriber)
            .map(|group| {
                group
                    .subscriptions
                    .iter()
                    .map(|handle| Subscription::new(Arc::clone(handle)))
                    .collect()
            })
            .unwrap_or_default()
    }
}
