//! Observer registration and notification fan-out.
//!
//! Each observer is a [`tokio::sync::watch`] channel: the registry holds the
//! sending half ([`ObserverHandle`]) and the client-facing side holds the
//! receiving half ([`ObserverStream`]). A watch channel keeps only the latest
//! value, so bursts coalesce for slow clients, and the registry refuses to
//! send anything not newer than what the observer already has, so delivery
//! is monotonic in version.
//!
//! The registry is owned by the dispatcher task. Nothing here blocks.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::watch;
use tracing::debug;

use crate::error::ObserverError;
use crate::state::{ResourceId, StateChange};

/// Identifier of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// The raw id.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry side of an observer.
#[derive(Debug)]
pub struct ObserverHandle {
    tx: watch::Sender<StateChange>,
}

impl ObserverHandle {
    /// Version of the last change handed to this observer.
    pub fn last_version(&self) -> u64 {
        self.tx.borrow().version
    }

    fn deliver(&self, change: StateChange, observer: ObserverId) -> Result<(), ObserverError> {
        self.tx
            .send(change)
            .map_err(|_closed| ObserverError::DeliveryFailed {
                resource: change.resource,
                observer: observer.into_inner(),
            })
    }
}

/// Client side of an observer.
///
/// Dropping the stream makes the next delivery fail, which unregisters the
/// observer.
#[derive(Debug)]
pub struct ObserverStream {
    rx: watch::Receiver<StateChange>,
}

impl ObserverStream {
    /// The newest change, marking it as seen.
    pub fn latest(&mut self) -> StateChange {
        *self.rx.borrow_and_update()
    }

    /// Wait for a change newer than the last one seen.
    ///
    /// Returns `None` once the observer has been unregistered.
    pub async fn changed(&mut self) -> Option<StateChange> {
        self.rx.changed().await.ok()?;
        Some(self.latest())
    }
}

/// Create an observer channel primed with the state the client starts from.
pub fn observer_channel(initial: StateChange) -> (ObserverHandle, ObserverStream) {
    let (tx, rx) = watch::channel(initial);
    (ObserverHandle { tx }, ObserverStream { rx })
}

/// Counts from one [`ObserverRegistry::notify`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyOutcome {
    /// Observers the change was handed to.
    pub delivered: usize,
    /// Observers skipped because they already had this version or newer.
    pub stale: usize,
    /// Observers whose delivery failed and who were unregistered.
    pub dropped: usize,
}

/// Observers per resource.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: BTreeMap<ResourceId, BTreeMap<ObserverId, ObserverHandle>>,
    next_id: u64,
}

impl ObserverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` as an observer of `resource`.
    pub fn register(&mut self, resource: ResourceId, handle: ObserverHandle) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        debug!(
            %resource,
            observer = %id,
            version = handle.last_version(),
            "Observer registered"
        );
        self.observers
            .entry(resource)
            .or_default()
            .insert(id, handle);
        id
    }

    /// Remove an observer. Returns whether it was registered; calling it
    /// again for the same id is harmless.
    pub fn unregister(&mut self, resource: ResourceId, id: ObserverId) -> bool {
        let Some(slots) = self.observers.get_mut(&resource) else {
            return false;
        };
        let removed = slots.remove(&id).is_some();
        if slots.is_empty() {
            self.observers.remove(&resource);
        }
        if removed {
            debug!(%resource, observer = %id, "Observer unregistered");
        }
        removed
    }

    /// Hand `change` to every observer of its resource.
    ///
    /// Observers that already hold this version or a newer one are skipped.
    /// An observer whose delivery fails is unregistered; the others are not
    /// affected.
    pub fn notify(&mut self, change: &StateChange) -> NotifyOutcome {
        let mut outcome = NotifyOutcome::default();
        let Some(slots) = self.observers.get_mut(&change.resource) else {
            return outcome;
        };

        let mut failed = Vec::new();
        for (id, handle) in slots.iter() {
            if handle.last_version() >= change.version {
                outcome.stale = outcome.stale.saturating_add(1);
                continue;
            }
            match handle.deliver(*change, *id) {
                Ok(()) => outcome.delivered = outcome.delivered.saturating_add(1),
                Err(e) => {
                    debug!(error = %e, "Dropping observer");
                    failed.push(*id);
                }
            }
        }

        outcome.dropped = failed.len();
        for id in failed {
            slots.remove(&id);
        }
        if slots.is_empty() {
            self.observers.remove(&change.resource);
        }
        outcome
    }

    /// Number of observers of `resource`.
    pub fn observer_count(&self, resource: ResourceId) -> usize {
        self.observers.get(&resource).map_or(0, BTreeMap::len)
    }

    /// Number of observers across all resources.
    pub fn len(&self) -> usize {
        self.observers.values().map(BTreeMap::len).sum()
    }

    /// Whether nobody observes anything.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
