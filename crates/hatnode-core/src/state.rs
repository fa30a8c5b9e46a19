//! Versioned state cells shared between the dispatcher and the poller.
//!
//! A [`ResourceState`] guards a `(value, version)` pair behind one mutex so
//! readers never see a torn pair. Every successful write bumps the version
//! once and pushes exactly one [`StateChange`] onto the [`ChangeNotifier`]
//! it was built with. The notifier side is an unbounded tokio channel, so a
//! write from the hardware thread never blocks on the dispatcher.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::value::ResourceValue;

/// Identity of a stateful, observable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceId {
    /// The LED display.
    Led,
    /// The joystick switch.
    Joystick,
}

impl ResourceId {
    /// Path segment the resource is mounted under by default.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Led => "led",
            Self::Joystick => "joystick",
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value together with the version it was written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The value.
    pub value: T,
    /// Number of writes applied before this value became current.
    pub version: u64,
}

/// One applied change of a resource, as fanned out to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    /// Which resource changed.
    pub resource: ResourceId,
    /// Version of the new value.
    pub version: u64,
    /// The new value.
    pub value: ResourceValue,
}

/// Receiving end of the change feed, drained by the dispatcher task.
pub type ChangeFeed = mpsc::UnboundedReceiver<StateChange>;

/// Sending end of the change feed.
///
/// Cloned into every [`ResourceState`]. Sending never blocks and never
/// fails the writer; a closed feed only means nobody is listening anymore.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<StateChange>,
}

impl ChangeNotifier {
    /// Enqueue a change for the dispatcher.
    pub fn notify(&self, change: StateChange) {
        if self.tx.send(change).is_err() {
            debug!(
                resource = %change.resource,
                version = change.version,
                "Change feed closed, dropping notification"
            );
        }
    }
}

/// Create a connected notifier / feed pair.
pub fn change_feed() -> (ChangeNotifier, ChangeFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChangeNotifier { tx }, rx)
}

/// Result of [`ResourceState::compare_and_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected version matched; the value was written at this version.
    Applied(u64),
    /// Another write got there first; this is the current version.
    Conflict(u64),
}

impl CasOutcome {
    /// Whether the write was applied.
    pub const fn applied(self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The version after the call, whichever way it went.
    pub const fn version(self) -> u64 {
        match self {
            Self::Applied(v) | Self::Conflict(v) => v,
        }
    }
}

/// A synchronized, versioned state cell for one resource.
#[derive(Debug)]
pub struct ResourceState<T> {
    resource: ResourceId,
    cell: Mutex<Versioned<T>>,
    notifier: ChangeNotifier,
}

impl<T> ResourceState<T>
where
    T: Copy + Into<ResourceValue>,
{
    /// Create a cell holding `initial` at version 0.
    pub const fn new(resource: ResourceId, initial: T, notifier: ChangeNotifier) -> Self {
        Self {
            resource,
            cell: Mutex::new(Versioned {
                value: initial,
                version: 0,
            }),
            notifier,
        }
    }

    /// The resource this cell belongs to.
    pub const fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Read the current value and its version as one unit.
    pub fn read(&self) -> Versioned<T> {
        *self.lock()
    }

    /// Unconditionally replace the value. Returns the new version.
    pub fn write(&self, value: T) -> u64 {
        let mut cell = self.lock();
        self.apply(&mut cell, value)
    }

    /// Replace the value only if the current version is `expected`.
    pub fn compare_and_set(&self, expected: u64, value: T) -> CasOutcome {
        let mut cell = self.lock();
        if cell.version != expected {
            return CasOutcome::Conflict(cell.version);
        }
        CasOutcome::Applied(self.apply(&mut cell, value))
    }

    fn apply(&self, cell: &mut Versioned<T>, value: T) -> u64 {
        cell.value = value;
        cell.version = cell.version.saturating_add(1);
        // Sent under the lock so the feed order matches version order.
        self.notifier.notify(StateChange {
            resource: self.resource,
            version: cell.version,
            value: value.into(),
        });
        cell.version
    }

    fn lock(&self) -> MutexGuard<'_, Versioned<T>> {
        // The cell holds plain Copy data; a panic mid-write cannot leave it
        // half-updated, so a poisoned lock is still usable.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
