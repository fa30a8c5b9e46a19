//! Liveness signal for the hardware poller.
//!
//! The poller runs on its own OS thread and may die without taking the
//! process down. [`PollerHealth`] is the shared record the poller updates
//! and the `/health` resource reports, so a dead poller is visible while the
//! dispatcher keeps serving last-known state.

use std::fmt;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Lifecycle of the poller thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    /// Created but not yet reading.
    Starting,
    /// Inside the read loop.
    Running,
    /// The read loop has exited.
    Stopped,
}

impl PollerStatus {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }

    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Shared poller health record.
#[derive(Debug)]
pub struct PollerHealth {
    status: AtomicU8,
    events: AtomicU64,
    transitions: AtomicU64,
    read_errors: AtomicU64,
    created_at: DateTime<Utc>,
    stop_reason: Mutex<Option<String>>,
}

impl PollerHealth {
    /// A fresh record in the `starting` state.
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(PollerStatus::Starting.as_u8()),
            events: AtomicU64::new(0),
            transitions: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            created_at: Utc::now(),
            stop_reason: Mutex::new(None),
        }
    }

    /// Current status.
    pub fn status(&self) -> PollerStatus {
        PollerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Mark the read loop as entered.
    pub fn mark_running(&self) {
        self.status
            .store(PollerStatus::Running.as_u8(), Ordering::Release);
    }

    /// Mark the read loop as exited. The first reason recorded wins.
    pub fn mark_stopped(&self, reason: impl Into<String>) {
        {
            let mut slot = self
                .stop_reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(reason.into());
            }
        }
        self.status
            .store(PollerStatus::Stopped.as_u8(), Ordering::Release);
    }

    /// Count one raw event read from the device.
    pub fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one accepted state transition.
    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed device read.
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the record.
    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: self.status(),
            events: self.events.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            stop_reason: self
                .stop_reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            observers: 0,
            since: self.created_at.to_rfc3339(),
        }
    }
}

impl Default for PollerHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`PollerHealth`] served by the `/health` resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Poller lifecycle state.
    pub status: PollerStatus,
    /// Raw events read.
    pub events: u64,
    /// Accepted switch transitions.
    pub transitions: u64,
    /// Failed reads.
    pub read_errors: u64,
    /// Why the poller stopped, if it has.
    pub stop_reason: Option<String>,
    /// Live observer registrations across all resources.
    pub observers: usize,
    /// RFC 3339 timestamp of when the record was created.
    pub since: String,
}

impl HealthReport {
    /// Attach the dispatcher's observer count.
    #[must_use]
    pub const fn with_observers(mut self, observers: usize) -> Self {
        self.observers = observers;
        self
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "poller={} events={} transitions={} read_errors={} observers={} since={}",
            self.status.name(),
            self.events,
            self.transitions,
            self.read_errors,
            self.observers,
            self.since
        )?;
        if let Some(reason) = &self.stop_reason {
            write!(f, " reason=\"{reason}\"")?;
        }
        Ok(())
    }
}
