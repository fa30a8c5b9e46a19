//! The joystick poller.
//!
//! [`HardwarePoller`] runs a blocking read loop on its own OS thread. Each
//! raw event goes through a [`SwitchMachine`]; an accepted transition is
//! written to the joystick [`ResourceState`], which enqueues the change for
//! the dispatcher task, and then the indicator shows the feedback color.
//!
//! Read errors are logged, counted in [`PollerHealth`], and retried with
//! exponential backoff. End of input stops the loop. The stop flag is
//! checked between events, so a loop blocked in a read exits after the next
//! event arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hatnode_core::hardware::{IndicatorHandle, InputSource, KeyAction, RawInputEvent};
use hatnode_core::health::PollerHealth;
use hatnode_core::state::ResourceState;
use hatnode_core::value::SwitchPosition;
use tracing::{info, warn};

/// First retry delay after a failed read.
pub const BACKOFF_INITIAL: Duration = Duration::from_millis(50);
/// Longest retry delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Switch state machine
// ---------------------------------------------------------------------------

/// Debounced two-position switch driven by key events.
///
/// From `down`, a key release moves to `up`; from `up`, a key press moves
/// to `down`. Anything else is ignored, as is any event arriving less than
/// the debounce window after the last accepted transition. The first event
/// is never debounced.
#[derive(Debug, Clone)]
pub struct SwitchMachine {
    position: SwitchPosition,
    debounce: Duration,
    last_transition: Option<Instant>,
}

impl SwitchMachine {
    /// A machine resting at `initial`.
    pub const fn new(initial: SwitchPosition, debounce: Duration) -> Self {
        Self {
            position: initial,
            debounce,
            last_transition: None,
        }
    }

    /// Current position.
    pub const fn position(&self) -> SwitchPosition {
        self.position
    }

    /// Feed one event observed at `now`. Returns the new position if the
    /// event caused a transition.
    pub fn on_event(&mut self, event: &RawInputEvent, now: Instant) -> Option<SwitchPosition> {
        let action = event.key_action()?;
        if let Some(last) = self.last_transition {
            if now.saturating_duration_since(last) < self.debounce {
                return None;
            }
        }
        let next = match (self.position, action) {
            (SwitchPosition::Down, KeyAction::Released) => SwitchPosition::Up,
            (SwitchPosition::Up, KeyAction::Pressed) => SwitchPosition::Down,
            _ => return None,
        };
        self.position = next;
        self.last_transition = Some(now);
        Some(next)
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    const fn new() -> Self {
        Self {
            next: BACKOFF_INITIAL,
        }
    }

    fn delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(BACKOFF_MAX);
        delay
    }

    const fn reset(&mut self) {
        self.next = BACKOFF_INITIAL;
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The stop flag was set.
    Stopped,
    /// The input device reported end of stream.
    InputClosed,
}

/// Marks the poller stopped however the thread leaves the loop.
struct StopGuard {
    health: Arc<PollerHealth>,
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.health.mark_stopped("poller panicked");
        } else {
            self.health.mark_stopped("poller exited");
        }
    }
}

/// Reads joystick events and publishes debounced switch transitions.
#[derive(Debug)]
pub struct HardwarePoller<I> {
    input: I,
    machine: SwitchMachine,
    state: Arc<ResourceState<SwitchPosition>>,
    indicator: IndicatorHandle,
    health: Arc<PollerHealth>,
    stop: Arc<AtomicBool>,
    backoff: Backoff,
}

impl<I: InputSource> HardwarePoller<I> {
    /// Build a poller starting from the joystick state's current position.
    pub fn new(
        input: I,
        state: Arc<ResourceState<SwitchPosition>>,
        indicator: IndicatorHandle,
        health: Arc<PollerHealth>,
        debounce: Duration,
    ) -> Self {
        let machine = SwitchMachine::new(state.read().value, debounce);
        Self {
            input,
            machine,
            state,
            indicator,
            health,
            stop: Arc::new(AtomicBool::new(false)),
            backoff: Backoff::new(),
        }
    }

    /// The flag that asks the loop to exit.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the read loop on the current thread.
    pub fn run(mut self) -> PollerExit {
        let _guard = StopGuard {
            health: Arc::clone(&self.health),
        };
        self.health.mark_running();
        info!(
            position = %self.machine.position(),
            debounce = ?self.machine.debounce,
            "Joystick poller running"
        );

        loop {
            if self.stop.load(Ordering::Acquire) {
                info!("Joystick poller stopping on request");
                self.health.mark_stopped("stop requested");
                return PollerExit::Stopped;
            }

            match self.input.next_event() {
                Ok(Some(event)) => {
                    self.backoff.reset();
                    self.on_event(&event, Instant::now());
                }
                Ok(None) => {
                    warn!("Joystick input closed");
                    self.health.mark_stopped("input closed");
                    return PollerExit::InputClosed;
                }
                Err(e) => {
                    self.health.record_read_error();
                    let delay = self.backoff.delay();
                    warn!(error = %e, retry_in = ?delay, "Joystick read failed");
                    thread::sleep(delay);
                }
            }
        }
    }

    fn on_event(&mut self, event: &RawInputEvent, now: Instant) {
        self.health.record_event();
        let Some(position) = self.machine.on_event(event, now) else {
            return;
        };
        let version = self.state.write(position);
        self.health.record_transition();
        info!(%position, version, "Joystick transition");
        self.indicator.show(position.feedback_color());
    }
}

impl<I: InputSource + 'static> HardwarePoller<I> {
    /// Run the read loop on a new OS thread.
    pub fn spawn(self) -> std::io::Result<PollerHandle> {
        let stop = self.stop_flag();
        let thread = thread::Builder::new()
            .name(String::from("joystick-poller"))
            .spawn(move || self.run())?;
        Ok(PollerHandle { stop, thread })
    }
}

/// Owner's handle to a spawned poller thread.
#[derive(Debug)]
pub struct PollerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<PollerExit>,
}

impl PollerHandle {
    /// Ask the loop to exit after its current read.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether the thread has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the thread. `None` means it panicked.
    pub fn join(self) -> Option<PollerExit> {
        self.thread.join().ok()
    }
}
