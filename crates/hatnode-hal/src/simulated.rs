//! In-process hardware for running without a Sense HAT.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use hatnode_core::hardware::{HardwareError, Indicator, InputSource, RawInputEvent};
use hatnode_core::value::Rgb;

/// Indicator that records every color it is given.
///
/// Clones share the same history, so a test can keep one clone and hand
/// the other to the code under test.
#[derive(Debug, Clone, Default)]
pub struct SimulatedIndicator {
    history: Arc<Mutex<Vec<Rgb>>>,
    failing: Arc<AtomicBool>,
}

impl SimulatedIndicator {
    /// A fresh indicator with empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every color set so far, oldest first. Clears show up as [`Rgb::OFF`].
    pub fn history(&self) -> Vec<Rgb> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The color currently shown, if any was ever set.
    pub fn current(&self) -> Option<Rgb> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl Indicator for SimulatedIndicator {
    fn set(&mut self, color: Rgb) -> Result<(), HardwareError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(simulated_io("writing simulated indicator"));
        }
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(color);
        Ok(())
    }
}

/// One step of a [`ScriptedInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver this event.
    Event(RawInputEvent),
    /// Fail one read.
    ReadError,
    /// Block for this long before the next step.
    Pause(Duration),
}

impl From<RawInputEvent> for ScriptStep {
    fn from(event: RawInputEvent) -> Self {
        Self::Event(event)
    }
}

/// Input that plays back a fixed script, then reports end of stream.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedInput {
    /// Play back `steps` in order.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Play back `events` with nothing in between.
    pub fn events(events: impl IntoIterator<Item = RawInputEvent>) -> Self {
        Self::new(events.into_iter().map(ScriptStep::Event))
    }
}

impl InputSource for ScriptedInput {
    fn next_event(&mut self) -> Result<Option<RawInputEvent>, HardwareError> {
        loop {
            match self.steps.pop_front() {
                None => return Ok(None),
                Some(ScriptStep::Event(event)) => return Ok(Some(event)),
                Some(ScriptStep::ReadError) => return Err(simulated_io("reading scripted input")),
                Some(ScriptStep::Pause(delay)) => thread::sleep(delay),
            }
        }
    }
}

/// Sending side of a [`ChannelInput`]. Dropping every sender ends the
/// input stream.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: mpsc::Sender<RawInputEvent>,
}

impl InputSender {
    /// Queue an event. Returns `false` if the input side is gone.
    pub fn send(&self, event: RawInputEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Input fed at runtime through an [`InputSender`].
#[derive(Debug)]
pub struct ChannelInput {
    rx: mpsc::Receiver<RawInputEvent>,
}

/// Create a connected sender and input source.
pub fn channel_input() -> (InputSender, ChannelInput) {
    let (tx, rx) = mpsc::channel();
    (InputSender { tx }, ChannelInput { rx })
}

impl InputSource for ChannelInput {
    fn next_event(&mut self) -> Result<Option<RawInputEvent>, HardwareError> {
        Ok(self.rx.recv().ok())
    }
}

fn simulated_io(context: &'static str) -> HardwareError {
    HardwareError::Io {
        context,
        path: PathBuf::from("simulated"),
        source: std::io::Error::other("simulated failure"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hatnode_core::hardware::{IndicatorHandle, KeyAction};
    use hatnode_core::value::LedColor;

    #[test]
    fn indicator_history_is_shared_between_clones() {
        let indicator = SimulatedIndicator::new();
        let handle = IndicatorHandle::new(indicator.clone());
        handle.show(LedColor::Orange.rgb());
        handle.blank();
        assert_eq!(indicator.history(), vec![LedColor::Orange.rgb(), Rgb::OFF]);
        assert_eq!(indicator.current(), Some(Rgb::OFF));
    }

    #[test]
    fn failing_indicator_records_nothing() {
        let indicator = SimulatedIndicator::new();
        indicator.set_failing(true);
        let handle = IndicatorHandle::new(indicator.clone());
        assert!(handle.set(LedColor::Red.rgb()).is_err());
        assert_eq!(indicator.current(), None);
    }

    #[test]
    fn script_plays_in_order_then_ends() {
        let press = RawInputEvent::key(28, KeyAction::Pressed);
        let mut input = ScriptedInput::new([
            ScriptStep::ReadError,
            ScriptStep::Pause(Duration::from_millis(1)),
            press.into(),
        ]);
        assert!(input.next_event().is_err());
        assert_eq!(input.next_event().unwrap(), Some(press));
        assert_eq!(input.next_event().unwrap(), None);
    }

    #[test]
    fn channel_input_ends_when_senders_drop() {
        let (sender, mut input) = channel_input();
        assert!(sender.send(RawInputEvent::sync()));
        drop(sender);
        assert_eq!(input.next_event().unwrap(), Some(RawInputEvent::sync()));
        assert_eq!(input.next_event().unwrap(), None);
    }
}
