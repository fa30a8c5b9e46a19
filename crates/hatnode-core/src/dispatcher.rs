//! Protocol-facing resource logic.
//!
//! [`ResourceDispatcher`] resolves a request path against the
//! [`ResourceTree`], applies the method to the resource behind it, and
//! renders the outcome as a [`Response`]. It is only ever driven from the
//! dispatcher task, one request at a time.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ResourceError;
use crate::hardware::IndicatorHandle;
use crate::health::PollerHealth;
use crate::protocol::{Method, Request, Response, Status};
use crate::state::{CasOutcome, ResourceId, ResourceState, StateChange, Versioned};
use crate::tree::{Endpoint, ResourceTree};
use crate::value::{LedColor, ResourceValue, SwitchPosition};

/// Payload returned by an accepted LED write.
pub const COLOR_UPDATED: &str = "Color updated successfully";
/// Payload returned when an LED write names an unknown color.
pub const INVALID_COLOR: &str = "Invalid color parameter";

/// Handles requests against the device resources.
#[derive(Debug)]
pub struct ResourceDispatcher {
    tree: ResourceTree,
    led: Arc<ResourceState<LedColor>>,
    joystick: Arc<ResourceState<SwitchPosition>>,
    indicator: IndicatorHandle,
    health: Arc<PollerHealth>,
}

impl ResourceDispatcher {
    /// Assemble a dispatcher over the given state cells and hardware.
    pub const fn new(
        tree: ResourceTree,
        led: Arc<ResourceState<LedColor>>,
        joystick: Arc<ResourceState<SwitchPosition>>,
        indicator: IndicatorHandle,
        health: Arc<PollerHealth>,
    ) -> Self {
        Self {
            tree,
            led,
            joystick,
            indicator,
            health,
        }
    }

    /// The path tree this dispatcher routes through.
    pub const fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    /// Current value and version of a stateful resource.
    pub fn get(&self, resource: ResourceId) -> Versioned<ResourceValue> {
        match resource {
            ResourceId::Led => lift(self.led.read()),
            ResourceId::Joystick => lift(self.joystick.read()),
        }
    }

    /// The current state of `resource` as a change record, which is what a
    /// new observer starts from.
    pub fn snapshot(&self, resource: ResourceId) -> StateChange {
        let current = self.get(resource);
        StateChange {
            resource,
            version: current.version,
            value: current.value,
        }
    }

    /// Write `payload` to a stateful resource.
    ///
    /// For the LED the payload must name one of the accepted colors. An
    /// unknown color blanks the display and leaves the state untouched.
    /// With `if_match`, the write only applies if the LED is still at that
    /// version. The joystick is read-only.
    pub fn put(
        &self,
        resource: ResourceId,
        payload: &[u8],
        if_match: Option<u64>,
    ) -> Result<Versioned<ResourceValue>, ResourceError> {
        match resource {
            ResourceId::Led => self.put_led(payload, if_match),
            ResourceId::Joystick => Err(ResourceError::MethodNotAllowed {
                method: Method::Put,
                path: format!("/{resource}"),
            }),
        }
    }

    fn put_led(
        &self,
        payload: &[u8],
        if_match: Option<u64>,
    ) -> Result<Versioned<ResourceValue>, ResourceError> {
        let Some(color) = std::str::from_utf8(payload)
            .ok()
            .and_then(|text| text.trim().parse::<LedColor>().ok())
        else {
            debug!(payload = %String::from_utf8_lossy(payload), "Rejected LED payload");
            self.indicator.blank();
            return Err(ResourceError::InvalidPayload(INVALID_COLOR.to_owned()));
        };

        let version = match if_match {
            None => self.led.write(color),
            Some(expected) => match self.led.compare_and_set(expected, color) {
                CasOutcome::Applied(version) => version,
                CasOutcome::Conflict(current) => {
                    return Err(ResourceError::PreconditionFailed { expected, current });
                }
            },
        };
        self.indicator.show(color.rgb());
        info!(%color, version, "LED color updated");

        Ok(Versioned {
            value: ResourceValue::Led(color),
            version,
        })
    }

    /// Answer a request. `observers` is the number of live observer
    /// registrations, reported by `/health`.
    pub fn handle(&self, request: &Request, observers: usize) -> Response {
        self.try_handle(request, observers)
            .unwrap_or_else(Response::from)
    }

    fn try_handle(&self, request: &Request, observers: usize) -> Result<Response, ResourceError> {
        let resource = self.tree.resolve(&request.path)?;
        let not_allowed = || ResourceError::MethodNotAllowed {
            method: request.method,
            path: request.path.clone(),
        };

        match (resource.endpoint, request.method) {
            (Endpoint::State(id), Method::Get) => Ok(render(self.get(id))),
            (Endpoint::State(id), Method::Put) => {
                let written = self.put(id, &request.payload, request.if_match)?;
                Ok(Response::text(Status::Changed, COLOR_UPDATED).with_version(written.version))
            }
            (Endpoint::Discovery, Method::Get) => Ok(Response::links(self.tree.render_discovery())),
            (Endpoint::Health, Method::Get) => {
                let report = self.health.report().with_observers(observers);
                Ok(Response::text(Status::Content, report.to_string()))
            }
            _ => Err(not_allowed()),
        }
    }
}

/// Render a stateful read.
pub fn render(current: Versioned<ResourceValue>) -> Response {
    Response::text(Status::Content, current.value.to_string()).with_version(current.version)
}

fn lift<T: Into<ResourceValue>>(versioned: Versioned<T>) -> Versioned<ResourceValue> {
    Versioned {
        value: versioned.value.into(),
        version: versioned.version,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::hardware::{HardwareError, Indicator};
    use crate::protocol::ContentFormat;
    use crate::state::{ChangeFeed, change_feed};
    use crate::value::Rgb;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Rgb>>>);

    impl Recorder {
        fn colors(&self) -> Vec<Rgb> {
            self.0.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl Indicator for Recorder {
        fn set(&mut self, color: Rgb) -> Result<(), HardwareError> {
            if let Ok(mut colors) = self.0.lock() {
                colors.push(color);
            }
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: ResourceDispatcher,
        joystick: Arc<ResourceState<SwitchPosition>>,
        recorder: Recorder,
        feed: ChangeFeed,
    }

    impl Fixture {
        fn handle(&self, request: &Request) -> Response {
            self.dispatcher.handle(request, 0)
        }
    }

    fn fixture() -> Fixture {
        let (notifier, feed) = change_feed();
        let led = Arc::new(ResourceState::new(
            ResourceId::Led,
            LedColor::Green,
            notifier.clone(),
        ));
        let joystick = Arc::new(ResourceState::new(
            ResourceId::Joystick,
            SwitchPosition::Down,
            notifier,
        ));
        let recorder = Recorder::default();
        let dispatcher = ResourceDispatcher::new(
            ResourceTree::standard(),
            led,
            Arc::clone(&joystick),
            IndicatorHandle::new(recorder.clone()),
            Arc::new(PollerHealth::new()),
        );
        Fixture {
            dispatcher,
            joystick,
            recorder,
            feed,
        }
    }

    #[test]
    fn every_accepted_color_reads_back() {
        let fx = fixture();
        for color in LedColor::ALL {
            let put = fx.handle(&Request::put("/led", color.name()));
            assert_eq!(put.status, Status::Changed);
            assert_eq!(put.payload, COLOR_UPDATED);

            let get = fx.handle(&Request::get("/led"));
            assert_eq!(get.status, Status::Content);
            assert_eq!(get.payload, color.name());
            assert_eq!(get.version, put.version);
        }
        let expected: Vec<Rgb> = LedColor::ALL.iter().map(|c| c.rgb()).collect();
        assert_eq!(fx.recorder.colors(), expected);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let fx = fixture();
        let put = fx.handle(&Request::put("/led", "orange\n"));
        assert_eq!(put.status, Status::Changed);
        assert_eq!(
            fx.dispatcher.get(ResourceId::Led).value,
            ResourceValue::Led(LedColor::Orange)
        );
    }

    #[test]
    fn unknown_color_blanks_display_and_keeps_state() {
        let mut fx = fixture();
        let put = fx.handle(&Request::put("/led", "purple"));
        assert_eq!(put.status, Status::BadRequest);
        assert_eq!(put.payload, INVALID_COLOR);

        let get = fx.handle(&Request::get("/led"));
        assert_eq!(get.payload, "green");
        assert_eq!(get.version, Some(0));
        assert_eq!(fx.recorder.colors(), vec![Rgb::OFF]);
        assert!(fx.feed.try_recv().is_err());
    }

    #[test]
    fn non_utf8_payload_is_invalid() {
        let fx = fixture();
        let result = fx.dispatcher.put(ResourceId::Led, &[0xff, 0xfe], None);
        assert_eq!(
            result,
            Err(ResourceError::InvalidPayload(INVALID_COLOR.to_owned()))
        );
    }

    #[test]
    fn joystick_rejects_every_write() {
        let mut fx = fixture();
        for payload in ["up", "down", "", "red"] {
            let put = fx.handle(&Request::put("/joystick", payload));
            assert_eq!(put.status, Status::MethodNotAllowed);
        }
        assert_eq!(fx.joystick.read().version, 0);
        assert_eq!(fx.joystick.read().value, SwitchPosition::Down);
        assert!(fx.feed.try_recv().is_err());
        assert!(fx.recorder.colors().is_empty());
    }

    #[test]
    fn joystick_reads_reflect_poller_writes() {
        let fx = fixture();
        fx.joystick.write(SwitchPosition::Up);
        let get = fx.handle(&Request::get("joystick"));
        assert_eq!(get.payload, "up");
        assert_eq!(get.version, Some(1));
    }

    #[test]
    fn reads_never_notify() {
        let mut fx = fixture();
        let _ = fx.handle(&Request::get("/led"));
        let _ = fx.handle(&Request::get("/joystick"));
        let _ = fx.handle(&Request::get("/.well-known/core"));
        assert!(fx.feed.try_recv().is_err());
    }

    #[test]
    fn accepted_write_notifies_once() {
        let mut fx = fixture();
        let _ = fx.handle(&Request::put("/led", "red"));
        let change = fx.feed.try_recv().ok();
        assert_eq!(
            change.map(|c| (c.version, c.value)),
            Some((1, ResourceValue::Led(LedColor::Red)))
        );
        assert!(fx.feed.try_recv().is_err());
    }

    #[test]
    fn conditional_write_checks_version() {
        let fx = fixture();
        let stale = fx.handle(&Request::put("/led", "red").if_match(5));
        assert_eq!(stale.status, Status::PreconditionFailed);
        assert_eq!(stale.version, Some(0));
        assert!(fx.recorder.colors().is_empty());

        let fresh = fx.handle(&Request::put("/led", "red").if_match(0));
        assert_eq!(fresh.status, Status::Changed);
        assert_eq!(fresh.version, Some(1));
    }

    #[test]
    fn discovery_lists_visible_resources_as_link_format() {
        let fx = fixture();
        let response = fx.handle(&Request::get("/.well-known/core"));
        assert_eq!(response.status, Status::Content);
        assert_eq!(response.payload, "led,joystick");
        assert_eq!(response.content_format, ContentFormat::LinkFormat);
        assert_eq!(response.version, None);
    }

    #[test]
    fn health_reports_poller_status() {
        let fx = fixture();
        let response = fx.handle(&Request::get("/health"));
        assert_eq!(response.status, Status::Content);
        assert!(response.payload.starts_with("poller=starting"));
        assert!(response.payload.contains(" observers=0 "));

        let response = fx.dispatcher.handle(&Request::get("/health"), 2);
        assert!(response.payload.contains(" observers=2 "));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let fx = fixture();
        let response = fx.handle(&Request::get("/temperature"));
        assert_eq!(response.status, Status::NotFound);
    }

    #[test]
    fn unsupported_methods_are_rejected() {
        let fx = fixture();
        for request in [
            Request::new(Method::Post, "/led"),
            Request::new(Method::Delete, "/joystick"),
            Request::put("/.well-known/core", "x"),
            Request::put("/health", "x"),
        ] {
            assert_eq!(fx.handle(&request).status, Status::MethodNotAllowed);
        }
    }
}
