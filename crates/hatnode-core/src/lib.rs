//! Resource model and protocol core for the Sense HAT device node.
//!
//! The node exposes two stateful resources, an LED color and a joystick
//! position, plus a discovery listing. This crate owns everything between
//! the hardware and the wire:
//!
//! # Modules
//!
//! - [`value`] -- LED colors, switch positions, and the RGB triples they map to.
//! - [`state`] -- [`ResourceState`], a versioned cell that feeds every write
//!   into the change feed.
//! - [`tree`] -- Path tree and `/.well-known/core` discovery rendering.
//! - [`observer`] -- Observer registry with monotonic, coalescing delivery.
//! - [`dispatcher`] -- Request handling against the resources.
//! - [`service`] -- The single task that serializes requests and fans out
//!   state changes.
//! - [`hardware`] -- Indicator and input traits implemented by `hatnode-hal`.
//! - [`health`] -- Poller liveness counters.
//! - [`protocol`] -- Transport-neutral request and response types.
//! - [`config`] -- Configuration loading from `hatnode-config.yaml`.
//! - [`error`] -- Error types shared across the crate.
//!
//! [`ResourceState`]: state::ResourceState

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hardware;
pub mod health;
pub mod observer;
pub mod protocol;
pub mod service;
pub mod state;
pub mod tree;
pub mod value;

pub use dispatcher::ResourceDispatcher;
pub use observer::ObserverRegistry;
pub use service::{DispatcherHandle, DispatcherService};
pub use state::{ResourceId, ResourceState};
pub use tree::ResourceTree;
