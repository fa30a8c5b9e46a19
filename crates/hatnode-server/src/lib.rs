//! HTTP binding for the hatnode resource protocol.
//!
//! This crate provides an Axum server that exposes the device resources:
//!
//! - **Resource requests** on any path (`GET /led`, `PUT /led`,
//!   `GET /.well-known/core`, ...), translated into protocol requests for
//!   the dispatcher task
//! - **Observe streams** at `GET /ws/<path>`, delivering JSON state frames
//!   over `WebSocket`
//!
//! # Architecture
//!
//! Handlers hold only a [`DispatcherHandle`]. Each request becomes one
//! command on the dispatcher's queue and waits for its reply, so the
//! resource logic stays single-threaded no matter how many connections
//! are open.
//!
//! [`DispatcherHandle`]: hatnode_core::service::DispatcherHandle

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
