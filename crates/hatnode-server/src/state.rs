//! Shared application state for the HTTP binding.
//!
//! Handlers never touch resources directly. Everything goes through the
//! [`DispatcherHandle`], so requests from every connection are serialized
//! by the dispatcher task.

use hatnode_core::service::DispatcherHandle;

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    dispatcher: DispatcherHandle,
}

impl AppState {
    /// Wrap a handle to a running dispatcher task.
    pub const fn new(dispatcher: DispatcherHandle) -> Self {
        Self { dispatcher }
    }

    /// The dispatcher task.
    pub const fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }
}
