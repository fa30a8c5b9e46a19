//! The dispatcher task.
//!
//! All protocol logic runs inside one tokio task that owns the
//! [`ResourceDispatcher`] and the [`ObserverRegistry`]. It consumes two
//! queues:
//!
//! - commands from the transport (requests and observer cancellations),
//!   sent through a cloneable [`DispatcherHandle`]
//! - the change feed filled by every [`ResourceState`] write, whether it came
//!   from a request or from the hardware poller thread
//!
//! Processing both queues in one task keeps request handling sequential and
//! means the poller thread never calls into observer delivery.
//!
//! [`ResourceState`]: crate::state::ResourceState

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::dispatcher::{ResourceDispatcher, render};
use crate::error::ServiceError;
use crate::observer::{ObserverId, ObserverRegistry, ObserverStream, observer_channel};
use crate::protocol::{Method, Request, Response};
use crate::state::{ChangeFeed, ResourceId, StateChange, Versioned};
use crate::tree::Endpoint;

/// A message for the dispatcher task.
#[derive(Debug)]
pub enum Command {
    /// Answer a request.
    Request {
        /// The request.
        request: Request,
        /// Where to send the answer.
        reply: oneshot::Sender<Reply>,
    },
    /// Drop an observer.
    Cancel {
        /// The observed resource.
        resource: ResourceId,
        /// The observer to drop.
        observer: ObserverId,
    },
}

/// The dispatcher's answer to a request.
#[derive(Debug)]
pub struct Reply {
    /// The response to send back.
    pub response: Response,
    /// Present when the request registered an observer.
    pub observation: Option<Observation>,
}

/// A live observer registration handed back to the transport.
#[derive(Debug)]
pub struct Observation {
    /// The observed resource.
    pub resource: ResourceId,
    /// Registration id, for cancelling.
    pub id: ObserverId,
    /// Stream of changes newer than the response's version.
    pub stream: ObserverStream,
}

/// Cloneable sender side of the dispatcher task.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Command>,
}

impl DispatcherHandle {
    /// Send a request and wait for the reply.
    pub async fn call(&self, request: Request) -> Result<Reply, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Request { request, reply })
            .await
            .map_err(|_closed| ServiceError::Unavailable)?;
        rx.await.map_err(|_dropped| ServiceError::Unavailable)
    }

    /// Unregister an observer without waiting, so it can be called from
    /// `Drop`. Unknown ids and a stopped dispatcher are both fine.
    ///
    /// If the queue is full the cancel is handed to a spawned task when a
    /// runtime is available.
    pub fn cancel(&self, resource: ResourceId, observer: ObserverId) {
        match self.tx.try_send(Command::Cancel { resource, observer }) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    debug!(%resource, %observer, "No runtime, cancel skipped");
                    return;
                };
                let tx = self.tx.clone();
                runtime.spawn(async move {
                    if tx.send(command).await.is_err() {
                        debug!(%resource, %observer, "Dispatcher gone, cancel skipped");
                    }
                });
            }
            Err(TrySendError::Closed(_command)) => {
                debug!(%resource, %observer, "Dispatcher gone, cancel skipped");
            }
        }
    }
}

/// The dispatcher task state.
#[derive(Debug)]
pub struct DispatcherService {
    dispatcher: ResourceDispatcher,
    registry: ObserverRegistry,
    commands: mpsc::Receiver<Command>,
    changes: ChangeFeed,
}

impl DispatcherService {
    /// Build the task around `dispatcher`, reading state changes from
    /// `changes`. `capacity` bounds the command queue.
    pub fn new(
        dispatcher: ResourceDispatcher,
        changes: ChangeFeed,
        capacity: usize,
    ) -> (Self, DispatcherHandle) {
        let (tx, commands) = mpsc::channel(capacity.max(1));
        let service = Self {
            dispatcher,
            registry: ObserverRegistry::new(),
            commands,
            changes,
        };
        (service, DispatcherHandle { tx })
    }

    /// Run until every [`DispatcherHandle`] has been dropped.
    pub async fn run(mut self) {
        info!("Dispatcher running");
        loop {
            tokio::select! {
                biased;
                Some(change) = self.changes.recv() => self.on_change(&change),
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
            }
        }
        info!("Dispatcher stopped");
    }

    fn on_change(&mut self, change: &StateChange) {
        let outcome = self.registry.notify(change);
        debug!(
            resource = %change.resource,
            version = change.version,
            value = %change.value,
            delivered = outcome.delivered,
            stale = outcome.stale,
            dropped = outcome.dropped,
            "State change fanned out"
        );
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Request { request, reply } => {
                let answer = self.on_request(&request);
                if let Err(unsent) = reply.send(answer) {
                    debug!(path = %request.path, "Requester went away before the reply");
                    if let Some(observation) = unsent.observation {
                        self.registry
                            .unregister(observation.resource, observation.id);
                    }
                }
            }
            Command::Cancel { resource, observer } => {
                self.registry.unregister(resource, observer);
            }
        }
    }

    fn on_request(&mut self, request: &Request) -> Reply {
        debug!(method = %request.method, path = %request.path, observe = request.observe, "Request");
        if request.observe && request.method == Method::Get {
            if let Some(resource) = self.observable(&request.path) {
                return self.observe(resource);
            }
        }
        Reply {
            response: self.dispatcher.handle(request, self.registry.len()),
            observation: None,
        }
    }

    fn observable(&self, path: &str) -> Option<ResourceId> {
        match self.dispatcher.tree().resolve(path).map(|r| r.endpoint) {
            Ok(Endpoint::State(resource)) => Some(resource),
            _ => None,
        }
    }

    fn observe(&mut self, resource: ResourceId) -> Reply {
        let current = self.dispatcher.snapshot(resource);
        let (handle, stream) = observer_channel(current);
        let id = self.registry.register(resource, handle);
        debug!(
            %resource,
            observers = self.registry.observer_count(resource),
            "Observe accepted"
        );
        let response: Response = render(Versioned {
            value: current.value,
            version: current.version,
        });
        Reply {
            response,
            observation: Some(Observation {
                resource,
                id,
                stream,
            }),
        }
    }
}
