//! Message passing between the engine thread and its clients.
//!
//! ```text
//!  client threads                         engine thread
//!  ──────────────                         ─────────────
//!  Client::post ──► crossbeam channel ──► EngineEndpoint::try_recv
//!                                                │ apply, between blocks
//!  Client::pump ◄── per-client queue  ◄── EngineEndpoint::broadcast / send_to
//! ```
//!
//! Records cross the bus as JSON strings, so nothing a client holds ever
//! points into engine memory. Each client's queue sits behind its own mutex
//! and is only locked long enough to push or drain it.

pub mod command;
pub mod notification;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

pub use command::ClientCommand;
pub use notification::{EngineNotification, EngineStatus};

use crate::error::{SamplerError, SamplerResult};

#[derive(Default)]
struct ClientQueue {
    pending: Mutex<VecDeque<String>>,
}

#[derive(Default)]
struct BusShared {
    clients: Mutex<HashMap<String, Arc<ClientQueue>>>,
}

struct Inbound {
    client: String,
    payload: String,
}

/// A command as received by the engine, tagged with who sent it.
#[derive(Debug)]
pub struct Incoming {
    pub client: String,
    /// Decode failures are kept so the engine can tell the sender.
    pub command: SamplerResult<ClientCommand>,
}

/// Client-side handle to the bus. Cheap to clone; register clients from any
/// thread.
#[derive(Clone)]
pub struct MessageBus {
    shared: Arc<BusShared>,
    tx: Sender<Inbound>,
}

impl MessageBus {
    /// Create the bus and the endpoint the engine drains it through.
    pub fn new() -> (MessageBus, EngineEndpoint) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(BusShared::default());
        let bus = MessageBus {
            shared: shared.clone(),
            tx,
        };
        (bus, EngineEndpoint { shared, rx })
    }

    /// Register `name` with a callback that receives its notifications.
    ///
    /// A name can only be held by one client at a time.
    pub fn register_client<F>(&self, name: impl Into<String>, callback: F) -> SamplerResult<Client>
    where
        F: FnMut(EngineNotification) + Send + 'static,
    {
        let name = name.into();
        let queue = Arc::new(ClientQueue::default());
        {
            let mut clients = self.shared.clients.lock();
            if clients.contains_key(&name) {
                return Err(SamplerError::ClientAlreadyRegistered(name));
            }
            clients.insert(name.clone(), queue.clone());
        }
        tracing::debug!(client = %name, "client registered");

        Ok(Client {
            name,
            queue,
            shared: self.shared.clone(),
            tx: self.tx.clone(),
            callback: Box::new(callback),
            registered: true,
        })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.shared.clients.lock().contains_key(name)
    }

    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().len()
    }
}

/// A registered client connection.
///
/// Dropping it unregisters the name.
pub struct Client {
    name: String,
    queue: Arc<ClientQueue>,
    shared: Arc<BusShared>,
    tx: Sender<Inbound>,
    callback: Box<dyn FnMut(EngineNotification) + Send>,
    registered: bool,
}

impl Client {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a command for the engine. Never blocks.
    pub fn post(&self, command: &ClientCommand) -> SamplerResult<()> {
        let payload = serde_json::to_string(command)?;
        self.tx
            .send(Inbound {
                client: self.name.clone(),
                payload,
            })
            .map_err(|_| SamplerError::Disconnected)
    }

    /// Deliver queued notifications to the callback, oldest first.
    ///
    /// Returns how many were delivered.
    pub fn pump(&mut self) -> usize {
        // Take the whole batch so the callback runs without the lock held
        let batch: Vec<String> = self.queue.pending.lock().drain(..).collect();

        let mut delivered = 0;
        for record in batch {
            match serde_json::from_str::<EngineNotification>(&record) {
                Ok(notification) => {
                    (self.callback)(notification);
                    delivered += 1;
                }
                Err(err) => {
                    tracing::warn!(client = %self.name, %err, "skipping undecodable notification");
                }
            }
        }
        delivered
    }

    /// Notifications waiting to be pumped.
    pub fn pending(&self) -> usize {
        self.queue.pending.lock().len()
    }

    /// Give the name back; same as dropping the client.
    pub fn unregister(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;

        let mut clients = self.shared.clients.lock();
        // Only remove the entry if it is still ours
        if clients
            .get(&self.name)
            .is_some_and(|queue| Arc::ptr_eq(queue, &self.queue))
        {
            clients.remove(&self.name);
        }
        drop(clients);
        tracing::debug!(client = %self.name, "client unregistered");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("registered", &self.registered)
            .finish()
    }
}

/// The engine's side of the bus.
pub struct EngineEndpoint {
    shared: Arc<BusShared>,
    rx: Receiver<Inbound>,
}

impl EngineEndpoint {
    /// Next posted command, if any.
    pub fn try_recv(&self) -> Option<Incoming> {
        match self.rx.try_recv() {
            Ok(Inbound { client, payload }) => Some(Incoming {
                client,
                command: serde_json::from_str(&payload).map_err(SamplerError::from),
            }),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Queue `notification` for every registered client.
    pub fn broadcast(&self, notification: &EngineNotification) -> SamplerResult<()> {
        let payload = serde_json::to_string(notification)?;
        for queue in self.shared.clients.lock().values() {
            queue.pending.lock().push_back(payload.clone());
        }
        Ok(())
    }

    /// Queue `notification` for one client.
    pub fn send_to(&self, client: &str, notification: &EngineNotification) -> SamplerResult<()> {
        let queue = self
            .shared
            .clients
            .lock()
            .get(client)
            .cloned()
            .ok_or_else(|| SamplerError::ClientNotRegistered(client.to_string()))?;
        let payload = serde_json::to_string(notification)?;
        queue.pending.lock().push_back(payload);
        Ok(())
    }

    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().len()
    }
}

impl std::fmt::Debug for EngineEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEndpoint")
            .field("clients", &self.client_count())
            .field("queued", &self.rx.len())
            .finish()
    }
}
