//! Thread-safe handle to the coordinator plus per-client outbound queues.
//!
//! One coarse mutex guards both. Every operation runs and delivers its
//! outbox inside the same critical section, so two clients never observe
//! each other's messages out of order.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shrimp_protocol::{FinishedGameReport, GameSettings, LobbySummary};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::config::ServerConfig;
use crate::coordinator::{Coordinator, CoordinatorError, Outbox};
use crate::identity::NamePool;
use crate::player::ClientId;

struct Inner {
    coordinator: Coordinator,
    /// Serialized lines waiting for each connection's writer
    outlets: HashMap<ClientId, UnboundedSender<String>>,
}

impl Inner {
    fn deliver(&self, outbox: Outbox) {
        for (to, message) in outbox {
            let Some(outlet) = self.outlets.get(&to) else {
                continue;
            };
            if outlet.send(message.to_string()).is_err() {
                debug!(client = %to, "Dropped message for closed connection");
            }
        }
    }
}

#[derive(Clone)]
pub struct SharedCoordinator {
    inner: Arc<Mutex<Inner>>,
}

impl SharedCoordinator {
    pub fn new(config: ServerConfig, names: NamePool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                coordinator: Coordinator::new(config, names),
                outlets: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking handler must not take every other connection down.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` and deliver what it produced, atomically.
    fn apply<F>(&self, op: F) -> Result<(), CoordinatorError>
    where
        F: FnOnce(&mut Coordinator) -> Result<Outbox, CoordinatorError>,
    {
        let mut inner = self.lock();
        let outbox = op(&mut inner.coordinator)?;
        inner.deliver(outbox);
        Ok(())
    }

    /// Register a connection whose outbound lines go to `outlet`.
    pub fn connect(&self, address: IpAddr, outlet: UnboundedSender<String>) -> ClientId {
        let mut inner = self.lock();
        let client = inner.coordinator.connect(address);
        inner.outlets.insert(client, outlet);
        client
    }

    pub fn identify(&self, client: ClientId, version: &str) -> Result<(), CoordinatorError> {
        self.apply(|c| c.identify(client, version))
    }

    pub fn promote(&self, client: ClientId, password: &str) -> Result<(), CoordinatorError> {
        self.apply(|c| c.promote(client, password))
    }

    pub fn create_lobby(
        &self,
        client: ClientId,
        name: &str,
        settings: GameSettings,
    ) -> Result<(), CoordinatorError> {
        self.apply(|c| c.create_lobby(client, name, settings))
    }

    pub fn request_lobby_list(&self, client: ClientId) -> Result<(), CoordinatorError> {
        self.apply(|c| c.request_lobby_list(client))
    }

    pub fn join_lobby(&self, client: ClientId, name: &str) -> Result<(), CoordinatorError> {
        self.apply(|c| c.join_lobby(client, name))
    }

    pub fn leave_lobby(&self, client: ClientId) -> Result<(), CoordinatorError> {
        self.apply(|c| c.leave_lobby(client))
    }

    pub fn submit_catch(&self, client: ClientId, amount: i64) -> Result<(), CoordinatorError> {
        self.apply(|c| c.submit_catch(client, amount))
    }

    pub fn post_chat(&self, client: ClientId, text: &str) -> Result<(), CoordinatorError> {
        self.apply(|c| c.post_chat(client, text))
    }

    /// Tear down a connection and drop its outlet. Safe to call twice.
    pub fn disconnect(&self, client: ClientId) {
        let mut inner = self.lock();
        inner.outlets.remove(&client);
        let outbox = inner.coordinator.disconnect(client);
        inner.deliver(outbox);
    }

    pub fn list_lobbies(&self) -> Vec<LobbySummary> {
        self.lock().coordinator.list_lobbies()
    }

    pub fn list_finished_games(&self) -> Vec<FinishedGameReport> {
        self.lock().coordinator.list_finished_games()
    }

    /// Read-only access to the coordinator under the lock
    pub fn inspect<R>(&self, f: impl FnOnce(&Coordinator) -> R) -> R {
        f(&self.lock().coordinator)
    }
}
