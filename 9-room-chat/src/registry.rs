use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{
    Mutex,
    mpsc::{self, error::TrySendError},
};
use tracing::debug;

pub type ClientId = String;

/// Lines queued for one client before it counts as dead.
pub const SINK_CAPACITY: usize = 1024;

/// Delivers lines to exactly one connected client.
///
/// The receiving half is drained by the session's writer task. Delivery never
/// waits: a queue that is full (client not reading) or closed (socket gone)
/// fails with a [`SinkError`], and the registry purges that client.
#[derive(Debug, Clone)]
pub struct Sink {
    tx: mpsc::Sender<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("client sink is closed")]
    Closed,
    #[error("client sink is full")]
    Full,
}

impl Sink {
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        Self::with_capacity(SINK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn deliver(&self, line: impl Into<String>) -> Result<(), SinkError> {
        self.tx.try_send(line.into()).map_err(|err| match err {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn same_channel(&self, other: &Sink) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("id {0} is already in use")]
    IdTaken(ClientId),
}

/// Result of a point-to-point delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No client is registered under the id.
    Absent,
    /// The client was registered but its sink failed; it has been purged.
    Purged,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, Sink>>,
    reject_duplicates: bool,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses a second registration under an id already online.
    pub fn rejecting_duplicates() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            reject_duplicates: true,
        }
    }

    /// Inserts the sink under `id`. Unless the registry rejects duplicates, an
    /// existing entry for the same id is silently replaced.
    pub async fn register(&self, id: ClientId, sink: Sink) -> Result<(), RegisterError> {
        let mut clients = self.clients.lock().await;
        if self.reject_duplicates && clients.contains_key(&id) {
            return Err(RegisterError::IdTaken(id));
        }
        if clients.insert(id.clone(), sink).is_some() {
            debug!(client = %id, "replaced existing registration");
        }
        Ok(())
    }

    pub async fn unregister(&self, id: &str) {
        self.clients.lock().await.remove(id);
    }

    /// Removes `id` only while it still maps to `sink`, leaving a newer
    /// registration under the same id untouched.
    pub async fn unregister_sink(&self, id: &str, sink: &Sink) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.get(id) {
            Some(current) if current.same_channel(sink) => {
                clients.remove(id);
                true
            }
            _ => false,
        }
    }

    pub async fn lookup(&self, id: &str) -> Option<Sink> {
        self.clients.lock().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.clients.lock().await.contains_key(id)
    }

    /// Ids online at one instant, sorted for stable output.
    pub async fn snapshot_ids(&self) -> Vec<ClientId> {
        let clients = self.clients.lock().await;
        let mut ids: Vec<ClientId> = clients.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Writes `line` to every sink, purging the ones that fail.
    ///
    /// Returns the number of clients the line reached.
    pub async fn deliver_all(&self, line: &str) -> usize {
        self.deliver_all_except(None, line).await
    }

    /// Like [`deliver_all`](Self::deliver_all), but never writes to `skip`.
    pub async fn deliver_all_except(&self, skip: Option<&str>, line: &str) -> usize {
        let mut clients = self.clients.lock().await;
        let mut delivered = 0;
        clients.retain(|id, sink| {
            if skip == Some(id.as_str()) {
                return true;
            }
            match sink.deliver(line) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(error) => {
                    debug!(client = %id, %error, "purging client");
                    false
                }
            }
        });
        delivered
    }

    pub async fn deliver_to(&self, id: &str, line: &str) -> Delivery {
        let mut clients = self.clients.lock().await;
        let Some(sink) = clients.get(id) else {
            return Delivery::Absent;
        };
        match sink.deliver(line) {
            Ok(()) => Delivery::Delivered,
            Err(error) => {
                debug!(client = %id, %error, "purging client");
                clients.remove(id);
                Delivery::Purged
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}
