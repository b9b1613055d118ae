//! Process-wide mapping from user id to the set of live endpoints currently
//! authenticated as that user (spec.md §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::wire::Frame;

/// A message queued for a connection's dedicated writer task.
pub type Outbound = Frame;

/// The runtime binding of a live TCP connection to an authenticated session
/// (spec.md §3 "Connection endpoint").
///
/// Writes go through `sender`, a channel to that connection's single
/// writer task, so replies and fan-out pushes can never interleave on the
/// wire (spec.md §5, §9 "Per-endpoint write serialization").
#[derive(Clone)]
pub struct Endpoint {
    pub id: Uuid,
    pub sender: mpsc::UnboundedSender<Outbound>,
}

impl Endpoint {
    pub fn new(sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Endpoint {
            id: Uuid::new_v4(),
            sender,
        }
    }

    /// Queues `frame` for delivery. Returns `false` if the endpoint's
    /// writer task has already exited (peer gone) — callers log and
    /// continue rather than treating this as fatal (spec.md §4.2, §4.5).
    pub fn send(&self, frame: Frame) -> bool {
        self.sender.send(frame).is_ok()
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<i64, Vec<Endpoint>>,
}

/// Safe for concurrent use from every connection-handler task and the
/// fan-out path (spec.md §4.2, §5). `endpoints_for` snapshots its bucket
/// under the lock and returns owned clones, so a slow peer's write never
/// holds the registry lock (spec.md §4.2 "preferred" policy).
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn attach(&self, user_id: i64, endpoint: Endpoint) {
        let mut inner = self.inner.write().await;
        inner.by_user.entry(user_id).or_default().push(endpoint);
    }

    /// Removes the endpoint with matching identity. Leaves an empty bucket
    /// in place, which is observable-equivalent to removing it (spec.md
    /// §4.2).
    pub async fn detach(&self, user_id: i64, endpoint_id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(bucket) = inner.by_user.get_mut(&user_id) {
            bucket.retain(|e| e.id != endpoint_id);
        }
    }

    /// A snapshot of `user_id`'s live endpoints, in attach order.
    pub async fn endpoints_for(&self, user_id: i64) -> Vec<Endpoint> {
        let inner = self.inner.read().await;
        inner.by_user.get(&user_id).cloned().unwrap_or_default()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;
