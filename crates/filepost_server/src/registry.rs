//! Registry of authenticated sessions.
//!
//! Admission is atomic: the capacity check and the insert happen under
//! one lock, so concurrent handshakes cannot overshoot the limit.
//! Removal is tied to the [`SessionHandle`] so a session leaves the
//! registry however its handler ends.

use crate::credentials::Role;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Descriptive record of one authenticated session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Authenticated client identifier.
    pub client_id: String,
    /// Role recorded from the credential at admission.
    pub role: Role,
    /// Remote peer address.
    pub remote_addr: SocketAddr,
}

/// Bounded set of authenticated sessions.
#[derive(Debug)]
pub struct ConnectionRegistry {
    capacity: usize,
    sessions: Mutex<HashMap<u64, SessionInfo>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a registry admitting at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Admits a session if capacity allows, returning a handle that
    /// removes it on drop.
    pub fn try_admit(self: Arc<Self>, info: SessionInfo) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= self.capacity {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        sessions.insert(id, info);
        drop(sessions);
        Some(SessionHandle { registry: self, id })
    }

    /// Number of admitted sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no session is admitted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the registry is at capacity.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Configured session limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn remove(&self, id: u64) {
        self.sessions.lock().remove(&id);
    }
}

/// Membership token for an admitted session.
#[derive(Debug)]
pub struct SessionHandle {
    registry: Arc<ConnectionRegistry>,
    id: u64,
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
