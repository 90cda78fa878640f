//! Credential storage and registration of unknown clients.
//!
//! The concrete persistence format is an external concern; the server
//! only depends on the [`CredentialStore`] lookup/create interface.
//! Both implementations serialize concurrent reads and creates behind a
//! lock, so racing registrations cannot corrupt the store.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Access level of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Regular user: may upload files and query the version.
    User,
    /// Administrator: may additionally edit the shared log.
    Admin,
}

/// Stored credential for one client. Created once at registration and
/// immutable thereafter; there is no password-change operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique client identifier.
    pub client_id: String,
    /// Hash of the client's password.
    pub password_hash: String,
    /// Access level.
    pub role: Role,
}

/// Lookup and creation of client credentials.
pub trait CredentialStore: Send + Sync {
    /// Looks up a credential by client identifier.
    fn lookup(&self, client_id: &str) -> Option<Credential>;

    /// Creates a credential. Fails if the identifier is taken.
    fn create(&self, credential: Credential) -> ServerResult<()>;
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given credentials.
    pub fn with_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let entries = credentials
            .into_iter()
            .map(|c| (c.client_id.clone(), c))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn lookup(&self, client_id: &str) -> Option<Credential> {
        self.entries.read().get(client_id).cloned()
    }

    fn create(&self, credential: Credential) -> ServerResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&credential.client_id) {
            return Err(ServerError::persistence(format!(
                "credential {:?} already exists",
                credential.client_id
            )));
        }
        entries.insert(credential.client_id.clone(), credential);
        Ok(())
    }
}

/// Credential store backed by a JSON file.
///
/// The whole file is rewritten on every create, under the same write
/// lock that guards the in-memory map.
#[derive(Debug)]
pub struct JsonCredentialStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Credential>>,
}

impl JsonCredentialStore {
    /// Opens the store at `path`, creating an empty file if absent.
    pub fn open(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read(&path)?;
            let list: Vec<Credential> = serde_json::from_slice(&raw)
                .map_err(|e| ServerError::persistence(format!("credential file: {e}")))?;
            list.into_iter().map(|c| (c.client_id.clone(), c)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, Credential>) -> ServerResult<()> {
        let mut list: Vec<&Credential> = entries.values().collect();
        list.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        let raw = serde_json::to_vec_pretty(&list)
            .map_err(|e| ServerError::persistence(format!("credential file: {e}")))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for JsonCredentialStore {
    fn lookup(&self, client_id: &str) -> Option<Credential> {
        self.entries.read().get(client_id).cloned()
    }

    fn create(&self, credential: Credential) -> ServerResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&credential.client_id) {
            return Err(ServerError::persistence(format!(
                "credential {:?} already exists",
                credential.client_id
            )));
        }
        entries.insert(credential.client_id.clone(), credential.clone());
        self.persist(&entries)
    }
}

/// Outcome of asking the operator about an unknown client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationDecision {
    /// Do not register; the client is refused with status 403.
    Reject,
    /// Register the client with the given role.
    Accept(Role),
}

/// Decides whether an unknown client may register.
///
/// Implementations should answer promptly; the deciding connection's
/// handler is parked on the call.
pub trait RegistrationPolicy: Send + Sync {
    /// Decides for the given client identifier.
    fn decide(&self, client_id: &str) -> RegistrationDecision;
}

/// Rejects every unknown client.
#[derive(Debug, Default)]
pub struct DenyUnknown;

impl RegistrationPolicy for DenyUnknown {
    fn decide(&self, _client_id: &str) -> RegistrationDecision {
        RegistrationDecision::Reject
    }
}

impl<F> RegistrationPolicy for F
where
    F: Fn(&str) -> RegistrationDecision + Send + Sync,
{
    fn decide(&self, client_id: &str) -> RegistrationDecision {
        self(client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(id: &str, role: Role) -> Credential {
        Credential {
            client_id: id.into(),
            password_hash: "AB12".into(),
            role,
        }
    }

    #[test]
    fn memory_lookup_and_create() {
        let store = MemoryCredentialStore::new();
        assert!(store.lookup("alice").is_none());

        store.create(cred("alice", Role::User)).unwrap();
        let found = store.lookup("alice").unwrap();
        assert_eq!(found.role, Role::User);
    }

    #[test]
    fn duplicate_create_rejected() {
        let store = MemoryCredentialStore::new();
        store.create(cred("alice", Role::User)).unwrap();
        assert!(store.create(cred("alice", Role::Admin)).is_err());
        // Original credential untouched.
        assert_eq!(store.lookup("alice").unwrap().role, Role::User);
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let store = JsonCredentialStore::open(&path).unwrap();
        store.create(cred("alice", Role::Admin)).unwrap();
        store.create(cred("bob", Role::User)).unwrap();
        drop(store);

        let reopened = JsonCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.lookup("alice").unwrap().role, Role::Admin);
        assert_eq!(reopened.lookup("bob").unwrap().role, Role::User);
    }

    #[test]
    fn deny_unknown_rejects() {
        assert_eq!(DenyUnknown.decide("anyone"), RegistrationDecision::Reject);
    }

    #[test]
    fn closure_policy() {
        let policy = |id: &str| {
            if id == "friend" {
                RegistrationDecision::Accept(Role::User)
            } else {
                RegistrationDecision::Reject
            }
        };
        assert_eq!(
            policy.decide("friend"),
            RegistrationDecision::Accept(Role::User)
        );
        assert_eq!(policy.decide("stranger"), RegistrationDecision::Reject);
    }
}
