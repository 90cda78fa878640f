//! # Filepost Server
//!
//! TCP server accepting authenticated file uploads and privileged
//! editing of a shared audit log.
//!
//! This crate provides:
//! - The accept loop and per-connection handlers ([`FileServer`],
//!   `ConnectionHandler`)
//! - Authentication against a pluggable [`CredentialStore`], with
//!   operator-driven registration of unknown clients
//! - A bounded [`ConnectionRegistry`] of authenticated sessions
//! - The global [`ModeGate`] serializing log edits across connections
//! - The mutex-guarded [`LogStore`] for the shared log file
//!
//! # Architecture
//!
//! One tokio task runs per accepted connection, bounded by a semaphore.
//! The first frame must authenticate; afterwards requests dispatch
//! through the [`PacketDispatcher`] against state shared behind
//! `Arc<ServerContext>`. While an administrator edits the log the
//! server holds `ReceivingLog` mode and all other dispatch waits on a
//! watch channel until the edit completes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod credentials;
mod dispatcher;
mod error;
mod handler;
mod logstore;
mod mode;
mod registry;
mod server;

pub use config::ServerConfig;
pub use credentials::{
    Credential, CredentialStore, DenyUnknown, JsonCredentialStore, MemoryCredentialStore,
    RegistrationDecision, RegistrationPolicy, Role,
};
pub use dispatcher::{PacketDispatcher, ServerContext};
pub use error::{ServerError, ServerResult};
pub use handler::ConnectionHandler;
pub use logstore::LogStore;
pub use mode::{ModeGate, ServerMode};
pub use registry::{ConnectionRegistry, SessionHandle, SessionInfo};
pub use server::FileServer;
