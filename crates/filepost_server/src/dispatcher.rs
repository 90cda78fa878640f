//! Post-authentication request dispatch.
//!
//! The dispatcher holds the business logic for the four operational
//! message kinds (upload, log request, log changes, version query).
//! Auth and disconnect are connection concerns and live in the handler.

use crate::config::ServerConfig;
use crate::credentials::{CredentialStore, RegistrationPolicy, Role};
use crate::error::ServerResult;
use crate::logstore::LogStore;
use crate::mode::ModeGate;
use crate::registry::{ConnectionRegistry, SessionInfo};
use filepost_protocol::{kind, status, Request, Response};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// State shared by every connection handler.
pub struct ServerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Registry of authenticated sessions.
    pub registry: Arc<ConnectionRegistry>,
    /// Global dispatch mode.
    pub mode: ModeGate,
    /// The shared log file.
    pub log: LogStore,
    /// Credential lookup/create.
    pub credentials: Arc<dyn CredentialStore>,
    /// Decision-maker for unknown clients.
    pub registration: Arc<dyn RegistrationPolicy>,
}

impl ServerContext {
    /// Creates a context from a configuration and the external
    /// collaborators.
    pub fn new(
        config: ServerConfig,
        credentials: Arc<dyn CredentialStore>,
        registration: Arc<dyn RegistrationPolicy>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.max_connections));
        let log = LogStore::new(&config.log_file);
        Self {
            config,
            registry,
            mode: ModeGate::new(),
            log,
            credentials,
            registration,
        }
    }
}

/// Routes one decoded request to its business logic.
pub struct PacketDispatcher {
    context: Arc<ServerContext>,
}

impl PacketDispatcher {
    /// Creates a dispatcher over the shared context.
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    /// Handles one request from an authenticated session and produces
    /// the response to send back.
    ///
    /// Auth (kind 0) and end-connection (kind 5) never reach this
    /// method; they are resolved in the connection handler.
    pub fn dispatch(&self, session: &SessionInfo, request: &Request) -> Response {
        match request {
            Request::SendFile {
                file_name,
                file_size,
                file_data,
                server_version,
                ..
            } => self.handle_send_file(session, file_name, *file_size, file_data, *server_version),
            Request::LogRequest { .. } => self.handle_log_request(session),
            Request::LogChanges { log_data, .. } => self.handle_log_changes(session, log_data),
            Request::VersionQuery { .. } => Response::Version {
                client_id: session.client_id.clone(),
                version: self.context.config.version,
            },
            Request::Auth { .. } | Request::EndConnection { .. } => Response::Status {
                client_id: session.client_id.clone(),
                kind: request.kind(),
                status: status::BAD_REQUEST,
            },
        }
    }

    fn handle_send_file(
        &self,
        session: &SessionInfo,
        file_name: &str,
        file_size: i32,
        file_data: &[u8],
        server_version: u8,
    ) -> Response {
        let running = self.context.config.version;
        if server_version != running {
            warn!(
                client_id = %session.client_id,
                declared = server_version,
                running,
                "upload targets a different server version"
            );
            return Response::Status {
                client_id: session.client_id.clone(),
                kind: kind::SEND_FILE,
                status: status::BAD_REQUEST,
            };
        }

        let status = match self.persist_upload(session, file_name, file_data) {
            Ok(()) => {
                info!(
                    client_id = %session.client_id,
                    file_name,
                    size = file_data.len(),
                    declared_size = file_size,
                    "file received"
                );
                status::OK
            }
            Err(e) => {
                error!(client_id = %session.client_id, file_name, "upload failed: {e}");
                status::INTERNAL_ERROR
            }
        };

        Response::Status {
            client_id: session.client_id.clone(),
            kind: kind::SEND_FILE,
            status,
        }
    }

    fn persist_upload(
        &self,
        session: &SessionInfo,
        file_name: &str,
        file_data: &[u8],
    ) -> ServerResult<()> {
        let target = self.upload_path(file_name)?;

        // Version 1 receives text, version 2 raw bytes.
        if self.context.config.version == 1 {
            let text = String::from_utf8_lossy(file_data);
            std::fs::write(&target, text.as_bytes())?;
        } else {
            std::fs::write(&target, file_data)?;
        }

        self.context.log.append_audit(
            &session.client_id,
            session.remote_addr,
            file_name,
            file_data.len(),
        )
    }

    /// Resolves the on-disk path for an uploaded name. Only the final
    /// path component is honored, so uploads stay inside the configured
    /// directory.
    fn upload_path(&self, file_name: &str) -> ServerResult<PathBuf> {
        let base = std::path::Path::new(file_name)
            .file_name()
            .ok_or_else(|| crate::error::ServerError::persistence("empty file name"))?;
        Ok(self.context.config.upload_dir.join(base))
    }

    fn handle_log_request(&self, session: &SessionInfo) -> Response {
        if session.role != Role::Admin {
            warn!(
                client_id = %session.client_id,
                "log requested without admin role, refused"
            );
            return Response::Status {
                client_id: session.client_id.clone(),
                kind: kind::LOG_REQUEST,
                status: status::FORBIDDEN,
            };
        }

        match self.context.log.read() {
            Ok(log_data) => {
                info!(client_id = %session.client_id, "log editing started");
                self.context.mode.set_receiving_log();
                Response::LogData {
                    client_id: session.client_id.clone(),
                    status: status::OK,
                    log_data,
                }
            }
            Err(e) => {
                error!(client_id = %session.client_id, "log read failed: {e}");
                Response::Status {
                    client_id: session.client_id.clone(),
                    kind: kind::LOG_REQUEST,
                    status: status::INTERNAL_ERROR,
                }
            }
        }
    }

    fn handle_log_changes(&self, session: &SessionInfo, log_data: &[u8]) -> Response {
        if session.role != Role::Admin {
            warn!(
                client_id = %session.client_id,
                "log changes without admin role, refused"
            );
            return Response::Status {
                client_id: session.client_id.clone(),
                kind: kind::LOG_CHANGES,
                status: status::FORBIDDEN,
            };
        }

        let status = match self.context.log.overwrite(log_data) {
            Ok(()) => {
                info!(client_id = %session.client_id, "log changes applied");
                status::OK
            }
            Err(e) => {
                error!(client_id = %session.client_id, "log overwrite failed: {e}");
                status::INTERNAL_ERROR
            }
        };

        // The one and only transition out of ReceivingLog, taken
        // whether or not the overwrite succeeded.
        self.context.mode.set_normal();

        Response::Status {
            client_id: session.client_id.clone(),
            kind: kind::LOG_CHANGES,
            status,
        }
    }
}
