//! TCP accept loop.

use crate::dispatcher::ServerContext;
use crate::error::ServerResult;
use crate::handler::ConnectionHandler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// The filepost server.
///
/// Accepts connections on the configured address and runs one
/// [`ConnectionHandler`] task per connection. Task fan-out is bounded
/// by a semaphore sized `max_connections + handshake_slack`, so
/// unauthenticated connections cannot pile up without bound.
///
/// # Example
///
/// ```no_run
/// use filepost_server::{FileServer, ServerConfig, MemoryCredentialStore, DenyUnknown};
/// use std::sync::Arc;
///
/// # async fn run() -> filepost_server::ServerResult<()> {
/// let config = ServerConfig::new("127.0.0.1:4280".parse().unwrap(), 1);
/// let server = FileServer::bind(
///     config,
///     Arc::new(MemoryCredentialStore::new()),
///     Arc::new(DenyUnknown),
/// )
/// .await?;
/// server.run().await
/// # }
/// ```
pub struct FileServer {
    listener: TcpListener,
    context: Arc<ServerContext>,
    permits: Arc<Semaphore>,
}

impl FileServer {
    /// Binds the listening socket and prepares the shared context.
    pub async fn bind(
        config: crate::config::ServerConfig,
        credentials: Arc<dyn crate::credentials::CredentialStore>,
        registration: Arc<dyn crate::credentials::RegistrationPolicy>,
    ) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let permits = Arc::new(Semaphore::new(config.accept_permits()));
        let context = Arc::new(ServerContext::new(config, credentials, registration));
        Ok(Self {
            listener,
            context,
            permits,
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared context (registry, mode, log). Mainly useful in tests.
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.context)
    }

    /// Accepts connections until the process ends.
    pub async fn run(self) -> ServerResult<()> {
        info!(
            addr = %self.listener.local_addr()?,
            version = self.context.config.version,
            "server started, waiting for connections"
        );

        loop {
            // Permits bound the number of live handler tasks; a permit
            // is released when its task finishes.
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|e| crate::error::ServerError::persistence(e.to_string()))?;

            let (stream, remote_addr) = self.listener.accept().await?;
            info!(%remote_addr, "connection accepted");

            let context = Arc::clone(&self.context);
            tokio::spawn(async move {
                let handler = ConnectionHandler::new(stream, remote_addr, context);
                if let Err(e) = handler.run().await {
                    warn!(%remote_addr, "connection ended with error: {e}");
                }
                drop(permit);
            });
        }
    }
}
