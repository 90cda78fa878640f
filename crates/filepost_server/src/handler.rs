//! Per-connection handler.
//!
//! One handler task runs per accepted connection. It authenticates the
//! first frame, then reads, gates and dispatches requests until the
//! peer disconnects or an error ends the session. Frames are read to
//! the `<EOF>` terminator; transport timing is never used as a message
//! boundary.

use crate::credentials::{Credential, RegistrationDecision};
use crate::dispatcher::{PacketDispatcher, ServerContext};
use crate::error::ServerResult;
use crate::registry::{SessionHandle, SessionInfo};
use filepost_protocol::{kind, status, FrameReader, Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

/// Placeholder identifier for replies to frames that failed to decode.
const UNKNOWN_CLIENT: &str = "?";

/// Handles one accepted connection.
pub struct ConnectionHandler<S> {
    stream: S,
    remote_addr: SocketAddr,
    reader: FrameReader,
    context: Arc<ServerContext>,
    dispatcher: PacketDispatcher,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a handler for a connection from `remote_addr`.
    pub fn new(stream: S, remote_addr: SocketAddr, context: Arc<ServerContext>) -> Self {
        let dispatcher = PacketDispatcher::new(Arc::clone(&context));
        Self {
            stream,
            remote_addr,
            reader: FrameReader::new(),
            context,
            dispatcher,
        }
    }

    /// Runs the connection to completion.
    pub async fn run(mut self) -> ServerResult<()> {
        let Some((session, _membership)) = self.authenticate().await? else {
            return Ok(());
        };

        loop {
            let frame = match self.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!(client_id = %session.client_id, "client closed the connection");
                    return Ok(());
                }
                Err(e) => {
                    warn!(client_id = %session.client_id, "client dropped abruptly: {e}");
                    return Ok(());
                }
            };

            let request = match Request::decode(&frame) {
                Ok(request) => request,
                Err(e) => {
                    error!(client_id = %session.client_id, "decode failed: {e}");
                    // State of the stream is unknown; answer and stop.
                    self.send(&Response::Status {
                        client_id: UNKNOWN_CLIENT.into(),
                        kind: kind::AUTH,
                        status: status::BAD_REQUEST,
                    })
                    .await?;
                    return Ok(());
                }
            };

            // While the log is being edited, only the edit itself goes
            // through; everything else, disconnects included, waits for
            // the mode to clear.
            if !matches!(request, Request::LogChanges { .. }) {
                self.context.mode.wait_for_normal().await;
            }

            if let Request::EndConnection { .. } = request {
                info!(client_id = %session.client_id, "client disconnected");
                return Ok(());
            }

            let response = self.dispatcher.dispatch(&session, &request);
            self.send(&response).await?;
        }
    }

    /// Reads and resolves the authentication frame.
    ///
    /// Returns the session and its registry membership on success, or
    /// `None` if the connection was refused (the refusal reply has
    /// already been sent).
    async fn authenticate(&mut self) -> ServerResult<Option<(SessionInfo, SessionHandle)>> {
        let frame = match self.read_frame().await? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let request = match Request::decode(&frame) {
            Ok(request) => request,
            Err(e) => {
                error!(remote_addr = %self.remote_addr, "decode failed before auth: {e}");
                self.send(&Response::Status {
                    client_id: UNKNOWN_CLIENT.into(),
                    kind: kind::AUTH,
                    status: status::BAD_REQUEST,
                })
                .await?;
                return Ok(None);
            }
        };

        let (client_id, password_hash) = match request {
            Request::Auth {
                client_id,
                password_hash,
            } => (client_id, password_hash),
            other => {
                warn!(
                    remote_addr = %self.remote_addr,
                    kind = other.kind(),
                    "first message was not auth, refusing"
                );
                self.send(&Response::Status {
                    client_id: other.client_id().into(),
                    kind: other.kind(),
                    status: status::BAD_REQUEST,
                })
                .await?;
                return Ok(None);
            }
        };

        let credential = self.context.credentials.lookup(&client_id);

        if self.context.registry.is_full() {
            warn!(
                client_id,
                limit = self.context.registry.capacity(),
                "connection refused, capacity reached"
            );
            self.refuse(&client_id, status::TOO_MANY_CONNECTIONS).await?;
            return Ok(None);
        }

        let role = match credential {
            Some(credential) => {
                if credential.password_hash != password_hash {
                    warn!(client_id, remote_addr = %self.remote_addr, "bad password hash");
                    self.refuse(&client_id, status::FORBIDDEN).await?;
                    return Ok(None);
                }
                credential.role
            }
            None => match self.context.registration.decide(&client_id) {
                RegistrationDecision::Accept(role) => {
                    let created = self.context.credentials.create(Credential {
                        client_id: client_id.clone(),
                        password_hash,
                        role,
                    });
                    if let Err(e) = created {
                        error!(client_id, "registration failed: {e}");
                        self.refuse(&client_id, status::INTERNAL_ERROR).await?;
                        return Ok(None);
                    }
                    info!(client_id, ?role, "new client registered");
                    role
                }
                RegistrationDecision::Reject => {
                    warn!(client_id, "registration refused by operator");
                    self.refuse(&client_id, status::FORBIDDEN).await?;
                    return Ok(None);
                }
            },
        };

        let session = SessionInfo {
            client_id: client_id.clone(),
            role,
            remote_addr: self.remote_addr,
        };

        // The capacity check above is advisory; admission itself is
        // atomic in the registry.
        let registry = Arc::clone(&self.context.registry);
        let Some(membership) = registry.try_admit(session.clone()) else {
            warn!(client_id, "connection refused, capacity reached at admission");
            self.refuse(&client_id, status::TOO_MANY_CONNECTIONS).await?;
            return Ok(None);
        };

        info!(client_id, remote_addr = %self.remote_addr, "client connected");
        self.send(&Response::Status {
            client_id,
            kind: kind::AUTH,
            status: status::OK,
        })
        .await?;

        Ok(Some((session, membership)))
    }

    async fn refuse(&mut self, client_id: &str, status: i16) -> ServerResult<()> {
        self.send(&Response::Status {
            client_id: client_id.into(),
            kind: kind::AUTH,
            status,
        })
        .await
    }

    /// Reads until one complete frame is buffered. `None` means the
    /// peer closed the stream cleanly.
    async fn read_frame(&mut self) -> ServerResult<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.reader.next_frame() {
                return Ok(Some(frame));
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.reader.extend(&chunk[..n]);
        }
    }

    async fn send(&mut self, response: &Response) -> ServerResult<()> {
        self.stream.write_all(&response.encode()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::credentials::{DenyUnknown, MemoryCredentialStore, Role};
    use tokio::io::duplex;

    fn test_context(dir: &tempfile::TempDir) -> Arc<ServerContext> {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), 1)
            .with_log_file(dir.path().join("log.txt"))
            .with_upload_dir(dir.path());
        let store = MemoryCredentialStore::with_credentials([Credential {
            client_id: "alice".into(),
            password_hash: "HASH".into(),
            role: Role::User,
        }]);
        Arc::new(ServerContext::new(
            config,
            Arc::new(store),
            Arc::new(DenyUnknown),
        ))
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    async fn expect_response(client: &mut (impl AsyncRead + Unpin)) -> Response {
        let mut reader = FrameReader::new();
        loop {
            if let Some(frame) = reader.next_frame() {
                return Response::decode(&frame).unwrap();
            }
            let mut chunk = [0u8; 1024];
            let n = client.read(&mut chunk).await.unwrap();
            assert!(n > 0, "server closed before replying");
            reader.extend(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn auth_then_version_query() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let handler = ConnectionHandler::new(server, addr(), test_context(&dir));
        let task = tokio::spawn(handler.run());

        client
            .write_all(
                &Request::Auth {
                    client_id: "alice".into(),
                    password_hash: "HASH".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        let reply = expect_response(&mut client).await;
        assert_eq!(reply.status(), status::OK);

        client
            .write_all(
                &Request::VersionQuery {
                    client_id: "alice".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        let reply = expect_response(&mut client).await;
        assert_eq!(
            reply,
            Response::Version {
                client_id: "alice".into(),
                version: 1
            }
        );

        client
            .write_all(
                &Request::EndConnection {
                    client_id: "alice".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn disconnect_waits_out_a_log_edit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let context = test_context(&dir);
        let handler = ConnectionHandler::new(server, addr(), Arc::clone(&context));
        let task = tokio::spawn(handler.run());

        client
            .write_all(
                &Request::Auth {
                    client_id: "alice".into(),
                    password_hash: "HASH".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        assert_eq!(expect_response(&mut client).await.status(), status::OK);

        // An edit is in flight elsewhere; even a disconnect defers
        // until the log comes back, keeping the session in the
        // registry for the duration.
        context.mode.set_receiving_log();
        client
            .write_all(
                &Request::EndConnection {
                    client_id: "alice".into(),
                }
                .encode(),
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!task.is_finished());
        assert_eq!(context.registry.len(), 1);

        context.mode.set_normal();
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(context.registry.len(), 0);
    }

    #[tokio::test]
    async fn wrong_hash_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let context = test_context(&dir);
        let handler = ConnectionHandler::new(server, addr(), Arc::clone(&context));
        let task = tokio::spawn(handler.run());

        client
            .write_all(
                &Request::Auth {
                    client_id: "alice".into(),
                    password_hash: "WRONG".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        let reply = expect_response(&mut client).await;
        assert_eq!(reply.status(), status::FORBIDDEN);

        task.await.unwrap().unwrap();
        assert_eq!(context.registry.len(), 0);
    }

    #[tokio::test]
    async fn unknown_client_rejected_by_policy() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let handler = ConnectionHandler::new(server, addr(), test_context(&dir));
        let task = tokio::spawn(handler.run());

        client
            .write_all(
                &Request::Auth {
                    client_id: "stranger".into(),
                    password_hash: "X".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        let reply = expect_response(&mut client).await;
        assert_eq!(reply.status(), status::FORBIDDEN);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn first_message_must_be_auth() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let handler = ConnectionHandler::new(server, addr(), test_context(&dir));
        let task = tokio::spawn(handler.run());

        client
            .write_all(
                &Request::VersionQuery {
                    client_id: "alice".into(),
                }
                .encode(),
            )
            .await
            .unwrap();
        let reply = expect_response(&mut client).await;
        assert_eq!(reply.status(), status::BAD_REQUEST);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn garbage_frame_gets_400_for_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = duplex(64 * 1024);
        let handler = ConnectionHandler::new(server, addr(), test_context(&dir));
        let task = tokio::spawn(handler.run());

        client.write_all(b"not a frame at all<EOF>").await.unwrap();
        let reply = expect_response(&mut client).await;
        assert_eq!(
            reply,
            Response::Status {
                client_id: "?".into(),
                kind: kind::AUTH,
                status: status::BAD_REQUEST,
            }
        );
        task.await.unwrap().unwrap();
    }
}
