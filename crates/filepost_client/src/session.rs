//! The client session state machine.
//!
//! One [`Session`] owns the socket and walks `Disconnected → Waiting →
//! Ready → TextEditor`. Every exchange publishes its state on a watch
//! channel so the progress task can tick while a reply is outstanding.

use crate::editor::LogEditor;
use crate::error::{ClientError, ClientResult};
use filepost_protocol::{kind, status, FrameReader, Request, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info};

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not authenticated (initial state, and after `exit`).
    Disconnected,
    /// A request is in flight; a reply is awaited.
    Waiting,
    /// Authenticated and idle, accepting operator commands.
    Ready,
    /// The shared log is checked out into the external editor.
    TextEditor,
}

/// Outcome of a file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The server stored the file (status 200).
    Accepted,
    /// The declared version does not match the server (status 400).
    VersionMismatch,
    /// The server failed to persist the file (status 500).
    ServerError,
}

/// Outcome of a log editing round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The edited log was stored (status 200).
    Saved,
    /// The server refused the log request (status 403, not an admin).
    Denied,
    /// The server failed to store the edited log (status 500).
    ServerError,
}

/// An authenticated (or authenticating) connection to the server.
pub struct Session<S> {
    stream: S,
    reader: FrameReader,
    client_id: String,
    state: watch::Sender<SessionState>,
}

impl Session<TcpStream> {
    /// Connects over TCP. The session starts `Disconnected`; call
    /// [`Session::authenticate`] next.
    pub async fn connect(addr: impl tokio::net::ToSocketAddrs, client_id: impl Into<String>) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream, client_id))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream.
    pub fn new(stream: S, client_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            stream,
            reader: FrameReader::new(),
            client_id: client_id.into(),
            state,
        }
    }

    /// Identifier this session authenticates as.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver observing every state transition, for the progress
    /// task.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Sends the auth frame and resolves the reply.
    ///
    /// On 200 the session becomes `Ready`. On 403 or 429 the session
    /// stays `Disconnected` and the error carries the refusal status;
    /// the server has closed the connection, so the session is done.
    pub async fn authenticate(&mut self, password_hash: &str) -> ClientResult<()> {
        let request = Request::Auth {
            client_id: self.client_id.clone(),
            password_hash: password_hash.into(),
        };
        let reply = self.transact(&request).await;
        match reply {
            Ok(Response::Status {
                status: status::OK, ..
            }) => {
                info!(client_id = %self.client_id, "authenticated");
                self.state.send_replace(SessionState::Ready);
                Ok(())
            }
            Ok(Response::Status { status, .. }) => {
                self.state.send_replace(SessionState::Disconnected);
                Err(ClientError::AuthRejected { status })
            }
            Ok(other) => {
                self.state.send_replace(SessionState::Disconnected);
                Err(unexpected("an auth status", &other))
            }
            Err(e) => {
                self.state.send_replace(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Asks the server for its running version.
    pub async fn query_version(&mut self) -> ClientResult<u8> {
        let request = Request::VersionQuery {
            client_id: self.client_id.clone(),
        };
        let reply = self.transact(&request).await?;
        self.state.send_replace(SessionState::Ready);
        match reply {
            Response::Version { version, .. } => Ok(version),
            other => Err(unexpected("a version reply", &other)),
        }
    }

    /// Uploads `file_data` under `file_name`, declaring which server
    /// version the payload targets.
    pub async fn send_file(
        &mut self,
        file_name: &str,
        file_data: Vec<u8>,
        server_version: u8,
    ) -> ClientResult<SendOutcome> {
        let request = Request::SendFile {
            client_id: self.client_id.clone(),
            file_name: file_name.into(),
            file_size: file_data.len() as i32,
            file_data,
            server_version,
        };
        let reply = self.transact(&request).await?;
        self.state.send_replace(SessionState::Ready);
        match reply {
            Response::Status {
                kind: kind::SEND_FILE,
                status,
                ..
            } => Ok(match status {
                status::OK => SendOutcome::Accepted,
                status::BAD_REQUEST => SendOutcome::VersionMismatch,
                _ => SendOutcome::ServerError,
            }),
            other => Err(unexpected("an upload status", &other)),
        }
    }

    /// Runs one full log editing round: fetch the log, hand it to the
    /// editor, post the edited bytes back.
    ///
    /// If the server refuses the fetch (not an admin) the round ends
    /// with [`EditOutcome::Denied`] and nothing is sent back.
    pub async fn edit_log(&mut self, editor: &dyn LogEditor) -> ClientResult<EditOutcome> {
        let request = Request::LogRequest {
            client_id: self.client_id.clone(),
        };
        let log_data = match self.transact(&request).await? {
            Response::LogData {
                status: status::OK,
                log_data,
                ..
            } => log_data,
            Response::Status {
                kind: kind::LOG_REQUEST,
                status: status::FORBIDDEN,
                ..
            } => {
                self.state.send_replace(SessionState::Ready);
                return Ok(EditOutcome::Denied);
            }
            Response::Status {
                kind: kind::LOG_REQUEST,
                ..
            } => {
                self.state.send_replace(SessionState::Ready);
                return Ok(EditOutcome::ServerError);
            }
            other => {
                self.state.send_replace(SessionState::Ready);
                return Err(unexpected("the log contents", &other));
            }
        };

        self.state.send_replace(SessionState::TextEditor);
        debug!(bytes = log_data.len(), "log checked out for editing");
        let edited = match editor.edit(&log_data) {
            Ok(edited) => edited,
            Err(e) => {
                // The server is holding ReceivingLog for us; post the
                // log back unchanged so it is not stuck there.
                let request = Request::LogChanges {
                    client_id: self.client_id.clone(),
                    log_data,
                };
                let release = self.transact(&request).await;
                self.state.send_replace(SessionState::Ready);
                release?;
                return Err(e);
            }
        };

        let request = Request::LogChanges {
            client_id: self.client_id.clone(),
            log_data: edited,
        };
        let reply = self.transact(&request).await?;
        self.state.send_replace(SessionState::Ready);
        match reply {
            Response::Status {
                kind: kind::LOG_CHANGES,
                status: status::OK,
                ..
            } => Ok(EditOutcome::Saved),
            Response::Status {
                kind: kind::LOG_CHANGES,
                ..
            } => Ok(EditOutcome::ServerError),
            other => Err(unexpected("a log changes status", &other)),
        }
    }

    /// Announces the disconnect and consumes the session. No reply is
    /// awaited; the socket closes when the session drops.
    pub async fn end_connection(mut self) -> ClientResult<()> {
        let request = Request::EndConnection {
            client_id: self.client_id.clone(),
        };
        self.stream.write_all(&request.encode()).await?;
        self.stream.flush().await?;
        self.state.send_replace(SessionState::Disconnected);
        info!(client_id = %self.client_id, "disconnected");
        Ok(())
    }

    /// Sends one request and reads one reply, in `Waiting` state for
    /// the duration. The caller sets the follow-up state.
    async fn transact(&mut self, request: &Request) -> ClientResult<Response> {
        self.state.send_replace(SessionState::Waiting);
        self.stream.write_all(&request.encode()).await?;
        self.stream.flush().await?;

        loop {
            if let Some(frame) = self.reader.next_frame() {
                return Ok(Response::decode(&frame)?);
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            self.reader.extend(&chunk[..n]);
        }
    }
}

fn unexpected(expected: &'static str, reply: &Response) -> ClientError {
    ClientError::UnexpectedResponse {
        expected,
        kind: reply.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    type Script = Vec<Box<dyn FnOnce(Request) -> Option<Response> + Send>>;

    /// Runs a scripted peer on the far side of a duplex stream: for
    /// each script entry, read one request and maybe answer.
    fn scripted_server(mut stream: DuplexStream, script: Script) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = FrameReader::new();
            for step in script {
                let frame = loop {
                    if let Some(frame) = reader.next_frame() {
                        break frame;
                    }
                    let mut chunk = [0u8; 4096];
                    let n = stream.read(&mut chunk).await.unwrap();
                    assert!(n > 0, "client closed mid-script");
                    reader.extend(&chunk[..n]);
                };
                let request = Request::decode(&frame).unwrap();
                if let Some(response) = step(request) {
                    stream.write_all(&response.encode()).await.unwrap();
                }
            }
        })
    }

    fn ok_status(kind: u8) -> Response {
        Response::Status {
            client_id: "alice".into(),
            kind,
            status: status::OK,
        }
    }

    #[tokio::test]
    async fn authenticate_success_reaches_ready() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|request| {
                assert!(matches!(
                    request,
                    Request::Auth { ref client_id, ref password_hash }
                        if client_id == "alice" && password_hash == "HASH"
                ));
                Some(ok_status(kind::AUTH))
            })],
        );

        let mut session = Session::new(client, "alice");
        assert_eq!(session.state(), SessionState::Disconnected);
        session.authenticate("HASH").await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn auth_refusal_carries_the_status() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|_| {
                Some(Response::Status {
                    client_id: "alice".into(),
                    kind: kind::AUTH,
                    status: status::TOO_MANY_CONNECTIONS,
                })
            })],
        );

        let mut session = Session::new(client, "alice");
        let err = session.authenticate("HASH").await.unwrap_err();
        assert!(err.is_capacity());
        assert_eq!(session.state(), SessionState::Disconnected);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn version_query_round_trip() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|request| {
                assert!(matches!(request, Request::VersionQuery { .. }));
                Some(Response::Version {
                    client_id: "alice".into(),
                    version: 2,
                })
            })],
        );

        let mut session = Session::new(client, "alice");
        assert_eq!(session.query_version().await.unwrap(), 2);
        assert_eq!(session.state(), SessionState::Ready);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn send_file_reports_version_mismatch() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|request| {
                assert!(matches!(
                    request,
                    Request::SendFile { server_version: 2, .. }
                ));
                Some(Response::Status {
                    client_id: "alice".into(),
                    kind: kind::SEND_FILE,
                    status: status::BAD_REQUEST,
                })
            })],
        );

        let mut session = Session::new(client, "alice");
        let outcome = session
            .send_file("notes.txt", b"hello".to_vec(), 2)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::VersionMismatch);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn send_file_declares_the_payload_size() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|request| {
                match request {
                    Request::SendFile {
                        file_name,
                        file_size,
                        file_data,
                        ..
                    } => {
                        assert_eq!(file_name, "notes.txt");
                        assert_eq!(file_size, 5);
                        assert_eq!(file_data, b"hello");
                    }
                    other => panic!("expected SendFile, got {other:?}"),
                }
                Some(ok_status(kind::SEND_FILE))
            })],
        );

        let mut session = Session::new(client, "alice");
        let outcome = session
            .send_file("notes.txt", b"hello".to_vec(), 1)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Accepted);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn edit_log_posts_back_the_edited_bytes() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![
                Box::new(|request| {
                    assert!(matches!(request, Request::LogRequest { .. }));
                    Some(Response::LogData {
                        client_id: "alice".into(),
                        status: status::OK,
                        log_data: b"line one\n".to_vec(),
                    })
                }),
                Box::new(|request| {
                    match request {
                        Request::LogChanges { log_data, .. } => {
                            assert_eq!(log_data, b"LINE ONE\n");
                        }
                        other => panic!("expected LogChanges, got {other:?}"),
                    }
                    Some(ok_status(kind::LOG_CHANGES))
                }),
            ],
        );

        let mut session = Session::new(client, "alice");
        let editor = |contents: &[u8]| contents.to_ascii_uppercase();
        let outcome = session.edit_log(&editor).await.unwrap();
        assert_eq!(outcome, EditOutcome::Saved);
        assert_eq!(session.state(), SessionState::Ready);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn edit_log_denied_sends_nothing_back() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|_| {
                Some(Response::Status {
                    client_id: "alice".into(),
                    kind: kind::LOG_REQUEST,
                    status: status::FORBIDDEN,
                })
            })],
        );

        let mut session = Session::new(client, "alice");
        let editor = |_: &[u8]| panic!("editor must not run when the fetch is denied");
        let outcome = session.edit_log(&editor).await.unwrap();
        assert_eq!(outcome, EditOutcome::Denied);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_editor_posts_the_log_back_unchanged() {
        struct BrokenEditor;
        impl crate::editor::LogEditor for BrokenEditor {
            fn edit(&self, _contents: &[u8]) -> ClientResult<Vec<u8>> {
                Err(ClientError::editor("no display"))
            }
        }

        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![
                Box::new(|_| {
                    Some(Response::LogData {
                        client_id: "alice".into(),
                        status: status::OK,
                        log_data: b"precious\n".to_vec(),
                    })
                }),
                Box::new(|request| {
                    match request {
                        Request::LogChanges { log_data, .. } => {
                            assert_eq!(log_data, b"precious\n");
                        }
                        other => panic!("expected LogChanges, got {other:?}"),
                    }
                    Some(ok_status(kind::LOG_CHANGES))
                }),
            ],
        );

        let mut session = Session::new(client, "alice");
        let err = session.edit_log(&BrokenEditor).await.unwrap_err();
        assert!(matches!(err, ClientError::Editor { .. }));
        assert_eq!(session.state(), SessionState::Ready);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn end_connection_sends_the_farewell() {
        let (client, server) = duplex(64 * 1024);
        let task = scripted_server(
            server,
            vec![Box::new(|request| {
                assert!(matches!(request, Request::EndConnection { .. }));
                None
            })],
        );

        let session = Session::new(client, "alice");
        session.end_connection().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn server_disappearing_mid_wait_is_an_error() {
        let (client, server) = duplex(64 * 1024);
        // Reads the auth frame, never answers, hangs up.
        let _task = scripted_server(server, vec![Box::new(|_| None)]);

        let mut session = Session::new(client, "alice");
        let err = session.authenticate("HASH").await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
