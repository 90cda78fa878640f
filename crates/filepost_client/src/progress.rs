//! Progress indication while the session waits on the server.

use crate::session::SessionState;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tick interval while the session is waiting.
const TICK: Duration = Duration::from_millis(200);

/// Receives a tick for every interval the session spends in
/// [`SessionState::Waiting`].
pub trait ProgressSink: Send + Sync + 'static {
    /// Called once per tick.
    fn tick(&self);
}

/// Prints a dot per tick to stderr.
#[derive(Debug, Default)]
pub struct DotProgress;

impl ProgressSink for DotProgress {
    fn tick(&self) {
        eprint!(".");
        let _ = std::io::stderr().flush();
    }
}

/// Spawns the progress task. It ticks while the observed state is
/// `Waiting`, sleeps otherwise, and ends when the session is dropped.
pub fn spawn(mut state: watch::Receiver<SessionState>, sink: Arc<dyn ProgressSink>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *state.borrow_and_update() == SessionState::Waiting {
                sink.tick();
                tokio::time::sleep(TICK).await;
                if state.has_changed().is_err() {
                    return;
                }
            } else if state.changed().await.is_err() {
                return;
            }
        }
    })
}
