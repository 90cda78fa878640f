//! Global server mode.
//!
//! While an administrator is editing the shared log, the server holds
//! [`ServerMode::ReceivingLog`] and every dispatch other than the
//! incoming log changes is deferred. Handlers await the transition back
//! to [`ServerMode::Normal`] on a watch channel instead of polling.

use tokio::sync::watch;

/// Process-wide dispatch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// All message kinds dispatch immediately.
    Normal,
    /// Only log changes dispatch; everything else waits.
    ReceivingLog,
}

/// Shared mode flag with async wakeup on transitions.
#[derive(Debug)]
pub struct ModeGate {
    tx: watch::Sender<ServerMode>,
}

impl ModeGate {
    /// Creates a gate in [`ServerMode::Normal`].
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ServerMode::Normal);
        Self { tx }
    }

    /// Current mode.
    pub fn current(&self) -> ServerMode {
        *self.tx.borrow()
    }

    /// Enters log-receiving mode.
    pub fn set_receiving_log(&self) {
        self.tx.send_replace(ServerMode::ReceivingLog);
    }

    /// Returns to normal mode, waking every deferred dispatch.
    pub fn set_normal(&self) {
        self.tx.send_replace(ServerMode::Normal);
    }

    /// Waits until the mode is [`ServerMode::Normal`]. Returns
    /// immediately if it already is.
    pub async fn wait_for_normal(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as the gate, so wait_for cannot fail.
        let _ = rx.wait_for(|mode| *mode == ServerMode::Normal).await;
    }
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn starts_normal() {
        let gate = ModeGate::new();
        assert_eq!(gate.current(), ServerMode::Normal);
    }

    #[tokio::test]
    async fn wait_returns_immediately_in_normal_mode() {
        let gate = ModeGate::new();
        tokio::time::timeout(Duration::from_millis(50), gate.wait_for_normal())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_blocks_until_mode_clears() {
        let gate = Arc::new(ModeGate::new());
        gate.set_receiving_log();
        assert_eq!(gate.current(), ServerMode::ReceivingLog);

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.wait_for_normal().await;
            })
        };

        // Not woken while the mode is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.set_normal();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
