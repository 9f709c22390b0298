//! Cooperative shutdown for the accept loop.

use tokio::sync::watch;

/// Owner side of the cancellation signal.
///
/// Dropping it cancels every token as well.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// A token for one accept loop. Tokens handed out after
    /// [`trigger`](Self::trigger) are already cancelled.
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side, passed into [`Server::run`](crate::server::Server::run).
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Resolves once shutdown is triggered or the owner is gone.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_cancels_existing_and_new_tokens() {
        let shutdown = Shutdown::new();
        let mut early = shutdown.token();
        assert!(!early.is_cancelled());

        shutdown.trigger();
        early.cancelled().await;

        let late = shutdown.token();
        assert!(late.is_cancelled());
    }

    #[tokio::test]
    async fn dropping_owner_cancels() {
        let shutdown = Shutdown::new();
        let mut token = shutdown.token();
        drop(shutdown);

        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}
