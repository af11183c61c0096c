//! Cooperative shutdown handling.
//!
//! The monitor loop must finish the current stack's pending action before
//! exiting, so interruption is a flag checked at stack boundaries rather
//! than a cancelled future.

use tokio::sync::watch;

/// Handle on the process shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Start listening for ctrl-c. Must be called inside a tokio runtime.
    #[must_use]
    pub fn listen() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down after the current stack");
                let _ = tx.send(true);
            }
        });
        Self { rx }
    }

    /// A handle that never signals. Used by one-shot commands.
    #[must_use]
    pub fn inert() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested. Pends forever on an inert handle.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                // Sender gone without signalling; nothing will ever arrive.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inert_handle_never_signals() {
        let shutdown = Shutdown::inert();
        assert!(!shutdown.requested());
    }

    #[tokio::test]
    async fn wait_returns_after_signal() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown { rx };
        tx.send(true).unwrap();
        shutdown.wait().await;
        assert!(shutdown.requested());
    }
}
