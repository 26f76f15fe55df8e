//! Graceful Shutdown Coordination
//!
//! Provides a shutdown controller plus cheap clonable tokens that scheduler
//! loops select on, so in-flight ticks finish before the process exits.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{info, warn};

/// Coordinates shutdown across background tasks.
///
/// The controller is held by the process entry point; each background loop
/// gets a [`ShutdownToken`] and exits its loop once the token fires.
pub struct ShutdownController {
    requested: AtomicBool,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            requested: AtomicBool::new(false),
            tx,
            rx,
        }
    }

    /// Hand out a token for a background task.
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.rx.clone(),
        }
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown. Duplicate requests are ignored.
    pub fn request_shutdown(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal");
            return;
        }

        info!("Shutdown requested");
        let _ = self.tx.send(true);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Token for observing shutdown in async tasks.
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check shutdown status without waiting.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested.
    ///
    /// Resolves immediately when shutdown was already requested, and also
    /// when the controller is dropped.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_shutdown_request() {
        let controller = ShutdownController::new();

        assert!(!controller.is_shutdown_requested());

        controller.request_shutdown();
        assert!(controller.is_shutdown_requested());

        // Duplicate request should be ignored
        controller.request_shutdown();
        assert!(controller.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_token_observes_shutdown() {
        let controller = ShutdownController::new();
        let mut token = controller.token();

        assert!(!token.is_shutdown());

        controller.request_shutdown();
        token.cancelled().await;
        assert!(token.is_shutdown());
    }

    #[test]
    fn test_cancelled_is_pending_until_requested() {
        let controller = ShutdownController::new();
        let mut token = controller.token();

        let mut cancelled = tokio_test::task::spawn(async move { token.cancelled().await });
        assert_pending!(cancelled.poll());

        controller.request_shutdown();
        assert!(cancelled.is_woken());
        assert_ready!(cancelled.poll());
    }

    #[tokio::test]
    async fn test_cloned_token_observes_shutdown() {
        let controller = ShutdownController::new();
        let token = controller.token();
        let mut cloned = token.clone();

        controller.request_shutdown();
        cloned.cancelled().await;
        assert!(cloned.is_shutdown());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_controller_drop() {
        let controller = ShutdownController::new();
        let mut token = controller.token();

        drop(controller);
        token.cancelled().await;
    }
}
