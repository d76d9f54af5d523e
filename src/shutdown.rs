use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{signal, sync::watch};
use tracing::{error, info, warn};

/// Broadcasts a single shutdown request to the server and any background work
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_requested: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Idempotent: only the first call broadcasts
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            info!("Initiating graceful shutdown");
            if let Err(e) = self.shutdown_tx.send(true) {
                error!("Failed to broadcast shutdown signal: {}", e);
            }
        }
    }

    /// Resolve once shutdown has been requested, by signal or by [`Self::initiate_shutdown`]
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }

    /// Wait for SIGINT/SIGTERM (or a programmatic request) and then broadcast shutdown
    pub async fn wait_for_shutdown_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C signal"),
            _ = terminate => info!("Received terminate signal"),
            _ = self.wait() => {}
        }

        self.initiate_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_initiate_shutdown_notifies_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait().await })
        };

        assert!(!coordinator.is_shutdown_requested());
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(coordinator.is_shutdown_requested());
        assert!(*coordinator.subscribe().borrow());
    }

    #[tokio::test]
    async fn test_signal_wait_returns_on_programmatic_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown_signal())
            .await
            .unwrap();
    }
}
