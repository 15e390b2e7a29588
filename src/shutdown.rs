use actix_web::dev::ServerHandle;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::worker::JobPool;

/// Handles graceful shutdown of the application
///
/// This module orchestrates graceful shutdown by:
/// 1. Listening for shutdown signals (SIGTERM, SIGINT/CTRL+C)
/// 2. Stopping the HTTP server (stops accepting new requests)
/// 3. Closing the job pool to new submissions
/// 4. Waiting for queued and running ingestion jobs to finish
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    pool: Arc<JobPool>,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        pool: Arc<JobPool>,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            pool,
        }
    }

    /// Wait for CTRL+C or SIGTERM (Unix only), then shut down gracefully
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        #[cfg(unix)]
        let terminate = terminate.recv();

        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            result = ctrl_c => {
                result?;
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    /// Perform the actual shutdown sequence
    async fn shutdown(self) -> Result<(), std::io::Error> {
        // 1. Stop HTTP server (stop accepting new requests)
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;
        info!("HTTP server stopped accepting new requests");

        // 2. Close the pool and wait for in-flight jobs
        self.pool.drain().await;

        // 3. Wait for HTTP server task to complete
        info!("Waiting for HTTP server to fully shut down...");
        match self.server_task.await {
            Ok(Ok(_)) => info!("HTTP server shut down successfully"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
