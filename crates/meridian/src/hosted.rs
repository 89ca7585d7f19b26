//! A game server hosted inside the client process.
//!
//! Single-player games run their server as a Tokio task linked to the
//! client by a [`MemoryConnection`] pair. The client owns the
//! [`LocalServer`] handle and stops the task when it quits.

use std::future::Future;
use std::time::Duration;

use meridian_transport::MemoryConnection;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Resolves when the hosting client asks the server to stop.
pub type ShutdownSignal = oneshot::Receiver<()>;

/// Handle to a locally hosted game server.
pub struct LocalServer {
    link: Option<MemoryConnection>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LocalServer {
    /// Spawns `serve` with the server end of a fresh in-process link and
    /// a shutdown signal. The client end stays in the handle until
    /// [`MeridianClient::connect_local`](crate::MeridianClient::connect_local)
    /// takes it.
    ///
    /// `serve` should return soon after the signal fires; a server that
    /// ignores it is aborted when the shutdown timeout runs out.
    pub fn spawn<F, Fut>(serve: F) -> Self
    where
        F: FnOnce(MemoryConnection, ShutdownSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (client_end, server_end) = MemoryConnection::pair();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(server_end, shutdown_rx));
        tracing::info!("local server started");
        Self {
            link: Some(client_end),
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    pub(crate) fn take_link(&mut self) -> Option<MemoryConnection> {
        self.link.take()
    }

    /// Returns `true` while the server task is running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals the server to stop and waits up to `limit` for it. Returns
    /// `true` if it stopped on its own; otherwise the task is aborted.
    pub async fn shutdown(mut self, limit: Duration) -> bool {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match tokio::time::timeout(limit, &mut self.task).await {
            Ok(Ok(())) => {
                tracing::info!("local server stopped");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "local server task failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "local server did not stop in time; aborting it"
                );
                self.task.abort();
                false
            }
        }
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for LocalServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalServer")
            .field("running", &self.is_running())
            .field("link_taken", &self.link.is_none())
            .finish()
    }
}
