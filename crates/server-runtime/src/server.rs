//! # Accept Loop
//!
//! Turns accepted transport connections into served sessions until told to
//! stop.
//!
//! ```text
//! accept ──spawn──→ establish (auth, hello) ──→ SessionServer::serve ──→ close
//!                        │
//!                        └── failure: counted, connection dropped
//! ```

use crate::container::ServerContainer;
use nc_03_session::{TransportConnection, TransportError, TransportListener};
use nc_telemetry::SESSIONS_TOTAL;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct NetconfServer {
    container: Arc<ServerContainer>,
    shutdown: watch::Sender<bool>,
}

impl NetconfServer {
    pub fn new(container: Arc<ServerContainer>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            container,
            shutdown,
        }
    }

    pub fn container(&self) -> &Arc<ServerContainer> {
        &self.container
    }

    /// Receiver that flips to `true` when shutdown is requested.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Ask `run` to stop accepting and close every session.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Accept connections from `listener` until `shutdown` is called.
    pub async fn run<L: TransportListener>(&self, mut listener: L) {
        let mut stop = self.shutdown.subscribe();
        info!("[Server] accepting connections");

        loop {
            tokio::select! {
                biased;
                // The borrow from `wait_for` must not outlive this arm.
                _ = async { let _ = stop.wait_for(|stopped| *stopped).await; } => break,
                accepted = listener.accept() => match accepted {
                    Ok(connection) => {
                        let server = self.clone_handle();
                        tokio::spawn(async move { server.serve_connection(connection).await });
                    }
                    Err(TransportError::Closed) => {
                        info!("[Server] listener closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "[Server] accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }

        self.container.shutdown().await;
        info!("[Server] stopped");
    }

    /// Establish a session on `connection` and serve it to completion.
    pub async fn serve_connection(&self, connection: TransportConnection) {
        let source = connection.endpoints.source;
        match self.container.sessions.establish(connection).await {
            Ok(established) => {
                self.container.session_server().serve(established).await;
            }
            Err(e) => {
                SESSIONS_TOTAL.with_label_values(&["rejected"]).inc();
                debug!(?source, error = %e, "[Server] session not established");
            }
        }
    }

    fn clone_handle(&self) -> Self {
        Self {
            container: Arc::clone(&self.container),
            shutdown: self.shutdown.clone(),
        }
    }
}
