//! TCP server: one session task per connection over one shared store.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hashsync_store::Store;
use hashsync_sync::TcpChannel;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::{ServerConfig, SessionConfig};
use crate::error::Result;
use crate::session::Session;

/// Accepts peers and reconciles each against the server store.
pub struct SyncServer {
    listener: TcpListener,
    store: Arc<dyn Store>,
    session: SessionConfig,
}

impl SyncServer {
    /// Open the configured backend and bind the listen address.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let store = config.store.open().await?;
        Self::bind_with_store(&config.addr, store, config.session).await
    }

    /// Bind with an already-open store.
    pub async fn bind_with_store(
        addr: &str,
        store: Arc<dyn Store>,
        session: SessionConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            store,
            session,
        })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared server store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Serve until the process is killed.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then stop accepting and end every
    /// open session.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "sync server listening");

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let channel = match TcpChannel::from_stream(stream) {
                        Ok(channel) => channel,
                        Err(e) => {
                            tracing::warn!(%peer, error = %e, "dropping connection");
                            continue;
                        }
                    };

                    tracing::info!(%peer, "peer connected");
                    let session = Session::new(Arc::clone(&self.store), channel, self.session.clone());
                    sessions.spawn(async move {
                        match session.run().await {
                            Ok(report) => tracing::info!(
                                %peer,
                                frames = report.frames_received,
                                snapshots_applied = report.snapshots_applied,
                                "peer disconnected"
                            ),
                            Err(e) => tracing::warn!(%peer, error = %e, "peer session failed"),
                        }
                    });
                }
            }
        }

        tracing::info!(open = sessions.len(), "sync server shutting down");
        sessions.shutdown().await;
        Ok(())
    }
}
