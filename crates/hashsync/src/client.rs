//! Client-side helpers.

use std::sync::Arc;
use std::time::Duration;

use hashsync_store::Store;
use hashsync_sync::{
    verify_convergence, ConvergenceResult, SyncError, SyncEvent, SyncState, TcpChannel,
};
use tokio::net::ToSocketAddrs;
use tokio::sync::broadcast;

use crate::config::SessionConfig;
use crate::error::{HashsyncError, Result};
use crate::session::Session;

/// Connect to a server and build a session over the connection.
///
/// The session is not started; call [`Session::run`].
pub async fn connect(
    addr: impl ToSocketAddrs,
    store: Arc<dyn Store>,
    config: SessionConfig,
) -> Result<Session<TcpChannel>> {
    let channel = TcpChannel::connect(addr).await?;
    tracing::info!(peer = %channel.peer_addr(), "connected");
    Ok(Session::new(store, channel, config))
}

/// Wait until the session reports that both sides hold the same state, and
/// `store` still agrees.
///
/// A candidate is either a matching `HashCheck` from the peer, or a fully
/// applied snapshot of the peer's state. Each candidate is checked against
/// the store with [`verify_convergence`]; one that no longer holds is skipped.
pub async fn await_convergence(
    store: &dyn Store,
    events: &mut broadcast::Receiver<SyncEvent>,
    timeout: Duration,
) -> Result<SyncEvent> {
    let wait = async {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(HashsyncError::Sync(SyncError::Closed))
                }
            };
            let Some(peer) = agreed_state(&event) else {
                continue;
            };

            let verdict = match verify_convergence(store, &peer).await {
                Ok(verdict) => verdict,
                Err(e) => return Err(HashsyncError::Sync(e)),
            };
            match verdict {
                ConvergenceResult::Converged => return Ok(event),
                ConvergenceResult::Diverged {
                    local,
                    remote,
                    local_count,
                    remote_count,
                } => {
                    tracing::debug!(%local, %remote, local_count, remote_count, "still diverged");
                }
            }
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| HashsyncError::Timeout(timeout))?
}

/// Peer state an event claims we match.
fn agreed_state(event: &SyncEvent) -> Option<SyncState> {
    match event {
        SyncEvent::InSync { digest, count } => Some(SyncState {
            root_hash: *digest,
            count: *count,
        }),
        SyncEvent::SnapshotApplied { report, peer, .. } if report.is_complete() => {
            Some(peer.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashsync_core::{Digest, Record};
    use hashsync_store::MemoryStore;
    use hashsync_sync::ApplyReport;

    #[tokio::test]
    async fn test_await_convergence_skips_other_events() {
        let store = MemoryStore::new();
        let other = SyncState::of(&[Record::new("1", "hello", 1000)]);
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(SyncEvent::Mismatch {
            local: Digest::empty(),
            remote: other.root_hash,
        })
        .unwrap();
        tx.send(SyncEvent::SnapshotApplied {
            report: ApplyReport { applied: 1, failed: 1 },
            digest: Digest::empty(),
            peer: SyncState::of(&[]),
        })
        .unwrap();
        // Complete, but the store does not hold what the peer sent.
        tx.send(SyncEvent::SnapshotApplied {
            report: ApplyReport { applied: 1, failed: 0 },
            digest: other.root_hash,
            peer: other,
        })
        .unwrap();
        tx.send(SyncEvent::InSync {
            digest: Digest::empty(),
            count: 0,
        })
        .unwrap();

        let event = await_convergence(&store, &mut rx, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(matches!(event, SyncEvent::InSync { .. }));
    }

    #[tokio::test]
    async fn test_await_convergence_rechecks_store() {
        let store = MemoryStore::with_records(vec![Record::new("1", "hello", 1000)]);
        let (tx, mut rx) = broadcast::channel(8);
        // Reported in sync at the empty digest, but the store has moved on.
        tx.send(SyncEvent::InSync {
            digest: Digest::empty(),
            count: 0,
        })
        .unwrap();

        let result = await_convergence(&store, &mut rx, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(HashsyncError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_await_convergence_times_out() {
        let store = MemoryStore::new();
        let (_tx, mut rx) = broadcast::channel::<SyncEvent>(8);
        let result = await_convergence(&store, &mut rx, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(HashsyncError::Timeout(_))));
    }
}
