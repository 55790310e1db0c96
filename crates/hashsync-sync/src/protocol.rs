//! Reconciliation state machine.
//!
//! A [`Reconciler`] answers one inbound message at a time. It holds no state
//! between rounds: every decision is made from the local store and the
//! message in hand, and the outcome is returned as a [`Step`] for the caller
//! to send and publish.

use std::sync::Arc;

use hashsync_core::{Digest, Record};
use hashsync_store::Store;

use crate::error::Result;
use crate::messages::{SnapshotPayload, SyncMessage, SyncState};

/// Outcome of applying a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Records written to the local store.
    pub applied: usize,
    /// Records skipped because the store rejected them.
    pub failed: usize,
}

impl ApplyReport {
    /// Whether every record in the snapshot was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Observable outcome of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Peer digest matched ours. `count` is the peer's announced record count.
    InSync { digest: Digest, count: usize },
    /// Peer digest differed; a snapshot was requested.
    Mismatch { local: Digest, remote: Digest },
    /// We sent our full state to the peer.
    SnapshotServed { count: usize },
    /// We absorbed the peer's full state. `digest` is ours after the apply;
    /// `peer` summarizes the snapshot as sent.
    SnapshotApplied {
        report: ApplyReport,
        digest: Digest,
        peer: SyncState,
    },
}

/// What to do after handling an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Message to send back to the peer, if any.
    pub reply: Option<SyncMessage>,
    /// What happened.
    pub event: SyncEvent,
}

/// Configuration for reconciliation behavior.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Re-issue a `HashCheck` after applying a snapshot so the peer can
    /// confirm convergence.
    pub confirm_after_apply: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            confirm_after_apply: true,
        }
    }
}

impl ReconcileConfig {
    pub fn with_confirm_after_apply(mut self, confirm: bool) -> Self {
        self.confirm_after_apply = confirm;
        self
    }
}

/// Protocol handler bound to one local store.
pub struct Reconciler<S: Store + ?Sized> {
    store: Arc<S>,
    config: ReconcileConfig,
}

impl<S: Store + ?Sized> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store + ?Sized> Reconciler<S> {
    /// Create a reconciler over a shared store.
    pub fn new(store: Arc<S>, config: ReconcileConfig) -> Self {
        Self { store, config }
    }

    /// The local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Summarize the local store from a single scan.
    pub async fn local_state(&self) -> Result<SyncState> {
        let records = self.store.list_all().await?;
        Ok(SyncState::of(&records))
    }

    /// Build the `HashCheck` announcing our current state.
    pub async fn hash_check(&self) -> Result<SyncMessage> {
        Ok(SyncMessage::HashCheck(self.local_state().await?))
    }

    /// Build a `SnapshotData` carrying every local record.
    pub async fn snapshot(&self) -> Result<SyncMessage> {
        let items = self.store.list_all().await?;
        Ok(SyncMessage::SnapshotData(SnapshotPayload { items }))
    }

    /// Dispatch one inbound message.
    pub async fn handle(&self, message: SyncMessage) -> Result<Step> {
        match message {
            SyncMessage::HashCheck(remote) => self.on_hash_check(&remote).await,
            SyncMessage::RequestSnapshot => self.on_request_snapshot().await,
            SyncMessage::SnapshotData(payload) => self.on_snapshot_data(payload).await,
        }
    }

    /// Compare the peer's digest with ours; pull on mismatch.
    pub async fn on_hash_check(&self, remote: &SyncState) -> Result<Step> {
        let local = self.store.state_digest().await?;

        if local == remote.root_hash {
            tracing::info!(digest = %local, count = remote.count, "in sync");
            return Ok(Step {
                reply: None,
                event: SyncEvent::InSync {
                    digest: local,
                    count: remote.count,
                },
            });
        }

        tracing::info!(
            local = %local,
            remote = %remote.root_hash,
            remote_count = remote.count,
            "digest mismatch, requesting snapshot"
        );
        Ok(Step {
            reply: Some(SyncMessage::RequestSnapshot),
            event: SyncEvent::Mismatch {
                local,
                remote: remote.root_hash,
            },
        })
    }

    /// Serve our full state.
    pub async fn on_request_snapshot(&self) -> Result<Step> {
        let items = self.store.list_all().await?;
        let count = items.len();
        tracing::info!(count, "serving snapshot");

        Ok(Step {
            reply: Some(SyncMessage::SnapshotData(SnapshotPayload { items })),
            event: SyncEvent::SnapshotServed { count },
        })
    }

    /// Absorb the peer's full state, then optionally confirm.
    ///
    /// No confirmation is sent when any record was rejected; the round ends
    /// incomplete and waits for the next announcement.
    pub async fn on_snapshot_data(&self, payload: SnapshotPayload) -> Result<Step> {
        let peer = SyncState::of(&payload.items);
        let report = self.apply_snapshot(&payload.items).await;
        let state = self.local_state().await?;

        tracing::info!(
            applied = report.applied,
            failed = report.failed,
            digest = %state.root_hash,
            "snapshot applied"
        );

        // A partial apply never matches the peer.
        let digest = state.root_hash;
        let confirm = self.config.confirm_after_apply && report.is_complete();
        let reply = confirm.then_some(SyncMessage::HashCheck(state));

        Ok(Step {
            reply,
            event: SyncEvent::SnapshotApplied {
                report,
                digest,
                peer,
            },
        })
    }

    /// Write every record through the local store.
    ///
    /// A record the store rejects is skipped and counted; the rest are
    /// still applied.
    pub async fn apply_snapshot(&self, items: &[Record]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for record in items {
            match self.store.put(record).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "failed to apply record");
                    report.failed += 1;
                }
            }
        }

        report
    }
}
