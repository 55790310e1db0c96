//! Convergence verification.
//!
//! After a round completes, a party can check that its store matches a
//! state summary received from the peer without exchanging records.

use hashsync_core::Digest;
use hashsync_store::Store;

use crate::error::Result;
use crate::messages::SyncState;

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both parties hold the same record set.
    Converged,
    /// The parties differ (another round is needed).
    Diverged {
        local: Digest,
        remote: Digest,
        local_count: usize,
        remote_count: usize,
    },
}

impl ConvergenceResult {
    /// Check if the parties have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare the local store against a peer's announced state.
///
/// Only the root digest decides the outcome; counts are carried along for
/// diagnostics.
pub async fn verify_convergence<S: Store + ?Sized>(
    local_store: &S,
    remote: &SyncState,
) -> Result<ConvergenceResult> {
    let records = local_store.list_all().await?;
    let local = SyncState::of(&records);

    if local.root_hash == remote.root_hash {
        return Ok(ConvergenceResult::Converged);
    }

    Ok(ConvergenceResult::Diverged {
        local: local.root_hash,
        remote: remote.root_hash,
        local_count: local.count,
        remote_count: remote.count,
    })
}
