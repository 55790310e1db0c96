//! Session endpoint: one store, one channel, one peer.
//!
//! A [`Session`] reads frames from its channel, hands decoded messages to a
//! [`Reconciler`], sends whatever reply comes back and publishes the
//! resulting [`SyncEvent`] to subscribers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hashsync_core::Record;
use hashsync_store::Store;
use hashsync_sync::{Channel, Reconciler, SyncError, SyncEvent, SyncMessage};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::config::SessionConfig;
use crate::error::Result;

/// Which side of the connection this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends a `HashCheck` as soon as the session starts.
    Client,
    /// Waits for the peer to speak first.
    Server,
}

/// How inbound messages are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One message at a time, in arrival order.
    Sequential,
    /// Each message handled as its own task. Handlers may interleave.
    Concurrent,
}

/// Counters accumulated over a session's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Frames read from the channel.
    pub frames_received: usize,
    /// Frames that were not valid envelopes or payloads.
    pub decode_errors: usize,
    /// Envelopes with an unrecognized `type`.
    pub unknown_types: usize,
    /// Messages abandoned because the store failed.
    pub store_errors: usize,
    /// `HashCheck`s that matched our digest.
    pub in_sync: usize,
    /// `HashCheck`s that did not.
    pub mismatches: usize,
    pub snapshots_served: usize,
    pub snapshots_applied: usize,
    /// Records written from applied snapshots.
    pub records_applied: usize,
    /// Records from applied snapshots the store rejected.
    pub records_failed: usize,
}

#[derive(Default)]
struct Stats {
    frames_received: AtomicUsize,
    decode_errors: AtomicUsize,
    unknown_types: AtomicUsize,
    store_errors: AtomicUsize,
    in_sync: AtomicUsize,
    mismatches: AtomicUsize,
    snapshots_served: AtomicUsize,
    snapshots_applied: AtomicUsize,
    records_applied: AtomicUsize,
    records_failed: AtomicUsize,
}

impl Stats {
    fn bump(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn record(&self, event: &SyncEvent) {
        match event {
            SyncEvent::InSync { .. } => Self::bump(&self.in_sync, 1),
            SyncEvent::Mismatch { .. } => Self::bump(&self.mismatches, 1),
            SyncEvent::SnapshotServed { .. } => Self::bump(&self.snapshots_served, 1),
            SyncEvent::SnapshotApplied { report, .. } => {
                Self::bump(&self.snapshots_applied, 1);
                Self::bump(&self.records_applied, report.applied);
                Self::bump(&self.records_failed, report.failed);
            }
        }
    }

    fn snapshot(&self) -> SessionReport {
        let get = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        SessionReport {
            frames_received: get(&self.frames_received),
            decode_errors: get(&self.decode_errors),
            unknown_types: get(&self.unknown_types),
            store_errors: get(&self.store_errors),
            in_sync: get(&self.in_sync),
            mismatches: get(&self.mismatches),
            snapshots_served: get(&self.snapshots_served),
            snapshots_applied: get(&self.snapshots_applied),
            records_applied: get(&self.records_applied),
            records_failed: get(&self.records_failed),
        }
    }
}

struct Inner<C> {
    reconciler: Reconciler<dyn Store>,
    channel: C,
    config: SessionConfig,
    events: broadcast::Sender<SyncEvent>,
    stats: Stats,
}

impl<C: Channel> Inner<C> {
    async fn send(&self, message: &SyncMessage) -> std::result::Result<(), SyncError> {
        let frame = message.encode()?;
        tracing::debug!(kind = %message.message_type(), bytes = frame.len(), "sending frame");
        self.channel.send_frame(frame).await
    }

    /// Handle one inbound frame. Only channel failures are returned; every
    /// other problem is logged, counted and dropped.
    async fn handle_frame(&self, frame: String) -> std::result::Result<(), SyncError> {
        let message = match SyncMessage::decode(&frame) {
            Ok(message) => message,
            Err(SyncError::UnknownMessageType(kind)) => {
                tracing::warn!(%kind, "ignoring unknown message type");
                Stats::bump(&self.stats.unknown_types, 1);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                Stats::bump(&self.stats.decode_errors, 1);
                return Ok(());
            }
        };
        tracing::debug!(kind = %message.message_type(), "received frame");

        let step = match self.reconciler.handle(message).await {
            Ok(step) => step,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(error = %e, "message handling failed");
                Stats::bump(&self.stats.store_errors, 1);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.stats.record(&step.event);
        // No subscribers is not an error.
        let _ = self.events.send(step.event);

        match step.reply {
            Some(reply) => self.send(&reply).await,
            None => Ok(()),
        }
    }
}

/// A session endpoint over channel `C`.
///
/// Cloning is cheap and yields a handle to the same session, so one clone
/// can [`run`](Session::run) while another [`register`](Session::register)s
/// records.
pub struct Session<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Channel + 'static> Session<C> {
    /// Create a session owning `store` and `channel`.
    pub fn new(store: Arc<dyn Store>, channel: C, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                reconciler: Reconciler::new(store, config.reconcile.clone()),
                channel,
                config,
                events,
                stats: Stats::default(),
            }),
        }
    }

    /// The local store.
    pub fn store(&self) -> &Arc<dyn Store> {
        self.inner.reconciler.store()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.inner.channel
    }

    /// Receive every [`SyncEvent`] produced from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Counters so far.
    pub fn report(&self) -> SessionReport {
        self.inner.stats.snapshot()
    }

    /// Store a record from the surrounding application, then announce.
    pub async fn register(&self, record: Record) -> Result<()> {
        self.store().put(&record).await?;
        tracing::debug!(id = %record.id, "registered record");
        self.announce().await
    }

    /// Send a `HashCheck` describing our current state.
    pub async fn announce(&self) -> Result<()> {
        let check = self.inner.reconciler.hash_check().await?;
        self.inner.send(&check).await?;
        Ok(())
    }

    /// Close our sending half. A running [`run`](Session::run) loop ends
    /// when the peer closes in turn.
    pub async fn close(&self) -> Result<()> {
        self.inner.channel.close().await?;
        Ok(())
    }

    /// Drive the session until the channel closes.
    ///
    /// Returns the final counters on a clean close, or the channel error
    /// that ended the session.
    pub async fn run(&self) -> Result<SessionReport> {
        if self.inner.config.role == Role::Client {
            self.announce().await?;
        }

        let dispatch = self.inner.config.dispatch;
        let mut tasks: JoinSet<std::result::Result<(), SyncError>> = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Some(e) = fatal(joined) {
                        break Err(e);
                    }
                }
                frame = self.inner.channel.recv_frame() => match frame {
                    Ok(Some(frame)) => {
                        Stats::bump(&self.inner.stats.frames_received, 1);
                        match dispatch {
                            DispatchMode::Sequential => {
                                if let Err(e) = self.inner.handle_frame(frame).await {
                                    break Err(e);
                                }
                            }
                            DispatchMode::Concurrent => {
                                let inner = Arc::clone(&self.inner);
                                tasks.spawn(async move { inner.handle_frame(frame).await });
                            }
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) if !e.is_fatal() => {
                        tracing::warn!(error = %e, "dropping unreadable frame");
                        Stats::bump(&self.inner.stats.frames_received, 1);
                        Stats::bump(&self.inner.stats.decode_errors, 1);
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        while let Some(joined) = tasks.join_next().await {
            if let Some(e) = fatal(joined) {
                tracing::debug!(error = %e, "handler failed after session end");
            }
        }

        let report = self.report();
        match outcome {
            Ok(()) => {
                tracing::info!(
                    frames = report.frames_received,
                    in_sync = report.in_sync,
                    applied = report.snapshots_applied,
                    "session closed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session ended");
                Err(e.into())
            }
        }
    }
}

fn fatal(
    joined: std::result::Result<std::result::Result<(), SyncError>, tokio::task::JoinError>,
) -> Option<SyncError> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(e) => {
            tracing::warn!(error = %e, "message handler panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hashsync_store::{MemoryStore, StoreError};
    use hashsync_sync::MemoryChannel;
    use std::time::Duration;

    fn session(
        records: Vec<Record>,
        channel: MemoryChannel,
        config: SessionConfig,
    ) -> Session<MemoryChannel> {
        Session::new(Arc::new(MemoryStore::with_records(records)), channel, config)
    }

    async fn next_event(rx: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event timeout")
            .unwrap()
    }

    /// Refuses any record whose content starts with "bad".
    struct PickyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl Store for PickyStore {
        async fn put(&self, record: &Record) -> hashsync_store::Result<()> {
            if record.content.starts_with("bad") {
                return Err(StoreError::InvalidData(record.id.clone()));
            }
            self.inner.put(record).await
        }

        async fn get(&self, id: &str) -> hashsync_store::Result<Record> {
            self.inner.get(id).await
        }

        async fn list_all(&self) -> hashsync_store::Result<Vec<Record>> {
            self.inner.list_all().await
        }
    }

    async fn next_applied(rx: &mut broadcast::Receiver<SyncEvent>) -> hashsync_sync::ApplyReport {
        loop {
            if let SyncEvent::SnapshotApplied { report, .. } = next_event(rx).await {
                return report;
            }
        }
    }

    #[tokio::test]
    async fn test_client_announces_on_connect() {
        let (a, b) = MemoryChannel::pair();
        let client = session(vec![], a, SessionConfig::client());

        let run = tokio::spawn({
            let client = client.clone();
            async move { client.run().await }
        });

        let frame = b.recv_frame().await.unwrap().unwrap();
        match SyncMessage::decode(&frame).unwrap() {
            SyncMessage::HashCheck(state) => assert_eq!(state.count, 0),
            other => panic!("unexpected message: {other:?}"),
        }

        b.close().await.unwrap();
        let report = run.await.unwrap().unwrap();
        assert_eq!(report.frames_received, 0);
    }

    #[tokio::test]
    async fn test_server_waits_for_peer() {
        let (a, b) = MemoryChannel::pair();
        let server = session(vec![], a, SessionConfig::server());
        let run = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });

        // Nothing arrives until we speak.
        assert!(
            tokio::time::timeout(Duration::from_millis(100), b.recv_frame())
                .await
                .is_err()
        );

        b.close().await.unwrap();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_frames_do_not_end_session() {
        let (a, b) = MemoryChannel::pair();
        let server = session(vec![], a, SessionConfig::server());
        let mut events = server.subscribe();
        let run = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });

        b.send_frame("garbage".into()).await.unwrap();
        b.send_frame(r#"{"type":"PING","payload":""}"#.into())
            .await
            .unwrap();
        b.send_frame(
            SyncMessage::HashCheck(hashsync_sync::SyncState::of(&[]))
                .encode()
                .unwrap(),
        )
        .await
        .unwrap();

        assert!(matches!(next_event(&mut events).await, SyncEvent::InSync { .. }));

        b.close().await.unwrap();
        let report = run.await.unwrap().unwrap();
        assert_eq!(report.frames_received, 3);
        assert_eq!(report.decode_errors, 1);
        assert_eq!(report.unknown_types, 1);
        assert_eq!(report.in_sync, 1);
    }

    #[tokio::test]
    async fn test_register_propagates_to_peer() {
        let (a, b) = MemoryChannel::pair();
        let client = session(vec![], a, SessionConfig::client());
        let server = session(vec![], b, SessionConfig::server());
        let mut server_events = server.subscribe();
        let mut client_events = client.subscribe();

        let client_run = tokio::spawn({
            let client = client.clone();
            async move { client.run().await }
        });
        let server_run = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });

        // Both empty: the connect announcement is already in sync.
        assert!(matches!(
            next_event(&mut server_events).await,
            SyncEvent::InSync { .. }
        ));

        let record = Record::new("1", "hello", 1000);
        client.register(record.clone()).await.unwrap();

        loop {
            if let SyncEvent::SnapshotApplied { report, .. } = next_event(&mut server_events).await {
                assert_eq!(report.applied, 1);
                break;
            }
        }
        assert_eq!(server.store().get("1").await.unwrap(), record);

        // The server's confirmation reaches the client last.
        loop {
            if let SyncEvent::InSync { .. } = next_event(&mut client_events).await {
                break;
            }
        }

        client.close().await.unwrap();
        server.close().await.unwrap();
        client_run.await.unwrap().unwrap();
        let report = server_run.await.unwrap().unwrap();
        assert_eq!(report.snapshots_applied, 1);
        assert_eq!(report.mismatches, 1);
    }

    #[tokio::test]
    async fn test_rejected_record_keeps_session_usable() {
        let (a, b) = MemoryChannel::pair();
        let client = session(
            vec![Record::new("x", "fine", 1), Record::new("y", "bad write", 2)],
            a,
            SessionConfig::client(),
        );
        let server = Session::new(
            Arc::new(PickyStore {
                inner: MemoryStore::new(),
            }),
            b,
            SessionConfig::server(),
        );
        let mut server_events = server.subscribe();

        let client_run = tokio::spawn({
            let client = client.clone();
            async move { client.run().await }
        });
        let server_run = tokio::spawn({
            let server = server.clone();
            async move { server.run().await }
        });

        let first = next_applied(&mut server_events).await;
        assert_eq!((first.applied, first.failed), (1, 1));

        // The next announcement starts a fresh round on the same connection.
        client.register(Record::new("z", "also fine", 3)).await.unwrap();
        let second = next_applied(&mut server_events).await;
        assert_eq!((second.applied, second.failed), (2, 1));
        assert_eq!(server.store().get("z").await.unwrap().content, "also fine");
        assert!(server.store().get("y").await.unwrap_err().is_not_found());

        // No confirmation follows a partial apply, so the rounds stay ended.
        assert!(
            tokio::time::timeout(Duration::from_millis(100), server_events.recv())
                .await
                .is_err()
        );

        client.close().await.unwrap();
        server.close().await.unwrap();
        let client_report = client_run.await.unwrap().unwrap();
        let server_report = server_run.await.unwrap().unwrap();
        assert_eq!(client_report.snapshots_served, 2);
        assert_eq!(client_report.in_sync, 0);
        assert_eq!(server_report.mismatches, 2);
        assert_eq!(server_report.snapshots_applied, 2);
        assert_eq!(server_report.records_applied, 3);
        assert_eq!(server_report.records_failed, 2);
        assert_eq!(server_report.store_errors, 0);
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_converge() {
        for dispatch in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let (a, b) = MemoryChannel::pair();
            let client = session(
                vec![Record::new("a", "client", 1)],
                a,
                SessionConfig::client().with_dispatch(dispatch),
            );
            let server = session(
                vec![Record::new("b", "server", 2)],
                b,
                SessionConfig::server().with_dispatch(dispatch),
            );
            let mut server_events = server.subscribe();

            let client_run = tokio::spawn({
                let client = client.clone();
                async move { client.run().await }
            });
            let server_run = tokio::spawn({
                let server = server.clone();
                async move { server.run().await }
            });

            // The round ends when the server confirms the client's final state.
            loop {
                if let SyncEvent::InSync { .. } = next_event(&mut server_events).await {
                    break;
                }
            }

            assert_eq!(
                client.store().state_digest().await.unwrap(),
                server.store().state_digest().await.unwrap()
            );
            assert_eq!(server.store().count().await.unwrap(), 2);

            client.close().await.unwrap();
            server.close().await.unwrap();
            client_run.await.unwrap().unwrap();
            server_run.await.unwrap().unwrap();
        }
    }
}
