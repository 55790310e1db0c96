//! Transport abstraction for the reconciliation protocol.
//!
//! A [`Channel`] is an opaque duplex pipe of UTF-8 text frames to exactly one
//! peer. Decoding frames into messages is the protocol's job, not the
//! channel's, so malformed input can be logged and dropped without tearing
//! down the connection.

use async_trait::async_trait;

use crate::error::Result;

/// Duplex text-frame channel to a single peer.
///
/// Implementations must be thread-safe (Send + Sync): a session may send
/// from several concurrently running handlers.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send one frame.
    async fn send_frame(&self, frame: String) -> Result<()>;

    /// Receive the next frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the channel. A frame that
    /// is not valid text yields a non-fatal error and the channel stays open.
    async fn recv_frame(&self) -> Result<Option<String>>;

    /// Close our sending half. The peer observes end-of-stream.
    async fn close(&self) -> Result<()>;
}

/// In-process channel for tests and embedding.
pub mod memory {
    use super::*;
    use crate::error::SyncError;
    use tokio::sync::{mpsc, Mutex};

    /// Frames buffered per direction before `send_frame` waits.
    const BUFFER: usize = 1000;

    /// One end of an in-memory duplex channel.
    pub struct MemoryChannel {
        tx: Mutex<Option<mpsc::Sender<String>>>,
        rx: Mutex<mpsc::Receiver<String>>,
    }

    impl MemoryChannel {
        /// Create two connected ends.
        pub fn pair() -> (MemoryChannel, MemoryChannel) {
            let (a_tx, b_rx) = mpsc::channel(BUFFER);
            let (b_tx, a_rx) = mpsc::channel(BUFFER);

            let a = MemoryChannel {
                tx: Mutex::new(Some(a_tx)),
                rx: Mutex::new(a_rx),
            };
            let b = MemoryChannel {
                tx: Mutex::new(Some(b_tx)),
                rx: Mutex::new(b_rx),
            };
            (a, b)
        }
    }

    #[async_trait]
    impl Channel for MemoryChannel {
        async fn send_frame(&self, frame: String) -> Result<()> {
            let tx = self.tx.lock().await;
            let Some(tx) = tx.as_ref() else {
                return Err(SyncError::Closed);
            };
            tx.send(frame)
                .await
                .map_err(|_| SyncError::Transport("peer disconnected".into()))
        }

        async fn recv_frame(&self) -> Result<Option<String>> {
            let mut rx = self.rx.lock().await;
            Ok(rx.recv().await)
        }

        async fn close(&self) -> Result<()> {
            self.tx.lock().await.take();
            Ok(())
        }
    }
}

/// Newline-delimited text frames over TCP.
pub mod tcp {
    use super::*;
    use crate::error::SyncError;
    use std::net::SocketAddr;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::{TcpStream, ToSocketAddrs};
    use tokio::sync::Mutex;

    /// A TCP connection carrying one JSON envelope per line.
    pub struct TcpChannel {
        peer: SocketAddr,
        reader: Mutex<FrameReader>,
        writer: Mutex<OwnedWriteHalf>,
    }

    /// Buffered read half. `pending` holds a partial line across cancelled
    /// reads.
    struct FrameReader {
        inner: BufReader<OwnedReadHalf>,
        pending: Vec<u8>,
    }

    impl TcpChannel {
        /// Connect to a listening peer.
        pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
            let stream = TcpStream::connect(addr)
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            Self::from_stream(stream)
        }

        /// Wrap an accepted or connected stream.
        pub fn from_stream(stream: TcpStream) -> Result<Self> {
            let peer = stream
                .peer_addr()
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            stream
                .set_nodelay(true)
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            let (read, write) = stream.into_split();

            Ok(Self {
                peer,
                reader: Mutex::new(FrameReader {
                    inner: BufReader::new(read),
                    pending: Vec::new(),
                }),
                writer: Mutex::new(write),
            })
        }

        /// Address of the remote end.
        pub fn peer_addr(&self) -> SocketAddr {
            self.peer
        }
    }

    #[async_trait]
    impl Channel for TcpChannel {
        async fn send_frame(&self, frame: String) -> Result<()> {
            if frame.contains('\n') {
                return Err(SyncError::Transport(
                    "frame contains a raw newline".into(),
                ));
            }

            let mut writer = self.writer.lock().await;
            let mut line = frame.into_bytes();
            line.push(b'\n');
            writer
                .write_all(&line)
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            writer
                .flush()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))
        }

        async fn recv_frame(&self) -> Result<Option<String>> {
            let mut reader = self.reader.lock().await;
            let FrameReader { inner, pending } = &mut *reader;

            loop {
                let read = inner
                    .read_until(b'\n', pending)
                    .await
                    .map_err(|e| SyncError::Transport(e.to_string()))?;
                if read == 0 && pending.is_empty() {
                    return Ok(None);
                }

                let mut line = std::mem::take(pending);
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }

                // Bad bytes spoil one frame, not the connection.
                return String::from_utf8(line).map(Some).map_err(SyncError::from);
            }
        }

        async fn close(&self) -> Result<()> {
            let mut writer = self.writer.lock().await;
            writer
                .shutdown()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))
        }
    }
}
