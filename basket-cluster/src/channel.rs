//! Point-to-point request/reply channel between mesh participants.
//!
//! The wire format is a 4-byte big-endian length prefix followed by a JSON
//! body. Each peer channel is strictly single-in-flight: callers serialize
//! on the channel's mutex, because interleaved frames would corrupt the
//! request/reply pairing on the shared socket.
//!
//! Failure handling is Lazy Pirate: a timed-out or broken exchange tears
//! the socket down and reconnects before the next attempt, up to three
//! attempts total.

use crate::error::{ClusterError, ClusterResult};
use crate::protocol::{NodeMessage, NodeReply};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Maximum frame size (16 MB).
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Total attempts per request (Lazy Pirate).
const MAX_ATTEMPTS: u32 = 3;

/// Deadline for each retry attempt after the first.
const RETRY_TIMEOUT: Duration = Duration::from_millis(500);

/// Reads a length-prefixed JSON frame.
pub async fn read_frame<T, R>(io: &mut R) -> io::Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    io.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes"),
        ));
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;

    serde_json::from_slice(&buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON decode error: {e}")))
}

/// Writes a length-prefixed JSON frame.
pub async fn write_frame<T, W>(io: &mut W, message: &T) -> io::Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let data = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("JSON encode error: {e}")))?;

    if data.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", data.len()),
        ));
    }

    io.write_all(&(data.len() as u32).to_be_bytes()).await?;
    io.write_all(&data).await?;
    io.flush().await?;
    Ok(())
}

/// A single-in-flight request/reply channel to one peer.
pub struct PeerChannel {
    addr: String,
    stream: Mutex<Option<TcpStream>>,
}

impl PeerChannel {
    /// Creates a channel to `addr`. No connection is made until the first
    /// request.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: Mutex::new(None),
        }
    }

    /// The peer address this channel talks to.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends one request and waits for its reply.
    ///
    /// The first attempt runs under `deadline`; each further attempt closes
    /// and reopens the socket first and runs under the shorter retry
    /// deadline. After the final attempt the caller gets
    /// [`ClusterError::Timeout`].
    pub async fn request(
        &self,
        message: &NodeMessage,
        deadline: Duration,
    ) -> ClusterResult<NodeReply> {
        let mut guard = self.stream.lock().await;

        for attempt in 1..=MAX_ATTEMPTS {
            let attempt_deadline = if attempt == 1 { deadline } else { RETRY_TIMEOUT };

            match timeout(attempt_deadline, self.exchange(&mut guard, message)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => {
                    debug!(peer = %self.addr, attempt, error = %e, "exchange failed, reopening socket");
                }
                Err(_) => {
                    debug!(peer = %self.addr, attempt, "exchange timed out, reopening socket");
                }
            }

            // Lazy Pirate: the socket state is suspect, drop it before retrying
            *guard = None;
        }

        warn!(peer = %self.addr, attempts = MAX_ATTEMPTS, "peer unreachable");
        Err(ClusterError::Timeout)
    }

    /// One connect-if-needed + write + read cycle on the held socket.
    async fn exchange(
        &self,
        slot: &mut Option<TcpStream>,
        message: &NodeMessage,
    ) -> io::Result<NodeReply> {
        let stream = match slot {
            Some(stream) => stream,
            None => slot.insert(TcpStream::connect(&self.addr).await?),
        };
        write_frame(stream, message).await?;
        read_frame(stream).await
    }
}

impl std::fmt::Debug for PeerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerChannel").field("addr", &self.addr).finish()
    }
}
