//! Master-side reader
//!
//! Relays the master's replication stream to the replica, filtering as it
//! goes. The stream has three phases: handshake replies, a one-shot bulk
//! snapshot transfer, and the steady command stream. The snapshot is handed
//! to the streaming filter; commands are admitted or dropped whole by their
//! key argument.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::{ProxyError, Result};
use crate::filter::KeyFilter;
use crate::protocol::{FrameKind, FrameReader};
use crate::snapshot::filter_snapshot;

/// Where the master's stream currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Status replies to the replica's handshake
    Handshake,
    /// Bulk snapshot transfer in progress
    Snapshot,
    /// Command replication after the snapshot
    Commands,
}

/// Decode, filter, and forward the master's stream until it disconnects.
pub(crate) async fn read_loop<R: AsyncRead + Unpin>(
    socket: R,
    slave_queue: mpsc::Sender<Bytes>,
    filter: Arc<KeyFilter>,
) -> Result<()> {
    let mut frames = FrameReader::new(BufReader::new(socket));
    let mut phase = Phase::Handshake;

    loop {
        let frame = match frames.read_frame().await {
            Ok(frame) => frame,
            Err(ProxyError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        match &frame.kind {
            // Handshake replies (+PONG, +FULLRESYNC …), keepalive newlines,
            // and legacy inline keyless commands all pass through.
            FrameKind::Inline => send(&slave_queue, frame.raw).await?,
            FrameKind::Reply(text) => {
                if phase == Phase::Handshake {
                    debug!(reply = %text, "handshake reply from master");
                }
                send(&slave_queue, frame.raw).await?;
            }

            // The snapshot transfer: forward the header, then filter the
            // payload it announces.
            FrameKind::BulkHeader(0) => send(&slave_queue, frame.raw).await?,
            FrameKind::BulkHeader(len) => {
                let len = *len;
                phase = Phase::Snapshot;
                info!(bytes = len, phase = ?phase, "snapshot transfer started");
                send(&slave_queue, frame.raw).await?;
                filter_snapshot(frames.get_mut(), &slave_queue, &filter, len).await?;
                info!("snapshot relayed; filtering command stream");
                phase = Phase::Commands;
            }

            // Replicated commands: the key argument decides. Keyless
            // commands (PING, SELECT, FLUSHDB, MULTI) carry no key to test
            // and pass through.
            FrameKind::Array(argv) => {
                if let Some(key) = argv.get(1) {
                    if !filter.matches(key.as_bytes()) {
                        trace!(key = %key, "replicated command dropped");
                        continue;
                    }
                }
                send(&slave_queue, frame.raw).await?;
            }
        }
    }
}

async fn send(queue: &mpsc::Sender<Bytes>, bytes: Bytes) -> Result<()> {
    queue.send(bytes).await.map_err(|_| ProxyError::QueueClosed)
}
