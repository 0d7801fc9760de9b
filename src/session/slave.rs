//! Replica-side reader
//!
//! The proxy is a replication relay, not a server: only the handful of
//! frames a replica legitimately sends during replication are forwarded to
//! the master. Anything else gets an error reply on the spot rather than
//! leaking upstream.

use bytes::Bytes;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{ProxyError, Result};
use crate::protocol::{FrameKind, FrameReader};

use super::ERR_UNKNOWN_COMMAND;

/// Decode and classify frames from the replica until it disconnects.
pub(crate) async fn read_loop<R: AsyncRead + Unpin>(
    socket: R,
    master_queue: mpsc::Sender<Bytes>,
    slave_queue: mpsc::Sender<Bytes>,
) -> Result<()> {
    let mut frames = FrameReader::new(BufReader::new(socket));

    loop {
        let frame = match frames.read_frame().await {
            Ok(frame) => frame,
            Err(ProxyError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        let admitted = if frame.is_empty_inline() || matches!(frame.kind, FrameKind::Reply(_)) {
            // Keepalives and handshake acknowledgements pass through
            true
        } else if let Some(verb) = frame.verb() {
            match verb.as_str() {
                "PING" if frame.arity() == 1 => {
                    debug!("ping from replica");
                    true
                }
                "SYNC" if frame.arity() == 1 => {
                    info!("replica requested sync");
                    true
                }
                // All REPLCONF variants go upstream: listening-port and capa
                // during the handshake, ACK <offset> afterwards.
                "REPLCONF" => true,
                _ => false,
            }
        } else {
            false
        };

        if admitted {
            send(&master_queue, frame.raw).await?;
        } else {
            debug!(frame = ?frame.kind, "non-replication frame from replica");
            send(&slave_queue, Bytes::from_static(ERR_UNKNOWN_COMMAND)).await?;
        }
    }
}

async fn send(queue: &mpsc::Sender<Bytes>, bytes: Bytes) -> Result<()> {
    queue.send(bytes).await.map_err(|_| ProxyError::QueueClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};
    use tokio::sync::mpsc::Receiver;

    async fn run_on(input: &[u8]) -> (Result<()>, Receiver<Bytes>, Receiver<Bytes>) {
        let (mut wire, socket) = duplex(4096);
        wire.write_all(input).await.unwrap();
        drop(wire);

        let (master_tx, master_rx) = mpsc::channel(super::super::QUEUE_CAPACITY);
        let (slave_tx, slave_rx) = mpsc::channel(super::super::QUEUE_CAPACITY);
        let result = read_loop(socket, master_tx, slave_tx).await;
        (result, master_rx, slave_rx)
    }

    fn collect(rx: &mut Receiver<Bytes>) -> Vec<u8> {
        let mut all = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            all.extend_from_slice(&chunk);
        }
        all
    }

    #[tokio::test]
    async fn test_ping_forwarded_verbatim() {
        let (result, mut master_rx, mut slave_rx) = run_on(b"*1\r\n$4\r\nPING\r\n").await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut master_rx), b"*1\r\n$4\r\nPING\r\n");
        assert!(collect(&mut slave_rx).is_empty());
    }

    #[tokio::test]
    async fn test_sync_forwarded_verbatim() {
        let (result, mut master_rx, _) = run_on(b"*1\r\n$4\r\nSYNC\r\n").await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut master_rx), b"*1\r\n$4\r\nSYNC\r\n");
    }

    #[tokio::test]
    async fn test_replconf_ack_forwarded() {
        let input = b"*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$2\r\n42\r\n";
        let (result, mut master_rx, mut slave_rx) = run_on(input).await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut master_rx), &input[..]);
        assert!(collect(&mut slave_rx).is_empty());
    }

    #[tokio::test]
    async fn test_replconf_listening_port_forwarded() {
        let input = b"*3\r\n$8\r\nREPLCONF\r\n$14\r\nlistening-port\r\n$4\r\n6381\r\n";
        let (result, mut master_rx, _) = run_on(input).await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut master_rx), &input[..]);
    }

    #[tokio::test]
    async fn test_empty_inline_and_reply_pass_through() {
        let (result, mut master_rx, _) = run_on(b"\r\n+OK\r\n").await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut master_rx), b"\r\n+OK\r\n");
    }

    #[tokio::test]
    async fn test_misuse_gets_error_reply_and_nothing_upstream() {
        let (result, mut master_rx, mut slave_rx) =
            run_on(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
        assert!(result.is_ok());
        assert!(collect(&mut master_rx).is_empty());
        assert_eq!(collect(&mut slave_rx), ERR_UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn test_misuse_does_not_end_session() {
        let input = b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*1\r\n$4\r\nPING\r\n";
        let (result, mut master_rx, mut slave_rx) = run_on(input).await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut master_rx), b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(collect(&mut slave_rx), ERR_UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn test_legacy_inline_command_is_misuse() {
        let (result, mut master_rx, mut slave_rx) = run_on(b"GET k\r\n").await;
        assert!(result.is_ok());
        assert!(collect(&mut master_rx).is_empty());
        assert_eq!(collect(&mut slave_rx), ERR_UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn test_ping_with_argument_is_misuse() {
        let (result, _, mut slave_rx) = run_on(b"*2\r\n$4\r\nPING\r\n$2\r\nhi\r\n").await;
        assert!(result.is_ok());
        assert_eq!(collect(&mut slave_rx), ERR_UNKNOWN_COMMAND);
    }
}
