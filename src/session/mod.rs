//! Per-replica replication session
//!
//! Each accepted replica connection gets one session: four tasks joined by
//! two bounded byte queues.
//!
//! ```text
//! slave  ── slave_reader ──► master queue ──► master_writer ──► master
//!                                                                  │
//! slave ◄── slave_writer ◄── slave queue  ◄── master_reader ◄──────┘
//! ```
//!
//! There is no cancel signal. A session unwinds cooperatively: a reader that
//! returns drops its queue senders, the writer drains what is queued and
//! exits, dropping a write half closes that TCP direction, and the opposite
//! reader then observes end-of-stream. Queues are bounded, so a slow replica
//! back-pressures the snapshot filter and, through it, the master's TCP
//! window.

mod master;
mod slave;

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::filter::KeyFilter;

/// Queue capacity, in chunks, for each direction
pub(crate) const QUEUE_CAPACITY: usize = 100;

/// Reply sent to a replica that issues a non-replication command
pub(crate) const ERR_UNKNOWN_COMMAND: &[u8] = b"-ERR unknown command\r\n";

/// One replica's replication pipeline.
pub struct Session {
    filter: Arc<KeyFilter>,
}

impl Session {
    pub fn new(filter: Arc<KeyFilter>) -> Self {
        Self { filter }
    }

    /// Run the pipeline over an accepted replica socket and a connected
    /// master socket until either peer goes away.
    pub async fn run(self, slave: TcpStream, master: TcpStream) {
        let (slave_rd, slave_wr) = slave.into_split();
        let (master_rd, master_wr) = master.into_split();

        let (master_tx, master_rx) = mpsc::channel::<Bytes>(QUEUE_CAPACITY);
        let (slave_tx, slave_rx) = mpsc::channel::<Bytes>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            log_task_end("master_writer", write_loop(master_wr, master_rx).await);
        });
        tokio::spawn(async move {
            log_task_end("slave_writer", write_loop(slave_wr, slave_rx).await);
        });

        let filter = self.filter.clone();
        let slave_tx_for_master = slave_tx.clone();
        tokio::spawn(async move {
            log_task_end(
                "master_reader",
                master::read_loop(master_rd, slave_tx_for_master, filter).await,
            );
        });

        // The slave reader runs inline; when it returns, the senders it owns
        // drop and the rest of the session unwinds.
        log_task_end(
            "slave_reader",
            slave::read_loop(slave_rd, master_tx, slave_tx).await,
        );
    }
}

/// Drain one queue FIFO into the owning socket.
///
/// A write error ends the task; the paired reader subsequently sees
/// end-of-stream on its socket and the session tears down.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut socket: W,
    mut queue: mpsc::Receiver<Bytes>,
) -> Result<()> {
    while let Some(chunk) = queue.recv().await {
        socket.write_all(&chunk).await?;
    }
    Ok(())
}

fn log_task_end(task: &str, result: Result<()>) {
    match result {
        Ok(()) => debug!(task, "session task finished"),
        Err(e) if e.is_disconnect() => debug!(task, error = %e, "session task disconnected"),
        Err(e) => warn!(task, error = %e, "session task failed"),
    }
}
