//! Record-by-record snapshot filtering
//!
//! Walks the opcode-dispatched record stream inside the announced bulk
//! payload. Records that are not entries (aux fields, database selectors,
//! resize hints, the terminator and CRC) stream straight through to the
//! output queue as they are read. Entries are staged (expiry prefix, type
//! byte, key, value) and the staging buffer is flushed or discarded as one
//! unit depending on the key predicate.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{ProxyError, Result};
use crate::filter::KeyFilter;

use super::codec::{copy_double, copy_string, read_count, read_string};
use super::reader::CountedReader;
use super::{
    SnapshotError, OPCODE_AUX, OPCODE_EOF, OPCODE_EXPIRETIME, OPCODE_EXPIRETIME_MS,
    OPCODE_RESIZEDB, OPCODE_SELECTDB, SNAPSHOT_MAGIC, TYPE_HASH, TYPE_HASH_ZIPLIST,
    TYPE_HASH_ZIPMAP, TYPE_LIST, TYPE_LIST_QUICKLIST, TYPE_LIST_ZIPLIST, TYPE_MAX, TYPE_SET,
    TYPE_SET_INTSET, TYPE_STRING, TYPE_ZSET, TYPE_ZSET_ZIPLIST,
};

/// Filter the snapshot payload announced by a bulk header.
///
/// Consumes exactly `announced_len` payload bytes plus the 8-byte CRC
/// trailer from `reader`, leaving it positioned at the next RESP frame, and
/// sends a valid snapshot containing only admitted entries to `out`.
pub async fn filter_snapshot<R: AsyncRead + Unpin>(
    reader: &mut R,
    out: &mpsc::Sender<Bytes>,
    keep: &KeyFilter,
    announced_len: u64,
) -> Result<()> {
    SnapshotFilter {
        reader: CountedReader::new(reader, announced_len),
        out,
        keep,
        kept: 0,
        dropped: 0,
    }
    .run()
    .await
}

struct SnapshotFilter<'a, R> {
    reader: CountedReader<'a, R>,
    out: &'a mpsc::Sender<Bytes>,
    keep: &'a KeyFilter,
    kept: u64,
    dropped: u64,
}

impl<R: AsyncRead + Unpin> SnapshotFilter<'_, R> {
    async fn run(mut self) -> Result<()> {
        self.header().await?;

        // Raw bytes of an expiry record awaiting its entry
        let mut pending_expiry: Option<BytesMut> = None;

        loop {
            let opcode = self.reader.read_u8().await?;

            if pending_expiry.is_some() && opcode > TYPE_MAX {
                // An expiry decorates exactly the next entry; anything else
                // here means the stream is not a snapshot we understand.
                return Err(SnapshotError::DanglingExpiry.into());
            }

            match opcode {
                OPCODE_AUX => {
                    let mut record = record_buf(opcode);
                    copy_string(&mut self.reader, &mut record).await?;
                    copy_string(&mut self.reader, &mut record).await?;
                    self.emit(record).await?;
                }
                OPCODE_RESIZEDB => {
                    let mut record = record_buf(opcode);
                    read_count(&mut self.reader, &mut record).await?;
                    read_count(&mut self.reader, &mut record).await?;
                    self.emit(record).await?;
                }
                OPCODE_SELECTDB => {
                    let mut record = record_buf(opcode);
                    let db = read_count(&mut self.reader, &mut record).await?;
                    trace!(db, "snapshot database selector");
                    self.emit(record).await?;
                }
                OPCODE_EXPIRETIME_MS => {
                    let mut record = record_buf(opcode);
                    let mut stamp = [0u8; 8];
                    self.reader.read_exact(&mut stamp).await?;
                    record.put_slice(&stamp);
                    pending_expiry = Some(record);
                }
                OPCODE_EXPIRETIME => {
                    let mut record = record_buf(opcode);
                    let mut stamp = [0u8; 4];
                    self.reader.read_exact(&mut stamp).await?;
                    record.put_slice(&stamp);
                    pending_expiry = Some(record);
                }
                OPCODE_EOF => {
                    self.emit(record_buf(opcode)).await?;
                    let crc = self.reader.read_trailer().await?;
                    self.emit_bytes(Bytes::copy_from_slice(&crc)).await?;
                    debug!(
                        kept = self.kept,
                        dropped = self.dropped,
                        "snapshot filtering finished"
                    );
                    return Ok(());
                }
                value_type if value_type <= TYPE_MAX => {
                    // Entry: stage expiry prefix (if any) + type + key + value,
                    // then emit or discard the whole staged record at once.
                    let mut staged = pending_expiry.take().unwrap_or_default();
                    staged.put_u8(value_type);

                    let key = read_string(&mut self.reader, &mut staged).await?;
                    self.value(value_type, &mut staged).await?;

                    if self.keep.matches(&key) {
                        self.kept += 1;
                        self.emit(staged).await?;
                    } else {
                        self.dropped += 1;
                        trace!(key = %String::from_utf8_lossy(&key), "entry dropped");
                    }
                }
                other => return Err(SnapshotError::UnknownOpcode(other).into()),
            }
        }
    }

    /// Validate and forward the magic + 4-byte ASCII version.
    async fn header(&mut self) -> Result<()> {
        let mut header = [0u8; 9];
        self.reader.read_exact(&mut header).await?;
        if &header[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic.into());
        }
        debug!(
            version = %String::from_utf8_lossy(&header[5..]),
            "snapshot header"
        );
        self.emit_bytes(Bytes::copy_from_slice(&header)).await
    }

    /// Consume one typed value, capturing its wire bytes into `raw`.
    async fn value(&mut self, value_type: u8, raw: &mut BytesMut) -> Result<()> {
        match value_type {
            TYPE_STRING => copy_string(&mut self.reader, raw).await,
            TYPE_LIST | TYPE_SET => {
                let len = read_count(&mut self.reader, raw).await?;
                for _ in 0..len {
                    copy_string(&mut self.reader, raw).await?;
                }
                Ok(())
            }
            TYPE_ZSET => {
                let len = read_count(&mut self.reader, raw).await?;
                for _ in 0..len {
                    copy_string(&mut self.reader, raw).await?;
                    copy_double(&mut self.reader, raw).await?;
                }
                Ok(())
            }
            TYPE_HASH => {
                let len = read_count(&mut self.reader, raw).await?;
                for _ in 0..len {
                    copy_string(&mut self.reader, raw).await?;
                    copy_string(&mut self.reader, raw).await?;
                }
                Ok(())
            }
            // Packed encodings ride inside a single opaque string
            TYPE_HASH_ZIPMAP
            | TYPE_LIST_ZIPLIST
            | TYPE_SET_INTSET
            | TYPE_ZSET_ZIPLIST
            | TYPE_HASH_ZIPLIST => copy_string(&mut self.reader, raw).await,
            TYPE_LIST_QUICKLIST => {
                let len = read_count(&mut self.reader, raw).await?;
                for _ in 0..len {
                    copy_string(&mut self.reader, raw).await?;
                }
                Ok(())
            }
            other => Err(SnapshotError::UnknownValueType(other).into()),
        }
    }

    async fn emit(&mut self, record: BytesMut) -> Result<()> {
        self.emit_bytes(record.freeze()).await
    }

    async fn emit_bytes(&mut self, bytes: Bytes) -> Result<()> {
        self.out
            .send(bytes)
            .await
            .map_err(|_| ProxyError::QueueClosed)
    }
}

fn record_buf(opcode: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_u8(opcode);
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
