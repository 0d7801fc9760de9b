//! Counted reads over the snapshot transfer
//!
//! The bulk header preceding a snapshot announces its payload length. Every
//! read inside the filter goes through this wrapper, which debits the
//! remaining budget before touching the wire; a record that would read past
//! the payload is rejected before it can desynchronize the surrounding RESP
//! stream. The CRC trailer is a distinct read, permitted only once the
//! payload budget is fully consumed.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

use super::{SnapshotError, TRAILER_LEN};

/// Budgeted reader over the announced snapshot payload.
pub struct CountedReader<'a, R> {
    inner: &'a mut R,
    remaining: u64,
}

impl<'a, R: AsyncRead + Unpin> CountedReader<'a, R> {
    /// Wrap `inner` with a payload budget of `len` bytes.
    pub fn new(inner: &'a mut R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }

    /// Payload bytes not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn debit(&mut self, n: u64) -> Result<()> {
        if n > self.remaining {
            return Err(SnapshotError::Overrun.into());
        }
        self.remaining -= n;
        Ok(())
    }

    /// Read a single payload byte.
    pub async fn read_u8(&mut self) -> Result<u8> {
        self.debit(1)?;
        Ok(self.inner.read_u8().await?)
    }

    /// Fill `buf` from the payload.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.debit(buf.len() as u64)?;
        self.inner.read_exact(buf).await?;
        Ok(())
    }

    /// Read the 8-byte CRC trailer that follows the payload.
    ///
    /// Only legal once the payload budget is exhausted; the caller must have
    /// seen the EOF opcode first.
    pub async fn read_trailer(&mut self) -> Result<[u8; TRAILER_LEN]> {
        if self.remaining != 0 {
            return Err(SnapshotError::TrailingBytes(self.remaining).into());
        }
        let mut crc = [0u8; TRAILER_LEN];
        self.inner.read_exact(&mut crc).await?;
        Ok(crc)
    }
}
