//! Streaming RESP frame decoder
//!
//! Reads one frame at a time off a buffered stream, accumulating the exact
//! wire bytes alongside the classified view. The decoder deliberately stops
//! at `$N` headers: the payload that follows a bulk header is the snapshot
//! transfer, and the caller decides whether to stream, filter, or skip it.

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ProxyError, Result};

use super::{Frame, FrameKind};

/// Maximum bulk argument size accepted from a peer (512MB, matches Redis
/// proto-max-bulk-len)
const MAX_ARG_LEN: u64 = 512 * 1024 * 1024;

/// Maximum argument count accepted in one array frame
const MAX_ARGS: u64 = 1_048_576;

/// Decodes RESP frames from a buffered reader.
pub struct FrameReader<R> {
    inner: R,

    // Reusable line scratch; arguments get exact-sized buffers of their own.
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::with_capacity(128),
        }
    }

    /// Access the underlying reader, positioned after the last frame.
    ///
    /// Used by the snapshot filter to consume the bulk payload announced by
    /// a [`FrameKind::BulkHeader`].
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Read one frame.
    ///
    /// Returns [`ProxyError::ConnectionClosed`] on a clean end-of-stream at a
    /// frame boundary; an end-of-stream anywhere else is an I/O error.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        self.read_line().await?;

        let mut raw = BytesMut::with_capacity(self.line.len());
        raw.extend_from_slice(&self.line);

        match self.line.first().copied() {
            None => Err(ProxyError::ConnectionClosed),
            _ if matches!(self.line.as_slice(), b"\n" | b"\r\n") => {
                Ok(Frame::new(raw.freeze(), FrameKind::Inline))
            }
            Some(b'+') => {
                let text = trimmed(&self.line[1..]).to_string();
                Ok(Frame::new(raw.freeze(), FrameKind::Reply(text)))
            }
            Some(b'$') => {
                let size = parse_length(&self.line[1..], "bulk size")?;
                Ok(Frame::new(raw.freeze(), FrameKind::BulkHeader(size)))
            }
            Some(b'*') => {
                let count = parse_length(&self.line[1..], "command length")?;
                if count > MAX_ARGS {
                    return Err(ProxyError::Protocol(format!(
                        "command length {} exceeds limit {}",
                        count, MAX_ARGS
                    )));
                }
                let argv = self.read_arguments(count, &mut raw).await?;
                Ok(Frame::new(raw.freeze(), FrameKind::Array(argv)))
            }
            // Legacy inline command: a single bare line
            Some(_) => Ok(Frame::new(raw.freeze(), FrameKind::Inline)),
        }
    }

    /// Read `count` `$M`-prefixed argument groups, appending every byte to `raw`.
    async fn read_arguments(&mut self, count: u64, raw: &mut BytesMut) -> Result<Vec<String>> {
        let mut argv = Vec::with_capacity(count as usize);

        for _ in 0..count {
            self.read_line().await?;
            raw.extend_from_slice(&self.line);

            if self.line.first() != Some(&b'$') {
                return Err(ProxyError::Protocol(format!(
                    "expected argument header, got {:?}",
                    String::from_utf8_lossy(&self.line)
                )));
            }
            let arg_len = parse_length(&self.line[1..], "argument length")?;
            if arg_len > MAX_ARG_LEN {
                return Err(ProxyError::Protocol(format!(
                    "argument length {} exceeds limit {}",
                    arg_len, MAX_ARG_LEN
                )));
            }

            let mut payload = vec![0u8; arg_len as usize];
            self.inner.read_exact(&mut payload).await?;
            raw.extend_from_slice(&payload);

            // Argument payloads are terminated by their own CRLF
            self.read_line().await?;
            if !matches!(self.line.as_slice(), b"\r\n" | b"\n") {
                return Err(ProxyError::Protocol(
                    "argument payload not terminated by CRLF".to_string(),
                ));
            }
            raw.extend_from_slice(&self.line);

            argv.push(String::from_utf8_lossy(&payload).into_owned());
        }

        Ok(argv)
    }

    /// Read one `\n`-terminated line into the scratch buffer.
    ///
    /// An empty scratch after return means the stream ended cleanly at a
    /// frame boundary.
    async fn read_line(&mut self) -> Result<()> {
        self.line.clear();
        let n = self.inner.read_until(b'\n', &mut self.line).await?;
        if n > 0 && self.line.last() != Some(&b'\n') {
            // EOF in the middle of a line
            return Err(ProxyError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended mid-line",
            )));
        }
        Ok(())
    }
}

fn trimmed(line: &[u8]) -> &str {
    std::str::from_utf8(line)
        .unwrap_or_default()
        .trim_end_matches(['\r', '\n'])
}

fn parse_length(line: &[u8], what: &str) -> Result<u64> {
    trimmed(line)
        .parse::<u64>()
        .map_err(|_| {
            ProxyError::Protocol(format!(
                "unable to decode {}: {:?}",
                what,
                String::from_utf8_lossy(line)
            ))
        })
}
