//! Length and string token decoding
//!
//! Every decoder here does two jobs at once: it consumes a token through the
//! counted reader, and it appends the exact bytes it consumed to a capture
//! buffer so the record can be re-emitted untouched. Decoding to a value is
//! separate and on demand: the predicate only ever needs the key, so value
//! strings are copied without conversion and LZF blobs are decompressed only
//! when a decode is requested.

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncRead;

use crate::error::Result;

use super::reader::CountedReader;
use super::{
    lzf, SnapshotError, ENC_INT16, ENC_INT32, ENC_INT8, ENC_LZF, LEN_14BIT, LEN_32BIT, LEN_64BIT,
    LEN_6BIT, LEN_ENCVAL,
};

/// Decode a length prefix, returning `(length, is_special_encoding)`.
///
/// When the top two bits of the first byte are `11`, the value is not a
/// length but a special-encoding selector carried in the low six bits.
pub(crate) async fn read_length<R: AsyncRead + Unpin>(
    reader: &mut CountedReader<'_, R>,
    raw: &mut BytesMut,
) -> Result<(u64, bool)> {
    let byte = reader.read_u8().await?;
    raw.put_u8(byte);

    match (byte & 0xC0) >> 6 {
        LEN_6BIT => Ok(((byte & 0x3F) as u64, false)),
        LEN_14BIT => {
            let next = reader.read_u8().await?;
            raw.put_u8(next);
            Ok(((((byte & 0x3F) as u64) << 8) | next as u64, false))
        }
        _ if byte == LEN_32BIT => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await?;
            raw.put_slice(&buf);
            Ok((u32::from_be_bytes(buf) as u64, false))
        }
        _ if byte == LEN_64BIT => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf).await?;
            raw.put_slice(&buf);
            Ok((u64::from_be_bytes(buf), false))
        }
        LEN_ENCVAL => Ok(((byte & 0x3F) as u64, true)),
        _ => Err(SnapshotError::InvalidEncoding.into()),
    }
}

/// Decode a collection length, which may not use a special encoding.
pub(crate) async fn read_count<R: AsyncRead + Unpin>(
    reader: &mut CountedReader<'_, R>,
    raw: &mut BytesMut,
) -> Result<u64> {
    let (len, special) = read_length(reader, raw).await?;
    if special {
        return Err(SnapshotError::InvalidEncoding.into());
    }
    Ok(len)
}

/// Consume one string token, capturing its wire bytes, and return the
/// decoded value.
pub(crate) async fn read_string<R: AsyncRead + Unpin>(
    reader: &mut CountedReader<'_, R>,
    raw: &mut BytesMut,
) -> Result<Vec<u8>> {
    string_token(reader, raw, true)
        .await
        .map(|decoded| decoded.unwrap_or_default())
}

/// Consume one string token, capturing its wire bytes, without decoding.
pub(crate) async fn copy_string<R: AsyncRead + Unpin>(
    reader: &mut CountedReader<'_, R>,
    raw: &mut BytesMut,
) -> Result<()> {
    string_token(reader, raw, false).await.map(|_| ())
}

async fn string_token<R: AsyncRead + Unpin>(
    reader: &mut CountedReader<'_, R>,
    raw: &mut BytesMut,
    decode: bool,
) -> Result<Option<Vec<u8>>> {
    let (len, special) = read_length(reader, raw).await?;

    if !special {
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;
        raw.put_slice(&buf);
        return Ok(decode.then_some(buf));
    }

    match len as u8 {
        ENC_INT8 => {
            let byte = reader.read_u8().await?;
            raw.put_u8(byte);
            Ok(decode.then(|| (byte as i8).to_string().into_bytes()))
        }
        ENC_INT16 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf).await?;
            raw.put_slice(&buf);
            Ok(decode.then(|| i16::from_le_bytes(buf).to_string().into_bytes()))
        }
        ENC_INT32 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await?;
            raw.put_slice(&buf);
            Ok(decode.then(|| i32::from_le_bytes(buf).to_string().into_bytes()))
        }
        ENC_LZF => {
            let compressed_len = read_count(reader, raw).await?;
            let uncompressed_len = read_count(reader, raw).await?;
            let mut compressed = vec![0u8; compressed_len as usize];
            reader.read_exact(&mut compressed).await?;
            raw.put_slice(&compressed);
            if !decode {
                return Ok(None);
            }
            let decoded = lzf::decompress(&compressed, uncompressed_len as usize)?;
            Ok(Some(decoded))
        }
        _ => Err(SnapshotError::InvalidEncoding.into()),
    }
}

/// Consume a sorted-set score: a 1-byte length followed by that many ASCII
/// bytes, with 253/254/255 denoting NaN/+inf/−inf and carrying no payload.
pub(crate) async fn copy_double<R: AsyncRead + Unpin>(
    reader: &mut CountedReader<'_, R>,
    raw: &mut BytesMut,
) -> Result<()> {
    let len = reader.read_u8().await?;
    raw.put_u8(len);
    if len < 253 {
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;
        raw.put_slice(&buf);
    }
    Ok(())
}
