//! Shared test utilities for Keysieve integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```
//!
//! Provides small encoders for building snapshot images byte-by-byte, and a
//! harness that runs the streaming filter over an in-memory wire.
#![allow(dead_code)]

use bytes::Bytes;
use tokio::sync::mpsc;

use keysieve::snapshot::filter_snapshot;
use keysieve::KeyFilter;

/// An arbitrary trailer; the filter copies it without validating.
pub const CRC: &[u8; 8] = b"\xde\xad\xbe\xef\x01\x02\x03\x04";

// ============================================================================
// Record encoders
// ============================================================================

/// Encode a length prefix using the shortest form that fits.
pub fn encode_len(n: u64) -> Vec<u8> {
    if n < 64 {
        vec![n as u8]
    } else if n < 16384 {
        vec![0x40 | (n >> 8) as u8, n as u8]
    } else if n <= u32::MAX as u64 {
        let mut buf = vec![0x80];
        buf.extend_from_slice(&(n as u32).to_be_bytes());
        buf
    } else {
        let mut buf = vec![0x81];
        buf.extend_from_slice(&n.to_be_bytes());
        buf
    }
}

/// Encode a raw (length-prefixed) string.
pub fn encode_string(s: &[u8]) -> Vec<u8> {
    let mut buf = encode_len(s.len() as u64);
    buf.extend_from_slice(s);
    buf
}

/// Encode an 8-bit integer-packed string.
pub fn encode_int8_string(v: i8) -> Vec<u8> {
    vec![0xC0, v as u8]
}

/// Encode a 16-bit integer-packed string.
pub fn encode_int16_string(v: i16) -> Vec<u8> {
    let mut buf = vec![0xC1];
    buf.extend_from_slice(&v.to_le_bytes());
    buf
}

/// Encode a 32-bit integer-packed string.
pub fn encode_int32_string(v: i32) -> Vec<u8> {
    let mut buf = vec![0xC2];
    buf.extend_from_slice(&v.to_le_bytes());
    buf
}

/// Encode an LZF-compressed string as a series of literal runs.
///
/// No actual compression happens; literal runs are valid LZF and are enough
/// to exercise the decompression path.
pub fn encode_lzf_string(s: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    for chunk in s.chunks(32) {
        compressed.push((chunk.len() - 1) as u8);
        compressed.extend_from_slice(chunk);
    }

    let mut buf = vec![0xC3];
    buf.extend_from_slice(&encode_len(compressed.len() as u64));
    buf.extend_from_slice(&encode_len(s.len() as u64));
    buf.extend_from_slice(&compressed);
    buf
}

pub fn aux(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = vec![0xFA];
    buf.extend_from_slice(&encode_string(key));
    buf.extend_from_slice(&encode_string(value));
    buf
}

pub fn select_db(db: u64) -> Vec<u8> {
    let mut buf = vec![0xFE];
    buf.extend_from_slice(&encode_len(db));
    buf
}

pub fn resize_db(main: u64, expires: u64) -> Vec<u8> {
    let mut buf = vec![0xFB];
    buf.extend_from_slice(&encode_len(main));
    buf.extend_from_slice(&encode_len(expires));
    buf
}

pub fn expiry_ms(stamp: u64) -> Vec<u8> {
    let mut buf = vec![0xFC];
    buf.extend_from_slice(&stamp.to_le_bytes());
    buf
}

pub fn expiry_s(stamp: u32) -> Vec<u8> {
    let mut buf = vec![0xFD];
    buf.extend_from_slice(&stamp.to_le_bytes());
    buf
}

/// String entry with a pre-encoded key, so integer-packed and LZF keys can
/// be exercised too.
pub fn entry_with_encoded_key(encoded_key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = vec![0x00];
    buf.extend_from_slice(encoded_key);
    buf.extend_from_slice(&encode_string(value));
    buf
}

pub fn entry_string(key: &[u8], value: &[u8]) -> Vec<u8> {
    entry_with_encoded_key(&encode_string(key), value)
}

fn entry_of_strings(value_type: u8, key: &[u8], items: &[&[u8]]) -> Vec<u8> {
    let mut buf = vec![value_type];
    buf.extend_from_slice(&encode_string(key));
    buf.extend_from_slice(&encode_len(items.len() as u64));
    for item in items {
        buf.extend_from_slice(&encode_string(item));
    }
    buf
}

pub fn entry_list(key: &[u8], items: &[&[u8]]) -> Vec<u8> {
    entry_of_strings(0x01, key, items)
}

pub fn entry_set(key: &[u8], members: &[&[u8]]) -> Vec<u8> {
    entry_of_strings(0x02, key, members)
}

/// Sorted set with ASCII scores (1-byte length prefix per score).
pub fn entry_zset(key: &[u8], members: &[(&[u8], &str)]) -> Vec<u8> {
    let mut buf = vec![0x03];
    buf.extend_from_slice(&encode_string(key));
    buf.extend_from_slice(&encode_len(members.len() as u64));
    for (member, score) in members {
        buf.extend_from_slice(&encode_string(member));
        buf.push(score.len() as u8);
        buf.extend_from_slice(score.as_bytes());
    }
    buf
}

pub fn entry_hash(key: &[u8], pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut buf = vec![0x04];
    buf.extend_from_slice(&encode_string(key));
    buf.extend_from_slice(&encode_len(pairs.len() as u64));
    for (field, value) in pairs {
        buf.extend_from_slice(&encode_string(field));
        buf.extend_from_slice(&encode_string(value));
    }
    buf
}

/// Packed-encoding entry (zipmap/ziplist/intset): key + one opaque blob.
pub fn entry_packed(value_type: u8, key: &[u8], blob: &[u8]) -> Vec<u8> {
    let mut buf = vec![value_type];
    buf.extend_from_slice(&encode_string(key));
    buf.extend_from_slice(&encode_string(blob));
    buf
}

/// Quicklist entry: key + a list of opaque ziplist blobs.
pub fn entry_quicklist(key: &[u8], blobs: &[&[u8]]) -> Vec<u8> {
    entry_of_strings(0x0E, key, blobs)
}

/// Wrap a record body into a complete image: header + body + EOF opcode.
/// The CRC trailer travels after the image on the wire, outside the
/// announced length.
pub fn image(body: &[u8]) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(b"REDIS0006");
    image.extend_from_slice(body);
    image.push(0xFF);
    image
}

// ============================================================================
// Filter harness
// ============================================================================

/// Run the snapshot filter over `image` + CRC and return `(output bytes,
/// wire bytes consumed)`.
pub async fn run_filter(image: &[u8], pattern: &str) -> (Vec<u8>, usize) {
    // Trailing garbage verifies the filter stops at exactly image + CRC
    let mut wire = image.to_vec();
    wire.extend_from_slice(CRC);
    wire.extend_from_slice(b"TRAILING-WIRE-DATA");

    let keep = KeyFilter::new(pattern).expect("test pattern must compile");
    let (tx, mut rx) = mpsc::channel::<Bytes>(100);

    let mut cursor = wire.as_slice();
    filter_snapshot(&mut cursor, &tx, &keep, image.len() as u64)
        .await
        .expect("filter should accept the image");
    let consumed = wire.len() - cursor.len();
    drop(tx);

    let mut output = Vec::new();
    while let Some(chunk) = rx.recv().await {
        output.extend_from_slice(&chunk);
    }
    (output, consumed)
}

/// The wire bytes the filter should emit for an image it keeps in full.
pub fn expected_output(image: &[u8]) -> Vec<u8> {
    let mut wire = image.to_vec();
    wire.extend_from_slice(CRC);
    wire
}
