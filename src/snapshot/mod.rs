//! Binary snapshot (RDB) streaming filter
//!
//! A replication transfer begins with a full-state snapshot: `REDIS` magic,
//! a 4-byte ASCII version, a sequence of opcode-dispatched records, an EOF
//! terminator, and an 8-byte CRC trailer. The filter walks that stream record
//! by record, copies everything that is not a key/value entry verbatim, and
//! drops entries (together with their pending expiry prefix) whose key fails
//! the predicate.
//!
//! Snapshots can be gigabytes, so nothing here materializes the file: staging
//! is bounded to one pending expiry plus one in-progress entry.

mod codec;
mod filter;
mod lzf;
mod reader;

pub use filter::filter_snapshot;
pub use reader::CountedReader;

use thiserror::Error;

/// Snapshot file magic
pub(crate) const SNAPSHOT_MAGIC: &[u8] = b"REDIS";

// Top-level record opcodes
pub(crate) const OPCODE_EOF: u8 = 0xFF;
pub(crate) const OPCODE_SELECTDB: u8 = 0xFE;
pub(crate) const OPCODE_EXPIRETIME: u8 = 0xFD;
pub(crate) const OPCODE_EXPIRETIME_MS: u8 = 0xFC;
pub(crate) const OPCODE_RESIZEDB: u8 = 0xFB;
pub(crate) const OPCODE_AUX: u8 = 0xFA;

// Value type opcodes
pub(crate) const TYPE_STRING: u8 = 0;
pub(crate) const TYPE_LIST: u8 = 1;
pub(crate) const TYPE_SET: u8 = 2;
pub(crate) const TYPE_ZSET: u8 = 3;
pub(crate) const TYPE_HASH: u8 = 4;
pub(crate) const TYPE_HASH_ZIPMAP: u8 = 9;
pub(crate) const TYPE_LIST_ZIPLIST: u8 = 10;
pub(crate) const TYPE_SET_INTSET: u8 = 11;
pub(crate) const TYPE_ZSET_ZIPLIST: u8 = 12;
pub(crate) const TYPE_HASH_ZIPLIST: u8 = 13;
pub(crate) const TYPE_LIST_QUICKLIST: u8 = 14;

/// Highest value-type opcode the filter understands
pub(crate) const TYPE_MAX: u8 = TYPE_LIST_QUICKLIST;

// Length encoding
pub(crate) const LEN_6BIT: u8 = 0;
pub(crate) const LEN_14BIT: u8 = 1;
pub(crate) const LEN_32BIT: u8 = 0x80;
pub(crate) const LEN_64BIT: u8 = 0x81;
pub(crate) const LEN_ENCVAL: u8 = 3;

// Special string encodings (selector in the low 6 bits of an ENCVAL byte)
pub(crate) const ENC_INT8: u8 = 0;
pub(crate) const ENC_INT16: u8 = 1;
pub(crate) const ENC_INT32: u8 = 2;
pub(crate) const ENC_LZF: u8 = 3;

/// Size of the CRC trailer that follows the EOF opcode
pub(crate) const TRAILER_LEN: usize = 8;

/// Errors raised while decoding the snapshot stream.
///
/// Any of these ends the session: a snapshot that fails to parse cannot be
/// resynchronized without risking misaligned bytes downstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("invalid magic: expected REDIS header")]
    InvalidMagic,

    #[error("record extends past the announced transfer length")]
    Overrun,

    #[error("invalid length encoding")]
    InvalidEncoding,

    #[error("LZF decompression error")]
    LzfDecompress,

    #[error("unknown record opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("unknown value type {0:#04x}")]
    UnknownValueType(u8),

    #[error("expiry record not followed by an entry")]
    DanglingExpiry,

    #[error("{0} bytes left unconsumed at snapshot terminator")]
    TrailingBytes(u64),
}
