//! RESP wire protocol
//!
//! Keysieve only ever relays bytes, so the frame type here differs from a
//! full RESP implementation in one important way: every decoded frame keeps
//! the exact byte sequence it was read from, and forwarding re-emits those
//! bytes untouched. Classification is a view over the raw bytes, never a
//! re-serialization source.

mod frame;
mod reader;

pub use frame::{Frame, FrameKind};
pub use reader::FrameReader;
