//! # Keysieve
//!
//! A transparent key-filtering replication proxy for Redis.
//!
//! Keysieve sits between a Redis master and a replica. The replica connects
//! to the proxy as if it were the master; the proxy connects onward to the
//! real master, relays the replication handshake, and then filters both the
//! initial binary snapshot and the live command stream so that only keys
//! matching a user-supplied regular expression reach the replica. Everything
//! else (handshake replies, keepalives, acknowledgements) passes through
//! byte-for-byte, so neither end can tell the proxy from a plain relay with
//! a reduced keyspace.
//!
//! The primary use is resharding: point one filtered replica per shard at
//! the same master and let ordinary replication split the keyspace.
//!
//! ## Module organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | RESP frame decoding with raw-byte capture |
//! | [`snapshot`] | Streaming filter over the binary snapshot transfer |
//! | [`session`]  | The four-task pipeline serving one replica |
//! | [`server`]   | Listener, accept loop, and shutdown |
//! | [`filter`]   | The compiled key predicate |
//! | [`config`]   | TOML + CLI configuration |

pub mod config;
pub mod error;
pub mod filter;
pub mod protocol;
pub mod server;
pub mod session;
pub mod snapshot;

pub use config::Config;
pub use error::{ProxyError, Result};
pub use filter::KeyFilter;
pub use server::Server;
