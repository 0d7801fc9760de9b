//! Key predicate
//!
//! Wraps the user-supplied regular expression. Compiled once at startup and
//! shared read-only by every session; keys are admitted when any part of the
//! name matches, mirroring an unanchored regex search.

use regex::Regex;

use crate::error::{ProxyError, Result};

/// Decides which keys are allowed through the proxy.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    pattern: Regex,
}

impl KeyFilter {
    /// Compile a filter from the pattern string.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ProxyError::Config(format!("invalid key pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// True when the key is admitted.
    ///
    /// Keys travel as raw bytes on the wire; they are matched through a lossy
    /// UTF-8 view, so a pattern can still select binary-ish keyspaces by
    /// their printable prefix.
    pub fn matches(&self, key: &[u8]) -> bool {
        self.pattern.is_match(&String::from_utf8_lossy(key))
    }

    /// The source text of the compiled pattern.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}
