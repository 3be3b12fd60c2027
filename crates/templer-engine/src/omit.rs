//! The omit sentinel
//!
//! Templates mark values to drop with `{{ omit }}`. The global renders to a
//! per-process random token; any rendered value containing it is removed from
//! its parent mapping or list.

use rand::RngCore;
use sha1::{Digest, Sha1};

const OMIT_PREFIX: &str = "__omit_place_holder__";

/// Unguessable marker rendered by the `omit` global
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmitSentinel(String);

impl Default for OmitSentinel {
    fn default() -> Self {
        Self::new()
    }
}

impl OmitSentinel {
    /// Generate a fresh sentinel from 64 random bytes
    pub fn new() -> Self {
        let mut seed = [0u8; 64];
        rand::rng().fill_bytes(&mut seed);
        Self(format!("{}{}", OMIT_PREFIX, hex::encode(Sha1::digest(seed))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `text` carries the sentinel anywhere
    pub fn is_in(&self, text: &str) -> bool {
        text.contains(&self.0)
    }
}

impl std::fmt::Display for OmitSentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
