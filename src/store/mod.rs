//! Stores for encoded calls
//!
//! A store is the hand-off point between `prepare` and the later invocation.
//! Every in-flight call needs its own key: two overlapping calls that share a
//! key overwrite each other. `StoreKey::unique` hands out process-unique keys.
//!
//! - `memory.rs` - concurrent in-process map
//! - `file.rs` - one file per key, optionally zstd-compressed

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const MAX_KEY_LEN: usize = 200;

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// Name of one stored call
///
/// Keys double as file names, so they are limited to ASCII alphanumerics,
/// `-`, `_` and `.`, and may not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(key: impl Into<String>) -> Result<Self, StoreError> {
        let key = key.into();
        if Self::is_valid(&key) {
            Ok(Self(key))
        } else {
            Err(StoreError::InvalidKey(key))
        }
    }

    /// Allocate a key no other call in this process has used
    pub fn unique() -> Self {
        let seq = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        Self(format!("call-{}-{}", std::process::id(), seq))
    }

    /// Like `unique`, with a caller-chosen prefix
    pub fn unique_with_prefix(prefix: &str) -> Result<Self, StoreError> {
        let seq = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        Self::new(format!("{}-{}-{}", prefix, std::process::id(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && !key.starts_with('.')
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = StoreError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl From<StoreKey> for String {
    fn from(key: StoreKey) -> Self {
        key.0
    }
}

/// Byte-addressable persistence for encoded calls
pub trait Store: Send + Sync {
    /// Write `bytes` under `key`, replacing any previous value
    fn write(&self, key: &StoreKey, bytes: &[u8]) -> Result<(), StoreError>;

    fn read(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &StoreKey) -> Result<(), StoreError>;

    fn contains(&self, key: &StoreKey) -> bool;

    /// Read and remove in one step
    ///
    /// Implementations override this when they can make it atomic, so that two
    /// consumers racing on one key see it exactly once.
    fn take(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        let bytes = self.read(key)?;
        self.remove(key)?;
        Ok(bytes)
    }
}
