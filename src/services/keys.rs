//! Object key generation and the two-level shard layout derived from keys.

use std::path::PathBuf;
use uuid::Uuid;

use super::storage_service::{StorageError, StorageResult};

/// Length of every generated key.
pub const KEY_LEN: usize = 32;

/// Shortest key the shard resolver can place.
pub const MIN_SHARD_KEY_LEN: usize = 5;

/// Produce a fresh key: a random v4 UUID as 32 lowercase hex characters.
pub fn generate_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Map a key to its shard directory, relative to the storage root.
///
/// Uses characters `[0,2)` and `[3,5)`, so `abcdef...` lands in `ab/de`. The
/// character at index 2 is skipped. Returns `None` when the key is too short
/// to shard or its first five characters are not ASCII.
pub fn shard_path(key: &str) -> Option<PathBuf> {
    let prefix = key.get(0..5)?;
    if !prefix.is_ascii() {
        return None;
    }
    let first = &prefix[0..2];
    let second = &prefix[3..5];
    let mut path = PathBuf::from(first);
    path.push(second);
    Some(path)
}

/// Syntactic key validation shared by every store operation.
///
/// Keys arrive as percent-decoded path segments, so anything other than ASCII
/// alphanumerics is rejected to keep separators and `..` out of the store.
pub fn ensure_key_safe(key: &str, min_len: usize) -> StorageResult<()> {
    if key.len() < min_len {
        return Err(StorageError::InvalidKey(format!(
            "key must be at least {min_len} characters"
        )));
    }
    if !key.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(StorageError::InvalidKey(
            "key may only contain ASCII letters and digits".into(),
        ));
    }
    Ok(())
}
