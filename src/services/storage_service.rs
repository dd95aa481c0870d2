//! src/services/storage_service.rs
//!
//! StorageService — the two-phase object store. Each object is a metadata
//! record `<key>.info` (JSON) and, once the upload completes, a payload record
//! `<key>.bin`, both sharded beneath `base_path/{key[0..2]}/{key[3..5]}/`.
//! All state lives on disk; the service itself holds no per-object memory.

use crate::{
    models::{file_info::FileInfo, object_state::ObjectState},
    services::{
        keys::{self, KEY_LEN, MIN_SHARD_KEY_LEN},
        mirror::MetadataMirror,
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const INFO_EXT: &str = "info";
const BIN_EXT: &str = "bin";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("no {record} record for `{key}`")]
    InvalidTarget { key: String, record: &'static str },
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("metadata record encoding: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of phase one: the new key and the metadata as persisted.
#[derive(Debug, Clone)]
pub struct Registration {
    pub key: String,
    pub info: FileInfo,
}

/// Outcome of phase two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadReceipt {
    pub size_bytes: u64,
    /// Lowercase hex MD5 of the stored payload.
    pub etag: String,
}

/// StorageService implements the object lifecycle:
/// - register metadata and mint a key (phase one)
/// - accept the payload for a registered key (phase two)
/// - read metadata or payload back
/// - delete both records
///
/// Operations on the same key are not serialized; concurrent payload uploads
/// for one key race and the last rename wins.
#[derive(Clone)]
pub struct StorageService {
    /// Root directory holding the shard tree.
    pub base_path: PathBuf,

    /// Best-effort relational mirror, fed on registration.
    pub mirror: Option<MetadataMirror>,
}

impl StorageService {
    pub fn new(base_path: impl Into<PathBuf>, mirror: Option<MetadataMirror>) -> Self {
        Self {
            base_path: base_path.into(),
            mirror,
        }
    }

    /// Absolute shard directory for a validated key.
    fn shard_dir(&self, key: &str) -> StorageResult<PathBuf> {
        let shard = keys::shard_path(key)
            .ok_or_else(|| StorageError::InvalidKey("key is too short to shard".into()))?;
        Ok(self.base_path.join(shard))
    }

    fn record_path(&self, key: &str, ext: &str) -> StorageResult<PathBuf> {
        Ok(self.shard_dir(key)?.join(format!("{key}.{ext}")))
    }

    /// Phase one: persist `info` under a freshly generated key.
    ///
    /// `created_at` is overwritten with the current time and `url` is dropped,
    /// since it is only ever computed on the way out. If this returns an error
    /// the key must be treated as never issued.
    pub async fn register(&self, mut info: FileInfo) -> StorageResult<Registration> {
        let key = keys::generate_key();
        let dir = self.shard_dir(&key)?;
        create_shard_dir(&dir).await?;

        info.created_at = Utc::now().timestamp();
        info.url = None;

        let info_path = dir.join(format!("{key}.{INFO_EXT}"));
        let data = serde_json::to_vec(&info)?;
        fs::write(&info_path, data).await?;
        info!(key = %key, box_key = %info.box_key, "registered object");

        if let Some(mirror) = &self.mirror {
            match mirror.save(&info).await {
                Ok(id) => debug!(key = %key, mirror_id = id, "mirrored metadata"),
                Err(err) => warn!(key = %key, "metadata mirror write failed: {}", err),
            }
        }

        Ok(Registration { key, info })
    }

    /// Phase two, buffered variant of [`Self::accept_payload_stream`].
    pub async fn accept_payload(&self, key: &str, data: Bytes) -> StorageResult<PayloadReceipt> {
        self.accept_payload_stream(key, stream::once(async move { Ok::<_, io::Error>(data) }))
            .await
    }

    /// Phase two: stream the payload for a registered key into `<key>.bin`.
    ///
    /// - Requires a full-length key and an existing info record.
    /// - Writes to a temporary file in the shard directory, fsyncs it, then
    ///   renames it over any previous payload.
    /// - Computes size and MD5 while streaming.
    ///
    /// The temporary file is removed on every error path, including when the
    /// returned future is dropped mid-upload.
    pub async fn accept_payload_stream<S>(&self, key: &str, stream: S) -> StorageResult<PayloadReceipt>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        keys::ensure_key_safe(key, KEY_LEN)?;
        let dir = self.shard_dir(key)?;
        let info_path = dir.join(format!("{key}.{INFO_EXT}"));
        if !fs::try_exists(&info_path).await? {
            return Err(StorageError::InvalidTarget {
                key: key.to_string(),
                record: INFO_EXT,
            });
        }

        let bin_path = dir.join(format!("{key}.{BIN_EXT}"));
        let tmp = TempPathGuard::new(dir.join(format!(".tmp-{}", Uuid::new_v4())));
        let mut file = File::create(tmp.path()).await?;

        let mut size_bytes: u64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size_bytes += chunk.len() as u64;
            digest.consume(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(tmp.path(), &bin_path).await?;
        tmp.disarm();

        let etag = format!("{:x}", digest.compute());
        info!(key = %key, size_bytes, "stored payload");
        Ok(PayloadReceipt { size_bytes, etag })
    }

    /// Read and decode the info record.
    pub async fn read_metadata(&self, key: &str) -> StorageResult<FileInfo> {
        keys::ensure_key_safe(key, MIN_SHARD_KEY_LEN)?;
        let info_path = self.record_path(key, INFO_EXT)?;
        let data = fs::read(&info_path)
            .await
            .map_err(|err| not_found_as_target(err, key, INFO_EXT))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Read the whole payload into memory.
    pub async fn read_payload(&self, key: &str) -> StorageResult<Vec<u8>> {
        keys::ensure_key_safe(key, MIN_SHARD_KEY_LEN)?;
        let bin_path = self.record_path(key, BIN_EXT)?;
        fs::read(&bin_path)
            .await
            .map_err(|err| not_found_as_target(err, key, BIN_EXT))
    }

    /// Open the payload for streaming. Returns the handle and its length.
    pub async fn payload_reader(&self, key: &str) -> StorageResult<(File, u64)> {
        keys::ensure_key_safe(key, MIN_SHARD_KEY_LEN)?;
        let bin_path = self.record_path(key, BIN_EXT)?;
        let file = File::open(&bin_path)
            .await
            .map_err(|err| not_found_as_target(err, key, BIN_EXT))?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Remove both records. Records that are already gone are skipped, so
    /// repeated deletes succeed. Shard directories are left in place.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        keys::ensure_key_safe(key, MIN_SHARD_KEY_LEN)?;
        // Payload first: a partial failure must leave a pending object, never
        // a payload without metadata.
        for ext in [BIN_EXT, INFO_EXT] {
            let path = self.record_path(key, ext)?;
            match fs::remove_file(&path).await {
                Ok(_) => debug!("removed {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("{} already missing", path.display());
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }
        info!(key = %key, "deleted object");
        Ok(())
    }

    /// Probe which records exist for `key`.
    pub async fn state(&self, key: &str) -> StorageResult<ObjectState> {
        keys::ensure_key_safe(key, MIN_SHARD_KEY_LEN)?;
        let has_info = fs::try_exists(self.record_path(key, INFO_EXT)?).await?;
        let has_bin = fs::try_exists(self.record_path(key, BIN_EXT)?).await?;
        Ok(ObjectState::from_presence(has_info, has_bin))
    }
}

/// Removes the wrapped path on drop unless disarmed.
struct TempPathGuard {
    path: PathBuf,
    armed: bool,
}

impl TempPathGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Keep the file; called once it has been renamed into place.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempPathGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed abandoned upload {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove {}: {}", self.path.display(), err),
        }
    }
}

/// Create a shard directory, tolerating concurrent creation of the same path.
async fn create_shard_dir(dir: &std::path::Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder.create(dir).await
}

fn not_found_as_target(err: io::Error, key: &str, record: &'static str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::InvalidTarget {
            key: key.to_string(),
            record,
        }
    } else {
        StorageError::Io(err)
    }
}
