//! Session-scoped storage for downloaded media.
//!
//! Every blob is a file inside a temporary directory owned by the store.
//! Revoking a blob deletes its file; dropping the store removes the whole
//! directory, so nothing outlives the session.

use omni_core::message::{generate_id, BlobRef};
use omni_core::Result;
use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::{debug, warn};

pub struct BlobStore {
    dir: TempDir,
    live: Mutex<HashMap<String, BlobRef>>,
}

impl BlobStore {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("omni-blobs-").tempdir()?;
        Ok(Self {
            dir,
            live: Mutex::new(HashMap::new()),
        })
    }

    pub fn create(&self, bytes: &[u8], mime_type: &str) -> Result<BlobRef> {
        let id = generate_id("blob");
        let path = self.dir.path().join(format!("{}.{}", id, extension_for(mime_type)));
        fs::write(&path, bytes)?;
        let blob = BlobRef {
            id: id.clone(),
            path,
            mime_type: mime_type.to_string(),
        };
        debug!(blob = %blob.id, size = bytes.len(), "blob created");
        self.live_blobs().insert(id, blob.clone());
        Ok(blob)
    }

    /// Releases a blob. Returns `false` if it was unknown or already revoked.
    pub fn revoke(&self, blob: &BlobRef) -> bool {
        if self.live_blobs().remove(&blob.id).is_none() {
            return false;
        }
        if let Err(e) = fs::remove_file(&blob.path) {
            warn!(blob = %blob.id, error = %e, "failed to remove blob file");
        }
        true
    }

    pub fn is_live(&self, blob: &BlobRef) -> bool {
        self.live_blobs().contains_key(&blob.id)
    }

    pub fn live_count(&self) -> usize {
        self.live_blobs().len()
    }

    fn live_blobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, BlobRef>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}
