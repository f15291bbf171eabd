//! Content store for attachment blobs
//!
//! Blobs live under `<root>/attachments/<owner>/<millis>_<file name>` and are
//! addressed by that relative key. A blob is "staged" once written; it only
//! becomes owned when an idea record referencing its key commits.

use crate::config::StorageConfig;
use crate::model::Attachment;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{info, warn};

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

const KEY_PREFIX: &str = "attachments";

/// Staged blobs wait this long for their record before a sweep may take them
pub const MIN_ORPHAN_AGE: Duration = Duration::from_secs(15 * 60);

/// Errors from the content store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("attachment '{name}' is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("blob '{0}' not found")]
    NotFound(String),

    #[error("storage I/O failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// File contents handed in by a submitter
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Declared MIME type; guessed from the extension when absent
    pub mime_type: Option<String>,
}

impl Upload {
    /// Read an upload from a local file
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        Ok(Self {
            file_name,
            bytes,
            mime_type: None,
        })
    }
}

/// A blob written to the store, with the descriptor that will reference it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBlob {
    pub key: String,
    pub attachment: Attachment,
}

/// Result of an orphan sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub kept: usize,
    pub removed: Vec<String>,
}

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: u64,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    /// Build from config; a relative `attachments_dir` is taken relative to `base_dir`
    pub fn from_config(config: &StorageConfig, base_dir: &Path) -> Self {
        let root = if config.attachments_dir.is_absolute() {
            config.attachments_dir.clone()
        } else {
            base_dir.join(&config.attachments_dir)
        };
        Self::new(root, &config.public_base_url, config.max_attachment_bytes)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public retrieval URL for a key
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Stage every upload, or none of them
    pub fn stage_all(&self, owner_id: &str, uploads: &[Upload]) -> Result<Vec<StagedBlob>, StorageError> {
        let mut staged = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.stage(owner_id, upload) {
                Ok(blob) => staged.push(blob),
                Err(e) => {
                    self.discard(&staged);
                    return Err(e);
                }
            }
        }
        Ok(staged)
    }

    /// Write one upload under a fresh key
    pub fn stage(&self, owner_id: &str, upload: &Upload) -> Result<StagedBlob, StorageError> {
        let size = upload.bytes.len() as u64;
        if size > self.max_bytes {
            return Err(StorageError::TooLarge {
                name: upload.file_name.clone(),
                size,
                limit: self.max_bytes,
            });
        }

        let owner = sanitize(owner_id);
        let file_name = sanitize(&upload.file_name);
        let dir = self.root.join(KEY_PREFIX).join(&owner);
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: format!("{}/{}", KEY_PREFIX, owner),
            source,
        })?;

        // Same name within the same millisecond: bump the stamp until free
        let mut stamp = unix_millis();
        let (key, mut file) = loop {
            let key = format!("{}/{}/{}_{}", KEY_PREFIX, owner, stamp, file_name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&key))
            {
                Ok(file) => break (key, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => stamp += 1,
                Err(source) => return Err(StorageError::Io { key, source }),
            }
        };

        if let Err(source) = file.write_all(&upload.bytes).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(self.root.join(&key));
            return Err(StorageError::Io { key, source });
        }

        let mime_type = upload
            .mime_type
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| guess_mime(&upload.file_name).to_string());

        Ok(StagedBlob {
            attachment: Attachment {
                name: upload.file_name.clone(),
                url: self.url_for(&key),
                mime_type,
                size,
            },
            key,
        })
    }

    /// Remove staged blobs that will not be referenced; best effort
    pub fn discard(&self, staged: &[StagedBlob]) {
        for blob in staged {
            match fs::remove_file(self.root.join(&blob.key)) {
                Ok(()) => info!(key = %blob.key, "discarded staged blob"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(key = %blob.key, error = %e, "failed to discard staged blob"),
            }
        }
    }

    /// Filesystem path of a stored key
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let well_formed = key.starts_with(&format!("{}/", KEY_PREFIX))
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Read a blob's bytes
    pub fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io {
                    key: key.to_string(),
                    source,
                }
            }
        })
    }

    /// Every blob key currently in the store
    pub fn keys(&self) -> Result<Vec<(String, SystemTime)>, StorageError> {
        let base = self.root.join(KEY_PREFIX);
        let mut keys = Vec::new();
        let owners = match fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(keys),
            Err(source) => {
                return Err(StorageError::Io {
                    key: KEY_PREFIX.to_string(),
                    source,
                })
            }
        };

        for owner in owners.filter_map(|e| e.ok()) {
            if !owner.path().is_dir() {
                continue;
            }
            let owner_name = owner.file_name().to_string_lossy().to_string();
            let files = fs::read_dir(owner.path()).map_err(|source| StorageError::Io {
                key: format!("{}/{}", KEY_PREFIX, owner_name),
                source,
            })?;
            for file in files.filter_map(|e| e.ok()) {
                let Ok(meta) = file.metadata() else { continue };
                if !meta.is_file() {
                    continue;
                }
                let modified = meta.modified().unwrap_or(UNIX_EPOCH);
                keys.push((
                    format!(
                        "{}/{}/{}",
                        KEY_PREFIX,
                        owner_name,
                        file.file_name().to_string_lossy()
                    ),
                    modified,
                ));
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Delete blobs no record references, once they are older than `older_than`
    ///
    /// Thresholds below [`MIN_ORPHAN_AGE`] are raised to it.
    pub fn sweep_orphans(
        &self,
        referenced: &HashSet<String>,
        older_than: Duration,
    ) -> Result<SweepReport, StorageError> {
        let older_than = older_than.max(MIN_ORPHAN_AGE);
        let now = SystemTime::now();
        let mut report = SweepReport::default();

        for (key, modified) in self.keys()? {
            report.scanned += 1;
            let age = now.duration_since(modified).unwrap_or_default();
            if referenced.contains(&key) || age < older_than {
                report.kept += 1;
                continue;
            }
            let path = self.path_for(&key)?;
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(key = %key, "removed orphaned blob");
                    report.removed.push(key);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(StorageError::Io { key, source }),
            }
        }
        Ok(report)
    }
}

/// Reduce a name to a single safe path segment
pub fn sanitize(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// MIME type from a file extension
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ContentStore {
        ContentStore::new(dir.path(), "/files/", 1024)
    }

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
            mime_type: None,
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("report final.pdf"), "report_final.pdf");
        assert_eq!(sanitize("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize("..."), "file");
        assert_eq!(sanitize("user@example.com"), "user_example.com");
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("Flow.PNG"), "image/png");
        assert_eq!(guess_mime("notes"), "application/octet-stream");
        assert_eq!(guess_mime("sheet.xlsx"), "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet");
    }

    #[test]
    fn test_stage_writes_blob_and_descriptor() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let blob = store.stage("u-1", &upload("flow chart.png", b"png-bytes")).unwrap();

        assert!(blob.key.starts_with("attachments/u-1/"));
        assert!(blob.key.ends_with("_flow_chart.png"));
        assert_eq!(blob.attachment.name, "flow chart.png");
        assert_eq!(blob.attachment.url, format!("/files/{}", blob.key));
        assert_eq!(blob.attachment.mime_type, "image/png");
        assert_eq!(blob.attachment.size, 9);
        assert_eq!(store.read(&blob.key).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_same_name_twice_gets_distinct_keys() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let a = store.stage("u-1", &upload("a.txt", b"one")).unwrap();
        let b = store.stage("u-1", &upload("a.txt", b"two")).unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(store.read(&a.key).unwrap(), b"one");
        assert_eq!(store.read(&b.key).unwrap(), b"two");
    }

    #[test]
    fn test_stage_all_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let too_big = vec![0u8; 2048];
        let err = store
            .stage_all("u-1", &[upload("ok.txt", b"fine"), upload("big.bin", &too_big)])
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { size: 2048, .. }));
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.path_for("attachments/u-1/../../secret").is_err());
        assert!(store.path_for("/etc/passwd").is_err());
        assert!(store.path_for("other/u-1/x").is_err());
        assert!(store.path_for("attachments/u-1/1_x.txt").is_ok());
    }

    #[test]
    fn test_read_missing_blob() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir).read("attachments/u-1/1_gone.txt").unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    fn backdate(store: &ContentStore, key: &str, by: Duration) {
        let path = store.path_for(key).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    #[test]
    fn test_sweep_removes_only_unreferenced_old_blobs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let owned = store.stage("u-1", &upload("owned.txt", b"a")).unwrap();
        let orphan = store.stage("u-1", &upload("orphan.txt", b"b")).unwrap();
        backdate(&store, &owned.key, Duration::from_secs(2 * 3600));
        backdate(&store, &orphan.key, Duration::from_secs(2 * 3600));

        let referenced: HashSet<String> = [owned.key.clone()].into_iter().collect();

        let report = store.sweep_orphans(&referenced, Duration::from_secs(3 * 3600)).unwrap();
        assert_eq!(report.scanned, 2);
        assert!(report.removed.is_empty());

        let report = store.sweep_orphans(&referenced, Duration::from_secs(3600)).unwrap();
        assert_eq!(report.removed, vec![orphan.key.clone()]);
        assert_eq!(report.kept, 1);
        assert!(store.read(&owned.key).is_ok());
        assert!(matches!(store.read(&orphan.key), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_sweep_spares_freshly_staged_blobs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        // Staged for a submission whose record is not written yet
        let pending = store.stage("u-1", &upload("pending.txt", b"c")).unwrap();

        let report = store.sweep_orphans(&HashSet::new(), Duration::ZERO).unwrap();
        assert_eq!(report.kept, 1);
        assert!(report.removed.is_empty());
        assert!(store.read(&pending.key).is_ok());

        backdate(&store, &pending.key, MIN_ORPHAN_AGE + Duration::from_secs(60));
        let report = store.sweep_orphans(&HashSet::new(), Duration::ZERO).unwrap();
        assert_eq!(report.removed, vec![pending.key]);
    }
}
