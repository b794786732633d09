//!
//! src/sink.rs
//!
//! Downloads cover art into the local image directory. Bytes are streamed
//! into a hidden temp file next to the target and renamed into place once
//! complete, so a reported path always holds a whole image. The temp file
//! is removed on error and when the download future is dropped.
//!

use std::{
    collections::HashMap,
    future::Future,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use reqwest::{Client, header};
use tokio::{io::AsyncWriteExt, sync::OwnedMutexGuard};
use tracing::{debug, info};

use crate::config::{CollisionPolicy, StorageConfig};
use crate::errors::IngestError;
use crate::fetch::send_checked;

/// Characters refused by common filesystems
const HOSTILE: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Longest file name, in bytes, most filesystems accept
const NAME_MAX: usize = 255;

pub fn sanitize_title(title: &str) -> String {
    let clean: String = title.chars()
        .map(|c| if HOSTILE.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    if clean.trim().is_empty() {
        "untitled".to_string()
    } else {
        clean
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

async fn with_deadline<T, F>(limit: Duration, what: &str, op: F) -> Result<T, IngestError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(|e| IngestError::Filesystem(format!("{what}: {e}"))),
        Err(_) => Err(IngestError::Filesystem(format!("{what}: timed out after {limit:?}")))
    }
}

#[derive(Clone, Debug)]
pub struct ImageSink {
    http: Client,
    root: PathBuf,
    extension: String,
    collision: CollisionPolicy,
    fs_timeout: Duration,

    // one lock per target file, shared by clones
    claims: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>
}

impl ImageSink {
    pub fn new(http: Client, cfg: &StorageConfig) -> Self {
        Self {
            http,
            root: cfg.image_dir.clone(),
            extension: cfg.extension.trim_start_matches('.').to_string(),
            collision: cfg.collision,
            fs_timeout: cfg.fs_timeout,
            claims: Arc::default()
        }
    }

    /// `<root>/<sanitized title>.<ext>`, the stem cut short so the whole
    /// name stays within `NAME_MAX` bytes
    pub fn path_for(&self, title: &str) -> PathBuf {
        let clean = sanitize_title(title);
        let budget = NAME_MAX.saturating_sub(self.extension.len() + 1);
        self.root.join(format!("{}.{}", truncate_bytes(&clean, budget), self.extension))
    }

    /// Exclusive use of the file `title` is stored under. Items whose titles
    /// map to the same name run one after another while the guard is held
    pub async fn claim(&self, title: &str) -> OwnedMutexGuard<()> {
        let path = self.path_for(title);
        let lock = {
            let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
            claims.retain(|_, lock| Arc::strong_count(lock) > 1);
            claims.entry(path).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Downloads `url` and stores it under the name derived from `title`.
    /// The image directory has to exist already
    pub async fn fetch(&self, url: &str, title: &str) -> Result<PathBuf, IngestError> {
        let path = self.path_for(title);
        let url = url::Url::parse(url)
            .map_err(|e| IngestError::Decode(format!("image url {url}: {e}")))?;

        let mut response = send_checked(
            self.http.get(url.clone()).header(header::ACCEPT, "image/*")
        ).await?;

        let root = self.root.clone();
        let temp = with_deadline(self.fs_timeout, "create temp file", async move {
            tokio::task::spawn_blocking(move || {
                tempfile::Builder::new()
                    .prefix(".cover-")
                    .suffix(".part")
                    .tempfile_in(&root)
            })
            .await
            .map_err(std::io::Error::other)?
        }).await?;

        // dropping `temp_path` deletes the partial file
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut written = 0_usize;
        while let Some(chunk) = response.chunk().await? {
            with_deadline(self.fs_timeout, "write image", file.write_all(&chunk)).await?;
            written += chunk.len();
        }
        with_deadline(self.fs_timeout, "flush image", file.flush()).await?;
        with_deadline(self.fs_timeout, "sync image", file.sync_all()).await?;
        drop(file);

        let target = path.clone();
        let collision = self.collision;
        with_deadline(self.fs_timeout, "persist image", async move {
            tokio::task::spawn_blocking(move || {
                let persisted = match collision {
                    CollisionPolicy::Overwrite => temp_path.persist(&target),
                    CollisionPolicy::Error => temp_path.persist_noclobber(&target)
                };
                persisted.map_err(|e| std::io::Error::new(
                    e.error.kind(),
                    format!("{}: {}", target.display(), e.error)
                ))
            })
            .await
            .map_err(std::io::Error::other)?
        }).await?;

        debug!(url = %url, bytes = written, "sink.image.written");
        info!(path = %path.display(), "sink.image.done");
        Ok(path)
    }
}
