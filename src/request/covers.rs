//! Album cover download and caching
//!
//! One download per album. Songs that share an album wait in
//! [`PendingCovers`] and all get the cached path once that download lands.

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::tidal::{AlbumId, CatalogApi, FetchError};
use crate::utils::{cover_art, cover_file_name};

/// Why a cover did not make it into the cache
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoverError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Received empty image data")]
    Empty,

    #[error("Error decoding image data: {0}")]
    Decode(String),

    #[error("Failed to write cover: {0}")]
    Io(String),
}

/// Where downloaded covers are stored
#[async_trait]
pub trait CoverCache: Send + Sync {
    /// Store image data under `name`, returning the path of the stored file
    async fn save(&self, data: Bytes, name: &str) -> Result<PathBuf, CoverError>;
}

/// Cover cache in a directory on disk, shared by all requests.
///
/// Files are keyed by album id, so two requests writing the same album's
/// cover write the same content to the same file.
#[derive(Debug, Clone)]
pub struct DiskCoverCache {
    dir: PathBuf,
}

impl DiskCoverCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl CoverCache for DiskCoverCache {
    async fn save(&self, data: Bytes, name: &str) -> Result<PathBuf, CoverError> {
        let dir = self.dir.clone();
        let path = dir.join(name);
        let target = path.clone();

        // Decoding and encoding is CPU-bound
        tokio::task::spawn_blocking(move || {
            let jpeg = cover_art::transcode_to_jpeg(&data)
                .map_err(|e| CoverError::Decode(format!("{:#}", e)))?;
            std::fs::create_dir_all(&dir)
                .map_err(|e| CoverError::Io(format!("{}: {}", dir.display(), e)))?;
            std::fs::write(&target, jpeg)
                .map_err(|e| CoverError::Io(format!("{}: {}", target.display(), e)))
        })
        .await
        .map_err(|e| CoverError::Io(format!("cover task failed: {}", e)))??;

        debug!("Cached cover at {}", path.display());
        Ok(path)
    }
}

/// Songs waiting for their album's cover, by album id
#[derive(Debug, Default)]
pub struct PendingCovers {
    waiting: HashMap<AlbumId, Vec<usize>>,
}

impl PendingCovers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a song (by index into the request's song list). Returns true on
    /// the first sighting of the album, which is when a download is due.
    pub fn register(&mut self, album_id: AlbumId, song: usize) -> bool {
        let waiting = self.waiting.entry(album_id).or_default();
        waiting.push(song);
        waiting.len() == 1
    }

    pub fn contains(&self, album_id: AlbumId) -> bool {
        self.waiting.contains_key(&album_id)
    }

    /// Remove and return every song waiting on the album
    pub fn take(&mut self, album_id: AlbumId) -> Vec<usize> {
        self.waiting.remove(&album_id).unwrap_or_default()
    }

}

/// Downloads a cover and hands it to the cache
#[derive(Clone)]
pub struct CoverFetcher {
    api: Arc<dyn CatalogApi>,
    cache: Arc<dyn CoverCache>,
}

impl CoverFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, cache: Arc<dyn CoverCache>) -> Self {
        Self { api, cache }
    }

    /// Download `url` and cache it as the cover of `album_id`
    pub fn fetch(&self, album_id: AlbumId, url: String) -> BoxFuture<'static, Result<PathBuf, CoverError>> {
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);

        async move {
            let data = api.fetch_bytes(&url).await?;
            if data.is_empty() {
                return Err(CoverError::Empty);
            }
            cache.save(data, &cover_file_name(album_id, &url)).await
        }
        .boxed()
    }
}
