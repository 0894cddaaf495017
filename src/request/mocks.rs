//! Mock catalog, auth gate and JSON fixtures for request tests

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::tidal::{AuthGate, CatalogApi, Endpoint, FetchError, LoginError, Params};

/// Catalog that serves canned pages keyed by endpoint and offset
#[derive(Default)]
pub struct MockCatalog {
    pages: HashMap<(String, u32), Result<Value, FetchError>>,
    images: HashMap<String, Result<Bytes, FetchError>>,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, endpoint: Endpoint, offset: u32, page: Value) -> Self {
        self.pages.insert((endpoint.to_string(), offset), Ok(page));
        self
    }

    pub fn with_failure(mut self, endpoint: Endpoint, offset: u32, error: FetchError) -> Self {
        self.pages.insert((endpoint.to_string(), offset), Err(error));
        self
    }

    pub fn with_image(mut self, url: &str, data: Vec<u8>) -> Self {
        self.images.insert(url.to_string(), Ok(Bytes::from(data)));
        self
    }

    pub fn with_image_failure(mut self, url: &str, error: FetchError) -> Self {
        self.images.insert(url.to_string(), Err(error));
        self
    }

    /// Every request made so far, as `endpoint@offset` or the image URL
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CatalogApi for MockCatalog {
    async fn fetch_json(&self, endpoint: &Endpoint, params: &Params) -> Result<Value, FetchError> {
        let offset = params
            .iter()
            .find(|(k, _)| *k == "offset")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}@{}", endpoint, offset));

        self.pages
            .get(&(endpoint.to_string(), offset))
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::Http {
                    status: 404,
                    message: format!("no fixture for {}@{}", endpoint, offset),
                })
            })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.images
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Http {
                status: 404,
                message: "no image fixture".to_string(),
            }))
    }
}

/// Auth gate with a fixed login result
pub struct MockAuth {
    authenticated: AtomicBool,
    result: Result<(), LoginError>,
    logins: AtomicUsize,
}

impl MockAuth {
    pub fn logged_in() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            result: Ok(()),
            logins: AtomicUsize::new(0),
        }
    }

    pub fn logged_out(result: Result<(), LoginError>) -> Self {
        Self {
            authenticated: AtomicBool::new(false),
            result,
            logins: AtomicUsize::new(0),
        }
    }

    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGate for MockAuth {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn login(&self) -> Result<(), LoginError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.result.is_ok() {
            self.authenticated.store(true, Ordering::SeqCst);
        }
        self.result.clone()
    }
}

/// A list reply
pub fn page(offset: u32, total: u32, items: Vec<Value>) -> Value {
    json!({
        "limit": 100,
        "offset": offset,
        "totalNumberOfItems": total,
        "items": items,
    })
}

/// A favorites artist entry
pub fn artist_item(id: u64, name: &str) -> Value {
    json!({ "created": "2020-01-01T00:00:00.000+0000", "item": { "id": id, "name": name } })
}

/// An album entry as listed for an artist
pub fn album_item(id: u64, title: &str, artist: &str) -> Value {
    json!({
        "id": id,
        "type": "ALBUM",
        "title": title,
        "audioQuality": "LOSSLESS",
        "artist": { "id": 1, "name": artist },
    })
}

/// Cover URL the default test parser builds for `cover_id(album_id)`
pub fn cover_url(album_id: u64) -> String {
    format!("http://resources.tidal.com/images/c{}/img/640x640.jpg", album_id)
}

/// A track entry
pub fn track_item(id: u64, album_id: u64, album: &str, artist: &str, track: u32) -> Value {
    json!({
        "id": id,
        "title": format!("Song {}", id),
        "duration": 200,
        "trackNumber": track,
        "volumeNumber": 1,
        "allowStreaming": true,
        "streamReady": true,
        "audioQuality": "LOSSLESS",
        "copyright": "(P) Label",
        "url": format!("http://www.tidal.com/track/{}", id),
        "artist": { "id": 1, "name": artist },
        "artists": [{ "id": 1, "name": artist }],
        "album": { "id": album_id, "title": album, "cover": format!("c{}-img", album_id) },
    })
}
