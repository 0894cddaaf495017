//! Deduplication and completion tracking for one logical request

use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::tidal::{AlbumId, ArtistId};

/// Entities already requested within one request
#[derive(Debug, Default)]
pub struct DedupTracker {
    requested_artists: HashSet<ArtistId>,
    requested_albums: HashMap<AlbumId, String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the artist was already requested
    pub fn insert_artist(&mut self, id: ArtistId) -> bool {
        self.requested_artists.insert(id)
    }

    pub fn has_artist(&self, id: ArtistId) -> bool {
        self.requested_artists.contains(&id)
    }

    pub fn artist_count(&self) -> usize {
        self.requested_artists.len()
    }

    /// Returns false if the album was already requested. The first album
    /// artist seen for an id is the one kept.
    pub fn insert_album(&mut self, id: AlbumId, album_artist: &str) -> bool {
        if self.requested_albums.contains_key(&id) {
            return false;
        }
        self.requested_albums.insert(id, album_artist.to_string());
        true
    }

    pub fn album_artist(&self, id: AlbumId) -> Option<&str> {
        self.requested_albums.get(&id).map(String::as_str)
    }
}

/// A requested/received counter pair. Both only ever grow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CounterPair {
    requested: usize,
    received: usize,
}

impl CounterPair {
    pub fn request(&mut self) {
        self.requested += 1;
    }

    /// Count a reply. A reply nobody asked for is ignored so that
    /// `requested >= received` always holds.
    pub fn receive(&mut self) -> bool {
        if self.received >= self.requested {
            warn!("Reply received with nothing outstanding");
            return false;
        }
        self.received += 1;
        true
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_settled(&self) -> bool {
        self.requested == self.received
    }
}

/// Outstanding work of a request
#[derive(Debug, Default, Clone)]
pub struct CompletionTracker {
    pub artist_albums: CounterPair,
    pub album_songs: CounterPair,
    pub album_covers: CounterPair,
    /// Held while artists are still being expanded into albums; track fetches
    /// wait until it drops.
    pub mid_artist_query: bool,
    /// Held while a page of the top-level list is in flight
    pub top_level_pending: bool,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artist albums and album songs have all come back
    pub fn children_settled(&self) -> bool {
        self.artist_albums.is_settled() && self.album_songs.is_settled()
    }

    /// Nothing is outstanding. Safe to call any number of times.
    pub fn is_quiescent(&self) -> bool {
        !self.mid_artist_query
            && !self.top_level_pending
            && self.children_settled()
            && self.album_covers.is_settled()
    }
}
