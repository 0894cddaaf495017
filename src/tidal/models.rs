//! TIDAL catalog models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// TIDAL artist identifier
pub type ArtistId = u64;

/// TIDAL album identifier
pub type AlbumId = u64;

/// TIDAL track identifier
pub type SongId = u64;

/// Nanoseconds per second, the unit song lengths are stored in
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Scheme used for the source locator of every parsed song
pub const URL_SCHEME: &str = "tidal";

/// Entity kind a request is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Artists,
    Albums,
    Songs,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artists => write!(f, "artists"),
            Self::Albums => write!(f, "albums"),
            Self::Songs => write!(f, "songs"),
        }
    }
}

/// Remote list endpoints the orchestrator talks to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    FavoriteArtists,
    FavoriteAlbums,
    FavoriteTracks,
    SearchArtists,
    SearchAlbums,
    SearchTracks,
    ArtistAlbums(ArtistId),
    AlbumTracks(AlbumId),
}

impl Endpoint {
    /// Path below the API base URL. Favorites live under the logged in user.
    pub fn path(&self, user_id: u64) -> String {
        match self {
            Self::FavoriteArtists => format!("users/{}/favorites/artists", user_id),
            Self::FavoriteAlbums => format!("users/{}/favorites/albums", user_id),
            Self::FavoriteTracks => format!("users/{}/favorites/tracks", user_id),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FavoriteArtists => write!(f, "favorites/artists"),
            Self::FavoriteAlbums => write!(f, "favorites/albums"),
            Self::FavoriteTracks => write!(f, "favorites/tracks"),
            Self::SearchArtists => write!(f, "search/artists"),
            Self::SearchAlbums => write!(f, "search/albums"),
            Self::SearchTracks => write!(f, "search/tracks"),
            Self::ArtistAlbums(id) => write!(f, "artists/{}/albums", id),
            Self::AlbumTracks(id) => write!(f, "albums/{}/tracks", id),
        }
    }
}

/// Artist entry from a favorites or search list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistRef {
    pub id: ArtistId,
    pub name: String,
}

/// Album entry from an album list, or the album of a listed track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRef {
    pub id: AlbumId,
    pub title: String,
    /// Name of the album's artist, used to back-fill album artist on its tracks
    pub artist: String,
    pub audio_quality: String,
}

/// A flattened song, the output unit of every request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: SongId,
    pub album_id: AlbumId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Only set when it differs from `artist`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    pub track: u32,
    pub disc: u32,
    /// Length in nanoseconds
    pub length_nanos: u64,
    /// Source locator (`tidal:<id>`)
    pub url: String,
    /// Remote cover URL, or a local file path once the cover is cached
    pub art: String,
    pub comment: String,
    pub compilation: bool,
    pub multi_disc: bool,
    pub valid: bool,
}

impl SongRecord {
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.length_nanos)
    }

    /// True once the cover locator points at a local file instead of a URL
    pub fn has_cached_art(&self) -> bool {
        !self.art.is_empty() && !self.art.starts_with("http://") && !self.art.starts_with("https://")
    }
}
