//! Conversion of TIDAL JSON items into typed records
//!
//! Every item is validated on its own. A malformed item yields a
//! [`ParseError`] for that item only; callers log it and move on to the next
//! one, so one bad entry never costs the rest of the page.

use serde_json::{Map, Value};
use tracing::warn;

use super::error::ParseError;
use super::models::{AlbumId, AlbumRef, ArtistRef, NSEC_PER_SEC, SongRecord, URL_SCHEME};

/// Fields every track object has to carry
const SONG_FIELDS: &[&str] = &[
    "album",
    "allowStreaming",
    "artist",
    "artists",
    "audioQuality",
    "duration",
    "id",
    "streamReady",
    "title",
    "trackNumber",
    "url",
    "volumeNumber",
    "copyright",
];

/// Result of parsing one entry of an album or track list
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// An album whose tracks still need to be fetched
    Album(AlbumRef),
    /// A track that was taken as-is from the list
    Song(SongRecord),
}

/// Turns JSON items into [`ArtistRef`], [`AlbumRef`] and [`SongRecord`]
#[derive(Debug, Clone)]
pub struct ResponseParser {
    resources_url: String,
    cover_size: String,
}

impl ResponseParser {
    pub fn new(resources_url: &str, cover_size: &str) -> Self {
        Self {
            resources_url: resources_url.trim_end_matches('/').to_string(),
            cover_size: cover_size.to_string(),
        }
    }

    /// Parse an artist from a favorites or search list
    pub fn parse_artist(&self, value: &Value) -> Result<ArtistRef, ParseError> {
        let obj = unwrap_item(value)?;
        require(obj, "artist", &["id", "name"])?;

        let id = json_id(&obj["id"]).ok_or(ParseError::MissingField {
            what: "artist",
            field: "id",
        })?;

        Ok(ArtistRef {
            id,
            name: json_str(&obj["name"]),
        })
    }

    /// Parse an entry of an album list (favorites, search or an artist's
    /// albums) or of a track list.
    ///
    /// Album items carry a `type` key. Track items carry an `album` object;
    /// with `fetch_albums` the track stands in for its whole album, otherwise
    /// the track itself is returned.
    pub fn parse_listing(&self, value: &Value, fetch_albums: bool) -> Result<Listing, ParseError> {
        let obj = unwrap_item(value)?;

        let (id, title) = if obj.contains_key("type") {
            require(obj, "album", &["id", "title"])?;
            (json_id(&obj["id"]), json_str(&obj["title"]))
        } else if obj.contains_key("album") {
            if !fetch_albums {
                return self.parse_song_object(obj, None, None).map(Listing::Song);
            }
            let album = obj["album"].as_object().ok_or(ParseError::NotObject("item album"))?;
            require(album, "item album", &["id", "title"])?;
            (json_id(&album["id"]), json_str(&album["title"]))
        } else {
            return Err(ParseError::UnknownItem);
        };

        let id = id.ok_or(ParseError::MissingField {
            what: "album",
            field: "id",
        })?;

        require(obj, "item", &["artist", "title", "audioQuality"])?;
        let artist = artist_name(obj, "item artist")?;

        Ok(Listing::Album(AlbumRef {
            id,
            title,
            artist,
            audio_quality: json_str(&obj["audioQuality"]),
        }))
    }

    /// Parse a single track.
    ///
    /// `album_id_requested` rejects tracks that do not belong to the album the
    /// list was fetched for. `album_artist` is recorded on the song only when
    /// it differs from the track artist.
    pub fn parse_song(
        &self,
        value: &Value,
        album_id_requested: Option<AlbumId>,
        album_artist: Option<&str>,
    ) -> Result<SongRecord, ParseError> {
        let obj = unwrap_item(value)?;
        self.parse_song_object(obj, album_id_requested, album_artist)
    }

    fn parse_song_object(
        &self,
        obj: &Map<String, Value>,
        album_id_requested: Option<AlbumId>,
        album_artist: Option<&str>,
    ) -> Result<SongRecord, ParseError> {
        require(obj, "track", SONG_FIELDS)?;

        let id = json_id(&obj["id"]).ok_or(ParseError::MissingField {
            what: "track",
            field: "id",
        })?;
        let title = strip_title_misc(&json_str(&obj["title"]));
        let artist = artist_name(obj, "track artist")?;

        let album = obj["album"].as_object().ok_or(ParseError::NotObject("track album"))?;
        require(album, "track album", &["id", "title", "cover"])?;
        let album_id = json_id(&album["id"]).ok_or(ParseError::MissingField {
            what: "track album",
            field: "id",
        })?;
        if let Some(expected) = album_id_requested {
            if expected != album_id {
                return Err(ParseError::WrongAlbum {
                    expected,
                    found: album_id,
                });
            }
        }
        let album_title = json_str(&album["title"]);

        if !obj["allowStreaming"].as_bool().unwrap_or(false) {
            warn!("Song {} - {} - {} is not allowStreaming", artist, album_title, title);
        }
        if !obj["streamReady"].as_bool().unwrap_or(false) {
            warn!("Song {} - {} - {} is not streamReady", artist, album_title, title);
        }

        let seconds = obj["duration"].as_f64().filter(|s| *s >= 0.0).ok_or(ParseError::InvalidDuration)?;
        let length_nanos = (seconds.trunc() as u64)
            .checked_mul(NSEC_PER_SEC)
            .ok_or(ParseError::InvalidDuration)?;

        let album_artist = album_artist
            .filter(|a| *a != artist)
            .map(str::to_string);

        Ok(SongRecord {
            id,
            album_id,
            compilation: album_artist.is_some(),
            album_artist,
            title,
            artist,
            album: album_title,
            track: json_u32(&obj["trackNumber"]),
            disc: json_u32(&obj["volumeNumber"]),
            length_nanos,
            url: format!("{}:{}", URL_SCHEME, id),
            art: self.cover_url(&json_str(&album["cover"])),
            comment: json_str(&obj["copyright"]),
            multi_disc: false,
            valid: true,
        })
    }

    /// Build the remote image URL for a cover identifier. Dashes in the
    /// identifier are path separators.
    pub fn cover_url(&self, cover: &str) -> String {
        format!(
            "{}/images/{}/{}.jpg",
            self.resources_url,
            cover.replace('-', "/"),
            self.cover_size
        )
    }
}

/// Normalize the tracks of one album fetch.
///
/// If any track is a compilation all of them are; if any track sits on disc 2
/// or later, every album title gets its disc number appended.
pub fn normalize_album_batch(songs: &mut [SongRecord]) {
    let compilation = songs.iter().any(|s| s.compilation);
    let multi_disc = songs.iter().any(|s| s.disc >= 2);

    for song in songs.iter_mut() {
        if compilation {
            song.compilation = true;
        }
        if multi_disc {
            song.multi_disc = true;
            song.album = format!("{} - (Disc {})", song.album, song.disc);
        }
    }
}

/// Extract the `items` array of a list reply
pub fn extract_items(value: &Value) -> Result<&Vec<Value>, ParseError> {
    value
        .as_object()
        .ok_or(ParseError::NotObject("reply"))?
        .get("items")
        .ok_or(ParseError::MissingField {
            what: "reply",
            field: "items",
        })?
        .as_array()
        .ok_or(ParseError::NotObject("items"))
}

/// Drop a trailing release note such as `(Remastered)`, `[Explicit]` or
/// `- 2011 Remaster` from a track title.
fn strip_title_misc(title: &str) -> String {
    let trimmed = title.trim_end();

    let split = if let Some(inner) = trimmed.strip_suffix(')').or_else(|| trimmed.strip_suffix(']')) {
        inner.rfind(['(', '[']).map(|pos| (&inner[..pos], &inner[pos + 1..]))
    } else {
        trimmed.rfind(" - ").map(|pos| (&trimmed[..pos], &trimmed[pos + 3..]))
    };

    match split {
        Some((body, note)) if is_release_note(note) => {
            let body = body.trim_end().trim_end_matches('-').trim_end();
            if body.is_empty() {
                title.to_string()
            } else {
                body.to_string()
            }
        }
        _ => title.to_string(),
    }
}

fn is_release_note(note: &str) -> bool {
    let note = note.trim().to_lowercase();
    let rest = note.trim_start_matches(|c: char| c.is_ascii_digit());
    let year_digits = note.len() - rest.len();
    let rest = rest.trim_start();

    match rest {
        "explicit" => year_digits == 0,
        "remaster" | "remastered" | "remastered version" => year_digits <= 4,
        _ => false,
    }
}

/// Favorites wrap the entity as `{"created": .., "item": {..}}`; unwrap one
/// level when present.
fn unwrap_item(value: &Value) -> Result<&Map<String, Value>, ParseError> {
    let obj = value.as_object().ok_or(ParseError::NotObject("item"))?;
    match obj.get("item") {
        Some(inner) => inner.as_object().ok_or(ParseError::NotObject("item")),
        None => Ok(obj),
    }
}

fn require(obj: &Map<String, Value>, what: &'static str, fields: &[&'static str]) -> Result<(), ParseError> {
    match fields.iter().find(|f| !obj.contains_key(**f)) {
        Some(field) => Err(ParseError::MissingField { what, field: *field }),
        None => Ok(()),
    }
}

fn artist_name(obj: &Map<String, Value>, what: &'static str) -> Result<String, ParseError> {
    let artist = obj["artist"].as_object().ok_or(ParseError::NotObject(what))?;
    require(artist, what, &["name"])?;
    Ok(json_str(&artist["name"]))
}

/// TIDAL ids are numbers, but accept numeric strings as well
fn json_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn json_str(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn json_u32(value: &Value) -> u32 {
    value.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> ResponseParser {
        ResponseParser::new("http://resources.tidal.com/", "640x640")
    }

    fn track(id: u64, album_id: u64, artist: &str, disc: u32) -> Value {
        json!({
            "id": id,
            "title": format!("Track {}", id),
            "duration": 215,
            "trackNumber": 3,
            "volumeNumber": disc,
            "allowStreaming": true,
            "streamReady": true,
            "audioQuality": "LOSSLESS",
            "copyright": "(P) 2019 Label",
            "url": format!("http://www.tidal.com/track/{}", id),
            "artist": { "id": 1, "name": artist },
            "artists": [{ "id": 1, "name": artist }],
            "album": { "id": album_id, "title": "Album", "cover": "aa-bb-cc" }
        })
    }

    #[test]
    fn test_parse_artist_unwraps_favorite() {
        let value = json!({ "created": "2020-01-01", "item": { "id": 5, "name": "Low" } });
        let artist = parser().parse_artist(&value).unwrap();
        assert_eq!(artist, ArtistRef { id: 5, name: "Low".to_string() });
    }

    #[test]
    fn test_parse_artist_missing_name() {
        let value = json!({ "id": 5 });
        assert_eq!(
            parser().parse_artist(&value),
            Err(ParseError::MissingField { what: "artist", field: "name" })
        );
    }

    #[test]
    fn test_parse_artist_rejects_non_object() {
        assert_eq!(parser().parse_artist(&json!(5)), Err(ParseError::NotObject("item")));
        assert_eq!(
            parser().parse_artist(&json!({ "item": "nope" })),
            Err(ParseError::NotObject("item"))
        );
    }

    #[test]
    fn test_parse_song_fields() {
        let song = parser().parse_song(&track(11, 100, "Low", 1), Some(100), Some("Low")).unwrap();
        assert_eq!(song.id, 11);
        assert_eq!(song.album_id, 100);
        assert_eq!(song.title, "Track 11");
        assert_eq!(song.track, 3);
        assert_eq!(song.disc, 1);
        assert_eq!(song.length_nanos, 215 * NSEC_PER_SEC);
        assert_eq!(song.url, "tidal:11");
        assert_eq!(song.art, "http://resources.tidal.com/images/aa/bb/cc/640x640.jpg");
        assert_eq!(song.comment, "(P) 2019 Label");
        assert_eq!(song.album_artist, None);
        assert!(!song.compilation);
        assert!(song.valid);
    }

    #[test]
    fn test_parse_song_sets_differing_album_artist() {
        let song = parser()
            .parse_song(&track(11, 100, "Guest", 1), Some(100), Some("Various Artists"))
            .unwrap();
        assert_eq!(song.album_artist.as_deref(), Some("Various Artists"));
        assert!(song.compilation);
    }

    #[test]
    fn test_parse_song_missing_field() {
        let mut value = track(11, 100, "Low", 1);
        value.as_object_mut().unwrap().remove("copyright");
        assert_eq!(
            parser().parse_song(&value, None, None),
            Err(ParseError::MissingField { what: "track", field: "copyright" })
        );
    }

    #[test]
    fn test_parse_song_wrong_album() {
        assert_eq!(
            parser().parse_song(&track(11, 100, "Low", 1), Some(200), None),
            Err(ParseError::WrongAlbum { expected: 200, found: 100 })
        );
    }

    #[test]
    fn test_parse_song_bad_duration() {
        let mut value = track(11, 100, "Low", 1);
        value["duration"] = json!("long");
        assert_eq!(parser().parse_song(&value, None, None), Err(ParseError::InvalidDuration));
    }

    #[test]
    fn test_parse_song_huge_duration() {
        let mut value = track(11, 100, "Low", 1);
        value["duration"] = json!(1.0e11);
        assert_eq!(parser().parse_song(&value, None, None), Err(ParseError::InvalidDuration));
    }

    #[test]
    fn test_parse_song_strips_release_note() {
        let mut value = track(11, 100, "Low", 1);
        value["title"] = json!("Sunflower - 2011 Remaster");
        assert_eq!(parser().parse_song(&value, None, None).unwrap().title, "Sunflower");
    }

    #[test]
    fn test_strip_title_misc() {
        assert_eq!(strip_title_misc("Song (Remastered)"), "Song");
        assert_eq!(strip_title_misc("Song [Explicit]"), "Song");
        assert_eq!(strip_title_misc("Song - (2009 Remaster)"), "Song");
        assert_eq!(strip_title_misc("Song - 1999 Remastered Version"), "Song");
        assert_eq!(strip_title_misc("Song (Live)"), "Song (Live)");
        assert_eq!(strip_title_misc("Song - Demo"), "Song - Demo");
        assert_eq!(strip_title_misc("(Remastered)"), "(Remastered)");
        assert_eq!(strip_title_misc("Remastered"), "Remastered");
    }

    #[test]
    fn test_parse_listing_album_item() {
        let value = json!({
            "item": {
                "id": 100, "type": "ALBUM", "title": "Things We Lost",
                "audioQuality": "LOSSLESS", "artist": { "name": "Low" }
            }
        });
        let listing = parser().parse_listing(&value, false).unwrap();
        assert_eq!(
            listing,
            Listing::Album(AlbumRef {
                id: 100,
                title: "Things We Lost".to_string(),
                artist: "Low".to_string(),
                audio_quality: "LOSSLESS".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_listing_track_item() {
        let value = track(11, 100, "Low", 1);

        match parser().parse_listing(&value, false).unwrap() {
            Listing::Song(song) => assert_eq!(song.id, 11),
            other => panic!("expected song, got {:?}", other),
        }

        match parser().parse_listing(&value, true).unwrap() {
            Listing::Album(album) => {
                assert_eq!(album.id, 100);
                assert_eq!(album.artist, "Low");
            }
            other => panic!("expected album, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_listing_unknown_item() {
        let value = json!({ "id": 1, "title": "?" });
        assert_eq!(parser().parse_listing(&value, true), Err(ParseError::UnknownItem));
    }

    #[test]
    fn test_normalize_multi_disc_batch() {
        let p = parser();
        let mut songs = vec![
            p.parse_song(&track(1, 100, "Low", 1), None, None).unwrap(),
            p.parse_song(&track(2, 100, "Low", 2), None, None).unwrap(),
        ];
        normalize_album_batch(&mut songs);
        assert_eq!(songs[0].album, "Album - (Disc 1)");
        assert_eq!(songs[1].album, "Album - (Disc 2)");
        assert!(songs.iter().all(|s| s.multi_disc));
        assert!(songs.iter().all(|s| !s.compilation));
    }

    #[test]
    fn test_normalize_compilation_batch() {
        let p = parser();
        let mut songs = vec![
            p.parse_song(&track(1, 100, "VA", 1), None, Some("VA")).unwrap(),
            p.parse_song(&track(2, 100, "Guest", 1), None, Some("VA")).unwrap(),
        ];
        normalize_album_batch(&mut songs);
        assert!(songs.iter().all(|s| s.compilation));
        assert_eq!(songs[0].album, "Album");
    }

    #[test]
    fn test_extract_items() {
        let value = json!({ "items": [1, 2] });
        assert_eq!(extract_items(&value).unwrap().len(), 2);
        assert!(extract_items(&json!({ "limit": 10 })).is_err());
        assert!(extract_items(&json!([])).is_err());
    }
}
