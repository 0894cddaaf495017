//! File names inside the cover cache

use url::Url;

use crate::tidal::AlbumId;

/// Name of the cached cover for an album: `<album id>-<remote file name>`.
///
/// Covers of the same album always map to the same name, which is what lets
/// concurrent requests share the cache directory.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     cover_file_name(42, "http://resources.tidal.com/images/ab/cd/640x640.jpg"),
///     "42-640x640.jpg"
/// );
/// ```
pub fn cover_file_name(album_id: AlbumId, cover_url: &str) -> String {
    let remote_name = Url::parse(cover_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "cover.jpg".to_string());

    format!("{}-{}", album_id, sanitize_filename(&remote_name))
}

/// Replace characters that are unsafe in file names on any major OS
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_file_name() {
        assert_eq!(
            cover_file_name(42, "http://resources.tidal.com/images/ab/cd/ef/640x640.jpg"),
            "42-640x640.jpg"
        );
    }

    #[test]
    fn test_cover_file_name_ignores_query() {
        assert_eq!(
            cover_file_name(7, "https://example.com/a/b/320x320.jpg?token=x"),
            "7-320x320.jpg"
        );
    }

    #[test]
    fn test_cover_file_name_fallback() {
        assert_eq!(cover_file_name(7, "not a url"), "7-cover.jpg");
        assert_eq!(cover_file_name(7, "https://example.com/"), "7-cover.jpg");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_filename(" a:b/c?.jpg "), "a_b_c_.jpg");
        assert_eq!(sanitize_filename("640x640.jpg"), "640x640.jpg");
    }
}
