//! Content types for served files.
//!
//! The table is fixed; extensions outside it get no `Content-Type` header
//! at all rather than a guessed one.

use std::path::Path;

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

/// Looks up the content type for a bare extension (no leading dot).
pub fn from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "html" => Some("text/html"),
        "mp3" => Some("audio/mpeg"),
        "mp4" => Some("video/mp4"),
        "jpeg" | "jpg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "js" => Some("text/javascript"),
        "json" => Some(APPLICATION_JSON),
        "css" => Some("text/css"),
        "text" | "txt" => Some(TEXT_PLAIN),
        _ => None,
    }
}

pub fn for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(from_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(for_path(Path::new("/www/index.html")), Some("text/html"));
        assert_eq!(for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(for_path(Path::new("song.mp3")), Some("audio/mpeg"));
    }

    #[test]
    fn unknown_or_missing_extension() {
        assert_eq!(for_path(Path::new("archive.tar.gz")), None);
        assert_eq!(for_path(Path::new("Makefile")), None);
    }
}
