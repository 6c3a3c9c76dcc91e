//! Media detection by file extension.

use mime_guess::MimeGuess;

/// MIME type used when the extension is unknown.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Best-guess MIME type for `path`, used as a hint when opening write streams.
pub fn mime_hint(path: &str) -> String {
    MimeGuess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

/// True for images (gif included) and videos.
pub fn is_image_video_gif(path: &str) -> bool {
    match MimeGuess::from_path(path).first() {
        Some(mime) => mime.type_() == mime_guess::mime::IMAGE || mime.type_() == mime_guess::mime::VIDEO,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_detection() {
        assert!(is_image_video_gif("/dcim/IMG_0001.JPG"));
        assert!(is_image_video_gif("/dcim/clip.mp4"));
        assert!(is_image_video_gif("/dcim/anim.gif"));
        assert!(!is_image_video_gif("/docs/notes.txt"));
        assert!(!is_image_video_gif("/docs/no_extension"));
    }

    #[test]
    fn test_mime_hint_falls_back() {
        assert_eq!(mime_hint("/a/b.png"), "image/png");
        assert_eq!(mime_hint("/a/b"), FALLBACK_MIME);
    }
}
