//! Shared text patterns.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `data:image/<kind>;base64,` prefix of an inline image.
    pub static ref DATA_URI_PATTERN: Regex = Regex::new(r"^data:image/\w+;base64,").unwrap();

    /// Absolute http(s) URL.
    pub static ref REMOTE_URL_PATTERN: Regex = Regex::new(r"^https?://").unwrap();
}

/// Strip a data URI prefix, leaving the base64 payload.
pub fn strip_data_uri(image: &str) -> &str {
    match DATA_URI_PATTERN.find(image) {
        Some(m) => &image[m.end()..],
        None => image,
    }
}

/// Whether `image` should be downloaded rather than decoded inline.
pub fn is_remote_url(image: &str) -> bool {
    REMOTE_URL_PATTERN.is_match(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_uri("data:image/png;base64,QkJC"), "QkJC");
        assert_eq!(strip_data_uri("AAAA"), "AAAA");
    }

    #[test]
    fn test_is_remote_url() {
        assert!(is_remote_url("https://images.example.com/face.jpg"));
        assert!(is_remote_url("http://localhost/face.jpg"));
        assert!(!is_remote_url("data:image/jpeg;base64,AAAA"));
    }
}
