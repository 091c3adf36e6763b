//! File extension from a media URL path.

/// Extension used when the URL path has none.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Lowercase extension of the last path segment of `url` (query and fragment ignored).
/// Falls back to [`DEFAULT_EXTENSION`] when there is no usable suffix.
pub fn extension_from_url(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or("");
    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal() {
        assert_eq!(extension_from_url("https://cdn.example.test/a/b/aula-07.MP3"), "mp3");
        assert_eq!(extension_from_url("https://cdn.example.test/livro.pdf?token=abc"), "pdf");
        assert_eq!(extension_from_url("https://cdn.example.test/x.tar.gz"), "gz");
    }

    #[test]
    fn dots_in_directories_do_not_count() {
        assert_eq!(extension_from_url("https://cdn.example.test/v1.2/file"), "bin");
    }

    #[test]
    fn missing_or_odd() {
        assert_eq!(extension_from_url("https://cdn.example.test/"), "bin");
        assert_eq!(extension_from_url("https://cdn.example.test/download"), "bin");
        assert_eq!(extension_from_url("https://cdn.example.test/.hidden"), "bin");
        assert_eq!(extension_from_url("https://cdn.example.test/a.b%20c"), "bin");
    }

    #[test]
    fn in_flight_suffix_is_never_an_extension() {
        assert_eq!(extension_from_url("https://cdn.example.test/a.mp3.cof-part"), "bin");
        assert_eq!(extension_from_url("https://cdn.example.test/cap.part"), "part");
    }
}
