//! Canonical download links and their mirror form.
//!
//! Only `https://gamebanana.com/mmdl/<digits>` is accepted as a download
//! link. The mirror form is `<public base>/<digits>.zip`.

use once_cell::sync::Lazy;
use regex_lite::Regex;

const CANONICAL_PREFIX: &str = "https://gamebanana.com/mmdl/";

static CANONICAL_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://gamebanana\.com/mmdl/([0-9]+)$").expect("valid regex"));

pub fn canonical_url(file_id: u64) -> String {
    format!("{}{}", CANONICAL_PREFIX, file_id)
}

pub fn is_canonical(url: &str) -> bool {
    CANONICAL_URL.is_match(url)
}

/// Numeric file id of a canonical download link.
pub fn file_id_of(url: &str) -> Option<u64> {
    CANONICAL_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Mirror URL for a canonical link; `None` for non-conforming links.
pub fn to_mirror_url(base: &str, url: &str) -> Option<String> {
    file_id_of(url).map(|id| format!("{}/{}.zip", base.trim_end_matches('/'), id))
}

/// Inverse of [`to_mirror_url`].
pub fn from_mirror_url(base: &str, mirror_url: &str) -> Option<String> {
    let prefix = format!("{}/", base.trim_end_matches('/'));
    let id = mirror_url.strip_prefix(&prefix)?.strip_suffix(".zip")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}{}", CANONICAL_PREFIX, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://mirror.example.org/banana-mirror";

    #[test]
    fn test_canonical_pattern() {
        assert!(is_canonical("https://gamebanana.com/mmdl/484937"));
        assert!(!is_canonical("https://gamebanana.com/dl/484937"));
        assert!(!is_canonical("http://gamebanana.com/mmdl/484937"));
        assert!(!is_canonical("https://gamebanana.com/mmdl/48a937"));
        assert!(!is_canonical("https://gamebanana.com/mmdl/"));
    }

    #[test]
    fn test_file_id() {
        assert_eq!(file_id_of("https://gamebanana.com/mmdl/12"), Some(12));
        assert_eq!(file_id_of("https://example.com/mmdl/12"), None);
    }

    #[test]
    fn test_mirror_round_trip() {
        for id in [1u64, 42, 484937, 1_234_567_890] {
            let url = canonical_url(id);
            let mirror = to_mirror_url(BASE, &url).unwrap();
            assert_eq!(mirror, format!("{}/{}.zip", BASE, id));
            assert_eq!(from_mirror_url(BASE, &mirror).unwrap(), url);
            assert_eq!(file_id_of(&from_mirror_url(BASE, &mirror).unwrap()), Some(id));
        }
    }

    #[test]
    fn test_trailing_slash_base() {
        let mirror = to_mirror_url("https://m.example/x/", "https://gamebanana.com/mmdl/5").unwrap();
        assert_eq!(mirror, "https://m.example/x/5.zip");
    }

    #[test]
    fn test_non_canonical_has_no_mirror() {
        assert!(to_mirror_url(BASE, "https://example.com/mod.zip").is_none());
        assert!(from_mirror_url(BASE, "https://elsewhere.org/5.zip").is_none());
        assert!(from_mirror_url(BASE, &format!("{}/abc.zip", BASE)).is_none());
    }
}
