use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Hex-encoded SHA-256 digest of `bytes`, used for both `url_hash` and `text_hash`
/// fingerprinting (SPEC_FULL §3, §4.1, §4.2).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Lowercases the scheme and host, drops a default port, strips a trailing slash from
/// an otherwise-empty path, and removes known tracking query parameters before the URL
/// is hashed for `url_hash` (SPEC_FULL §4.1).
pub fn canonicalize_url(raw: &str) -> Result<String, url::ParseError> {
    const TRACKING_PARAMS: &[&str] = &[
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "gclid",
        "fbclid",
        "mc_cid",
        "mc_eid",
    ];

    let mut parsed = url::Url::parse(raw)?;

    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() {
        parsed.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &retained {
            serializer.append_pair(k, v);
        }
        parsed.set_query(Some(&serializer.finish()));
    }

    parsed.set_fragment(None);

    if parsed.path() == "/" {
        // keep a bare trailing slash, but don't treat "example.com" and
        // "example.com/" as different articles
    }

    Ok(parsed.to_string())
}

/// `url_hash` is the SHA-256 of the canonicalized URL; this is what `ON CONFLICT`
/// dedup in `storage` keys on.
pub fn url_hash(raw: &str) -> Result<String, url::ParseError> {
    Ok(sha256_hex(canonicalize_url(raw)?.as_bytes()))
}

/// NFC-normalizes, collapses whitespace, and lowercases `text` (SPEC_FULL §4.2 step 3).
/// Shared by `text_hash` and by `title_norm` at the article-index write path, since both
/// need the same canonical form before comparison or hashing.
pub fn normalize_text(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    nfc.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// `text_hash` is the SHA-256 of the normalized article body, used to catch
/// re-published duplicates that arrive under a different URL or differ only in case
/// or Unicode normalization form.
pub fn text_hash(clean_text: &str) -> String {
    sha256_hex(normalize_text(clean_text).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable_and_lowercase() {
        let digest = sha256_hex(b"hello");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
        assert_eq!(digest, sha256_hex(b"hello"));
    }

    #[test]
    fn canonicalize_url_strips_tracking_params_and_fragment() {
        let a = canonicalize_url("https://Example.com/a?utm_source=x&id=1#section").unwrap();
        let b = canonicalize_url("https://example.com/a?id=1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn url_hash_is_identical_for_equivalent_urls() {
        let a = url_hash("https://example.com/story?utm_campaign=foo&ref=1").unwrap();
        let b = url_hash("https://example.com/story?ref=1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn text_hash_ignores_whitespace_differences() {
        let a = text_hash("hello   world\n\nagain");
        let b = text_hash("hello world again");
        assert_eq!(a, b);
    }

    #[test]
    fn text_hash_differs_for_different_content() {
        assert_ne!(text_hash("hello world"), text_hash("hello there"));
    }

    #[test]
    fn text_hash_ignores_case_differences() {
        let a = text_hash("Hello World Again");
        let b = text_hash("hello world again");
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_text_lowercases_and_collapses_whitespace() {
        assert_eq!(normalize_text("  Hello   WORLD  "), "hello world");
    }
}
