//! Object key layout and URL-to-key resolution.

use url::Url;

use crate::error::{StorageError, StorageResult};

/// Prefix for uploaded X-ray images.
pub const XRAY_PREFIX: &str = "xrays";

/// Key for a new X-ray upload: `xrays/{user_id}/{millis}.jpg`.
pub fn xray_key(user_id: &str, timestamp_ms: i64) -> String {
    format!("{}/{}/{}.jpg", XRAY_PREFIX, user_id, timestamp_ms)
}

/// Resolve the object key behind a URL handed out by the storage client.
///
/// Accepts public URLs under `public_base` and path-style S3 URLs
/// (`{endpoint}/{bucket}/{key}`, presigned or not). Query strings are ignored.
pub fn key_from_url(url: &str, bucket: &str, public_base: Option<&str>) -> StorageResult<String> {
    if let Some(base) = public_base {
        let base = base.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix(base).and_then(|r| r.strip_prefix('/')) {
            let raw = rest.split(['?', '#']).next().unwrap_or_default();
            return decode_key(raw, url);
        }
    }

    let parsed = Url::parse(url).map_err(|e| StorageError::invalid_key(format!("{}: {}", url, e)))?;

    let path = parsed.path().trim_start_matches('/');
    match path.split_once('/') {
        Some((first, rest)) if first == bucket => decode_key(rest, url),
        _ => Err(StorageError::invalid_key(format!(
            "{} is not inside bucket {}",
            url, bucket
        ))),
    }
}

fn decode_key(raw: &str, url: &str) -> StorageResult<String> {
    let key = urlencoding::decode(raw)
        .map_err(|e| StorageError::invalid_key(format!("{}: {}", url, e)))?
        .into_owned();

    if key.is_empty() {
        return Err(StorageError::invalid_key(format!("{} has no object key", url)));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xray_key_layout() {
        assert_eq!(xray_key("u1", 1_700_000_000_000), "xrays/u1/1700000000000.jpg");
    }

    #[test]
    fn test_key_from_public_url() {
        let key = key_from_url(
            "https://cdn.example.com/xrays/u1/17.jpg",
            "bucket",
            Some("https://cdn.example.com/"),
        )
        .unwrap();
        assert_eq!(key, "xrays/u1/17.jpg");
    }

    #[test]
    fn test_key_from_presigned_url() {
        let url = "http://localhost:9000/scans/xrays/u%201/17.jpg?X-Amz-Signature=abc&X-Amz-Expires=604800";
        assert_eq!(key_from_url(url, "scans", None).unwrap(), "xrays/u 1/17.jpg");
    }

    #[test]
    fn test_public_base_falls_back_to_path_style() {
        let url = "http://localhost:9000/scans/xrays/u1/17.jpg";
        let key = key_from_url(url, "scans", Some("https://cdn.example.com")).unwrap();
        assert_eq!(key, "xrays/u1/17.jpg");
    }

    #[test]
    fn test_foreign_url_rejected() {
        let err = key_from_url("https://elsewhere.io/other/x.jpg", "scans", None).unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));

        assert!(key_from_url("not a url", "scans", None).is_err());
        assert!(key_from_url("https://cdn.example.com/", "scans", Some("https://cdn.example.com")).is_err());
    }
}
