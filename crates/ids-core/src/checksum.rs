use crate::error::{IdsError, Result};
use crate::registry::CHECKSUM_ALGORITHM;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Algorithm-prefixed digest of `bytes`, e.g. `sha256:9f86d0…`.
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{CHECKSUM_ALGORITHM}:{:x}", Sha256::digest(bytes))
}

/// Digest the file at `path`. Read failures surface as `ChecksumFailed` so
/// callers can report them per entity.
pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| IdsError::ChecksumFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(digest_bytes(&bytes))
}

/// Compare a stored checksum against a fresh one. A stored value without an
/// algorithm prefix is compared on the hex part alone.
pub fn matches(stored: &str, computed: &str) -> bool {
    if stored == computed {
        return true;
    }
    match (stored.split_once(':'), computed.split_once(':')) {
        (None, Some((_, hex))) => stored.eq_ignore_ascii_case(hex),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn digest_is_prefixed_sha256() {
        assert_eq!(
            digest_bytes(b"test"),
            "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn digest_file_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = digest_file(&dir.path().join("nope.md")).unwrap_err();
        assert_eq!(err.code(), "IDS_CHECKSUM_FAILED");
    }

    #[test]
    fn unprefixed_stored_value_matches_hex() {
        let computed = digest_bytes(b"test");
        let hex = computed.split_once(':').unwrap().1;
        assert!(matches(hex, &computed));
        assert!(matches(&computed, &computed));
        assert!(!matches("sha256:deadbeef", &computed));
        assert!(!matches("", &computed));
    }
}
