//! Content addressing for regions
//!
//! A region's identity is the hex BLAKE3 digest of its normalized content.
//! It doubles as the cache key and the artifact file stem.

use crate::region::{Region, RegionKind};

/// Hash arbitrary content into a 64 character hex identity
pub fn hash_content(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Identity of a fence body: its lines joined and trimmed
pub fn fence_identity<S: AsRef<str>>(lines: &[S]) -> String {
    hash_content(fence_body(lines).as_str())
}

/// Identity of a file reference: the raw path string
pub fn file_identity(path: &str) -> String {
    hash_content(path)
}

/// Recompute the identity of a region from its fields
pub fn identity(region: &Region) -> String {
    match (&region.kind, &region.file_path, &region.content) {
        (RegionKind::File, Some(path), _) => file_identity(path),
        (_, _, Some(lines)) => fence_identity(lines),
        _ => hash_content(""),
    }
}

/// Normalized fence body used for hashing and rendering
pub fn fence_body<S: AsRef<str>>(lines: &[S]) -> String {
    let joined = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    joined.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_256() {
        let id = hash_content("x^2");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash_content("x^2"), hash_content("x^2"));
        assert_ne!(hash_content("x^2"), hash_content("x^3"));
    }

    #[test]
    fn test_fence_identity_ignores_outer_whitespace() {
        let a = fence_identity(&["", "  x^2", ""]);
        let b = fence_identity(&["x^2  "]);
        assert_eq!(a, b);
        assert_eq!(a, hash_content("x^2"));
    }

    #[test]
    fn test_fence_identity_keeps_inner_whitespace() {
        let a = fence_identity(&["a", "b"]);
        let b = fence_identity(&["a", "", "b"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_identity_uses_raw_path() {
        assert_eq!(file_identity("fig.plt"), hash_content("fig.plt"));
        assert_ne!(file_identity("fig.plt"), file_identity("./fig.plt"));
    }
}
