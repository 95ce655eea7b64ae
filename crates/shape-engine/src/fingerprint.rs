//! Shape fragment fingerprints.
//!
//! Generates stable 32-bit fingerprints over the ordered key-name list and
//! the ordered `name:type` property list of a shape fragment. The fingerprint
//! is order-sensitive: `["a", "b"]` and `["b", "a"]` hash differently.
//!
//! A fingerprint of zero means "unknown". Recognition then falls back to the
//! string-subset path, which costs a few comparisons and nothing else.

use crc32fast::Hasher;
use shapesink_core::ShapeFragment;

/// Compute a fingerprint over an ordered list of strings.
///
/// Each item is terminated with a NUL byte so that item boundaries
/// contribute to the hash (`["ab"]` differs from `["a", "b"]`).
fn fingerprint_of<S: AsRef<str>>(items: &[S]) -> u32 {
    let mut hasher = Hasher::new();
    for item in items {
        hasher.update(item.as_ref().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

/// Fingerprint of a fragment's ordered key-name list.
pub fn key_names_fingerprint<S: AsRef<str>>(key_names: &[S]) -> u32 {
    fingerprint_of(key_names)
}

/// Fingerprint of a fragment's ordered `name:type` property list.
pub fn property_fingerprint<S: AsRef<str>>(properties: &[S]) -> u32 {
    fingerprint_of(properties)
}

/// Fill in any missing fingerprint on a fragment.
///
/// Idempotent: a non-zero fingerprint (typically precomputed upstream) is
/// left untouched; a zero one is recomputed from the fragment's lists.
pub fn ensure_hashes(fragment: &mut ShapeFragment) {
    if fragment.key_names_hash == 0 {
        fragment.key_names_hash = key_names_fingerprint(&fragment.key_names);
    }
    if fragment.property_hash == 0 {
        fragment.property_hash = property_fingerprint(&fragment.properties);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let keys = vec!["id".to_string(), "region".to_string()];
        assert_eq!(key_names_fingerprint(&keys), key_names_fingerprint(&keys));
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let ab = vec!["a", "b"];
        let ba = vec!["b", "a"];
        assert_ne!(key_names_fingerprint(&ab), key_names_fingerprint(&ba));
    }

    #[test]
    fn fingerprint_sees_item_boundaries() {
        let joined = vec!["ab"];
        let split = vec!["a", "b"];
        assert_ne!(
            property_fingerprint(&joined),
            property_fingerprint(&split)
        );
    }

    #[test]
    fn ensure_hashes_computes_missing_values() {
        let mut fragment = ShapeFragment {
            key_names: vec!["id".into()],
            properties: vec!["id:integer".into(), "name:string".into()],
            key_names_hash: 0,
            property_hash: 0,
        };
        ensure_hashes(&mut fragment);
        assert_ne!(fragment.key_names_hash, 0);
        assert_ne!(fragment.property_hash, 0);
    }

    #[test]
    fn ensure_hashes_keeps_upstream_values() {
        let mut fragment = ShapeFragment {
            key_names: vec!["id".into()],
            properties: vec!["id:integer".into()],
            key_names_hash: 123,
            property_hash: 456,
        };
        ensure_hashes(&mut fragment);
        assert_eq!(fragment.key_names_hash, 123);
        assert_eq!(fragment.property_hash, 456);
    }

    #[test]
    fn same_bytes_same_value_across_calls() {
        let mut a = ShapeFragment {
            key_names: vec!["id".into()],
            properties: vec!["id:integer".into()],
            ..Default::default()
        };
        let mut b = a.clone();
        ensure_hashes(&mut a);
        ensure_hashes(&mut b);
        assert_eq!(a.key_names_hash, b.key_names_hash);
        assert_eq!(a.property_hash, b.property_hash);
    }
}
