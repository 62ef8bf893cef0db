use dupecat::scanner::{Fingerprinter, HashError, HashPolicy, HashTier};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;

fn small_policy() -> HashPolicy {
    HashPolicy {
        full_max_size: 64,
        sample_max_size: 4096,
        sample_count: 4,
        window_size: 16,
        stream_threshold: 1024,
    }
}

fn file_with(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn test_tier_selection_by_size() {
    let dir = TempDir::new().unwrap();
    let fp = Fingerprinter::new(small_policy());

    for (len, tier) in [(0, HashTier::Full), (64, HashTier::Full), (65, HashTier::Sampled), (4096, HashTier::Sampled), (4097, HashTier::Quick)] {
        let path = file_with(&dir, &format!("f{len}"), &patterned(len, 1));
        let result = fp.fingerprint(&path, len as u64).unwrap();
        assert_eq!(result.tier, tier, "size {len}");
        assert_eq!(result.hex.len(), 64);
        assert!(result.hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

#[test]
fn test_full_tier_matches_blake3_of_content() {
    let dir = TempDir::new().unwrap();
    let content = b"hello dupecat";
    let path = file_with(&dir, "a", content);

    let result = Fingerprinter::new(small_policy())
        .fingerprint(&path, content.len() as u64)
        .unwrap();

    assert_eq!(result.hex, blake3::hash(content).to_hex().to_string());
}

#[test]
fn test_mmap_and_streaming_agree_with_in_memory() {
    let dir = TempDir::new().unwrap();
    let content = patterned(3000, 9);
    let path = file_with(&dir, "big", &content);
    let expected = blake3::hash(&content).to_hex().to_string();

    // 3000 bytes: above full_max (64) and above stream_threshold (1024).
    let streamed = Fingerprinter::new(small_policy())
        .full_hash(&path, content.len() as u64)
        .unwrap();
    assert_eq!(streamed, expected);

    let mapped = Fingerprinter::new(HashPolicy {
        stream_threshold: 1 << 20,
        ..small_policy()
    })
    .full_hash(&path, content.len() as u64)
    .unwrap();
    assert_eq!(mapped, expected);
}

#[test]
fn test_same_size_different_content_differs_in_every_tier() {
    let dir = TempDir::new().unwrap();
    let fp = Fingerprinter::new(small_policy());

    for len in [32_usize, 1000, 8000] {
        let a = file_with(&dir, &format!("a{len}"), &patterned(len, 1));
        let b = file_with(&dir, &format!("b{len}"), &patterned(len, 2));
        let ha = fp.fingerprint(&a, len as u64).unwrap();
        let hb = fp.fingerprint(&b, len as u64).unwrap();
        assert_eq!(ha.tier, hb.tier);
        assert_ne!(ha.hex, hb.hex, "size {len}");
    }
}

#[test]
fn test_sampled_hash_is_seeded_with_size() {
    let dir = TempDir::new().unwrap();
    let fp = Fingerprinter::new(small_policy());
    let path = file_with(&dir, "s", &patterned(1000, 3));

    let as_recorded = fp.sampled_hash(&path, 1000).unwrap();
    let other_size = fp.sampled_hash(&path, 999).unwrap();

    assert_ne!(as_recorded, other_size);
}

#[test]
fn test_quick_hash_ignores_middle_bytes() {
    let dir = TempDir::new().unwrap();
    let fp = Fingerprinter::new(small_policy());
    let mut a = patterned(8000, 5);
    let mut b = a.clone();
    b[4000] ^= 0xFF;
    let pa = file_with(&dir, "a", &a);
    let pb = file_with(&dir, "b", &b);

    assert_eq!(fp.quick_hash(&pa, 8000).unwrap(), fp.quick_hash(&pb, 8000).unwrap());

    // The tail window is covered.
    a[7999] ^= 0xFF;
    fs::write(&pa, &a).unwrap();
    assert_ne!(fp.quick_hash(&pa, 8000).unwrap(), fp.quick_hash(&pb, 8000).unwrap());
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let result = Fingerprinter::new(small_policy()).fingerprint(&dir.path().join("gone"), 10);
    assert!(matches!(result, Err(HashError::NotFound(_))));
}

#[test]
fn test_streaming_hash_stops_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let content = patterned(5000, 7);
    let path = file_with(&dir, "big", &content);

    let fp = Fingerprinter::new(small_policy()).with_shutdown_flag(Arc::new(AtomicBool::new(true)));
    let result = fp.full_hash(&path, content.len() as u64);

    assert!(matches!(result, Err(HashError::Interrupted(_))));
}
