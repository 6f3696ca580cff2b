//! Content fingerprints for dataset files.
//!
//! Reports record the fingerprint of every shard they were computed from so
//! two runs can be checked against the same data.

/// FNV-1a 64-bit hash of `data`, as 16 hex digits.
#[must_use]
pub fn compute_checksum_bytes(data: &[u8]) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }

    format!("{hash:016x}")
}

/// Combine several fingerprints (images file, labels file) into one.
#[must_use]
pub fn combine_checksums(parts: &[&str]) -> String {
    compute_checksum_bytes(parts.join(":").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_bytes() {
        let checksum = compute_checksum_bytes(b"hello world");
        assert_eq!(checksum.len(), 16);
        assert_eq!(checksum, compute_checksum_bytes(b"hello world"));
        assert_ne!(checksum, compute_checksum_bytes(b"hello world!"));
    }

    #[test]
    fn test_checksum_empty_is_offset_basis() {
        assert_eq!(compute_checksum_bytes(b""), "cbf29ce484222325");
    }

    #[test]
    fn test_combine_is_order_sensitive() {
        let a = compute_checksum_bytes(b"images");
        let b = compute_checksum_bytes(b"labels");
        assert_ne!(combine_checksums(&[&a, &b]), combine_checksums(&[&b, &a]));
    }
}
