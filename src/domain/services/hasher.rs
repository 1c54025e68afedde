//! Hasher — streaming MD5 + SHA-256 over a byte range of a Block source
//! (spec §4.C), required for the Validator's dedup key and for
//! post-extraction verification.

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::domain::repositories::{BlockSource, BlockSourceError};

/// Bytes read per `read_at` call while streaming a hash over a source range;
/// bounds memory regardless of the declared candidate size.
const HASH_WINDOW: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DigestPair {
    pub md5: String,
    pub sha256: String,
}

/// Hashes `len` bytes starting at `offset` of `source`, one bounded window
/// at a time, without materializing the whole range in memory.
pub fn hash_range<S: BlockSource + ?Sized>(
    source: &S,
    offset: u64,
    len: u64,
) -> Result<DigestPair, BlockSourceError> {
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();

    let mut remaining = len;
    let mut pos = offset;
    while remaining > 0 {
        let want = remaining.min(HASH_WINDOW as u64) as usize;
        let chunk = source.read_at(pos, want)?;
        if chunk.is_empty() {
            break;
        }
        md5.update(&chunk);
        sha256.update(&chunk);
        pos += chunk.len() as u64;
        remaining -= chunk.len() as u64;
    }

    Ok(DigestPair {
        md5: hex::encode(md5.finalize()),
        sha256: hex::encode(sha256.finalize()),
    })
}

/// Hashes an in-memory buffer directly (used by the Carver, which already
/// holds the candidate's bytes in a chunk buffer, and by the Extractor's
/// post-write reverification).
pub fn hash_bytes(data: &[u8]) -> DigestPair {
    let mut md5 = Md5::new();
    md5.update(data);
    let mut sha256 = Sha256::new();
    sha256.update(data);
    DigestPair {
        md5: hex::encode(md5.finalize()),
        sha256: hex::encode(sha256.finalize()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_matches_known_vectors() {
        let digest = hash_bytes(b"");
        assert_eq!(digest.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            digest.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
