//! Content hashing for the patching client.
//!
//! A `Digest` is a fixed-width 20-byte SHA-1 value — the same width the
//! original IcePatch2 client uses for both per-file and per-node/root
//! checksums. `hash_sequence` is the folding primitive: it feeds a series of
//! byte slices into one hasher in order, so a directory's rolled-up digest
//! and the tree's root digest are both plain applications of it.

use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Fixed-width content digest.
pub type Digest = [u8; 20];

/// Canonical all-zero digest used for directory entries and empty subtrees.
pub const ZERO_DIGEST: Digest = [0u8; 20];

const STREAM_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("reading `{path}` for hashing: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid digest hex `{0}`")]
    InvalidHex(String),
}

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> Digest {
    use sha1::{Digest as _, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash a file's full content, streaming so large files don't need to be
/// read entirely into memory.
pub fn hash_file(path: &Path) -> Result<Digest, HashError> {
    use sha1::{Digest as _, Sha1};

    let mut file = std::fs::File::open(path).map_err(|e| HashError::Io {
        path: path.to_string_lossy().into_owned(),
        source: e,
    })?;

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| HashError::Io {
            path: path.to_string_lossy().into_owned(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Fold a sequence of byte slices into a single digest by feeding each one,
/// in order, into one hasher. Used both to roll up a bucket's entries and to
/// fold the 256 bucket digests into the root digest.
pub fn hash_sequence<'a, I>(items: I) -> Digest
where
    I: IntoIterator<Item = &'a [u8]>,
{
    use sha1::{Digest as _, Sha1};
    let mut hasher = Sha1::new();
    for item in items {
        hasher.update(item);
    }
    hasher.finalize().into()
}

/// Format a digest as lowercase hex.
pub fn to_hex(digest: &Digest) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a 40-char hex string into a digest.
pub fn from_hex(hex: &str) -> Result<Digest, HashError> {
    if hex.len() != 40 {
        return Err(HashError::InvalidHex(hex.to_string()));
    }
    let mut out = [0u8; 20];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).map_err(|_| HashError::InvalidHex(hex.to_string()))?;
        out[i] = u8::from_str_radix(s, 16).map_err(|_| HashError::InvalidHex(hex.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_hash_is_deterministic() {
        assert_eq!(hash_bytes(b""), hash_bytes(b""));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(hash_bytes(b"foo"), hash_bytes(b"bar"));
    }

    #[test]
    fn hash_sequence_is_order_sensitive() {
        let a: Digest = hash_sequence([b"foo".as_slice(), b"bar".as_slice()]);
        let b: Digest = hash_sequence([b"bar".as_slice(), b"foo".as_slice()]);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_sequence_of_nothing_is_stable() {
        let empty_items: [&[u8]; 0] = [];
        assert_eq!(hash_sequence(empty_items), hash_sequence(empty_items));
    }

    #[test]
    fn hex_round_trip() {
        let d = hash_bytes(b"hello patchkit");
        let hex = to_hex(&d);
        assert_eq!(hex.len(), 40);
        assert_eq!(from_hex(&hex).unwrap(), d);
    }

    #[test]
    fn hash_file_matches_hash_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"hello world").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"hello world"));
    }

    #[test]
    fn hash_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt");
        assert!(hash_file(&missing).is_err());
    }

    proptest! {
        #[test]
        fn hash_bytes_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            prop_assert_eq!(hash_bytes(&data), hash_bytes(&data));
        }

        #[test]
        fn hex_round_trip_prop(data in proptest::collection::vec(any::<u8>(), 0..=1024)) {
            let d = hash_bytes(&data);
            prop_assert_eq!(from_hex(&to_hex(&d)).unwrap(), d);
        }
    }
}
