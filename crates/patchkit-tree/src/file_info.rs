//! `FileInfo` / `FileInfoSeq`: the manifest record for one filesystem entry
//! and the sorted, de-duplicated sequence of them.

use patchkit_core::PatchError;
use patchkit_hash::{Digest, ZERO_DIGEST};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sentinel size meaning "this entry is a directory".
pub const DIRECTORY_SIZE: i64 = -1;

/// A manifest record for a single filesystem entry.
///
/// Total ordering is by `path` lexicographically (see `FileInfo::path_cmp`);
/// equality is by all fields, matching the original `FileInfoLess` /
/// `FileInfoEqual` functors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Relative path from the data directory, forward-slash separated,
    /// never starting with `/`.
    pub path: String,
    /// Fixed-width content digest; all-zero for directories.
    pub checksum: Digest,
    /// `-1` directory, `0` empty regular file, `>0` non-empty regular file.
    pub size: i64,
    /// Execute-bit hint applied on extraction.
    pub executable: bool,
}

impl FileInfo {
    pub fn directory(path: impl Into<String>) -> Self {
        FileInfo {
            path: path.into(),
            checksum: ZERO_DIGEST,
            size: DIRECTORY_SIZE,
            executable: false,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.size < 0
    }

    /// Byte serialization fed into `hash_sequence` when folding a bucket's
    /// digest: `path || size (big-endian 8 bytes) || checksum`.
    pub fn serialize_for_hash(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.path.len() + 8 + self.checksum.len());
        out.extend_from_slice(self.path.as_bytes());
        out.extend_from_slice(&self.size.to_be_bytes());
        out.extend_from_slice(&self.checksum);
        out
    }
}

/// Order `FileInfo` by `path` only — entries are otherwise unordered.
impl PartialOrd for FileInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// A sorted, de-duplicated sequence of `FileInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileInfoSeq(Vec<FileInfo>);

impl FileInfoSeq {
    pub fn empty() -> Self {
        FileInfoSeq(Vec::new())
    }

    /// Construct from data already sorted and unique by `path`; errors with
    /// `ManifestUnavailable` otherwise. The manifest store / orchestrator
    /// layers treat that as recoverable and report it through the feedback
    /// channel rather than aborting outright.
    pub fn from_sorted(items: Vec<FileInfo>) -> Result<Self, PatchError> {
        for w in items.windows(2) {
            match w[0].path.cmp(&w[1].path) {
                Ordering::Less => {}
                Ordering::Equal => {
                    return Err(PatchError::ManifestUnavailable {
                        reason: format!("duplicate path `{}`", w[1].path),
                    })
                }
                Ordering::Greater => {
                    return Err(PatchError::ManifestUnavailable {
                        reason: format!(
                            "manifest is not sorted: `{}` precedes `{}`",
                            w[0].path, w[1].path
                        ),
                    })
                }
            }
        }
        Ok(FileInfoSeq(items))
    }

    /// Sort and drop adjacent duplicates (by full equality), as the
    /// reconciler does defensively with a freshly fetched remote bucket.
    pub fn sort_and_dedup(mut items: Vec<FileInfo>) -> Self {
        items.sort();
        items.dedup();
        FileInfoSeq(items)
    }

    pub fn as_slice(&self) -> &[FileInfo] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<FileInfo> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileInfo> {
        self.0.iter()
    }

    /// `self - other` by path alone: an entry is dropped as soon as `other`
    /// has any entry at the same path, regardless of content. Used to fold
    /// already-removed (by path) entries out of `local_files`/`remove_set`
    /// once their path is gone from disk — content no longer matters there.
    /// Reconciliation itself must *not* use this; see `difference_by_content`.
    pub fn difference(&self, other: &FileInfoSeq) -> Vec<FileInfo> {
        set_difference(&self.0, &other.0)
    }

    /// `self - other`, tie-broken by content instead of path alone: an entry
    /// is kept unless `other` has the *same path and checksum*. Mirrors the
    /// original `IcePatch2::FileInfoLess` order (path, then checksum), which
    /// is what `reconcile` needs — a file whose content changed but whose
    /// path didn't must show up as "present in local, absent from remote"
    /// and vice versa, not cancel out as unchanged.
    pub fn difference_by_content(&self, other: &FileInfoSeq) -> Vec<FileInfo> {
        let other_keys: std::collections::HashSet<(&str, Digest)> = other
            .0
            .iter()
            .map(|f| (f.path.as_str(), f.checksum))
            .collect();
        self.0
            .iter()
            .filter(|f| !other_keys.contains(&(f.path.as_str(), f.checksum)))
            .cloned()
            .collect()
    }

    /// `self ∪ other`, result sorted and unique by path (the other side
    /// wins ties, matching `set_union`'s "prefer first range" semantics
    /// being irrelevant here since members are disjoint in practice).
    pub fn union(&self, other: &FileInfoSeq) -> FileInfoSeq {
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        let mut a = self.0.iter().peekable();
        let mut b = other.0.iter().peekable();
        loop {
            match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => match x.path.cmp(&y.path) {
                    Ordering::Less => out.push((*a.next().unwrap()).clone()),
                    Ordering::Greater => out.push((*b.next().unwrap()).clone()),
                    Ordering::Equal => {
                        out.push((*b.next().unwrap()).clone());
                        a.next();
                    }
                },
                (Some(_), None) => out.push((*a.next().unwrap()).clone()),
                (None, Some(_)) => out.push((*b.next().unwrap()).clone()),
                (None, None) => break,
            }
        }
        FileInfoSeq(out)
    }
}

/// Both inputs must already be sorted by path (callers always hold that
/// invariant); adjacent-duplicate safe.
fn set_difference(a: &[FileInfo], b: &[FileInfo]) -> Vec<FileInfo> {
    let mut out = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() {
        if j >= b.len() || a[i].path < b[j].path {
            out.push(a[i].clone());
            i += 1;
        } else if a[i].path == b[j].path {
            i += 1;
            j += 1;
        } else {
            j += 1;
        }
    }
    out
}
