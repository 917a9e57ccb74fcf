//! `FileTree0`: the two-level radix tree used for bounded-memory
//! reconciliation. 256 buckets keyed by the first byte of
//! each entry's path hash; each bucket rolls up its own digest, and the 256
//! bucket digests fold into one root digest.

use crate::file_info::{FileInfo, FileInfoSeq};
use patchkit_hash::{hash_bytes, hash_sequence, Digest};

pub const BUCKET_COUNT: usize = 256;

/// One bucket of the two-level tree: its entries (in global sort order) and
/// their rolled-up digest.
#[derive(Debug, Clone, Default)]
pub struct TreeNode {
    pub files: Vec<FileInfo>,
    pub checksum: Digest,
}

#[derive(Debug, Clone)]
pub struct FileTree0 {
    pub nodes: Vec<TreeNode>,
    pub checksum: Digest,
}

impl FileTree0 {
    pub fn bucket(&self, index: u8) -> &TreeNode {
        &self.nodes[index as usize]
    }
}

/// The bucket a path is assigned to: the first byte of `hash(path)`.
pub fn bucket_for_path(path: &str) -> u8 {
    hash_bytes(path.as_bytes())[0]
}

/// Build a `FileTree0` from a `FileInfoSeq`. Pure function of the sequence's
/// ordered content — two manifests with identical content always produce an
/// identical `checksum`.
pub fn build_tree0(seq: &FileInfoSeq) -> FileTree0 {
    let mut nodes: Vec<TreeNode> = (0..BUCKET_COUNT).map(|_| TreeNode::default()).collect();

    for entry in seq.iter() {
        let bucket = bucket_for_path(&entry.path) as usize;
        nodes[bucket].files.push(entry.clone());
    }

    for node in nodes.iter_mut() {
        let serialized: Vec<Vec<u8>> = node.files.iter().map(|f| f.serialize_for_hash()).collect();
        let refs: Vec<&[u8]> = serialized.iter().map(|v| v.as_slice()).collect();
        node.checksum = hash_sequence(refs);
    }

    let bucket_digests: Vec<&[u8]> = nodes.iter().map(|n| n.checksum.as_slice()).collect();
    let checksum = hash_sequence(bucket_digests);

    FileTree0 { nodes, checksum }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_info::FileInfo;
    use patchkit_hash::ZERO_DIGEST;
    use proptest::prelude::*;

    fn info(path: &str) -> FileInfo {
        FileInfo {
            path: path.into(),
            checksum: ZERO_DIGEST,
            size: 0,
            executable: false,
        }
    }

    #[test]
    fn empty_seq_has_stable_checksum() {
        let t1 = build_tree0(&FileInfoSeq::empty());
        let t2 = build_tree0(&FileInfoSeq::empty());
        assert_eq!(t1.checksum, t2.checksum);
        assert_eq!(t1.nodes.len(), BUCKET_COUNT);
    }

    #[test]
    fn identical_content_identical_checksum() {
        let seq1 = FileInfoSeq::sort_and_dedup(vec![info("a"), info("b"), info("c")]);
        let seq2 = FileInfoSeq::sort_and_dedup(vec![info("c"), info("b"), info("a")]);
        assert_eq!(build_tree0(&seq1).checksum, build_tree0(&seq2).checksum);
    }

    #[test]
    fn different_content_different_checksum() {
        let seq1 = FileInfoSeq::sort_and_dedup(vec![info("a")]);
        let seq2 = FileInfoSeq::sort_and_dedup(vec![info("a"), info("b")]);
        assert_ne!(build_tree0(&seq1).checksum, build_tree0(&seq2).checksum);
    }

    #[test]
    fn bucket_partitioning_preserves_all_entries() {
        let items: Vec<_> = (0..500).map(|i| info(&format!("file-{i}"))).collect();
        let seq = FileInfoSeq::sort_and_dedup(items);
        let tree = build_tree0(&seq);
        let total: usize = tree.nodes.iter().map(|n| n.files.len()).sum();
        assert_eq!(total, seq.len());
    }

    #[test]
    fn bucket_order_matches_global_sort_order() {
        let items: Vec<_> = (0..200).map(|i| info(&format!("f{i}"))).collect();
        let seq = FileInfoSeq::sort_and_dedup(items);
        let tree = build_tree0(&seq);
        for node in &tree.nodes {
            for w in node.files.windows(2) {
                assert!(w[0].path < w[1].path);
            }
        }
    }

    proptest! {
        #[test]
        fn checksum_is_pure_function_of_ordered_content(
            paths in proptest::collection::vec("[a-z]{1,8}", 0..30)
        ) {
            let mut items: Vec<FileInfo> = paths.iter().map(|p| info(p)).collect();
            items.sort();
            items.dedup();
            let seq = FileInfoSeq::from_sorted(items).unwrap();
            let t1 = build_tree0(&seq);
            let t2 = build_tree0(&seq);
            prop_assert_eq!(t1.checksum, t2.checksum);
        }
    }
}
