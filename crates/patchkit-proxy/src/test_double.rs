//! An in-memory `FileServerProxy` double for tests, backed by a plain map
//! instead of a mock framework since the surface here is data, not behavior.
//!
//! The real bzip2 codec lives behind the transport this crate doesn't own,
//! so this double treats the "compressed" wire representation as identical
//! to the file's raw bytes. Tests that exercise the decompression worker use
//! a matching identity codec so round trips still validate the pipeline
//! wiring, just not real bzip2.

use crate::proxy::FileServerProxy;
use patchkit_core::PatchError;
use patchkit_hash::{hash_bytes, Digest};
use patchkit_tree::{build_tree0, FileInfo, FileInfoSeq};
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryFileServer {
    state: RwLock<ServerState>,
}

struct ServerState {
    entries: FileInfoSeq,
    contents: HashMap<String, Vec<u8>>,
}

impl InMemoryFileServer {
    pub fn new() -> Self {
        InMemoryFileServer {
            state: RwLock::new(ServerState {
                entries: FileInfoSeq::empty(),
                contents: HashMap::new(),
            }),
        }
    }

    /// Adds `path`, and — matching what a real `scan_tree` over a served
    /// root directory would also report — a directory entry for every
    /// ancestor of `path` that doesn't already have one.
    pub fn put_file(&self, path: &str, content: Vec<u8>, executable: bool) {
        let mut state = self.state.write().unwrap();
        let info = FileInfo {
            path: path.to_string(),
            checksum: hash_bytes(&content),
            size: content.len() as i64,
            executable,
        };
        state.contents.insert(path.to_string(), content);
        let mut items: Vec<FileInfo> = state
            .entries
            .iter()
            .filter(|f| f.path != path)
            .cloned()
            .collect();
        items.push(info);
        for ancestor in ancestors(path) {
            if !items.iter().any(|f| f.path == ancestor) {
                items.push(FileInfo::directory(ancestor));
            }
        }
        state.entries = FileInfoSeq::sort_and_dedup(items);
    }

    pub fn put_directory(&self, path: &str) {
        let mut state = self.state.write().unwrap();
        let mut items: Vec<FileInfo> = state
            .entries
            .iter()
            .filter(|f| f.path != path)
            .cloned()
            .collect();
        items.push(FileInfo::directory(path));
        state.entries = FileInfoSeq::sort_and_dedup(items);
    }

    pub fn remove(&self, path: &str) {
        let mut state = self.state.write().unwrap();
        state.contents.remove(path);
        let items: Vec<FileInfo> = state
            .entries
            .iter()
            .filter(|f| f.path != path)
            .cloned()
            .collect();
        state.entries = FileInfoSeq::sort_and_dedup(items);
    }

    pub fn entries(&self) -> FileInfoSeq {
        self.state.read().unwrap().entries.clone()
    }
}

impl Default for InMemoryFileServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileServerProxy for InMemoryFileServer {
    fn get_root_checksum(&self) -> Result<Digest, PatchError> {
        let state = self.state.read().unwrap();
        Ok(build_tree0(&state.entries).checksum)
    }

    fn get_bucket_checksums(&self) -> Result<Vec<Digest>, PatchError> {
        let state = self.state.read().unwrap();
        let tree = build_tree0(&state.entries);
        Ok(tree.nodes.iter().map(|n| n.checksum).collect())
    }

    fn get_bucket_files(&self, bucket: u8) -> Result<FileInfoSeq, PatchError> {
        let state = self.state.read().unwrap();
        let tree = build_tree0(&state.entries);
        Ok(FileInfoSeq::sort_and_dedup(
            tree.bucket(bucket).files.clone(),
        ))
    }

    fn get_file_compressed(
        &self,
        path: &str,
        offset: i64,
        max_bytes: i64,
    ) -> Result<Vec<u8>, PatchError> {
        let state = self.state.read().unwrap();
        let content = state.contents.get(path).ok_or_else(|| PatchError::ServerError {
            path: path.to_string(),
            reason: "no such file".into(),
        })?;

        let offset = offset.max(0) as usize;
        if offset >= content.len() {
            return Ok(Vec::new());
        }
        let end = (offset + max_bytes.max(0) as usize).min(content.len());
        Ok(content[offset..end].to_vec())
    }

    fn get_checksum_for(&self, path: &str) -> Result<Option<Digest>, PatchError> {
        let state = self.state.read().unwrap();
        Ok(state.contents.get(path).map(|c| hash_bytes(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_checksum_reflects_content() {
        let server = InMemoryFileServer::new();
        let empty_checksum = server.get_root_checksum().unwrap();
        server.put_file("a.txt", b"hello".to_vec(), false);
        let non_empty_checksum = server.get_root_checksum().unwrap();
        assert_ne!(empty_checksum, non_empty_checksum);
    }

    #[test]
    fn bucket_checksums_has_256_entries() {
        let server = InMemoryFileServer::new();
        server.put_file("a.txt", b"x".to_vec(), false);
        assert_eq!(server.get_bucket_checksums().unwrap().len(), 256);
    }

    #[test]
    fn get_file_compressed_paginates() {
        let server = InMemoryFileServer::new();
        server.put_file("a.txt", b"hello world".to_vec(), false);
        let part1 = server.get_file_compressed("a.txt", 0, 5).unwrap();
        assert_eq!(part1, b"hello");
        let part2 = server.get_file_compressed("a.txt", 5, 100).unwrap();
        assert_eq!(part2, b" world");
        let eof = server.get_file_compressed("a.txt", 11, 100).unwrap();
        assert!(eof.is_empty());
    }
}
