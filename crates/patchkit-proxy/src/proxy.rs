//! Thin abstraction over the remote file-server RPC surface.
//! The wire transport itself is out of scope — this crate only describes
//! the shape callers depend on, the way `tcfs-storage::operator` describes
//! an `Operator` without owning the HTTP stack underneath it.

use patchkit_core::PatchError;
use patchkit_hash::Digest;
use patchkit_tree::FileInfoSeq;
use std::sync::Arc;

/// Whether a proxy handle talks to the server with wire-level compression
/// enabled. Mirrors the original's `ice_compress(bool)` toggle: reconciliation
/// traffic benefits from compression, but `get_file_compressed` payloads are
/// already bzip2-compressed, so that call is always issued on the
/// `Uncompressed` handle to avoid compressing twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Compressed,
    Uncompressed,
}

/// The remote file-server operations a `Patcher` depends on.
///
/// Implementations are expected to translate any transport/RPC failure into
/// `PatchError::ServerError { path, reason }`.
pub trait FileServerProxy: Send + Sync {
    fn get_root_checksum(&self) -> Result<Digest, PatchError>;

    /// Must return exactly `BUCKET_COUNT` digests; callers treat any other
    /// length as `ProtocolViolation`.
    fn get_bucket_checksums(&self) -> Result<Vec<Digest>, PatchError>;

    fn get_bucket_files(&self, bucket: u8) -> Result<FileInfoSeq, PatchError>;

    /// Up to `max_bytes` of the already-bzip2-compressed representation of
    /// `path`, starting at `offset`. An empty return before `offset +
    /// returned_len == size` signals a size mismatch to the caller.
    fn get_file_compressed(&self, path: &str, offset: i64, max_bytes: i64) -> Result<Vec<u8>, PatchError>;

    /// Optional diagnostic: the server's own checksum for one path.
    fn get_checksum_for(&self, _path: &str) -> Result<Option<Digest>, PatchError> {
        Ok(None)
    }
}

/// The two logical endpoints a `Patcher` holds: one with wire compression
/// enabled (used for reconciliation RPCs) and one without (used for
/// `get_file_compressed`, since that payload is already compressed).
pub struct FileServerHandles {
    pub compress: Box<dyn FileServerProxy>,
    pub no_compress: Box<dyn FileServerProxy>,
}

impl FileServerHandles {
    /// Select the handle for `mode`, so a caller picking an endpoint by
    /// `CompressionMode` (rather than by field name) has one.
    pub fn handle(&self, mode: CompressionMode) -> &dyn FileServerProxy {
        match mode {
            CompressionMode::Compressed => self.compress.as_ref(),
            CompressionMode::Uncompressed => self.no_compress.as_ref(),
        }
    }
}

/// Lets one shared proxy back both handles in `FileServerHandles` — e.g. a
/// single `Arc<InMemoryFileServer>` test double, or a single underlying RPC
/// channel an embedder toggles compression on with two cheap wrapper
/// values. Forwards every call through the shared reference.
impl<T: FileServerProxy + ?Sized> FileServerProxy for Arc<T> {
    fn get_root_checksum(&self) -> Result<Digest, PatchError> {
        (**self).get_root_checksum()
    }

    fn get_bucket_checksums(&self) -> Result<Vec<Digest>, PatchError> {
        (**self).get_bucket_checksums()
    }

    fn get_bucket_files(&self, bucket: u8) -> Result<FileInfoSeq, PatchError> {
        (**self).get_bucket_files(bucket)
    }

    fn get_file_compressed(&self, path: &str, offset: i64, max_bytes: i64) -> Result<Vec<u8>, PatchError> {
        (**self).get_file_compressed(path, offset, max_bytes)
    }

    fn get_checksum_for(&self, path: &str) -> Result<Option<Digest>, PatchError> {
        (**self).get_checksum_for(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_double::InMemoryFileServer;

    #[test]
    fn arc_wrapped_proxy_forwards_calls() {
        let server = Arc::new(InMemoryFileServer::new());
        server.put_file("a.txt", b"hello".to_vec(), false);

        let compress: Box<dyn FileServerProxy> = Box::new(server.clone());
        let no_compress: Box<dyn FileServerProxy> = Box::new(server.clone());
        let handles = FileServerHandles {
            compress,
            no_compress,
        };

        assert_eq!(
            handles.compress.get_root_checksum().unwrap(),
            handles.no_compress.get_root_checksum().unwrap()
        );
    }

    #[test]
    fn handle_selects_by_compression_mode() {
        let server = Arc::new(InMemoryFileServer::new());
        let handles = FileServerHandles {
            compress: Box::new(server.clone()),
            no_compress: Box::new(server.clone()),
        };

        assert_eq!(
            handles.handle(CompressionMode::Compressed).get_root_checksum().unwrap(),
            handles.handle(CompressionMode::Uncompressed).get_root_checksum().unwrap()
        );
    }
}
