//! The download pipeline: streams each `update_set` entry from the server in
//! fixed-size chunks into a `.bz2` sidecar, handing completed sidecars to the
//! decompression worker via `DecompressQueue`.

use crate::worker::DecompressQueue;
use patchkit_core::{io as core_io, Feedback, PatchError};
use patchkit_proxy::FileServerProxy;
use patchkit_tree::FileInfo;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Sum of positive `size`s in `update_set` — the `total` denominator passed
/// to `feedback.patch_start`/`patch_progress`.
pub fn total_bytes(update_set: &[FileInfo]) -> u64 {
    update_set
        .iter()
        .filter(|f| f.size > 0)
        .map(|f| f.size as u64)
        .sum()
}

/// Download and enqueue every entry in `update_set`.
///
/// Directories are created immediately and (outside dry-run) journaled
/// straight away, since they need no decompression step. Regular files are
/// fetched in chunks from `server`; outside dry-run each chunk is also
/// written into a `.bz2` sidecar that's pushed onto `queue` for the worker.
/// `DryRun` scopes out filesystem mutation and worker activity, not the
/// network fetch: the chunk loop and `patch_progress` feedback still run so
/// a dry run reports accurate progress against the real transfer size.
///
/// Returns `Ok(true)` on completion, `Ok(false)` if feedback requested
/// cancellation (the producer stops enqueueing and returns immediately —
/// teardown of the worker is the caller's responsibility).
#[allow(clippy::too_many_arguments)]
pub fn update_files(
    data_dir: &Path,
    update_set: &[FileInfo],
    chunk_size: i64,
    dry_run: bool,
    server: &dyn FileServerProxy,
    queue: &DecompressQueue,
    feedback: &mut dyn Feedback,
    mut on_directory_committed: impl FnMut(&FileInfo) -> Result<(), PatchError>,
) -> Result<bool, PatchError> {
    let total = total_bytes(update_set);
    let mut updated: u64 = 0;

    for entry in update_set {
        if !core_io::is_safe_relative_path(&entry.path) {
            return Err(PatchError::ProtocolViolation(format!(
                "server returned unsafe path `{}`",
                entry.path
            )));
        }

        if entry.is_directory() {
            if !dry_run {
                let abs = core_io::native_join(&data_dir.to_string_lossy(), &entry.path);
                core_io::create_directory_recursive(&abs)?;
                on_directory_committed(entry)?;
            }
            continue;
        }

        if !feedback.patch_start(&entry.path, entry.size, updated, total) {
            return Ok(false);
        }

        let sidecar = core_io::sidecar_path(data_dir, &entry.path);

        if !dry_run {
            if let Some(parent) = sidecar.parent() {
                core_io::create_directory_recursive(parent)?;
            }
            core_io::remove_recursive(&sidecar)?;
        }

        // The chunked fetch and its progress feedback run unconditionally —
        // `DryRun` scopes out filesystem mutation and worker activity (§6),
        // not the network transfer itself; only the sidecar write and the
        // enqueue onto the decompression queue are skipped.
        let completed = download_one(
            &entry.path, entry.size, chunk_size, server, &sidecar, dry_run, feedback, &mut updated,
            total,
        )?;
        if !completed {
            return Ok(false);
        }

        if !dry_run {
            if let Some(err) = queue.take_sticky_error() {
                return Err(err);
            }
            queue.push(entry.clone());
        }

        if !feedback.patch_end() {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Fetch `path` in chunks, writing each into `sidecar` unless `dry_run` —
/// the fetch loop and `feedback.patch_progress` always run, matching the
/// original `ClientUtil.cpp::updateFilesInternal`, which issues
/// `getFileCompressed`/`patchProgress` regardless of dry-run and only
/// guards the sidecar write.
#[allow(clippy::too_many_arguments)]
fn download_one(
    path: &str,
    size: i64,
    chunk_size: i64,
    server: &dyn FileServerProxy,
    sidecar: &Path,
    dry_run: bool,
    feedback: &mut dyn Feedback,
    updated: &mut u64,
    total: u64,
) -> Result<bool, PatchError> {
    let mut file = if dry_run {
        None
    } else {
        Some(
            std::fs::File::create(sidecar)
                .map_err(|e| PatchError::io(sidecar.to_string_lossy(), e))?,
        )
    };

    let mut pos: i64 = 0;
    while pos < size {
        let chunk = server.get_file_compressed(path, pos, chunk_size)?;
        if chunk.is_empty() {
            return Err(PatchError::SizeMismatch {
                path: path.to_string(),
            });
        }

        if let Some(file) = file.as_mut() {
            file.write_all(&chunk)
                .map_err(|e| PatchError::io(sidecar.to_string_lossy(), e))?;
        }
        pos += chunk.len() as i64;
        *updated += chunk.len() as u64;

        if !feedback.patch_progress(pos, size, *updated, total) {
            return Ok(false);
        }
    }

    debug!(path, size, "sidecar written");
    info!(path, "downloaded");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchkit_core::NullFeedback;
    use patchkit_proxy::test_double::InMemoryFileServer;

    #[test]
    fn total_bytes_ignores_directories() {
        let entries = vec![
            FileInfo::directory("a"),
            FileInfo {
                path: "b".into(),
                checksum: patchkit_hash::ZERO_DIGEST,
                size: 10,
                executable: false,
            },
        ];
        assert_eq!(total_bytes(&entries), 10);
    }

    #[test]
    fn rejects_path_traversal_from_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let server = InMemoryFileServer::new();
        let entries = vec![FileInfo {
            path: "../escaped.txt".into(),
            checksum: patchkit_hash::ZERO_DIGEST,
            size: 5,
            executable: false,
        }];
        let queue = DecompressQueue::new();
        let mut fb = NullFeedback;

        let err = update_files(dir.path(), &entries, 100_000, false, &server, &queue, &mut fb, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, PatchError::ProtocolViolation(_)));
        assert!(!dir.path().join("../escaped.txt").exists());
    }

    #[test]
    fn downloads_file_into_sidecar_then_enqueues() {
        let dir = tempfile::tempdir().unwrap();
        let server = InMemoryFileServer::new();
        server.put_file("readme.txt", b"hello world".to_vec(), false);

        let entries = server.entries().into_vec();
        let queue = DecompressQueue::new();
        let mut fb = NullFeedback;

        let completed = update_files(
            dir.path(),
            &entries,
            100_000,
            false,
            &server,
            &queue,
            &mut fb,
            |_| Ok(()),
        )
        .unwrap();

        assert!(completed);
        let sidecar = dir.path().join("readme.txt.bz2");
        assert_eq!(std::fs::read(&sidecar).unwrap(), b"hello world");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let server = InMemoryFileServer::new();
        server.put_file("readme.txt", b"hello world".to_vec(), false);
        server.put_directory("a");

        let entries = server.entries().into_vec();
        let queue = DecompressQueue::new();
        let mut fb = NullFeedback;

        update_files(dir.path(), &entries, 100_000, true, &server, &queue, &mut fb, |_| {
            panic!("directory commit should not run in dry-run")
        })
        .unwrap();

        assert!(!dir.path().join("a").exists());
        assert!(!dir.path().join("readme.txt.bz2").exists());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn dry_run_creates_no_parent_directory_for_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let server = InMemoryFileServer::new();
        server.put_file("a/b.bin", b"nested content".to_vec(), false);

        let entries = server.entries().into_vec();
        let queue = DecompressQueue::new();
        let mut fb = NullFeedback;

        update_files(dir.path(), &entries, 100_000, true, &server, &queue, &mut fb, |_| {
            panic!("directory commit should not run in dry-run")
        })
        .unwrap();

        assert!(!dir.path().join("a").exists());
        assert!(!dir.path().join("a/b.bin.bz2").exists());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn dry_run_still_fetches_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let server = InMemoryFileServer::new();
        server.put_file("readme.txt", b"hello world".to_vec(), false);

        let entries = server.entries().into_vec();
        let queue = DecompressQueue::new();

        struct RecordProgress(Vec<i64>);
        impl Feedback for RecordProgress {
            fn patch_progress(&mut self, pos: i64, _file_size: i64, _updated: u64, _total: u64) -> bool {
                self.0.push(pos);
                true
            }
        }
        let mut fb = RecordProgress(Vec::new());

        let completed = update_files(
            dir.path(),
            &entries,
            100_000,
            true,
            &server,
            &queue,
            &mut fb,
            |_| panic!("directory commit should not run in dry-run"),
        )
        .unwrap();

        assert!(completed);
        // The fetch happened and reported real progress even though dry-run
        // skipped the sidecar write.
        assert_eq!(fb.0, vec![11]);
        assert!(!dir.path().join("readme.txt.bz2").exists());
    }

    #[test]
    fn dry_run_still_surfaces_size_mismatch_from_the_server() {
        struct ShortProxy;
        impl FileServerProxy for ShortProxy {
            fn get_root_checksum(&self) -> Result<patchkit_hash::Digest, PatchError> {
                Ok(patchkit_hash::ZERO_DIGEST)
            }
            fn get_bucket_checksums(&self) -> Result<Vec<patchkit_hash::Digest>, PatchError> {
                Ok(vec![patchkit_hash::ZERO_DIGEST; 256])
            }
            fn get_bucket_files(&self, _bucket: u8) -> Result<patchkit_tree::FileInfoSeq, PatchError> {
                Ok(patchkit_tree::FileInfoSeq::empty())
            }
            fn get_file_compressed(
                &self,
                _path: &str,
                _offset: i64,
                _max_bytes: i64,
            ) -> Result<Vec<u8>, PatchError> {
                Ok(Vec::new())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let entries = vec![FileInfo {
            path: "big.bin".into(),
            checksum: patchkit_hash::ZERO_DIGEST,
            size: 100,
            executable: false,
        }];
        let queue = DecompressQueue::new();
        let mut fb = NullFeedback;

        let err = update_files(dir.path(), &entries, 10, true, &ShortProxy, &queue, &mut fb, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, PatchError::SizeMismatch { .. }));
    }

    #[test]
    fn size_mismatch_when_server_returns_short() {
        struct ShortProxy;
        impl FileServerProxy for ShortProxy {
            fn get_root_checksum(&self) -> Result<patchkit_hash::Digest, PatchError> {
                Ok(patchkit_hash::ZERO_DIGEST)
            }
            fn get_bucket_checksums(&self) -> Result<Vec<patchkit_hash::Digest>, PatchError> {
                Ok(vec![patchkit_hash::ZERO_DIGEST; 256])
            }
            fn get_bucket_files(&self, _bucket: u8) -> Result<patchkit_tree::FileInfoSeq, PatchError> {
                Ok(patchkit_tree::FileInfoSeq::empty())
            }
            fn get_file_compressed(
                &self,
                _path: &str,
                _offset: i64,
                _max_bytes: i64,
            ) -> Result<Vec<u8>, PatchError> {
                Ok(Vec::new())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let entries = vec![FileInfo {
            path: "big.bin".into(),
            checksum: patchkit_hash::ZERO_DIGEST,
            size: 100,
            executable: false,
        }];
        let queue = DecompressQueue::new();
        let mut fb = NullFeedback;

        let err = update_files(dir.path(), &entries, 10, false, &ShortProxy, &queue, &mut fb, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, PatchError::SizeMismatch { .. }));
    }

    #[test]
    fn cancellation_at_patch_progress_stops_the_phase() {
        let dir = tempfile::tempdir().unwrap();
        let server = InMemoryFileServer::new();
        server.put_file("big.bin", vec![0u8; 30], false);
        let entries = server.entries().into_vec();
        let queue = DecompressQueue::new();

        struct CancelSecondProgress(u32);
        impl Feedback for CancelSecondProgress {
            fn patch_progress(&mut self, _pos: i64, _file_size: i64, _updated: u64, _total: u64) -> bool {
                self.0 += 1;
                self.0 < 2
            }
        }
        let mut fb = CancelSecondProgress(0);

        let completed =
            update_files(dir.path(), &entries, 10, false, &server, &queue, &mut fb, |_| Ok(())).unwrap();
        assert!(!completed);
    }
}
