//! `scan_tree`: rebuild a manifest straight from the filesystem, the
//! "thorough" path taken when no usable local manifest exists.

use patchkit_core::PatchError;
use patchkit_tree::{FileInfo, FileInfoSeq};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A regular file found during the walk, not yet hashed.
struct PendingFile {
    rel: String,
    abs: PathBuf,
    size: i64,
    executable: bool,
}

/// Walk `data_dir` recursively, hashing each regular file, and produce a
/// sorted, de-duplicated manifest. Symlinks and device files are skipped
/// with a warning rather than failing the whole scan.
///
/// The directory walk itself is sequential (each `read_dir` call depends on
/// the previous one discovering its parent), but hashing — the expensive
/// part for a large tree — runs across a rayon pool once every regular file
/// has been found, the same "collect first, parallelize the CPU-bound part"
/// split `tcfs-chunks::blake3` uses for its own large-file hashing.
pub fn scan_tree(data_dir: &Path) -> Result<FileInfoSeq, PatchError> {
    let mut entries = Vec::new();
    let mut pending_files = Vec::new();
    if data_dir.exists() {
        walk(data_dir, data_dir, &mut entries, &mut pending_files)?;
    }

    let hashed: Vec<FileInfo> = pending_files
        .into_par_iter()
        .map(|pending| {
            patchkit_hash::hash_file(&pending.abs).map(|checksum| FileInfo {
                path: pending.rel,
                checksum,
                size: pending.size,
                executable: pending.executable,
            })
        })
        .collect::<Result<_, _>>()
        .map_err(|e| {
            PatchError::io(
                data_dir.to_string_lossy(),
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            )
        })?;

    entries.extend(hashed);
    Ok(FileInfoSeq::sort_and_dedup(entries))
}

fn walk(
    root: &Path,
    dir: &Path,
    out: &mut Vec<FileInfo>,
    pending_files: &mut Vec<PendingFile>,
) -> Result<(), PatchError> {
    let read_dir =
        std::fs::read_dir(dir).map_err(|e| PatchError::io(dir.to_string_lossy(), e))?;

    for entry in read_dir {
        let entry = entry.map_err(|e| PatchError::io(dir.to_string_lossy(), e))?;
        let path = entry.path();
        let rel = relative_slash_path(root, &path);

        if rel == crate::store::MANIFEST_FILE_NAME {
            continue;
        }

        let meta = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping entry: cannot stat");
                continue;
            }
        };

        if meta.file_type().is_symlink() {
            warn!(path = %path.display(), "skipping symlink");
            continue;
        }

        if meta.is_dir() {
            out.push(FileInfo::directory(rel));
            walk(root, &path, out, pending_files)?;
        } else if meta.is_file() {
            pending_files.push(PendingFile {
                rel,
                abs: path,
                size: meta.len() as i64,
                executable: is_executable(&meta),
            });
        } else {
            warn!(path = %path.display(), "skipping device/special file");
        }
    }

    Ok(())
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_empty_dir_is_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let seq = scan_tree(dir.path()).unwrap();
        assert!(seq.is_empty());
    }

    #[test]
    fn scan_finds_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join("root.txt"), b"").unwrap();

        let seq = scan_tree(dir.path()).unwrap();
        let paths: Vec<_> = seq.iter().map(|f| f.path.clone()).collect();
        assert!(paths.contains(&"sub".to_string()));
        assert!(paths.contains(&"sub/a.txt".to_string()));
        assert!(paths.contains(&"root.txt".to_string()));

        let root_txt = seq.iter().find(|f| f.path == "root.txt").unwrap();
        assert_eq!(root_txt.size, 0);

        let sub = seq.iter().find(|f| f.path == "sub").unwrap();
        assert_eq!(sub.size, -1);
    }

    #[test]
    fn scan_skips_symlinks() {
        #[cfg(unix)]
        {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("real.txt"), b"x").unwrap();
            std::os::unix::fs::symlink(
                dir.path().join("real.txt"),
                dir.path().join("link.txt"),
            )
            .unwrap();

            let seq = scan_tree(dir.path()).unwrap();
            let paths: Vec<_> = seq.iter().map(|f| f.path.clone()).collect();
            assert!(paths.contains(&"real.txt".to_string()));
            assert!(!paths.contains(&"link.txt".to_string()));
        }
    }

    #[test]
    fn scan_skips_its_own_manifest_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::store::MANIFEST_FILE_NAME), b"{}").unwrap();
        let seq = scan_tree(dir.path()).unwrap();
        assert!(seq.is_empty());
    }
}
