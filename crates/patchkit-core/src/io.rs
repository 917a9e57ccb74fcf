//! Path normalization and filesystem primitives shared by the patching
//! client. Paths that travel over the wire or live in the manifest are
//! always forward-slash canonical; these helpers are the only place that
//! talks to platform-native paths.

use crate::error::{PatchError, PatchResult};
use std::path::{Component, Path, PathBuf};

/// Collapse `.`/`..`/repeated separators and convert to forward slashes.
///
/// Mirrors `IcePatch2::normalize()` in the original C++ client: a pure
/// string operation, no filesystem access, so it works on paths that don't
/// exist yet.
pub fn normalize(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if !parts.is_empty() && *parts.last().unwrap() != ".." {
                    parts.pop();
                } else if !is_absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Resolve `dir` (possibly relative) against the current working directory,
/// then normalize. Fails with `Configuration` if the cwd cannot be read —
/// the original client treats that as a construction-time abort.
pub fn resolve_data_dir(dir: &str) -> PatchResult<String> {
    if dir.is_empty() {
        return Err(PatchError::Configuration(
            "no data directory specified".into(),
        ));
    }

    if dir.starts_with('/') {
        return Ok(normalize(dir));
    }

    let cwd = std::env::current_dir().map_err(|e| {
        PatchError::Configuration(format!("cannot get the current directory: {e}"))
    })?;

    let joined = format!("{}/{}", cwd.to_string_lossy().replace('\\', "/"), dir);
    Ok(normalize(&joined))
}

/// Recursively create a directory, tolerating "already exists".
pub fn create_directory_recursive(path: &Path) -> PatchResult<()> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) => Err(PatchError::io(path.to_string_lossy(), e)),
    }
}

/// Recursively remove a file or directory. Missing paths are not an error
/// (mirrors the original's best-effort `removeRecursive` used before
/// truncating a stale `.bz2` sidecar).
pub fn remove_recursive(path: &Path) -> PatchResult<()> {
    if !path.exists() && !is_dangling_symlink(path) {
        return Ok(());
    }

    let meta = std::fs::symlink_metadata(path).map_err(|e| PatchError::io(path.to_string_lossy(), e))?;

    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PatchError::io(path.to_string_lossy(), e)),
    }
}

fn is_dangling_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Join a data directory with a manifest-relative path using platform-native
/// separators, used only right before an OS call.
pub fn native_join(data_dir: &str, relative_path: &str) -> PathBuf {
    let mut out = PathBuf::from(data_dir);
    for part in relative_path.split('/') {
        out.push(part);
    }
    out
}

/// The transient `.bz2` sidecar path for a manifest-relative file path,
/// shared by the download pipeline and the decompression worker so both
/// sides agree on where a payload lands.
pub fn sidecar_path(data_dir: &Path, relative_path: &str) -> PathBuf {
    let native = native_join(&data_dir.to_string_lossy(), relative_path);
    let mut os_string = native.into_os_string();
    os_string.push(".bz2");
    PathBuf::from(os_string)
}

/// True if `path` is lexically nested under `prefix` as a path component
/// (not merely a string prefix) — used by `remove_files` to skip the
/// descendants of an already-removed directory in one pass.
pub fn is_descendant_of(path: &str, prefix: &str) -> bool {
    let dir_prefix = format!("{prefix}/");
    path.len() > dir_prefix.len() && path.starts_with(dir_prefix.as_str())
}

/// Reject path components that are unsafe to materialize on a real
/// filesystem: absolute paths, `..` traversal, and empty segments.
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') {
        return false;
    }
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}
