//! Local manifest store: loads and saves the `FileInfoSeq` sidecar that
//! records every file and directory in a managed tree.
//!
//! Follows the same atomic write-then-rename discipline as
//! `tcfs-sync::state::StateCache::flush` so readers never observe a
//! truncated manifest, and the same version-tagged JSON envelope as
//! `tcfs-sync::manifest::SyncManifest` so a format change is detectable.

use patchkit_core::PatchError;
use patchkit_tree::FileInfo;
use patchkit_tree::FileInfoSeq;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = ".manifest.json";

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    version: u32,
    entries: Vec<FileInfo>,
}

fn manifest_path(data_dir: &Path) -> std::path::PathBuf {
    data_dir.join(MANIFEST_FILE_NAME)
}

/// Load the local manifest. Fails with `ManifestUnavailable` if the file is
/// missing, not valid JSON, from an unrecognized version, or unsorted/
/// duplicated — callers escalate to a thorough rescan on this error.
pub fn load_manifest(data_dir: &Path) -> Result<FileInfoSeq, PatchError> {
    let path = manifest_path(data_dir);
    let bytes = std::fs::read(&path).map_err(|e| PatchError::ManifestUnavailable {
        reason: format!("reading `{}`: {e}", path.display()),
    })?;

    let parsed: ManifestFile =
        serde_json::from_slice(&bytes).map_err(|e| PatchError::ManifestUnavailable {
            reason: format!("parsing `{}`: {e}", path.display()),
        })?;

    if parsed.version != CURRENT_VERSION {
        return Err(PatchError::ManifestUnavailable {
            reason: format!(
                "manifest version {} is not supported (expected {})",
                parsed.version, CURRENT_VERSION
            ),
        });
    }

    FileInfoSeq::from_sorted(parsed.entries)
}

/// Write the manifest to a temporary file and rename over the target.
pub fn save_manifest(data_dir: &Path, seq: &FileInfoSeq) -> Result<(), PatchError> {
    std::fs::create_dir_all(data_dir).map_err(|e| PatchError::io(data_dir.to_string_lossy(), e))?;

    let path = manifest_path(data_dir);
    let payload = ManifestFile {
        version: CURRENT_VERSION,
        entries: seq.as_slice().to_vec(),
    };

    let json = serde_json::to_vec_pretty(&payload).map_err(|e| PatchError::ManifestUnavailable {
        reason: format!("serializing manifest: {e}"),
    })?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json).map_err(|e| PatchError::io(tmp_path.to_string_lossy(), e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| PatchError::io(path.to_string_lossy(), e))?;

    Ok(())
}
