//! Bucketed tree reconciliation: compare a local `FileTree0` against the
//! server's bucket checksums and produce `remove_set`/`update_set`, each
//! sorted and duplicate-free.

use patchkit_core::{Feedback, PatchError};
use patchkit_proxy::FileServerProxy;
use patchkit_tree::{FileInfoSeq, FileTree0};
use tracing::debug;

pub struct ReconcileOutcome {
    pub remove_set: FileInfoSeq,
    pub update_set: FileInfoSeq,
    /// `false` if feedback requested cancellation; the caller must treat the
    /// partially-built sets as void in that case.
    pub completed: bool,
}

/// Run the bucket-by-bucket diff: only buckets whose rolled-up checksum
/// disagrees are fetched and diffed entry-by-entry.
///
/// `local` is the tree built from the current manifest. `server` is queried
/// for its 256 bucket digests up front; any length other than
/// `patchkit_tree::BUCKET_COUNT` is a `ProtocolViolation`.
pub fn reconcile(
    local: &FileTree0,
    server: &dyn FileServerProxy,
    feedback: &mut dyn Feedback,
) -> Result<ReconcileOutcome, PatchError> {
    let server_digests = server.get_bucket_checksums()?;
    if server_digests.len() != patchkit_tree::BUCKET_COUNT {
        return Err(PatchError::ProtocolViolation(format!(
            "server returned {} bucket checksums, expected {}",
            server_digests.len(),
            patchkit_tree::BUCKET_COUNT
        )));
    }

    let mut remove_set = FileInfoSeq::empty();
    let mut update_set = FileInfoSeq::empty();

    for (b, server_digest) in server_digests.iter().enumerate() {
        let local_node = local.bucket(b as u8);

        if &local_node.checksum != server_digest {
            let remote_bucket = server.get_bucket_files(b as u8)?;
            let remote_bucket = FileInfoSeq::sort_and_dedup(remote_bucket.into_vec());
            let local_bucket = FileInfoSeq::sort_and_dedup(local_node.files.clone());

            // Tie-broken by content (path, then checksum), not path alone: a
            // file whose content changed but whose path didn't must appear
            // as "only in local" *and* "only in remote" so it lands in both
            // `remove_set` and `update_set` — the remove-then-redownload is
            // how a whole-file-replace client applies an in-place edit.
            let to_remove = local_bucket.difference_by_content(&remote_bucket);
            let to_update = remote_bucket.difference_by_content(&local_bucket);

            if !to_remove.is_empty() || !to_update.is_empty() {
                debug!(bucket = b, removed = to_remove.len(), updated = to_update.len(), "bucket differs");
            }

            remove_set = remove_set.union(&FileInfoSeq::sort_and_dedup(to_remove));
            update_set = update_set.union(&FileInfoSeq::sort_and_dedup(to_update));
        }

        let percent = ((b + 1) * 100 / patchkit_tree::BUCKET_COUNT) as u32;
        if !feedback.file_list_progress(percent) {
            return Ok(ReconcileOutcome {
                remove_set,
                update_set,
                completed: false,
            });
        }
    }

    Ok(ReconcileOutcome {
        remove_set,
        update_set,
        completed: true,
    })
}
