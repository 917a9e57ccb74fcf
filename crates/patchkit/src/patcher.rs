//! `Patcher`: the orchestrator. Holds configuration, owns the
//! manifest/tree/reconciler/pipeline components, and drives `prepare()` then
//! `patch()` exactly once each.

use patchkit_core::{io as core_io, Feedback, PatchError};
use patchkit_proxy::FileServerHandles;
use patchkit_sync::{spawn_worker, Bzip2Codec, DecompressCodec, DecompressQueue};
use patchkit_tree::{build_tree0, FileInfo, FileInfoSeq};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Construction-time settings, resolved from `PatcherConfig`.
pub struct PatcherOptions {
    pub directory: String,
    pub thorough: bool,
    pub dry_run: bool,
    pub chunk_size: i64,
    /// Transport endpoints for the remote file server. Building the handles
    /// themselves from this string is the embedder's job (the wire
    /// transport isn't this crate's concern), but a `Patcher` still refuses
    /// to start against a config that never named a server at all.
    pub endpoints: String,
}

impl From<&patchkit_core::PatcherConfig> for PatcherOptions {
    fn from(cfg: &patchkit_core::PatcherConfig) -> Self {
        PatcherOptions {
            directory: cfg.directory.clone(),
            thorough: cfg.is_thorough(),
            dry_run: cfg.is_dry_run(),
            chunk_size: cfg.effective_chunk_size(),
            endpoints: cfg.endpoints.clone(),
        }
    }
}

/// The file-tree patching orchestrator.
///
/// Lifecycle: construct, call `prepare()` once, then `patch()` once, then
/// drop. The worker thread this orchestrator spawns only lives for the
/// duration of a single `patch()` call, so there's never a lingering thread
/// to clean up at drop time.
pub struct Patcher {
    data_dir: PathBuf,
    dry_run: bool,
    chunk_size: i64,
    server_compress: Box<dyn patchkit_proxy::FileServerProxy>,
    server_no_compress: Box<dyn patchkit_proxy::FileServerProxy>,
    codec: Arc<dyn DecompressCodec>,
    feedback: Box<dyn Feedback>,

    thorough: bool,
    local_files: FileInfoSeq,
    remove_set: FileInfoSeq,
    update_set: FileInfoSeq,
}

impl Patcher {
    /// Validate configuration and construct a `Patcher` against the given
    /// file-server handles. Building the handles themselves — proxy
    /// construction over the wire transport — isn't this crate's concern;
    /// callers build them and pass them in.
    pub fn new(
        options: PatcherOptions,
        handles: FileServerHandles,
        feedback: Box<dyn Feedback>,
    ) -> Result<Self, PatchError> {
        let data_dir = core_io::resolve_data_dir(&options.directory)?;

        if options.endpoints.trim().is_empty() {
            return Err(PatchError::Configuration(
                "no server endpoints specified".into(),
            ));
        }

        Ok(Patcher {
            data_dir: PathBuf::from(data_dir),
            dry_run: options.dry_run,
            chunk_size: options.chunk_size.max(1),
            server_compress: handles.compress,
            server_no_compress: handles.no_compress,
            codec: Arc::new(Bzip2Codec),
            feedback,
            thorough: options.thorough,
            local_files: FileInfoSeq::empty(),
            remove_set: FileInfoSeq::empty(),
            update_set: FileInfoSeq::empty(),
        })
    }

    /// Swap the decompression codec, e.g. for a test double. The production
    /// default is `Bzip2Codec`.
    pub fn with_codec(mut self, codec: Arc<dyn DecompressCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn remove_set(&self) -> &[FileInfo] {
        self.remove_set.as_slice()
    }

    pub fn update_set(&self) -> &[FileInfo] {
        self.update_set.as_slice()
    }

    pub fn local_files(&self) -> &[FileInfo] {
        self.local_files.as_slice()
    }

    /// Reconcile the local tree against the server.
    /// Returns `false` if feedback requested cancellation; raises on a hard
    /// error.
    pub fn prepare(&mut self) -> Result<bool, PatchError> {
        self.local_files = FileInfoSeq::empty();
        let mut thorough = self.thorough;

        if !thorough {
            match patchkit_manifest::load_manifest(&self.data_dir) {
                Ok(seq) => self.local_files = seq,
                Err(e) => {
                    if self.feedback.no_file_summary(&e.to_string()) {
                        thorough = true;
                    } else {
                        return Ok(false);
                    }
                }
            }
        }

        if thorough {
            self.local_files = patchkit_manifest::scan_tree(&self.data_dir)?;
            patchkit_manifest::save_manifest(&self.data_dir, &self.local_files)?;
        }

        let local_tree = build_tree0(&self.local_files);
        let server_root = self.server_compress.get_root_checksum()?;

        if local_tree.checksum == server_root {
            self.remove_set = FileInfoSeq::empty();
            self.update_set = FileInfoSeq::empty();
            return Ok(true);
        }

        if !self.feedback.file_list_start() {
            return Ok(false);
        }

        let outcome = patchkit_sync::reconcile(
            &local_tree,
            self.server_compress.as_ref(),
            self.feedback.as_mut(),
        )?;

        if !outcome.completed {
            return Ok(false);
        }

        if !self.feedback.file_list_end() {
            return Ok(false);
        }

        debug!(
            remove = outcome.remove_set.len(),
            update = outcome.update_set.len(),
            "reconciliation complete"
        );

        self.remove_set = outcome.remove_set;
        self.update_set = outcome.update_set;
        Ok(true)
    }

    /// Apply `remove_set` then `update_set`.
    pub fn patch(&mut self) -> Result<bool, PatchError> {
        if !self.remove_set.is_empty() {
            if !self.remove_files_phase()? {
                return Ok(false);
            }
            if !self.dry_run {
                patchkit_manifest::save_manifest(&self.data_dir, &self.local_files)?;
            }
        }

        if !self.update_set.is_empty() {
            let completed = self.update_files_phase()?;
            if !completed {
                return Ok(false);
            }
            if !self.dry_run {
                patchkit_manifest::save_manifest(&self.data_dir, &self.local_files)?;
            }
        }

        Ok(true)
    }

    /// Delete every path in `remove_set`, skipping descendants of an
    /// already-removed directory in the same pass. Dry-run makes this a
    /// no-op. This phase never reports cancellation: there is no feedback
    /// callback in the removal loop.
    ///
    /// A failed delete aborts the phase immediately instead of being logged
    /// and ignored — the file is still on disk, so pretending it was
    /// removed would desync the manifest from reality. Whatever was
    /// already deleted before the failure is still committed to
    /// `local_files`/`remove_set`, so a re-run doesn't redo that work.
    fn remove_files_phase(&mut self) -> Result<bool, PatchError> {
        if self.dry_run {
            self.remove_set = FileInfoSeq::empty();
            return Ok(true);
        }

        let entries = self.remove_set.as_slice().to_vec();
        let mut removed = Vec::new();
        let mut i = 0;
        while i < entries.len() {
            let path = entries[i].path.clone();
            let abs = core_io::native_join(&self.data_dir.to_string_lossy(), &path);

            if let Err(e) = core_io::remove_recursive(&abs) {
                self.commit_removed(&removed);
                return Err(e);
            }
            info!(path = %path, "removed");
            removed.push(entries[i].clone());

            i += 1;
            while i < entries.len() && core_io::is_descendant_of(&entries[i].path, &path) {
                removed.push(entries[i].clone());
                i += 1;
            }
        }

        self.commit_removed(&removed);
        Ok(true)
    }

    /// Fold `removed` out of `local_files` and `remove_set`. Called both on
    /// a clean finish and, with whatever was deleted so far, right before a
    /// failed delete is propagated.
    fn commit_removed(&mut self, removed: &[FileInfo]) {
        let removed_seq = FileInfoSeq::sort_and_dedup(removed.to_vec());
        self.local_files = FileInfoSeq::sort_and_dedup(self.local_files.difference(&removed_seq));
        self.remove_set = FileInfoSeq::sort_and_dedup(self.remove_set.difference(&removed_seq));
    }

    /// Stream `update_set` from the server, overlapping download with
    /// decompression via a worker thread.
    ///
    /// The worker thread and the update log are both scoped to this call:
    /// on every exit path — success, cancellation, or error — the queue is
    /// shut down and the worker joined before this method returns. Leaving
    /// either running past this call would leak a thread and a file handle
    /// every time a run gets cancelled or hits an error.
    fn update_files_phase(&mut self) -> Result<bool, PatchError> {
        let queue = DecompressQueue::new();

        let log: Option<Arc<Mutex<patchkit_manifest::UpdateLog>>> = if self.dry_run {
            None
        } else {
            Some(Arc::new(Mutex::new(patchkit_manifest::UpdateLog::open(
                &self.data_dir,
            )?)))
        };

        let worker_handle = log.clone().map(|log| {
            spawn_worker(
                self.data_dir.clone(),
                queue.clone(),
                self.codec.clone(),
                move |entry| log.lock().unwrap().append(entry),
            )
        });

        let log_for_dirs = log.clone();
        let producer_result = patchkit_sync::update_files(
            &self.data_dir,
            self.update_set.as_slice(),
            self.chunk_size,
            self.dry_run,
            self.server_no_compress.as_ref(),
            &queue,
            self.feedback.as_mut(),
            move |entry| match &log_for_dirs {
                Some(log) => log.lock().unwrap().append(entry),
                None => Ok(()),
            },
        );

        // Teardown runs on every exit path: success, cancellation, or error.
        queue.shutdown();
        let worker_result = worker_handle.map(|h| h.join().expect("worker thread panicked"));

        let producer_completed = match producer_result {
            Ok(completed) => completed,
            Err(e) => {
                self.close_log(log);
                return Err(e);
            }
        };

        if let Some(err) = queue.take_sticky_error() {
            self.close_log(log);
            return Err(err);
        }
        if let Some(Err(e)) = worker_result {
            self.close_log(log);
            return Err(e);
        }

        self.close_log(log);

        if !producer_completed {
            return Ok(false);
        }

        self.local_files = self.local_files.union(&self.update_set);
        self.update_set = FileInfoSeq::empty();
        Ok(true)
    }

    fn close_log(&self, log: Option<Arc<Mutex<patchkit_manifest::UpdateLog>>>) {
        if let Some(log) = log {
            match Arc::try_unwrap(log) {
                Ok(mutex) => {
                    if let Err(e) = mutex.into_inner().unwrap().close() {
                        warn!(error = %e, "failed to close update log");
                    }
                }
                Err(_) => {
                    warn!("update log still referenced at teardown; not closed explicitly");
                }
            }
        }
    }
}
