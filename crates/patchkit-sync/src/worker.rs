//! The decompression worker and the mutex+condvar-guarded queue it shares
//! with the download pipeline.
//!
//! The queue, the active flag, and the sticky error all live behind one
//! lock — modeled here as a single `DecompressQueue` handle rather than
//! three loose fields, message-passing style: the producer pushes and shuts
//! down, the worker pops and reports its outcome through its `JoinHandle`.

use patchkit_core::{io as core_io, PatchError};
use patchkit_tree::FileInfo;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct StickyError {
    path: String,
    reason: String,
}

impl StickyError {
    fn into_patch_error(self) -> PatchError {
        PatchError::DecompressionFailure {
            path: self.path,
            reason: self.reason,
        }
    }
}

struct State {
    queue: VecDeque<FileInfo>,
    active: bool,
    error: Option<StickyError>,
}

struct Shared {
    state: Mutex<State>,
    condvar: Condvar,
}

/// Handle to the queue shared between the producer thread (download
/// pipeline) and the consumer thread (decompression worker). Cheap to
/// clone — clones share the same underlying lock via `Arc`.
#[derive(Clone)]
pub struct DecompressQueue {
    shared: Arc<Shared>,
}

impl DecompressQueue {
    pub fn new() -> Self {
        DecompressQueue {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    active: true,
                    error: None,
                }),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Push a completed sidecar's `FileInfo` and wake the worker.
    pub fn push(&self, info: FileInfo) {
        let mut state = self.shared.state.lock().unwrap();
        state.queue.push_back(info);
        self.shared.condvar.notify_all();
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the sticky error, if any. Used by the producer at its next
    /// synchronization point; the orchestrator's own check at join time
    /// comes from the worker thread's `JoinHandle` result, not a second read
    /// of this same cell.
    pub fn take_sticky_error(&self) -> Option<PatchError> {
        self.shared
            .state
            .lock()
            .unwrap()
            .error
            .take()
            .map(StickyError::into_patch_error)
    }

    /// Mark inactive and notify — the orderly-teardown half of
    /// `update_files`'s producer/consumer handoff. Safe to call more than
    /// once.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.active = false;
        self.shared.condvar.notify_all();
    }

    fn record_error(&self, path: impl Into<String>, reason: impl Into<String>) {
        let mut state = self.shared.state.lock().unwrap();
        if state.error.is_none() {
            state.error = Some(StickyError {
                path: path.into(),
                reason: reason.into(),
            });
        }
        self.shared.condvar.notify_all();
    }

    /// The worker's only suspension point: wait while active and empty.
    fn pop_blocking(&self) -> Option<FileInfo> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some(item);
            }
            if !state.active {
                return None;
            }
            state = self.shared.condvar.wait(state).unwrap();
        }
    }
}

impl Default for DecompressQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The decompression primitive, expressed as a trait so the embedder can
/// substitute a test double or a different compression format.
pub trait DecompressCodec: Send + Sync {
    /// Decompress `sidecar` into `target`, creating `target`'s parent
    /// directory if needed. `target`'s executable bit is the caller's
    /// responsibility, not the codec's.
    fn decompress(&self, sidecar: &std::path::Path, target: &std::path::Path) -> Result<(), String>;
}

/// The production codec: the bzip2 format the original IcePatch2 client
/// used for its sidecars.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bzip2Codec;

impl DecompressCodec for Bzip2Codec {
    fn decompress(&self, sidecar: &std::path::Path, target: &std::path::Path) -> Result<(), String> {
        use bzip2::read::BzDecoder;
        use std::fs::File;
        use std::io::copy;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("creating `{}`: {e}", parent.display()))?;
        }

        let input =
            File::open(sidecar).map_err(|e| format!("opening `{}`: {e}", sidecar.display()))?;
        let mut output =
            File::create(target).map_err(|e| format!("creating `{}`: {e}", target.display()))?;
        let mut decoder = BzDecoder::new(input);
        copy(&mut decoder, &mut output)
            .map_err(|e| format!("decompressing `{}`: {e}", sidecar.display()))?;
        Ok(())
    }
}

/// Spawn the single background consumer.
///
/// Pops a completed sidecar under the lock, releases it before invoking
/// `codec` and before the `on_committed` journal write — the lock is never
/// held across a decompression operation. Any failure is recorded as the
/// sticky error and ends the thread; the same failure is also this
/// `JoinHandle`'s `Err`, which is how the orchestrator picks it up at join
/// time.
pub fn spawn_worker(
    data_dir: PathBuf,
    queue: DecompressQueue,
    codec: Arc<dyn DecompressCodec>,
    mut on_committed: impl FnMut(&FileInfo) -> Result<(), PatchError> + Send + 'static,
) -> JoinHandle<Result<(), PatchError>> {
    std::thread::spawn(move || {
        while let Some(entry) = queue.pop_blocking() {
            let sidecar = core_io::sidecar_path(&data_dir, &entry.path);
            let target = core_io::native_join(&data_dir.to_string_lossy(), &entry.path);

            if let Err(reason) = codec.decompress(&sidecar, &target) {
                queue.record_error(entry.path.clone(), reason.clone());
                return Err(PatchError::DecompressionFailure {
                    path: entry.path,
                    reason,
                });
            }

            if let Err(e) = apply_executable_bit(&target, entry.executable) {
                let reason = e.to_string();
                queue.record_error(entry.path.clone(), reason);
                return Err(e);
            }

            if let Err(e) = core_io::remove_recursive(&sidecar) {
                warn!(path = %sidecar.display(), error = %e, "could not remove sidecar after decompression");
            }

            if let Err(e) = on_committed(&entry) {
                let reason = e.to_string();
                queue.record_error(entry.path.clone(), reason);
                return Err(e);
            }

            debug!(path = %entry.path, "decompressed and journaled");
        }
        Ok(())
    })
}

#[cfg(unix)]
fn apply_executable_bit(target: &std::path::Path, executable: bool) -> Result<(), PatchError> {
    use std::os::unix::fs::PermissionsExt;

    let meta = std::fs::metadata(target).map_err(|e| PatchError::io(target.to_string_lossy(), e))?;
    let mut mode = meta.permissions().mode();
    mode = if executable { mode | 0o111 } else { mode & !0o111 };
    std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode))
        .map_err(|e| PatchError::io(target.to_string_lossy(), e))
}

#[cfg(not(unix))]
fn apply_executable_bit(_target: &std::path::Path, _executable: bool) -> Result<(), PatchError> {
    Ok(())
}
