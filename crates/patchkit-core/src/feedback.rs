//! The caller-supplied progress/cancellation interface.
//!
//! Expressed as a plain trait object rather than a registry of callbacks, in
//! the style of `tcfs-sync::engine::ProgressFn` — one capability set the
//! producer thread calls synchronously, never reentered. Every method
//! returns `bool`; `false` requests cancellation at that point.

/// Lives here (rather than in the root crate) so `patchkit-sync`'s
/// reconciler and download pipeline can depend on it without depending on
/// the orchestrator crate; `patchkit` re-exports it as part of its public
/// API.
pub trait Feedback: Send {
    /// The local manifest could not be loaded; `reason` is human-readable.
    /// Returning `true` escalates to a thorough rescan.
    fn no_file_summary(&mut self, reason: &str) -> bool {
        let _ = reason;
        true
    }

    fn file_list_start(&mut self) -> bool {
        true
    }

    fn file_list_progress(&mut self, percent: u32) -> bool {
        let _ = percent;
        true
    }

    fn file_list_end(&mut self) -> bool {
        true
    }

    fn patch_start(&mut self, path: &str, file_size: i64, updated: u64, total: u64) -> bool {
        let _ = (path, file_size, updated, total);
        true
    }

    fn patch_progress(&mut self, pos: i64, file_size: i64, updated: u64, total: u64) -> bool {
        let _ = (pos, file_size, updated, total);
        true
    }

    fn patch_end(&mut self) -> bool {
        true
    }
}

/// A `Feedback` that always allows the run to proceed; the default for
/// callers that don't need progress reporting.
#[derive(Debug, Default)]
pub struct NullFeedback;

impl Feedback for NullFeedback {}
