//! `patchkit`: a file-tree patching client that brings a local directory
//! into exact content-level agreement with a remote authoritative tree
//! exposed by a file-server service.
//!
//! This crate is the orchestrator — `Patcher` — wiring together
//! `patchkit-tree`'s reconciliation model, `patchkit-manifest`'s on-disk
//! state, and `patchkit-sync`'s download/decompression pipeline. The wire
//! transport for the remote procedure calls, the bzip2 codec (beyond the
//! default `Bzip2Codec`), CLI argument parsing, logging setup, and
//! configuration-file loading are all out of scope — the embedder supplies
//! a `FileServerHandles`, a `Feedback`, and (optionally) a `PatcherConfig`
//! parsed however it likes.

mod patcher;

pub use patchkit_core::{PatchError, PatchResult, PatcherConfig};
pub use patchkit_proxy::{CompressionMode, FileServerHandles, FileServerProxy};
pub use patchkit_sync::{Bzip2Codec, DecompressCodec};
pub use patchkit_tree::{FileInfo, FileInfoSeq};
pub use patcher::{Patcher, PatcherOptions};

/// The caller-supplied progress/cancellation interface,
/// re-exported from `patchkit-core` so embedders only need this crate.
pub use patchkit_core::{Feedback, NullFeedback};
