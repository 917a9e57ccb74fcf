pub mod download;
pub mod reconciler;
pub mod worker;

pub use download::{total_bytes, update_files};
pub use reconciler::{reconcile, ReconcileOutcome};
pub use worker::{spawn_worker, Bzip2Codec, DecompressCodec, DecompressQueue};
