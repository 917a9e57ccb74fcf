pub mod scan;
pub mod store;
pub mod update_log;

pub use scan::scan_tree;
pub use store::{load_manifest, save_manifest, MANIFEST_FILE_NAME};
pub use update_log::UpdateLog;
