use serde::{Deserialize, Serialize};

/// Configuration for a `Patcher`.
///
/// Loading this from a config file or environment is the embedder's job —
/// `PatcherConfig` only promises a stable `Deserialize`/`Serialize` shape,
/// the way `tcfs-core::config::TcfsConfig` does for its own subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatcherConfig {
    /// Data directory, relative paths resolved against the current
    /// working directory at construction time.
    pub directory: String,
    /// `> 0` forces a full rescan even if a local manifest exists.
    pub thorough: i32,
    /// `> 0` disables all filesystem mutation and all worker activity;
    /// reconciliation still runs.
    pub dry_run: i32,
    /// Max bytes per compressed chunk request, clamped to `>= 1`.
    pub chunk_size: i64,
    /// Transport endpoints for the remote file server.
    pub endpoints: String,
    /// Logical identity of the remote server object.
    pub identity: String,
}

impl Default for PatcherConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            thorough: 0,
            dry_run: 0,
            chunk_size: 100_000,
            endpoints: String::new(),
            identity: "IcePatch2/server".into(),
        }
    }
}

impl PatcherConfig {
    pub fn is_thorough(&self) -> bool {
        self.thorough > 0
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run > 0
    }

    /// Clamp to `>= 1`: a zero or negative chunk size would make the
    /// download loop spin without ever advancing `pos`.
    pub fn effective_chunk_size(&self) -> i64 {
        self.chunk_size.max(1)
    }
}
