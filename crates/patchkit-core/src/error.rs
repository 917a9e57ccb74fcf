use thiserror::Error;

pub type PatchResult<T> = Result<T, PatchError>;

/// The error taxonomy for the patching client.
///
/// `Cancelled` is deliberately absent: a feedback-requested stop is not an
/// error, it is reported by `prepare()`/`patch()` returning `false`.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Missing `directory`/`endpoints`, or the current working directory
    /// could not be resolved. Raised during `Patcher` construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The remote proxy is not a file server, or `get_bucket_checksums`
    /// returned other than 256 entries.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Transport/RPC failure, or a `FileAccessException` surfaced by the
    /// server, for a specific path.
    #[error("server error for `{path}`: {reason}")]
    ServerError { path: String, reason: String },

    /// The server returned an empty chunk before `pos == size`.
    #[error("size mismatch for `{path}`")]
    SizeMismatch { path: String },

    /// The local manifest is missing, unsorted, duplicated, or from a
    /// format this client does not understand.
    #[error("manifest unavailable: {reason}")]
    ManifestUnavailable { reason: String },

    /// A local filesystem operation (read/write/remove/mkdir) failed.
    #[error("I/O failure for `{path}`: {source}")]
    IoFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The decompression worker hit a codec error on a sidecar file. Sticky:
    /// once set it is surfaced at the next producer sync point and at join.
    #[error("decompression failed for `{path}`: {reason}")]
    DecompressionFailure { path: String, reason: String },
}

impl PatchError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        PatchError::IoFailure {
            path: path.into(),
            source,
        }
    }
}
