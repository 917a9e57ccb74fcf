pub mod proxy;

#[cfg(any(test, feature = "test-util"))]
pub mod test_double;

pub use proxy::{CompressionMode, FileServerHandles, FileServerProxy};

#[cfg(any(test, feature = "test-util"))]
pub use test_double::InMemoryFileServer;
