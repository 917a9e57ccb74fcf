pub mod config;
pub mod error;
pub mod feedback;
pub mod io;

pub use config::PatcherConfig;
pub use error::{PatchError, PatchResult};
pub use feedback::{Feedback, NullFeedback};
