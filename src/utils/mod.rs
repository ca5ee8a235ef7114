//! Utility functions and helpers.

pub mod logging;
pub mod path;

pub use logging::{init_logging, LogConfig};
pub use path::FolderPrefix;
