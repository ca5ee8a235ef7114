//! whouses: find out which processes are using a file or folder, and stop them.
//!
//! Discovery combines three views of the system: processes whose executable
//! lives under the target, processes that have loaded a module from it, and
//! processes the platform lock registry reports as holding its files open.

pub mod actions;
pub mod core;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
