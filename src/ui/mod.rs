//! User interface components.
//!
//! This module provides:
//! - CLI definition
//! - Text rendering of scan and termination results

pub mod cli;
pub mod report;

pub use cli::Cli;
pub use report::{render_outcomes, render_records, render_report};
