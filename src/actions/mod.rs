//! Actions taken on discovered processes.

pub mod terminate;

pub use terminate::{ProcessKiller, SystemKiller, Terminator};
