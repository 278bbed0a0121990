//! I/O adapters for a sync run.

pub mod artifacts;
pub mod config;
pub mod git;
pub mod process;
pub mod test_runner;
pub mod workdir;
