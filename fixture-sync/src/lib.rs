//! Regenerates test fixtures from a pinned revision of an upstream repository.
//!
//! A run clones the upstream repository into a scoped temporary directory,
//! checks out the pinned revision, runs its test command, and copies the
//! produced artifacts into a local fixtures directory:
//!
//! - **[`sync`]**: orchestration of the steps and the run report.
//! - **[`io`]**: side-effecting adapters (git, child processes, config,
//!   working directory, artifact installation).
//!
//! External tools sit behind the [`io::git::SourceControl`] and
//! [`io::test_runner::TestRunner`] traits so the sequence can be tested
//! without network access.

pub mod cancel;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
