//! Stable exit codes for the fixture-sync CLI.

/// All fixtures regenerated, or `config` succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, working directory failure, or any other error.
pub const INVALID: i32 = 1;
pub const CLONE_FAILED: i32 = 2;
pub const CHECKOUT_FAILED: i32 = 3;
pub const TEST_RUN_FAILED: i32 = 4;
/// The test command succeeded but an expected artifact was not produced.
pub const ARTIFACT_MISSING: i32 = 5;
pub const COPY_FAILED: i32 = 6;
/// Run aborted by SIGINT (128 + 2, as shells report it).
pub const INTERRUPTED: i32 = 130;
