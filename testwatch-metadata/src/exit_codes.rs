// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `testwatch` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TestwatchExitCode {}

impl TestwatchExitCode {
    /// No errors occurred and testwatch exited normally.
    pub const OK: i32 = 0;

    /// With `--once`, the snapshot contained at least one failing file.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The configuration could not be loaded.
    pub const CONFIG_ERROR: i32 = 96;

    /// The event stream client could not be set up.
    pub const SETUP_ERROR: i32 = 97;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
