// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for testwatch.
//!
//! ## Config file location
//!
//! In order of priority:
//!
//! 1. `--config PATH` on the command line.
//! 2. The `TESTWATCH_CONFIG` environment variable.
//! 3. **Unix/macOS**: `$XDG_CONFIG_HOME/testwatch/config.toml` or
//!    `~/.config/testwatch/config.toml`. **Windows**:
//!    `%APPDATA%\testwatch\config.toml`, with fallback to
//!    `~/.config/testwatch/config.toml`.
//!
//! A missing file at a default location is not an error. A missing file at an
//! explicit path is. The value `none` skips the config file entirely.
//!
//! ## Configuration hierarchy
//!
//! Settings are resolved in the following order (highest priority first):
//!
//! 1. CLI arguments (e.g., `--url`)
//! 2. The config file
//! 3. Built-in defaults

mod discovery;
mod imp;

pub use discovery::*;
pub use imp::*;
