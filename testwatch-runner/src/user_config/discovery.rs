// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Where testwatch looks for its config file when none is given explicitly.

use crate::errors::ConfigError;
use camino::Utf8PathBuf;
use etcetera::{BaseStrategy, HomeDirError, base_strategy::Xdg};
use std::path::PathBuf;

/// The directory under the platform config dir that holds testwatch's files.
const APP_DIR: &str = "testwatch";

/// The config file name within [`APP_DIR`].
const CONFIG_FILE: &str = "config.toml";

/// Returns candidate paths for the config file, in order of priority.
///
/// Everywhere, this includes `$XDG_CONFIG_HOME/testwatch/config.toml`
/// (`~/.config/testwatch/config.toml` if unset). On Windows,
/// `%APPDATA%\testwatch\config.toml` comes first.
///
/// A platform whose home directory can't be determined contributes no
/// candidate. The caller should use the first path that exists.
pub fn config_paths() -> Result<Vec<Utf8PathBuf>, ConfigError> {
    let mut candidates = Vec::new();

    #[cfg(windows)]
    candidates.push(etcetera::base_strategy::Windows::new().map(|s| s.config_dir()));
    candidates.push(Xdg::new().map(|s| s.config_dir()));

    candidates
        .into_iter()
        .filter_map(|dir: Result<PathBuf, HomeDirError>| dir.ok())
        .map(config_file_in)
        .collect()
}

fn config_file_in(config_dir: PathBuf) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::try_from(config_dir.join(APP_DIR).join(CONFIG_FILE))
        .map_err(|error| ConfigError::NonUtf8Path { error })
}
