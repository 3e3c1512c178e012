// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::NO_HEADING;
use std::error::Error;
use testwatch_metadata::TestwatchExitCode;
use testwatch_runner::errors::{ConfigError, TransportError};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are printed through
// display_to_stderr.

/// An error that ends the program with a specific exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("failed to load configuration")]
    ConfigLoad {
        #[source]
        error: ConfigError,
    },
    #[error("failed to set up event stream transport")]
    TransportSetup {
        #[source]
        error: TransportError,
    },
    #[error("failed to start async runtime")]
    RuntimeBuild {
        #[source]
        error: std::io::Error,
    },
    #[error("failed to set up Ctrl-C handler")]
    SignalHandlerSetup {
        #[source]
        error: std::io::Error,
    },
    #[error("failed to serialize state as JSON")]
    JsonSerialize {
        #[source]
        error: serde_json::Error,
    },
    #[error("failed to write output")]
    WriteOutput {
        #[source]
        error: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigLoad { .. } => TestwatchExitCode::CONFIG_ERROR,
            Self::TransportSetup { .. }
            | Self::RuntimeBuild { .. }
            | Self::SignalHandlerSetup { .. } => TestwatchExitCode::SETUP_ERROR,
            Self::JsonSerialize { .. } | Self::WriteOutput { .. } => {
                TestwatchExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr, followed by its chain of causes.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::ConfigLoad { error } => {
                error!("failed to load configuration");
                Some(error as &dyn Error)
            }
            Self::TransportSetup { error } => {
                error!("failed to set up event stream transport");
                Some(error as &dyn Error)
            }
            Self::RuntimeBuild { error } => {
                error!("failed to start async runtime");
                Some(error as &dyn Error)
            }
            Self::SignalHandlerSetup { error } => {
                error!("failed to set up Ctrl-C handler");
                Some(error as &dyn Error)
            }
            Self::JsonSerialize { error } => {
                error!("failed to serialize state as JSON");
                Some(error as &dyn Error)
            }
            Self::WriteOutput { error } => {
                error!("failed to write output");
                Some(error as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
