// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testwatch-runner.

use camino::{FromPathBufError, Utf8PathBuf};
use std::{error, fmt, io};
use thiserror::Error;

/// An error that occurred while subscribing to or reading from the event stream.
///
/// Transport errors are never fatal: the reconciler logs them and reconnects.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Building the HTTP client failed.
    #[error("failed to build HTTP client for event stream")]
    ClientBuild {
        /// The underlying error.
        #[source]
        error: reqwest::Error,
    },

    /// The connection to the event stream could not be established.
    #[error("failed to connect to event stream at `{url}`")]
    Connect {
        /// The endpoint that was requested.
        url: String,

        /// The underlying error.
        #[source]
        error: reqwest::Error,
    },

    /// The endpoint responded, but not with a success status.
    #[error("event stream at `{url}` responded with status {status}")]
    Status {
        /// The endpoint that was requested.
        url: String,

        /// The status code returned.
        status: reqwest::StatusCode,
    },

    /// Reading the body of an established stream failed.
    #[error("error reading from event stream")]
    Read {
        /// The underlying error.
        #[source]
        error: reqwest::Error,
    },

    /// The stream is unreachable for a transport-specific reason.
    #[error("event stream is unreachable: {reason}")]
    Unreachable {
        /// A description of what went wrong.
        reason: String,
    },
}

impl TransportError {
    /// Creates a new `Unreachable` error.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }
}

/// An error that occurred while loading testwatch configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found at {path}")]
    FileNotFound {
        /// The path that was requested.
        path: Utf8PathBuf,
    },

    /// The config file could not be read.
    #[error("failed to read config file at {path}")]
    Read {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The config file is not valid TOML, or has values of the wrong type.
    #[error("failed to parse config file at {path}")]
    Parse {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// The configured stream URL is not a valid `http` or `https` URL.
    #[error("invalid event stream URL `{url}`: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,

        /// Why the URL was rejected.
        reason: String,
    },

    /// The default config directory is not valid UTF-8.
    #[error("config directory is not valid UTF-8")]
    NonUtf8Path {
        /// The underlying error.
        #[source]
        error: FromPathBufError,
    },
}

/// Displays an error followed by each of its sources, separated by `: `.
#[derive(Clone, Copy, Debug)]
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Wraps `error` for display.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
