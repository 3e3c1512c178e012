// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// The maximum number of characters of a malformed message kept for diagnostics.
const PREVIEW_CHARS: usize = 80;

/// An error that occurs while decoding a message from the event stream.
///
/// Decode errors are per-message: the stream itself is still usable.
#[derive(Debug)]
pub struct EventDecodeError {
    preview: String,
    error: serde_json::Error,
}

impl EventDecodeError {
    pub(crate) fn new(text: &str, error: serde_json::Error) -> Self {
        Self {
            preview: preview(text),
            error,
        }
    }

    /// Returns the beginning of the offending message, truncated with `…` if it was long.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Returns the underlying JSON error.
    pub fn json_error(&self) -> &serde_json::Error {
        &self.error
    }
}

impl fmt::Display for EventDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to decode event from message `{}`", self.preview)
    }
}

impl error::Error for EventDecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let mut preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        preview.push('…');
    }
    preview
}
