// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A live terminal view of a running test suite.
//!
//! `testwatch` subscribes to the event stream published by a test runner,
//! mirrors it into memory, and prints the state of every test file each time
//! it changes.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod render;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
