// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the testwatch live event stream.
//!
//! A test producer pushes one JSON message per state change, each of the form
//! `{"type": <tag>, "data": <payload>}`. This crate defines the payload shapes
//! and decodes messages into [`Event`]s. It does not interpret events: see
//! `testwatch-runner` for the state store they are applied to.
//!
//! Field names match the producer's wire format exactly, so these types also
//! serialize back into messages the producer would have sent.

mod errors;
mod events;
mod exit_codes;

pub use errors::*;
pub use events::*;
pub use exit_codes::*;
