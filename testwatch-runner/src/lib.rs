// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testwatch: mirroring a running test suite from its
//! live event stream.
//!
//! The basic flow is:
//!
//! 1. A [`Transport`](reconciler::Transport) (usually
//!    [`SseTransport`](reconciler::SseTransport)) produces a stream of text
//!    messages.
//! 2. The [`Reconciler`](reconciler::Reconciler) decodes each message into an
//!    [`Event`](testwatch_metadata::Event) and applies it to the shared
//!    [`StateHandle`](store::StateHandle), reconnecting whenever the stream
//!    drops.
//! 3. Readers take snapshots of the [`StateStore`](store::StateStore) and
//!    derive statuses on demand.

pub mod errors;
pub mod reconciler;
pub mod store;
pub mod user_config;
