// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keeps a [`StateHandle`](crate::store::StateHandle) in sync with a live
//! event stream.
//!
//! A [`Reconciler`] owns a background task that subscribes through a
//! [`Transport`], decodes each message and applies it to the store. When the
//! stream fails or closes, the task waits for the [`ReconnectPolicy`] delay and
//! subscribes again, indefinitely, until [`Reconciler::stop`] is called.

mod imp;
mod sse;
mod transport;

pub use imp::*;
pub use sse::*;
pub use transport::*;
