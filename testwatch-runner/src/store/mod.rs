// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-memory model of a test run.
//!
//! A [`StateStore`] holds every [`File`] known to the dashboard, each of which
//! owns its [`SubTest`]s. Statuses are never stored: [`File::status`] and
//! [`SubTest::status`] derive them from leaf state on every call, so there is
//! nothing to invalidate when an event lands.
//!
//! The store is shared between the reconciler and readers through a
//! [`StateHandle`].

mod handle;
mod imp;
mod model;

pub use handle::*;
pub use imp::*;
pub use model::*;
