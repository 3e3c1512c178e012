// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ApplyOutcome, File, StateStore};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use testwatch_metadata::Event;
use tokio::sync::watch;

/// A cloneable, shared handle to a [`StateStore`].
///
/// Readers borrow the store through [`read`](Self::read) or take an owned
/// [`snapshot`](Self::snapshot). Every write that changes the store bumps a
/// revision counter, which can be awaited through [`subscribe`](Self::subscribe).
///
/// Writes are only possible from this crate, and only by the current holder
/// of a [`WriterToken`].
#[derive(Clone, Debug)]
pub struct StateHandle {
    inner: Arc<RwLock<Shared>>,
    revision: Arc<watch::Sender<u64>>,
}

#[derive(Debug, Default)]
struct Shared {
    store: StateStore,
    // The generation of the only writer allowed to mutate the store.
    writer: u64,
}

/// Permission to write to a [`StateHandle`], valid until the next claim or revocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WriterToken {
    generation: u64,
}

impl WriterToken {
    pub(crate) fn generation(self) -> u64 {
        self.generation
    }
}

impl StateHandle {
    /// Creates a handle to a new, empty store.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(Shared::default())),
            revision: Arc::new(sender),
        }
    }

    /// Runs `f` with shared access to the store.
    ///
    /// The store cannot change while `f` runs, so `f` should not block.
    pub fn read<R>(&self, f: impl FnOnce(&StateStore) -> R) -> R {
        f(&self.read_lock().store)
    }

    /// Returns an owned copy of every file, in display order.
    pub fn snapshot(&self) -> Vec<File> {
        self.read(|store| store.files().cloned().collect())
    }

    /// Returns the current revision. Starts at 0 and increases with every change.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Returns a receiver notified on each new revision.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Invalidates every outstanding token and returns a new one.
    pub(crate) fn claim_writer(&self) -> WriterToken {
        let mut shared = self.write_lock();
        shared.writer += 1;
        WriterToken {
            generation: shared.writer,
        }
    }

    /// Invalidates every outstanding token.
    ///
    /// Once this returns, no write from a previously claimed token can land.
    pub(crate) fn revoke_writer(&self) {
        self.write_lock().writer += 1;
    }

    /// Applies `event` if `token` is still current.
    ///
    /// Returns `None` if the token was revoked.
    pub(crate) fn apply(&self, token: WriterToken, event: Event) -> Option<ApplyOutcome> {
        let mut shared = self.write_lock();
        if shared.writer != token.generation {
            return None;
        }
        let outcome = shared.store.apply(event);
        if outcome.changed() {
            // Bumped under the lock so revisions are ordered with writes.
            self.revision.send_modify(|revision| *revision += 1);
        }
        Some(outcome)
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Shared> {
        // A panicking reader cannot leave the store half-written, so poison is ignored.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Shared> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}
