// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{File, Status};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use testwatch_metadata::{Event, EventKind, FileState, InfoRecord, SubTestState};

/// Every file known to the dashboard, in display order.
///
/// All updates are full-field overwrites, so applying the same event twice
/// leaves the store unchanged the second time.
#[derive(Clone, Debug, Default)]
pub struct StateStore {
    files: IndexMap<String, File>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the files in display order.
    pub fn files(&self) -> impl ExactSizeIterator<Item = &File> + DoubleEndedIterator {
        self.files.values()
    }

    /// Returns the file with the given name, if any.
    pub fn file(&self, name: &str) -> Option<&File> {
        self.files.get(name)
    }

    /// Returns the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files are known.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Counts files and sub-tests by their derived status.
    pub fn summary(&self) -> StoreSummary {
        let mut summary = StoreSummary {
            files: self.files.len(),
            ..StoreSummary::default()
        };
        for test in self.files.values().flat_map(|file| file.sub_tests()) {
            summary.sub_tests += 1;
            match test.status() {
                Status::Running => summary.running += 1,
                Status::Done => summary.done += 1,
                Status::Error => summary.errored += 1,
                Status::Skip => {}
            }
        }
        summary
    }

    /// Replaces every file with the contents of a snapshot.
    ///
    /// Files are ordered by name, independent of the order of the snapshot.
    pub fn replace_all(&mut self, snapshot: BTreeMap<String, FileState>) -> ApplyOutcome {
        let mut states: Vec<FileState> = snapshot.into_values().collect();
        // The key and the payload name normally agree, but the payload name is the identity.
        states.sort_by(|a, b| a.name.cmp(&b.name));

        self.files = IndexMap::with_capacity(states.len());
        for state in states {
            self.files
                .insert(state.name.clone(), File::from_state(state));
        }
        ApplyOutcome::Replaced {
            files: self.files.len(),
        }
    }

    /// Creates or updates a file.
    ///
    /// An existing file has its duration and infos overwritten and keeps its
    /// sub-tests. A new file is appended with everything in the payload.
    pub fn upsert_file(&mut self, state: FileState) -> ApplyOutcome {
        match self.files.get_mut(&state.name) {
            Some(file) => {
                file.update(state.duration, state.infos);
                ApplyOutcome::FileUpdated
            }
            None => {
                self.files
                    .insert(state.name.clone(), File::from_state(state));
                ApplyOutcome::FileCreated
            }
        }
    }

    /// Overwrites the file-level infos of an existing file.
    pub fn set_file_infos(&mut self, name: &str, infos: Vec<InfoRecord>) -> ApplyOutcome {
        match self.files.get_mut(name) {
            Some(file) => {
                file.set_infos(infos);
                ApplyOutcome::FileInfosUpdated
            }
            None => ApplyOutcome::UnknownFile {
                filename: name.to_owned(),
            },
        }
    }

    /// Creates or updates a sub-test within the file named by `state.filename`.
    ///
    /// An existing sub-test is overwritten in place. Does nothing if the file
    /// is not known.
    pub fn upsert_sub_test(&mut self, state: SubTestState) -> ApplyOutcome {
        let Some(file) = self.files.get_mut(&state.filename) else {
            return ApplyOutcome::UnknownFile {
                filename: state.filename,
            };
        };
        if file.upsert_sub_test(state) {
            ApplyOutcome::SubTestCreated
        } else {
            ApplyOutcome::SubTestUpdated
        }
    }

    /// Applies a decoded event.
    pub fn apply(&mut self, event: Event) -> ApplyOutcome {
        match event {
            Event::Init(snapshot) => self.replace_all(snapshot),
            Event::Start(state) | Event::End(state) => self.upsert_file(state),
            Event::FileInfo(state) => self.set_file_infos(&state.name, state.infos),
            Event::StartTest(state)
            | Event::EndTest(state)
            | Event::Error(state)
            | Event::Info(state) => self.upsert_sub_test(state),
            // Files are never removed while connected.
            Event::Remove(_) => ApplyOutcome::Ignored {
                kind: EventKind::Remove,
            },
        }
    }
}

/// The result of applying an event to a [`StateStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every file was replaced by a snapshot.
    Replaced {
        /// The number of files now in the store.
        files: usize,
    },

    /// A new file was appended.
    FileCreated,

    /// An existing file had its duration and infos overwritten.
    FileUpdated,

    /// An existing file had its infos overwritten.
    FileInfosUpdated,

    /// A new sub-test was appended to an existing file.
    SubTestCreated,

    /// An existing sub-test was overwritten.
    SubTestUpdated,

    /// The event referred to a file that is not in the store, and was dropped.
    UnknownFile {
        /// The file name the event referred to.
        filename: String,
    },

    /// The event has no effect on the store.
    Ignored {
        /// The kind of event that was ignored.
        kind: EventKind,
    },
}

impl ApplyOutcome {
    /// Returns true if the store was written to.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::UnknownFile { .. } | Self::Ignored { .. })
    }
}

/// Counts of files and sub-tests in a [`StateStore`].
///
/// The status counts are over sub-tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// The number of files.
    pub files: usize,

    /// The number of sub-tests across all files.
    pub sub_tests: usize,

    /// Sub-tests still running.
    pub running: usize,

    /// Sub-tests that finished cleanly.
    pub done: usize,

    /// Sub-tests that finished with errors.
    pub errored: usize,
}
