// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::StateStore;
use indexmap::IndexMap;
use std::fmt;
use testwatch_metadata::{ErrorRecord, FileState, InfoRecord, SubTestState};

/// The derived status of a [`File`] or [`SubTest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Still running.
    Running,

    /// Finished without errors.
    Done,

    /// Finished, or still running, with at least one error.
    Error,

    /// Skipped by the producer.
    ///
    /// Never derived by the store itself.
    Skip,
}

impl Status {
    /// Returns the status as an upper-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
            Self::Skip => "SKIP",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A test file under observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
    name: String,
    duration: u64,
    sub_tests: IndexMap<String, SubTest>,
    infos: Vec<InfoRecord>,
}

impl File {
    pub(super) fn from_state(state: FileState) -> Self {
        let mut file = Self {
            name: state.name,
            duration: state.duration,
            sub_tests: IndexMap::with_capacity(state.sub_tests.len()),
            infos: state.infos,
        };
        for test in state.sub_tests {
            file.upsert_sub_test(test);
        }
        file
    }

    /// Returns the file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of nanoseconds the file took, or 0 while it is running.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Returns the file-level info records, in arrival order.
    pub fn infos(&self) -> &[InfoRecord] {
        &self.infos
    }

    /// Returns the file-level info records, stably sorted by their `order` field.
    pub fn infos_by_order(&self) -> Vec<&InfoRecord> {
        sorted_by_order(self.infos.iter(), |info| info.order)
    }

    /// Returns the sub-tests in arrival order.
    pub fn sub_tests(&self) -> impl ExactSizeIterator<Item = &SubTest> + DoubleEndedIterator {
        self.sub_tests.values()
    }

    /// Returns the sub-test with the given name, if any.
    pub fn sub_test(&self, name: &str) -> Option<&SubTest> {
        self.sub_tests.get(name)
    }

    /// Returns the sub-tests stably sorted by their `order` field.
    ///
    /// Sub-tests with equal `order` keep their arrival order.
    pub fn sub_tests_by_order(&self) -> Vec<&SubTest> {
        sorted_by_order(self.sub_tests.values(), |test| test.order)
    }

    /// Derives the status of this file from its sub-tests.
    ///
    /// Any errored sub-test makes the file errored, even if others are still
    /// running. A file with no sub-tests is done.
    pub fn status(&self) -> Status {
        let mut running = false;
        for test in self.sub_tests.values() {
            match test.status() {
                Status::Error => return Status::Error,
                Status::Running => running = true,
                Status::Done | Status::Skip => {}
            }
        }
        if running { Status::Running } else { Status::Done }
    }

    /// Converts this file back into its wire representation.
    pub fn to_state(&self) -> FileState {
        FileState {
            name: self.name.clone(),
            duration: self.duration,
            sub_tests: self
                .sub_tests
                .values()
                .map(|test| test.to_state(&self.name))
                .collect(),
            infos: self.infos.clone(),
        }
    }

    pub(super) fn update(&mut self, duration: u64, infos: Vec<InfoRecord>) {
        self.duration = duration;
        self.infos = infos;
    }

    pub(super) fn set_infos(&mut self, infos: Vec<InfoRecord>) {
        self.infos = infos;
    }

    /// Returns true if a new sub-test was appended.
    pub(super) fn upsert_sub_test(&mut self, state: SubTestState) -> bool {
        match self.sub_tests.get_mut(&state.name) {
            Some(existing) => {
                existing.overwrite(state);
                false
            }
            None => {
                self.sub_tests
                    .insert(state.name.clone(), SubTest::from_state(state));
                true
            }
        }
    }
}

/// A single named test case within a [`File`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubTest {
    name: String,
    runner: String,
    order: i64,
    duration: u64,
    errors: Vec<ErrorRecord>,
    infos: Vec<InfoRecord>,
}

impl SubTest {
    fn from_state(state: SubTestState) -> Self {
        Self {
            name: state.name,
            runner: state.runner,
            order: state.order,
            duration: state.duration,
            errors: state.errors,
            infos: state.infos,
        }
    }

    fn overwrite(&mut self, state: SubTestState) {
        self.runner = state.runner;
        self.order = state.order;
        self.duration = state.duration;
        self.errors = state.errors;
        self.infos = state.infos;
    }

    /// Returns the sub-test name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of runner executing this sub-test, or an empty string.
    pub fn runner(&self) -> &str {
        &self.runner
    }

    /// Returns the producer-assigned display position.
    pub fn order(&self) -> i64 {
        self.order
    }

    /// Returns the number of nanoseconds the sub-test took, or 0 while it is running.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Returns the errors recorded against this sub-test.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Returns the info records, in arrival order.
    pub fn infos(&self) -> &[InfoRecord] {
        &self.infos
    }

    /// Returns the info records, stably sorted by their `order` field.
    pub fn infos_by_order(&self) -> Vec<&InfoRecord> {
        sorted_by_order(self.infos.iter(), |info| info.order)
    }

    /// Derives the status of this sub-test.
    ///
    /// A zero duration means the sub-test is still running, regardless of
    /// any errors already recorded.
    pub fn status(&self) -> Status {
        if self.duration == 0 {
            Status::Running
        } else if !self.errors.is_empty() {
            Status::Error
        } else {
            Status::Done
        }
    }

    /// Converts this sub-test back into its wire representation.
    pub fn to_state(&self, filename: &str) -> SubTestState {
        SubTestState {
            filename: filename.to_owned(),
            name: self.name.clone(),
            runner: self.runner.clone(),
            duration: self.duration,
            errors: self.errors.clone(),
            infos: self.infos.clone(),
            order: self.order,
        }
    }
}

fn sorted_by_order<'a, T>(items: impl Iterator<Item = &'a T>, order: fn(&T) -> i64) -> Vec<&'a T> {
    let mut items: Vec<_> = items.collect();
    items.sort_by_key(|item| order(item));
    items
}

/// The file and sub-test currently focused by the user.
///
/// Both are held by name and may dangle: an entity that no longer exists (for
/// example after a fresh snapshot) simply resolves to `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveSelection {
    file: Option<String>,
    test: Option<String>,
}

impl ActiveSelection {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Focuses a file, clearing any focused sub-test.
    pub fn select_file(&mut self, name: impl Into<String>) {
        self.file = Some(name.into());
        self.test = None;
    }

    /// Focuses a sub-test of the currently focused file.
    pub fn select_test(&mut self, name: impl Into<String>) {
        self.test = Some(name.into());
    }

    /// Clears both the focused file and sub-test.
    pub fn clear(&mut self) {
        self.file = None;
        self.test = None;
    }

    /// Returns the name of the focused file.
    pub fn file_name(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Returns the name of the focused sub-test.
    pub fn test_name(&self) -> Option<&str> {
        self.test.as_deref()
    }

    /// Looks up the focused file in `store`.
    pub fn resolve_file<'a>(&self, store: &'a StateStore) -> Option<&'a File> {
        store.file(self.file.as_deref()?)
    }

    /// Looks up the focused sub-test in `store`.
    pub fn resolve_test<'a>(&self, store: &'a StateStore) -> Option<&'a SubTest> {
        self.resolve_file(store)?.sub_test(self.test.as_deref()?)
    }
}
