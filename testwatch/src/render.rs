// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text and JSON views of a [`StateStore`].

use owo_colors::{OwoColorize, Style, style};
use swrite::{SWrite, swrite, swriteln};
use testwatch_filtering::search;
use testwatch_metadata::FileState;
use testwatch_runner::store::{ActiveSelection, File, StateStore, Status, SubTest};

/// Formats a duration in nanoseconds for display.
///
/// Below one second, shows milliseconds. Otherwise shows seconds. Both with
/// two decimal places.
pub(crate) fn format_nanoseconds(nanos: u64) -> String {
    let nanos = nanos as f64;
    if nanos < 1e9 {
        format!("{:.2}ms", nanos / 1e6)
    } else {
        format!("{:.2}s", nanos / 1e9)
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RenderStyles {
    running: Style,
    done: Style,
    error: Style,
    skip: Style,
    name: Style,
    dimmed: Style,
}

impl RenderStyles {
    pub(crate) fn colorize(&mut self) {
        self.running = style().yellow();
        self.done = style().green();
        self.error = style().red().bold();
        self.skip = style().dimmed();
        self.name = style().bold();
        self.dimmed = style().dimmed();
    }

    fn status(&self, status: Status) -> Style {
        match status {
            Status::Running => self.running,
            Status::Done => self.done,
            Status::Error => self.error,
            Status::Skip => self.skip,
        }
    }
}

/// What to render, and how.
#[derive(Clone, Debug, Default)]
pub(crate) struct RenderOpts {
    pub(crate) filter: Option<String>,
    pub(crate) show_infos: bool,
    pub(crate) styles: RenderStyles,
}

/// Returns the files to show: all of them in store order, or, with a filter,
/// the matching ones ranked best first.
pub(crate) fn visible_files<'a>(store: &'a StateStore, filter: Option<&str>) -> Vec<&'a File> {
    search(store.files(), filter.unwrap_or_default(), |file| file.name())
}

/// Points `selection` at the first errored file, and within it the first
/// errored sub-test. Clears it if nothing has errored.
pub(crate) fn update_selection(files: &[&File], selection: &mut ActiveSelection) {
    let Some(file) = files.iter().find(|file| file.status() == Status::Error) else {
        selection.clear();
        return;
    };
    selection.select_file(file.name());
    if let Some(test) = file
        .sub_tests_by_order()
        .into_iter()
        .find(|test| test.status() == Status::Error)
    {
        selection.select_test(test.name());
    }
}

/// Renders the store as text, updating `selection` along the way.
pub(crate) fn render_text(
    store: &StateStore,
    opts: &RenderOpts,
    selection: &mut ActiveSelection,
) -> String {
    let files = visible_files(store, opts.filter.as_deref());
    update_selection(&files, selection);

    let mut out = String::new();
    for file in &files {
        write_file(&mut out, file, opts);
    }

    if let Some(file) = selection.resolve_file(store) {
        out.push('\n');
        swriteln!(out, "errors in {}:", file.name().style(opts.styles.name));
        for test in file.sub_tests_by_order() {
            write_errors(&mut out, test, selection.test_name() == Some(test.name()), opts);
        }
    }

    let summary = store.summary();
    let summary_line = format!(
        "{} files, {} sub-tests: {} running, {} done, {} errored",
        summary.files, summary.sub_tests, summary.running, summary.done, summary.errored,
    );
    swriteln!(out, "{}", summary_line.style(opts.styles.dimmed));
    out
}

fn write_file(out: &mut String, file: &File, opts: &RenderOpts) {
    let status = file.status();
    swriteln!(
        out,
        "{:<7}  {:>10}  {}",
        status.style(opts.styles.status(status)),
        format_nanoseconds(file.duration()),
        file.name().style(opts.styles.name),
    );
    if opts.show_infos {
        for info in file.infos_by_order() {
            swriteln!(out, "    [{}] {}", info.kind, info.title);
        }
    }
    for test in file.sub_tests_by_order() {
        let status = test.status();
        swrite!(
            out,
            "    {:<7}  {:>10}  {}",
            status.style(opts.styles.status(status)),
            format_nanoseconds(test.duration()),
            test.name(),
        );
        if !test.runner().is_empty() {
            let runner = format!("({})", test.runner());
            swrite!(out, " {}", runner.style(opts.styles.dimmed));
        }
        out.push('\n');
        if opts.show_infos {
            for info in test.infos_by_order() {
                swriteln!(
                    out,
                    "        [{}] {}",
                    info.kind,
                    info.title.style(opts.styles.dimmed)
                );
            }
        }
    }
}

fn write_errors(out: &mut String, test: &SubTest, focused: bool, opts: &RenderOpts) {
    if test.errors().is_empty() {
        return;
    }
    let marker = if focused { ">" } else { " " };
    for error in test.errors() {
        swriteln!(
            out,
            "{marker} {}: {}",
            test.name().style(opts.styles.name),
            error.message.style(opts.styles.error)
        );
        if let Some(expected) = &error.expected {
            swriteln!(out, "      expected: {expected}");
        }
        if let Some(actual) = &error.actual {
            swriteln!(out, "      actual:   {actual}");
        }
    }
}

/// Renders the visible files as a single line of JSON, in the wire format.
pub(crate) fn render_json(
    store: &StateStore,
    opts: &RenderOpts,
) -> Result<String, serde_json::Error> {
    let files: Vec<FileState> = visible_files(store, opts.filter.as_deref())
        .into_iter()
        .map(File::to_state)
        .collect();
    let mut out = serde_json::to_string(&files)?;
    out.push('\n');
    Ok(out)
}
