// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::EventDecodeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt};

/// A single message from the live event stream.
///
/// On the wire, every event is an object with a `type` tag and a `data` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// A full snapshot of every known file, keyed by the producer's file key.
    ///
    /// Sent once each time a subscription is established.
    Init(BTreeMap<String, FileState>),

    /// A file started (or restarted) running.
    Start(FileState),

    /// A file finished running.
    End(FileState),

    /// A sub-test started running.
    StartTest(SubTestState),

    /// A sub-test finished running.
    EndTest(SubTestState),

    /// An error was recorded against a running sub-test.
    Error(SubTestState),

    /// A diagnostic record was attached to a sub-test.
    ///
    /// The payload carries the sub-test's full, updated list of records.
    Info(SubTestState),

    /// A diagnostic record was attached to a file as a whole.
    FileInfo(FileState),

    /// The producer stopped tracking a file, usually because it was deleted.
    ///
    /// The payload is the file name.
    Remove(String),
}

impl Event {
    /// Decodes a single message from its JSON text.
    pub fn decode(text: &str) -> Result<Self, EventDecodeError> {
        serde_json::from_str(text).map_err(|error| EventDecodeError::new(text, error))
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Init(_) => EventKind::Init,
            Self::Start(_) => EventKind::Start,
            Self::End(_) => EventKind::End,
            Self::StartTest(_) => EventKind::StartTest,
            Self::EndTest(_) => EventKind::EndTest,
            Self::Error(_) => EventKind::Error,
            Self::Info(_) => EventKind::Info,
            Self::FileInfo(_) => EventKind::FileInfo,
            Self::Remove(_) => EventKind::Remove,
        }
    }

    /// Returns the name of the file this event is about, or `None` for a snapshot.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Init(_) => None,
            Self::Start(file) | Self::End(file) | Self::FileInfo(file) => Some(&file.name),
            Self::StartTest(test) | Self::EndTest(test) | Self::Error(test) | Self::Info(test) => {
                Some(&test.filename)
            }
            Self::Remove(name) => Some(name),
        }
    }
}

/// The tag of an [`Event`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// `init`
    Init,
    /// `start`
    Start,
    /// `end`
    End,
    /// `start_test`
    StartTest,
    /// `end_test`
    EndTest,
    /// `error`
    Error,
    /// `info`
    Info,
    /// `file_info`
    FileInfo,
    /// `remove`
    Remove,
}

impl EventKind {
    /// Returns the tag as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Start => "start",
            Self::End => "end",
            Self::StartTest => "start_test",
            Self::EndTest => "end_test",
            Self::Error => "error",
            Self::Info => "info",
            Self::FileInfo => "file_info",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of a test file, as carried by `init`, `start`, `end` and `file_info`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileState {
    /// The file name. Unique among files.
    pub name: String,

    /// Nanoseconds the file took to run, or 0 while it is still running.
    #[serde(default)]
    pub duration: u64,

    /// The sub-tests the producer knows about, in the order they were added.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sub_tests: Vec<SubTestState>,

    /// Diagnostic records attached to the file as a whole.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub infos: Vec<InfoRecord>,
}

/// The state of a single sub-test within a file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTestState {
    /// The name of the file that owns this sub-test.
    pub filename: String,

    /// The sub-test name. Unique within its file.
    pub name: String,

    /// The kind of runner executing the sub-test, for example `rest` or `sql`.
    #[serde(default)]
    pub runner: String,

    /// Nanoseconds the sub-test took to run, or 0 while it is still running.
    #[serde(default)]
    pub duration: u64,

    /// Errors recorded for this sub-test. Empty while it is passing.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<ErrorRecord>,

    /// Diagnostic records attached to this sub-test.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub infos: Vec<InfoRecord>,

    /// Producer-assigned display position.
    #[serde(default)]
    pub order: i64,
}

/// A single failure recorded against a sub-test.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// The failure message.
    pub message: String,

    /// The expected value, if the failure was a comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,

    /// The actual value, if the failure was a comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
}

impl ErrorRecord {
    /// Creates an error record with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }
}

/// A diagnostic record: a request sent, a response received, a query run, and so on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
    /// What kind of record this is.
    #[serde(rename = "type")]
    pub kind: InfoKind,

    /// A short title, e.g. `POST /users` or `Helper.login`.
    pub title: String,

    /// The record body.
    #[serde(default)]
    pub content: String,

    /// Structured arguments, for helper invocations.
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<InfoArg>,

    /// When the record was produced, as reported by the producer.
    #[serde(default)]
    pub timestamp: i64,

    /// Producer-assigned position among the records of the same parent.
    #[serde(default)]
    pub order: i64,

    /// The language of `content`, used for optional syntax highlighting.
    #[serde(
        default,
        deserialize_with = "deserialize_language",
        skip_serializing_if = "Option::is_none"
    )]
    pub language: Option<Language>,
}

/// The kind of an [`InfoRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoKind {
    /// A helper function was invoked.
    Helper,
    /// A request was sent.
    Request,
    /// A response was received.
    Response,
    /// A query was executed.
    Query,
    /// A query produced a result.
    Result,
}

impl InfoKind {
    /// Returns the kind as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Helper => "helper",
            Self::Request => "request",
            Self::Response => "response",
            Self::Query => "query",
            Self::Result => "result",
        }
    }
}

impl fmt::Display for InfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named argument to a helper invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoArg {
    /// The argument name, if the helper declares one. Variadic arguments have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The formatted argument value.
    pub value: String,
}

/// The language tag attached to an [`InfoRecord`]'s content.
///
/// Tags outside the known set are kept as [`Language::Other`] rather than
/// failing the whole message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    /// `go`
    Go,
    /// `lua`
    Lua,
    /// `diff`
    Diff,
    /// `graphql`
    Graphql,
    /// `sql`
    Sql,
    /// `json`
    Json,
    /// Any other tag.
    Other(String),
}

impl Language {
    /// Parses a language tag. Never fails.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "go" => Self::Go,
            "lua" => Self::Lua,
            "diff" => Self::Diff,
            "graphql" => Self::Graphql,
            "sql" => Self::Sql,
            "json" => Self::Json,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the tag as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Go => "go",
            Self::Lua => "lua",
            Self::Diff => "diff",
            Self::Graphql => "graphql",
            Self::Sql => "sql",
            Self::Json => "json",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

// The producer emits `null` for empty collections.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// An empty tag means no language.
fn deserialize_language<'de, D>(deserializer: D) -> Result<Option<Language>, D::Error>
where
    D: Deserializer<'de>,
{
    let tag = Option::<String>::deserialize(deserializer)?;
    Ok(tag
        .filter(|tag| !tag.is_empty())
        .map(|tag| Language::from_tag(&tag)))
}
