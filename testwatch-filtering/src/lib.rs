// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Fuzzy matching for interactively filtering test lists.
//!
//! [`score`] rates how well a typed pattern matches a candidate string, and
//! [`search`] uses it to filter and rank a list. Matching is case-insensitive
//! and accepts both contiguous substrings and scattered subsequences; better
//! matches (exact, prefix, start of a path or word segment) rank higher, and
//! shorter candidates get a small bonus.
//!
//! ```
//! use testwatch_filtering::search;
//!
//! let files = vec!["user_test.lua", "admin/users.lua", "teams.lua"];
//! let ranked = search(files, "user", |name| *name);
//! assert_eq!(ranked, vec!["user_test.lua", "admin/users.lua"]);
//! ```

mod matcher;
mod search;

pub use matcher::{FuzzyMatch, MatchTier, SEGMENT_DELIMITERS, fuzzy_match, score};
pub use search::search;
