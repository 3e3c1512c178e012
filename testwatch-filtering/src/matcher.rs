// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Characters that split a candidate into segments for [`MatchTier::Segment`].
pub const SEGMENT_DELIMITERS: [char; 4] = ['_', '-', '/', '.'];

/// Candidates at least this many characters long get no length bonus.
const LENGTH_BONUS_CAP: usize = 100;

/// How a pattern matched a candidate. Better tiers have higher base scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchTier {
    /// The pattern was empty. Everything matches with a score of 0.
    EmptyPattern,

    /// The pattern is a substring or a scattered subsequence of the candidate.
    Partial,

    /// A delimiter-separated segment of the candidate starts with the pattern.
    Segment,

    /// The candidate starts with the pattern.
    Prefix,

    /// The candidate equals the pattern.
    Exact,
}

impl MatchTier {
    /// The score a match of this tier starts from, before the length bonus.
    pub fn base_score(self) -> u32 {
        match self {
            Self::EmptyPattern => 0,
            Self::Partial => 100,
            Self::Segment => 250,
            Self::Prefix => 500,
            Self::Exact => 1000,
        }
    }
}

/// The result of a successful [`fuzzy_match`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FuzzyMatch {
    /// The tier the match fell into.
    pub tier: MatchTier,

    /// The final score: the tier's base score plus the length bonus.
    pub score: u32,
}

/// Matches `pattern` against `text`, case-insensitively.
///
/// Returns `None` if `pattern` is neither a substring nor a subsequence of `text`.
pub fn fuzzy_match(pattern: &str, text: &str) -> Option<FuzzyMatch> {
    let pattern = pattern.to_lowercase();
    if pattern.is_empty() {
        return Some(FuzzyMatch {
            tier: MatchTier::EmptyPattern,
            score: 0,
        });
    }

    let lowered = text.to_lowercase();
    if !lowered.contains(&pattern) && !is_subsequence(&pattern, &lowered) {
        return None;
    }

    let tier = if lowered == pattern {
        MatchTier::Exact
    } else if lowered.starts_with(&pattern) {
        MatchTier::Prefix
    } else if lowered
        .split(SEGMENT_DELIMITERS)
        .any(|segment| segment.starts_with(&pattern))
    {
        MatchTier::Segment
    } else {
        MatchTier::Partial
    };

    // The bonus is computed from the original text, favoring shorter candidates.
    let bonus = LENGTH_BONUS_CAP.saturating_sub(text.chars().count());
    Some(FuzzyMatch {
        tier,
        score: tier.base_score() + bonus as u32,
    })
}

/// Returns the score of `pattern` against `text`, or `None` if it doesn't match.
///
/// An empty pattern matches everything with a score of 0.
pub fn score(pattern: &str, text: &str) -> Option<u32> {
    fuzzy_match(pattern, text).map(|m| m.score)
}

/// Greedily consumes `pattern`'s characters from left to right through `text`.
fn is_subsequence(pattern: &str, text: &str) -> bool {
    let mut pattern_chars = pattern.chars().peekable();
    for c in text.chars() {
        match pattern_chars.peek() {
            Some(&next) if next == c => {
                pattern_chars.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    pattern_chars.peek().is_none()
}
