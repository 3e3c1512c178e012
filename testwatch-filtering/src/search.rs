// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::matcher::score;

/// Filters `items` down to those matching `pattern`, best matches first.
///
/// `text_of` returns the string each item is matched against. Items with equal
/// scores keep their original relative order. If `pattern` is empty, `items`
/// is returned as-is, without re-sorting.
pub fn search<T, F>(items: impl IntoIterator<Item = T>, pattern: &str, mut text_of: F) -> Vec<T>
where
    F: FnMut(&T) -> &str,
{
    if pattern.is_empty() {
        return items.into_iter().collect();
    }

    let mut scored: Vec<(u32, T)> = items
        .into_iter()
        .filter_map(|item| {
            let score = score(pattern, text_of(&item))?;
            Some((score, item))
        })
        .collect();

    // sort_by is stable, which keeps ties in input order.
    scored.sort_by(|(a, _), (b, _)| b.cmp(a));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Named {
        id: usize,
        name: &'static str,
    }

    #[test]
    fn empty_pattern_returns_input_unchanged() {
        let items = vec!["zeta", "alpha", "mid"];
        assert_eq!(search(items.clone(), "", |s| *s), items);
    }

    #[test]
    fn ranks_by_descending_score() {
        let items = vec!["a/b/user_test.lua", "user", "users.lua", "u_s_e_r.lua"];
        let ranked = search(items, "user", |s| *s);
        assert_eq!(
            ranked,
            vec![
                // exact
                "user",
                // prefix
                "users.lua",
                // segment
                "a/b/user_test.lua",
                // subsequence
                "u_s_e_r.lua",
            ]
        );
    }

    #[test]
    fn ties_keep_input_order() {
        // Same length and same tier, so same score.
        let items = vec![
            Named { id: 0, name: "x_foo" },
            Named { id: 1, name: "nomatch" },
            Named { id: 2, name: "y_foo" },
            Named { id: 3, name: "z_foo" },
        ];
        let ranked = search(items, "foo", |item| item.name);
        let ids: Vec<_> = ranked.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![0, 2, 3]);
    }

    #[test]
    fn works_over_references() {
        let owned = vec!["Alpha".to_owned(), "beta".to_owned()];
        let ranked = search(&owned, "ALP", |s| s.as_str());
        assert_eq!(ranked, vec![&owned[0]]);
    }
}
