//! Scope-set matching for access-token containers.

use std::collections::BTreeSet;

use crate::error::{StorageError, StorageResult};

/// A normalized scope set.
pub type ScopeSet = BTreeSet<String>;

/// Splits `target` on whitespace, lower-cases each scope and drops duplicates.
#[must_use]
pub fn normalize_scopes(target: &str) -> ScopeSet {
    target
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Returns true if the two sets share a scope.
#[must_use]
pub fn intersects(a: &ScopeSet, b: &ScopeSet) -> bool {
    // Both sets are sorted, so walk the smaller one.
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().any(|scope| large.contains(scope))
}

/// Finds the first stored key whose scopes are a superset of `requested`.
///
/// Containers are kept overlap-free by the write path, so at most one key can
/// match a non-empty request; a second match is logged and ignored.
///
/// # Errors
///
/// Returns `InvalidArgument` if `requested` holds no scopes.
pub fn find_match<'a, I>(keys: I, requested: &str) -> StorageResult<Option<&'a str>>
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = normalize_scopes(requested);
    if wanted.is_empty() {
        return Err(StorageError::invalid_argument(
            "target",
            "access token lookups need at least one scope",
        ));
    }

    let mut found = None;
    for key in keys {
        if !wanted.is_subset(&normalize_scopes(key)) {
            continue;
        }
        match found {
            None => found = Some(key),
            Some(first) => {
                tracing::warn!(
                    first,
                    other = key,
                    "several access tokens satisfy one scope request; using the first"
                );
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn set(items: &[&str]) -> ScopeSet {
        items.iter().map(|item| (*item).to_string()).collect()
    }

    #[test_case("User.Read Mail.Read", &["mail.read", "user.read"] ; "mixed case")]
    #[test_case("  a   b\tc\n", &["a", "b", "c"] ; "irregular whitespace")]
    #[test_case("a A a", &["a"] ; "duplicates")]
    #[test_case("   ", &[] ; "blank")]
    fn test_normalize_scopes(input: &str, expected: &[&str]) {
        assert_eq!(normalize_scopes(input), set(expected));
    }

    #[test_case("a b", "b c", true ; "shared scope")]
    #[test_case("a b", "c d", false ; "disjoint")]
    #[test_case("A", "a", true ; "case insensitive")]
    #[test_case("", "a", false ; "empty")]
    fn test_intersects(a: &str, b: &str, expected: bool) {
        assert_eq!(
            intersects(&normalize_scopes(a), &normalize_scopes(b)),
            expected
        );
    }

    #[test]
    fn test_find_match_uses_superset_rule() {
        let keys = ["a b", "a b c"];
        assert!(keys.contains(&find_match(keys, "a").expect("lookup").expect("match")));
        assert_eq!(find_match(keys, "c B").expect("lookup"), Some("a b c"));
        assert_eq!(find_match(keys, "a d").expect("lookup"), None);
    }

    #[test]
    fn test_find_match_first_match_wins() {
        let keys = ["x y", "x z"];
        assert_eq!(find_match(keys, "x").expect("lookup"), Some("x y"));
    }

    #[test]
    fn test_find_match_rejects_empty_request() {
        assert!(matches!(
            find_match(["a"], " \t"),
            Err(StorageError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_find_match_empty_container() {
        assert_eq!(find_match(std::iter::empty(), "a").expect("lookup"), None);
    }
}
