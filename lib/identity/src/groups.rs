//! Group membership normalized from identity provider claims.
//!
//! The `cognito:groups` claim arrives in several shapes depending on who
//! produced it: a JSON list in tokens, a single string for one group, or a
//! joined string (`"a,b"` or `"[a b]"`) once a gateway has flattened the
//! claim map. All of them become a `GroupSet` at the boundary.
//!
//! A joined string cannot tell a separator from a comma inside a name: the
//! gateway's `"ops,administrators"` is two groups. Group names must therefore
//! not contain commas (the provider already forbids whitespace). Members of a
//! JSON list are taken as-is and never split.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of group names an identity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GroupsClaim", into = "Vec<String>")]
pub struct GroupSet {
    groups: BTreeSet<String>,
}

/// Wire shapes accepted for the groups claim.
#[derive(Deserialize)]
#[serde(untagged)]
enum GroupsClaim {
    Many(Vec<String>),
    One(String),
}

impl From<GroupsClaim> for GroupSet {
    fn from(claim: GroupsClaim) -> Self {
        match claim {
            GroupsClaim::Many(groups) => groups.into_iter().collect(),
            GroupsClaim::One(joined) => Self::from_joined(&joined),
        }
    }
}

impl From<GroupSet> for Vec<String> {
    fn from(set: GroupSet) -> Self {
        set.groups.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for GroupSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let groups = iter
            .into_iter()
            .map(Into::into)
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        Self { groups }
    }
}

impl GroupSet {
    /// Creates an empty group set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a flattened groups claim such as `"a"`, `"a,b"` or `"[a b]"`.
    ///
    /// Every comma and whitespace run separates names.
    #[must_use]
    pub fn from_joined(joined: &str) -> Self {
        let trimmed = joined.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .collect()
    }

    /// Returns true if `group` is a member of the set.
    #[must_use]
    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Returns true if the set has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Iterates group names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }
}
