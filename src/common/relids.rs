// Relation Identifier Sets
//
// Immutable, structurally shared sets of base relation ids. Every set
// operation returns a new set; clones only bump a reference count.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::common::types::RelId;

/// A set of base relation ids
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Relids(Rc<BTreeSet<RelId>>);

impl Relids {
    /// The empty set
    pub fn empty() -> Self {
        Relids::default()
    }

    /// A set holding exactly one relation
    pub fn singleton(relid: RelId) -> Self {
        let mut set = BTreeSet::new();
        set.insert(relid);
        Relids(Rc::new(set))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, relid: RelId) -> bool {
        self.0.contains(&relid)
    }

    pub fn iter(&self) -> impl Iterator<Item = RelId> + '_ {
        self.0.iter().copied()
    }

    /// Members of either set
    pub fn union(&self, other: &Relids) -> Relids {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        Relids(Rc::new(self.0.union(&other.0).copied().collect()))
    }

    /// Members of `self` that are not in `other`
    pub fn difference(&self, other: &Relids) -> Relids {
        if self.is_empty() || !self.overlaps(other) {
            return self.clone();
        }
        Relids(Rc::new(self.0.difference(&other.0).copied().collect()))
    }

    /// True if every member of `self` is in `other`. The empty set is a
    /// subset of everything.
    pub fn is_subset(&self, other: &Relids) -> bool {
        self.0.is_subset(&other.0)
    }

    /// True if the sets share at least one member
    pub fn overlaps(&self, other: &Relids) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.0.iter().any(|r| large.0.contains(r))
    }

    /// True if `self` has a member that `other` lacks
    pub fn nonempty_difference(&self, other: &Relids) -> bool {
        self.0.iter().any(|r| !other.0.contains(r))
    }

    /// Compare two sets for the subset relation
    pub fn subset_compare(&self, other: &Relids) -> SubsetComparison {
        match (self.is_subset(other), other.is_subset(self)) {
            (true, true) => SubsetComparison::Equal,
            (true, false) => SubsetComparison::Subset1,
            (false, true) => SubsetComparison::Subset2,
            (false, false) => SubsetComparison::Different,
        }
    }
}

/// Result of [`Relids::subset_compare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetComparison {
    Equal,
    /// The first set is a proper subset of the second
    Subset1,
    /// The second set is a proper subset of the first
    Subset2,
    Different,
}

impl FromIterator<RelId> for Relids {
    fn from_iter<I: IntoIterator<Item = RelId>>(iter: I) -> Self {
        Relids(Rc::new(iter.into_iter().collect()))
    }
}

impl<const N: usize> From<[RelId; N]> for Relids {
    fn from(ids: [RelId; N]) -> Self {
        ids.into_iter().collect()
    }
}

impl fmt::Display for Relids {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = self.0.iter().map(|r| r.to_string()).collect::<Vec<_>>();
        write!(f, "({})", ids.join(" "))
    }
}

impl fmt::Debug for Relids {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relids{}", self)
    }
}
