// Equivalence Classes
//
// Sets of expressions known to be equal after the joins that mention them.
// Sort orderings (pathkeys) are expressed in terms of these classes, so two
// relations sorted on columns of the same class are sorted "the same way".

use crate::common::{EcId, Relids};
use crate::planner::expr::Expression;

/// A set of mutually equal expressions
#[derive(Debug, Clone)]
pub struct EquivalenceClass {
    pub id: EcId,
    pub members: Vec<Expression>,
    /// Base relations referenced by the members
    pub relids: Relids,
    /// Some member is a constant
    pub has_const: bool,
    /// The class was formed from outer-join clauses
    pub below_outer_join: bool,
    /// Set when this class has been merged into another one
    pub merged_into: Option<EcId>,
}

impl EquivalenceClass {
    pub fn new(id: EcId, below_outer_join: bool) -> Self {
        EquivalenceClass {
            id,
            members: Vec::new(),
            relids: Relids::empty(),
            has_const: false,
            below_outer_join,
            merged_into: None,
        }
    }

    /// A class equated to a constant gets its clauses replaced by
    /// per-relation restrictions, so it can never appear in a canonical
    /// merge ordering.
    pub fn must_be_redundant(&self) -> bool {
        self.has_const && !self.below_outer_join
    }

    pub fn add_member(&mut self, expr: Expression) {
        if self.members.contains(&expr) {
            return;
        }
        self.relids = self.relids.union(&expr.relids());
        self.has_const |= expr.relids().is_empty();
        self.members.push(expr);
    }
}

/// Registry of equivalence classes for one query
#[derive(Debug, Default)]
pub struct EquivalenceClasses {
    classes: Vec<EquivalenceClass>,
}

impl EquivalenceClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow merge links to the class currently representing `id`
    pub fn canonical(&self, id: EcId) -> EcId {
        let mut current = id;
        while let Some(next) = self.classes.get(current as usize).and_then(|ec| ec.merged_into) {
            current = next;
        }
        current
    }

    pub fn get(&self, id: EcId) -> Option<&EquivalenceClass> {
        self.classes.get(self.canonical(id) as usize)
    }

    /// Class containing `expr`, if one exists
    pub fn find(&self, expr: &Expression) -> Option<EcId> {
        self.classes
            .iter()
            .find(|ec| ec.merged_into.is_none() && ec.members.contains(expr))
            .map(|ec| ec.id)
    }

    /// Class containing `expr`, creating a single-member class if needed
    pub fn get_or_create(&mut self, expr: &Expression, below_outer_join: bool) -> EcId {
        if !below_outer_join {
            if let Some(id) = self.find(expr) {
                return id;
            }
        }
        let id = self.classes.len() as EcId;
        let mut ec = EquivalenceClass::new(id, below_outer_join);
        ec.add_member(expr.clone());
        self.classes.push(ec);
        id
    }

    /// Record `left = right`, merging their classes
    pub fn make_equivalence(&mut self, left: &Expression, right: &Expression) -> EcId {
        let left_ec = self.get_or_create(left, false);
        let right_ec = self.get_or_create(right, false);
        if left_ec == right_ec {
            return left_ec;
        }

        let moved = std::mem::take(&mut self.classes[right_ec as usize].members);
        self.classes[right_ec as usize].merged_into = Some(left_ec);
        let target = &mut self.classes[left_ec as usize];
        for member in moved {
            target.add_member(member);
        }
        left_ec
    }

    /// Add a constant to the class of `expr`
    pub fn equate_to_constant(&mut self, expr: &Expression, constant: Expression) -> EcId {
        let id = self.get_or_create(expr, false);
        self.classes[id as usize].add_member(constant);
        id
    }

    pub fn is_redundant(&self, id: EcId) -> bool {
        self.get(id).is_some_and(|ec| ec.must_be_redundant())
    }

    /// True if the class still relates something outside `relids`, i.e. an
    /// ordering on it may be useful to a later merge join
    pub fn reaches_beyond(&self, id: EcId, relids: &Relids) -> bool {
        self.get(id).is_some_and(|ec| ec.relids.nonempty_difference(relids))
    }
}
