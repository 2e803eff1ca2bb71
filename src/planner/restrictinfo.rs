// Restriction Clauses and the Join Predicate Classifier
//
// A RestrictInfo wraps one boolean condition together with the facts the
// join generators need about it: which relations each side touches, whether
// it may be used as a merge or hash key, and which equivalence classes its
// sides belong to.

use std::fmt;
use std::rc::Rc;

use crate::common::{EcId, Relids};
use crate::planner::equivclass::EquivalenceClasses;
use crate::planner::expr::{Expression, Operator};

/// Default selectivity of an equality clause
pub const DEFAULT_EQ_SEL: f64 = 0.005;

/// Default selectivity of an inequality clause
pub const DEFAULT_INEQ_SEL: f64 = 0.3333333333333333;

/// Identifier of a btree operator family (merge join support)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpFamilyId(pub u32);

/// Identifier of a hashable equality operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorId(pub u32);

/// Operator family used for plain equality clauses
pub const DEFAULT_BTREE_FAMILY: OpFamilyId = OpFamilyId(1976);

/// Operator used for plain equality clauses
pub const DEFAULT_EQ_OPERATOR: OperatorId = OperatorId(96);

/// A restriction or join clause
#[derive(Debug, Clone)]
pub struct RestrictInfo {
    /// The clause itself
    pub clause: Expression,
    /// True if the clause belongs to an enclosing (outer) join level
    pub is_pushed_down: bool,
    /// Binary operator clause with disjoint, non-empty sides
    pub can_join: bool,
    /// All relations referenced by the clause
    pub clause_relids: Relids,
    /// Relations referenced by the left operand
    pub left_relids: Relids,
    /// Relations referenced by the right operand
    pub right_relids: Relids,
    /// Present if the clause is usable as a merge key
    pub merge_opfamily: Option<OpFamilyId>,
    /// Present if the clause is usable as a hash key
    pub hash_operator: Option<OperatorId>,
    /// Equivalence class of the left operand, for mergejoinable clauses
    pub left_ec: Option<EcId>,
    /// Equivalence class of the right operand, for mergejoinable clauses
    pub right_ec: Option<EcId>,
    /// Fraction of row pairs expected to satisfy the clause
    pub norm_selec: f64,
}

impl RestrictInfo {
    /// Build a clause, deriving its relation sets and operator tags.
    ///
    /// Equality between two disjoint relation sets is both merge- and
    /// hash-joinable; equivalence classes are attached separately.
    pub fn new(clause: Expression) -> Self {
        let clause_relids = clause.relids();
        let (left_relids, right_relids, op) = match clause.binary_operands() {
            Some((left, op, right)) => (left.relids(), right.relids(), Some(op)),
            None => (Relids::empty(), Relids::empty(), None),
        };

        let can_join = op.is_some_and(|op| op.is_comparison())
            && !left_relids.is_empty()
            && !right_relids.is_empty()
            && !left_relids.overlaps(&right_relids);
        let is_equality = can_join && op == Some(Operator::Equals);

        let norm_selec = match op {
            Some(Operator::Equals) => DEFAULT_EQ_SEL,
            Some(op) if op.is_comparison() => DEFAULT_INEQ_SEL,
            _ => 0.5,
        };

        RestrictInfo {
            clause,
            is_pushed_down: false,
            can_join,
            clause_relids,
            left_relids,
            right_relids,
            merge_opfamily: is_equality.then_some(DEFAULT_BTREE_FAMILY),
            hash_operator: is_equality.then_some(DEFAULT_EQ_OPERATOR),
            left_ec: None,
            right_ec: None,
            norm_selec,
        }
    }

    pub fn with_pushed_down(mut self, pushed_down: bool) -> Self {
        self.is_pushed_down = pushed_down;
        self
    }

    pub fn with_selectivity(mut self, selec: f64) -> Self {
        self.norm_selec = selec.clamp(0.0, 1.0);
        self
    }

    /// Remove the merge join capability (e.g. a type without btree support)
    pub fn without_merge(mut self) -> Self {
        self.merge_opfamily = None;
        self.left_ec = None;
        self.right_ec = None;
        self
    }

    /// Remove the hash join capability
    pub fn without_hash(mut self) -> Self {
        self.hash_operator = None;
        self
    }

    pub fn with_eclasses(mut self, left_ec: EcId, right_ec: EcId) -> Self {
        self.left_ec = Some(left_ec);
        self.right_ec = Some(right_ec);
        self
    }

    /// Same clause over different columns (e.g. an append member's), keeping
    /// the operator tags and equivalence classes
    pub fn translated(&self, clause: Expression) -> RestrictInfo {
        let fresh = RestrictInfo::new(clause);
        RestrictInfo {
            clause: fresh.clause,
            clause_relids: fresh.clause_relids,
            left_relids: fresh.left_relids,
            right_relids: fresh.right_relids,
            can_join: fresh.can_join,
            merge_opfamily: self.merge_opfamily.filter(|_| fresh.can_join),
            hash_operator: self.hash_operator.filter(|_| fresh.can_join),
            ..self.clone()
        }
    }

    pub fn left_operand(&self) -> Option<&Expression> {
        self.clause.binary_operands().map(|(left, _, _)| left)
    }

    pub fn right_operand(&self) -> Option<&Expression> {
        self.clause.binary_operands().map(|(_, _, right)| right)
    }

    /// True for a plain equality usable for substitution of one side by the
    /// other
    pub fn is_hashable_equality(&self) -> bool {
        self.can_join
            && self.hash_operator.is_some()
            && matches!(self.clause.binary_operands(), Some((_, Operator::Equals, _)))
    }
}

impl fmt::Display for RestrictInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clause)
    }
}

/// Check whether a join clause has the form "outer op inner" or
/// "inner op outer" for the given input relations.
///
/// Returns `Some(outer_is_left)` when it does. A clause mixing both inputs
/// on one side is never usable.
pub fn clause_sides_match_join(
    rinfo: &RestrictInfo,
    outer_relids: &Relids,
    inner_relids: &Relids,
) -> Option<bool> {
    if rinfo.left_relids.is_subset(outer_relids) && rinfo.right_relids.is_subset(inner_relids) {
        Some(true)
    } else if rinfo.left_relids.is_subset(inner_relids) && rinfo.right_relids.is_subset(outer_relids) {
        Some(false)
    } else {
        None
    }
}

/// A join clause classified for one particular (outer, inner) pairing.
///
/// The orientation is only meaningful for the join attempt that produced
/// it, which is why it lives here and not on the shared RestrictInfo.
#[derive(Debug, Clone)]
pub struct ClassifiedClause {
    pub rinfo: Rc<RestrictInfo>,
    pub outer_is_left: bool,
    /// Canonical equivalence class of the outer operand
    pub outer_ec: Option<EcId>,
    /// Canonical equivalence class of the inner operand
    pub inner_ec: Option<EcId>,
}

impl ClassifiedClause {
    /// Classify `rinfo` against the two inputs; `None` if it does not
    /// bind one side to each
    pub fn classify(
        rinfo: &Rc<RestrictInfo>,
        outer_relids: &Relids,
        inner_relids: &Relids,
        eclasses: &EquivalenceClasses,
    ) -> Option<Self> {
        let outer_is_left = clause_sides_match_join(rinfo, outer_relids, inner_relids)?;
        let (outer_ec, inner_ec) = if outer_is_left {
            (rinfo.left_ec, rinfo.right_ec)
        } else {
            (rinfo.right_ec, rinfo.left_ec)
        };
        Some(ClassifiedClause {
            rinfo: Rc::clone(rinfo),
            outer_is_left,
            outer_ec: outer_ec.map(|ec| eclasses.canonical(ec)),
            inner_ec: inner_ec.map(|ec| eclasses.canonical(ec)),
        })
    }

    pub fn outer_operand(&self) -> Option<&Expression> {
        if self.outer_is_left {
            self.rinfo.left_operand()
        } else {
            self.rinfo.right_operand()
        }
    }

    pub fn inner_operand(&self) -> Option<&Expression> {
        if self.outer_is_left {
            self.rinfo.right_operand()
        } else {
            self.rinfo.left_operand()
        }
    }
}

/// Wrap bare clauses (e.g. derived filters) as RestrictInfos
pub fn make_restrictinfos_from_actual_clauses(clauses: Vec<Expression>) -> Vec<Rc<RestrictInfo>> {
    clauses
        .into_iter()
        .map(|clause| Rc::new(RestrictInfo::new(clause).with_pushed_down(true)))
        .collect()
}
