// Join Order Constraints, Lateral References and Placeholders
//
// Facts about the query's join tree that restrict which relation pairs may
// be joined and which parameterizations are worth generating.

use crate::common::Relids;
use crate::planner::expr::Expression;

/// Join kinds handled by the path generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Full,
    Right,
    Semi,
    Anti,
    /// Unique-ify the outer side, then inner join
    UniqueOuter,
    /// Unique-ify the inner side, then inner join
    UniqueInner,
}

impl JoinType {
    /// Join kinds that null-extend or filter by non-matching, for which a
    /// pushed-down clause is a post-join filter rather than a join clause
    pub fn is_outer_join(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full | JoinType::Right | JoinType::Anti)
    }

    /// Right and full joins must use every join clause as a merge/hash key
    pub fn requires_all_clauses(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    /// Join kinds a nested loop can execute
    pub fn nestloop_ok(&self) -> bool {
        !self.requires_all_clauses()
    }

    /// The same join seen with its inputs swapped, if it can run that way
    pub fn commuted(&self) -> Option<JoinType> {
        match self {
            JoinType::Inner => Some(JoinType::Inner),
            JoinType::Full => Some(JoinType::Full),
            JoinType::Left => Some(JoinType::Right),
            JoinType::Right => Some(JoinType::Left),
            JoinType::UniqueOuter => Some(JoinType::UniqueInner),
            JoinType::UniqueInner => Some(JoinType::UniqueOuter),
            JoinType::Semi | JoinType::Anti => None,
        }
    }
}

/// Join order constraint for one outer join or semi/anti join.
///
/// Rows of `min_righthand` may only be joined with rows of `min_lefthand`
/// once both sets are fully available.
#[derive(Debug, Clone)]
pub struct SpecialJoinInfo {
    pub min_lefthand: Relids,
    pub min_righthand: Relids,
    pub jointype: JoinType,
    /// Right-hand expressions compared by a semi join, used to unique-ify
    /// its inner side
    pub semi_rhs_exprs: Vec<Expression>,
}

impl SpecialJoinInfo {
    pub fn new(jointype: JoinType, min_lefthand: Relids, min_righthand: Relids) -> Self {
        SpecialJoinInfo {
            min_lefthand,
            min_righthand,
            jointype,
            semi_rhs_exprs: Vec::new(),
        }
    }

    pub fn with_semi_rhs_exprs(mut self, exprs: Vec<Expression>) -> Self {
        self.semi_rhs_exprs = exprs;
        self
    }

    /// Plain inner-join info for a pair of relations with no constraint
    pub fn inner(lefthand: Relids, righthand: Relids) -> Self {
        SpecialJoinInfo::new(JoinType::Inner, lefthand, righthand)
    }
}

/// A lateral reference: `lateral_rhs` uses values of `lateral_lhs`
#[derive(Debug, Clone)]
pub struct LateralJoinInfo {
    pub lateral_lhs: Relids,
    pub lateral_rhs: Relids,
}

/// A placeholder expression evaluated at a fixed join level
#[derive(Debug, Clone)]
pub struct PlaceHolderInfo {
    pub id: u32,
    /// Minimal set of relations at which the expression can be evaluated
    pub ph_eval_at: Relids,
    /// Relations outside `ph_eval_at` referenced laterally, if any
    pub ph_lateral: Relids,
}

impl PlaceHolderInfo {
    pub fn new(id: u32, ph_eval_at: Relids) -> Self {
        PlaceHolderInfo {
            id,
            ph_eval_at,
            ph_lateral: Relids::empty(),
        }
    }

    pub fn with_lateral(mut self, lateral: Relids) -> Self {
        self.ph_lateral = lateral;
        self
    }
}
