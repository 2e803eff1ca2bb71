// Join-Key Substitution
//
// Rewrites an expression over one relation into an expression over another
// by replacing every column with the opposite side of an equality join
// clause that binds it. Used to turn a partition's CHECK constraint into a
// filter on the relation it is joined to.

use std::rc::Rc;

use crate::planner::expr::{ColumnRef, Expression};
use crate::planner::restrictinfo::RestrictInfo;

/// Replace every column of `expr` through the equality clauses in `clauses`.
///
/// Returns `None` if any column has no binding clause; no partial rewrite
/// is ever produced.
pub fn substitute_join_keys(expr: &Expression, clauses: &[Rc<RestrictInfo>]) -> Option<Expression> {
    expr.map_columns(&mut |col| bound_expression(col, clauses))
}

fn bound_expression(col: &ColumnRef, clauses: &[Rc<RestrictInfo>]) -> Option<Expression> {
    let target = Expression::Column(*col);
    clauses
        .iter()
        .filter(|rinfo| rinfo.is_hashable_equality())
        .find_map(|rinfo| {
            let (left, _, right) = rinfo.clause.binary_operands()?;
            let other = if *left == target {
                right
            } else if *right == target {
                left
            } else {
                return None;
            };
            // replacing a column with an expression on its own relation
            // would not move the filter anywhere
            (!other.relids().contains(col.relid)).then(|| other.clone())
        })
}
