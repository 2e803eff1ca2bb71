// Join Relation Construction
//
// make_join_rel checks that two relations may be joined at this point,
// finds or creates the relation for their union, and runs path generation
// for every legal direction and join type.

use std::rc::Rc;

use log::debug;

use crate::common::{RelIndex, Relids};
use crate::planner::context::PlannerInfo;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::joininfo::{JoinType, SpecialJoinInfo};
use crate::planner::joinpath::{JoinInputs, add_paths_to_joinrel};
use crate::planner::relation::{RelKind, RelOptInfo};
use crate::planner::restrictinfo::RestrictInfo;

/// Outcome of checking a proposed join against the join order constraints
#[derive(Debug)]
enum JoinLegality<'a> {
    Illegal,
    Unconstrained,
    /// Implements `sjinfo`; `reversed` if the second relation is its left
    /// side
    Implements {
        sjinfo: &'a SpecialJoinInfo,
        reversed: bool,
    },
}

fn join_is_legal<'a>(root: &'a PlannerInfo, rel1: &Relids, rel2: &Relids) -> JoinLegality<'a> {
    let joinrelids = rel1.union(rel2);
    let mut matched: Option<(&SpecialJoinInfo, bool)> = None;

    for sjinfo in &root.join_info_list {
        // irrelevant, or a join entirely inside its right-hand side
        if !sjinfo.min_righthand.overlaps(&joinrelids) || joinrelids.is_subset(&sjinfo.min_righthand) {
            continue;
        }

        let reversed = if sjinfo.min_lefthand.is_subset(rel1) && sjinfo.min_righthand.is_subset(rel2) {
            false
        } else if sjinfo.min_lefthand.is_subset(rel2) && sjinfo.min_righthand.is_subset(rel1) {
            true
        } else if rel1.overlaps(&sjinfo.min_righthand) && rel2.overlaps(&sjinfo.min_righthand) {
            continue;
        } else {
            return JoinLegality::Illegal;
        };
        if matched.is_some() {
            return JoinLegality::Illegal;
        }
        matched = Some((sjinfo, reversed));
    }

    match matched {
        Some((sjinfo, reversed)) => JoinLegality::Implements { sjinfo, reversed },
        None => JoinLegality::Unconstrained,
    }
}

fn build_join_rel(
    root: &mut PlannerInfo,
    outer: RelIndex,
    inner: RelIndex,
    sjinfo: &SpecialJoinInfo,
    restrictlist: &[Rc<RestrictInfo>],
) -> PlannerResult<RelIndex> {
    let outerrel = root.rel(outer)?;
    let innerrel = root.rel(inner)?;
    let relids = outerrel.relids.union(&innerrel.relids);
    if let Some(existing) = root.find_join_rel(&relids) {
        return Ok(existing);
    }

    let mut joinrel = RelOptInfo::new(
        RelIndex(0),
        &format!("{}_{}", outerrel.name, innerrel.name),
        RelKind::Join,
        relids,
    );
    joinrel.rows = root
        .cost_model
        .join_rel_size(outerrel.rows, innerrel.rows, sjinfo.jointype, restrictlist);
    joinrel.reltarget = outerrel
        .reltarget
        .iter()
        .chain(innerrel.reltarget.iter())
        .copied()
        .collect();
    debug!("Created join relation {} ({:.0} rows)", joinrel.relids, joinrel.rows);
    Ok(root.register_join_rel(joinrel))
}

/// Find or create the join relation of `rel1` and `rel2` and add paths for
/// every legal way of joining them.
///
/// Returns `None` if the two may not be joined directly. The join
/// relation's cheapest paths are not recomputed.
pub fn make_join_rel(root: &mut PlannerInfo, rel1: RelIndex, rel2: RelIndex) -> PlannerResult<Option<RelIndex>> {
    let relids1 = root.rel(rel1)?.relids.clone();
    let relids2 = root.rel(rel2)?.relids.clone();
    if relids1.overlaps(&relids2) {
        return Ok(None);
    }

    let (outer, inner, sjinfo) = match join_is_legal(root, &relids1, &relids2) {
        JoinLegality::Illegal => {
            debug!("Join of {} and {} is not legal", relids1, relids2);
            return Ok(None);
        }
        JoinLegality::Implements { sjinfo, reversed: false } => (rel1, rel2, sjinfo.clone()),
        JoinLegality::Implements { sjinfo, reversed: true } => (rel2, rel1, sjinfo.clone()),
        JoinLegality::Unconstrained => (rel1, rel2, SpecialJoinInfo::inner(relids1.clone(), relids2.clone())),
    };

    let outer_relids = root.rel(outer)?.relids.clone();
    let inner_relids = root.rel(inner)?.relids.clone();
    let restrictlist = root.build_joinrel_restrictlist(&outer_relids, &inner_relids);
    let joinrel = build_join_rel(root, outer, inner, &sjinfo, &restrictlist)?;

    let forward = JoinInputs {
        joinrel,
        outerrel: outer,
        innerrel: inner,
    };
    let backward = JoinInputs {
        joinrel,
        outerrel: inner,
        innerrel: outer,
    };

    match sjinfo.jointype {
        JoinType::Inner => {
            add_paths_to_joinrel(root, forward, JoinType::Inner, &sjinfo, &restrictlist)?;
            add_paths_to_joinrel(root, backward, JoinType::Inner, &sjinfo, &restrictlist)?;
        }
        JoinType::Left => {
            add_paths_to_joinrel(root, forward, JoinType::Left, &sjinfo, &restrictlist)?;
            add_paths_to_joinrel(root, backward, JoinType::Right, &sjinfo, &restrictlist)?;
        }
        JoinType::Full => {
            add_paths_to_joinrel(root, forward, JoinType::Full, &sjinfo, &restrictlist)?;
            add_paths_to_joinrel(root, backward, JoinType::Full, &sjinfo, &restrictlist)?;
        }
        JoinType::Semi => {
            add_paths_to_joinrel(root, forward, JoinType::Semi, &sjinfo, &restrictlist)?;
            // the semi join can also run as an inner join over a
            // duplicate-free right-hand side
            if !sjinfo.semi_rhs_exprs.is_empty() && inner_relids == sjinfo.min_righthand {
                add_paths_to_joinrel(root, forward, JoinType::UniqueInner, &sjinfo, &restrictlist)?;
                add_paths_to_joinrel(root, backward, JoinType::UniqueOuter, &sjinfo, &restrictlist)?;
            }
        }
        JoinType::Anti => {
            add_paths_to_joinrel(root, forward, JoinType::Anti, &sjinfo, &restrictlist)?;
        }
        other => return Err(PlannerError::UnrecognizedJoinType(other)),
    }
    Ok(Some(joinrel))
}
