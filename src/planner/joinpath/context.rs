// Join-Level Context
//
// Facts computed once per (outer, inner) pair and shared by every strategy
// generator: the usable merge clauses, semi/anti cost factors, the
// relations a parameterized result may depend on, and the lateral
// requirements every result must carry.

use std::rc::Rc;

use log::trace;

use crate::common::Relids;
use crate::planner::context::PlannerInfo;
use crate::planner::cost_model::SemiAntiJoinFactors;
use crate::planner::error::PlannerResult;
use crate::planner::joininfo::{JoinType, SpecialJoinInfo};
use crate::planner::joinpath::JoinInputs;
use crate::planner::restrictinfo::{ClassifiedClause, RestrictInfo};

/// Shared inputs of all join strategies for one relation pair
#[derive(Debug, Clone)]
pub struct JoinPathExtraData {
    /// Clauses to check at this join
    pub restrictlist: Vec<Rc<RestrictInfo>>,
    /// Merge-joinable clauses, oriented for this pair
    pub mergeclause_list: Vec<ClassifiedClause>,
    /// False if some clause rules merge joins out for this pair
    pub mergejoin_allowed: bool,
    pub sjinfo: SpecialJoinInfo,
    /// Present for semi and anti joins only
    pub semifactors: Option<SemiAntiJoinFactors>,
    /// Relations worth accepting parameters from
    pub param_source_rels: Relids,
    /// Lateral relations every path for this pair must require; empty if
    /// none
    pub extra_lateral_rels: Relids,
}

impl JoinPathExtraData {
    pub fn build(
        root: &PlannerInfo,
        inputs: JoinInputs,
        jointype: JoinType,
        sjinfo: &SpecialJoinInfo,
        restrictlist: &[Rc<RestrictInfo>],
    ) -> PlannerResult<Self> {
        let joinrel = root.rel(inputs.joinrel)?;
        let outerrel = root.rel(inputs.outerrel)?;
        let innerrel = root.rel(inputs.innerrel)?;

        let (mergeclause_list, mergejoin_allowed) = if root.config.enable_mergejoin || jointype == JoinType::Full {
            select_mergejoin_clauses(root, &outerrel.relids, &innerrel.relids, jointype, restrictlist)
        } else {
            (Vec::new(), true)
        };

        let semifactors = matches!(jointype, JoinType::Semi | JoinType::Anti).then(|| {
            root.cost_model
                .semi_anti_join_factors(jointype, outerrel.rows, innerrel.rows, restrictlist)
        });

        let mut param_source_rels = Relids::empty();
        for constraint in &root.join_info_list {
            if joinrel.relids.overlaps(&constraint.min_righthand)
                && !joinrel.relids.overlaps(&constraint.min_lefthand)
            {
                param_source_rels = param_source_rels.union(&root.all_baserels.difference(&constraint.min_righthand));
            }
            if constraint.jointype == JoinType::Full
                && joinrel.relids.overlaps(&constraint.min_lefthand)
                && !joinrel.relids.overlaps(&constraint.min_righthand)
            {
                param_source_rels = param_source_rels.union(&root.all_baserels.difference(&constraint.min_lefthand));
            }
        }

        // a lateral reference can only be satisfied by a parameterized path
        for lateral in &root.lateral_info_list {
            if lateral.lateral_rhs.is_subset(&joinrel.relids) {
                param_source_rels = param_source_rels.union(&lateral.lateral_lhs.difference(&joinrel.relids));
            }
        }

        let mut extra_lateral_rels = Relids::empty();
        for phinfo in &root.placeholder_list {
            if phinfo.ph_eval_at.is_subset(&joinrel.relids)
                && !phinfo.ph_eval_at.is_subset(&outerrel.relids)
                && !phinfo.ph_eval_at.is_subset(&innerrel.relids)
            {
                extra_lateral_rels = extra_lateral_rels.union(&phinfo.ph_lateral);
            }
        }
        let extra_lateral_rels = extra_lateral_rels.difference(&joinrel.relids);

        trace!(
            "Join context for {}: {} merge clauses, param sources {}, extra lateral {}",
            joinrel.relids,
            mergeclause_list.len(),
            param_source_rels,
            extra_lateral_rels
        );

        Ok(JoinPathExtraData {
            restrictlist: restrictlist.to_vec(),
            mergeclause_list,
            mergejoin_allowed,
            sjinfo: sjinfo.clone(),
            semifactors,
            param_source_rels,
            extra_lateral_rels,
        })
    }
}

/// Merge-joinable clauses for the pair, and whether merge joins are allowed
/// at all.
///
/// Right and full joins cannot move a leftover clause to a filter step, so
/// any clause that is not usable as a merge key disables merge joins for
/// them. Constant clauses are exempt.
pub fn select_mergejoin_clauses(
    root: &PlannerInfo,
    outer_relids: &Relids,
    inner_relids: &Relids,
    jointype: JoinType,
    restrictlist: &[Rc<RestrictInfo>],
) -> (Vec<ClassifiedClause>, bool) {
    let is_outer_join = jointype.is_outer_join();
    let mut result = Vec::new();
    let mut have_nonmergeable = false;

    for rinfo in restrictlist {
        // pushed-down clauses are filters above an outer join
        if is_outer_join && rinfo.is_pushed_down {
            continue;
        }
        if !rinfo.can_join || rinfo.merge_opfamily.is_none() {
            if !rinfo.clause.is_constant() {
                have_nonmergeable = true;
            }
            continue;
        }
        let Some(classified) = ClassifiedClause::classify(rinfo, outer_relids, inner_relids, &root.eclasses) else {
            have_nonmergeable = true;
            continue;
        };
        let redundant = match (classified.outer_ec, classified.inner_ec) {
            (Some(outer_ec), Some(inner_ec)) => {
                root.eclasses.is_redundant(outer_ec) || root.eclasses.is_redundant(inner_ec)
            }
            _ => true,
        };
        if redundant {
            have_nonmergeable = true;
            continue;
        }
        result.push(classified);
    }

    let allowed = !(jointype.requires_all_clauses() && have_nonmergeable);
    (result, allowed)
}
