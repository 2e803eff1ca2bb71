// Explicitly Sorted Merge Joins
//
// Merge joins over the cheapest-total path of each input, with both sides
// sorted as needed. One candidate per useful outer ordering.

use std::rc::Rc;

use log::trace;

use crate::planner::context::PlannerInfo;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::joininfo::JoinType;
use crate::planner::joinpath::try_paths::{MergeInputs, try_mergejoin_path};
use crate::planner::joinpath::{JoinAttempt, cheapest_total};
use crate::planner::pathkeys::{
    PathKey, build_join_pathkeys, find_mergeclauses_for_pathkeys, make_inner_pathkeys_for_merge,
    select_outer_pathkeys_for_merge,
};
use crate::planner::pathnode::create_unique_path;

/// Merge joins with explicit sorts of the cheapest-total inputs.
///
/// Every ordering from `select_outer_pathkeys_for_merge` is tried as the
/// leading key, with the other keys behind it in their ranked order. That
/// varies which key leads without trying every permutation.
pub fn sort_inner_and_outer(root: &mut PlannerInfo, attempt: &JoinAttempt<'_>) -> PlannerResult<()> {
    let extra = attempt.extra;
    if extra.mergeclause_list.is_empty() {
        return Ok(());
    }

    let (mut outer_path, mut inner_path, joinrel_relids) = {
        let outerrel = root.rel(attempt.inputs.outerrel)?;
        let innerrel = root.rel(attempt.inputs.innerrel)?;
        let outer_path = cheapest_total(outerrel)?;
        let inner_path = cheapest_total(innerrel)?;
        if outer_path.param_by_rel(&innerrel.relids) || inner_path.param_by_rel(&outerrel.relids) {
            return Ok(());
        }
        (outer_path, inner_path, root.rel(attempt.inputs.joinrel)?.relids.clone())
    };

    let attempt = match attempt.jointype {
        JoinType::UniqueOuter => {
            outer_path = create_unique_path(root, &outer_path, &extra.sjinfo)?;
            attempt.as_jointype(JoinType::Inner)
        }
        JoinType::UniqueInner => {
            inner_path = create_unique_path(root, &inner_path, &extra.sjinfo)?;
            attempt.as_jointype(JoinType::Inner)
        }
        _ => *attempt,
    };

    let all_pathkeys = {
        let joinrel = root.rel(attempt.inputs.joinrel)?;
        select_outer_pathkeys_for_merge(root, &extra.mergeclause_list, joinrel)
    };
    trace!(
        "Sorted merge for {}: {} candidate leading keys",
        joinrel_relids,
        all_pathkeys.len()
    );

    for (position, front) in all_pathkeys.iter().enumerate() {
        let outerkeys: Vec<PathKey> = std::iter::once(*front)
            .chain(
                all_pathkeys
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != position)
                    .map(|(_, pk)| *pk),
            )
            .collect();

        let cur_mergeclauses = find_mergeclauses_for_pathkeys(&outerkeys, true, &extra.mergeclause_list);
        if cur_mergeclauses.len() != extra.mergeclause_list.len() {
            return Err(PlannerError::IncompleteMergeClauses {
                jointype: attempt.jointype,
                used: cur_mergeclauses.len(),
                required: extra.mergeclause_list.len(),
            });
        }

        let innerkeys = make_inner_pathkeys_for_merge(&cur_mergeclauses, &outerkeys);
        let merge_pathkeys = {
            let joinrel = root.rel(attempt.inputs.joinrel)?;
            build_join_pathkeys(root, joinrel, attempt.jointype, &outerkeys)
        };

        try_mergejoin_path(
            root,
            &attempt,
            MergeInputs {
                outer: Rc::clone(&outer_path),
                inner: Rc::clone(&inner_path),
                pathkeys: merge_pathkeys,
                mergeclauses: cur_mergeclauses,
                outersortkeys: outerkeys,
                innersortkeys: innerkeys,
            },
        )?;
    }
    Ok(())
}
