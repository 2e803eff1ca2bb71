// Hash Joins
//
// Hash joins need at least one hashable clause binding the two inputs.
// Output is unordered, so only costs and parameterizations matter when
// choosing input paths.

use std::rc::Rc;

use crate::planner::context::PlannerInfo;
use crate::planner::error::PlannerResult;
use crate::planner::joininfo::JoinType;
use crate::planner::joinpath::try_paths::try_hashjoin_path;
use crate::planner::joinpath::{JoinAttempt, cheapest_total};
use crate::planner::pathnode::create_unique_path;
use crate::planner::restrictinfo::ClassifiedClause;

pub fn hash_inner_and_outer(root: &mut PlannerInfo, attempt: &JoinAttempt<'_>) -> PlannerResult<()> {
    let extra = attempt.extra;
    let is_outer_join = attempt.jointype.is_outer_join();

    let outerrel = root.rel(attempt.inputs.outerrel)?;
    let innerrel = root.rel(attempt.inputs.innerrel)?;

    let hashclauses: Vec<ClassifiedClause> = extra
        .restrictlist
        .iter()
        .filter(|rinfo| !(is_outer_join && rinfo.is_pushed_down))
        .filter(|rinfo| rinfo.can_join && rinfo.hash_operator.is_some())
        .filter_map(|rinfo| ClassifiedClause::classify(rinfo, &outerrel.relids, &innerrel.relids, &root.eclasses))
        .collect();
    if hashclauses.is_empty() {
        return Ok(());
    }

    let cheapest_startup_outer = outerrel.cheapest_startup_path.clone();
    let mut cheapest_total_outer = cheapest_total(outerrel)?;
    let mut cheapest_total_inner = cheapest_total(innerrel)?;
    if cheapest_total_outer.param_by_rel(&innerrel.relids) || cheapest_total_inner.param_by_rel(&outerrel.relids) {
        return Ok(());
    }
    let outer_parameterized: Vec<_> = outerrel.cheapest_parameterized().cloned().collect();
    let inner_parameterized: Vec<_> = innerrel.cheapest_parameterized().cloned().collect();
    let outer_relids = outerrel.relids.clone();
    let inner_relids = innerrel.relids.clone();

    match attempt.jointype {
        JoinType::UniqueOuter => {
            cheapest_total_outer = create_unique_path(root, &cheapest_total_outer, &extra.sjinfo)?;
            let attempt = attempt.as_jointype(JoinType::Inner);
            try_hashjoin_path(root, &attempt, &cheapest_total_outer, &cheapest_total_inner, &hashclauses)?;
        }
        JoinType::UniqueInner => {
            cheapest_total_inner = create_unique_path(root, &cheapest_total_inner, &extra.sjinfo)?;
            let attempt = attempt.as_jointype(JoinType::Inner);
            try_hashjoin_path(root, &attempt, &cheapest_total_outer, &cheapest_total_inner, &hashclauses)?;
            if let Some(startup_outer) = &cheapest_startup_outer {
                if !Rc::ptr_eq(startup_outer, &cheapest_total_outer) {
                    try_hashjoin_path(root, &attempt, startup_outer, &cheapest_total_inner, &hashclauses)?;
                }
            }
        }
        _ => {
            if let Some(startup_outer) = &cheapest_startup_outer {
                try_hashjoin_path(root, attempt, startup_outer, &cheapest_total_inner, &hashclauses)?;
            }

            for outer_path in &outer_parameterized {
                if outer_path.param_by_rel(&inner_relids) {
                    continue;
                }
                for inner_path in &inner_parameterized {
                    if inner_path.param_by_rel(&outer_relids) {
                        continue;
                    }
                    let already_tried = cheapest_startup_outer
                        .as_ref()
                        .is_some_and(|startup| Rc::ptr_eq(startup, outer_path))
                        && Rc::ptr_eq(inner_path, &cheapest_total_inner);
                    if already_tried {
                        continue;
                    }
                    try_hashjoin_path(root, attempt, outer_path, inner_path, &hashclauses)?;
                }
            }
        }
    }
    Ok(())
}
