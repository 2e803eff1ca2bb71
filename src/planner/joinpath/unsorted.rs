// Joins Driven by the Outer Path's Ordering
//
// Walks every outer path. Each one gets nested loops against the inner
// relation's cheapest paths, plus merge joins that reuse whatever ordering
// the outer path already has: one with an explicitly sorted inner, and more
// with presorted inner paths on shorter and shorter key prefixes.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::common::Relids;
use crate::planner::context::PlannerInfo;
use crate::planner::error::PlannerResult;
use crate::planner::joininfo::JoinType;
use crate::planner::joinpath::try_paths::{MergeInputs, try_mergejoin_path, try_nestloop_path};
use crate::planner::joinpath::{JoinAttempt, cheapest_total};
use crate::planner::path::{Path, compare_path_costs};
use crate::planner::pathkeys::{
    CostCriterion, PathKey, build_join_pathkeys, find_mergeclauses_for_pathkeys, get_cheapest_path_for_pathkeys,
    make_inner_pathkeys_for_merge, pathkeys_contained_in,
};
use crate::planner::pathnode::{create_material_path, create_unique_path};
use crate::planner::restrictinfo::ClassifiedClause;

/// Snapshot of the relation data the generator reads
struct UnsortedInputs {
    outer_paths: Vec<Rc<Path>>,
    outer_cheapest_total: Rc<Path>,
    inner_paths: Vec<Rc<Path>>,
    inner_parameterized: Vec<Rc<Path>>,
    inner_cheapest_total: Option<Rc<Path>>,
    inner_relids: Relids,
}

fn snapshot(root: &PlannerInfo, attempt: &JoinAttempt<'_>) -> PlannerResult<UnsortedInputs> {
    let outerrel = root.rel(attempt.inputs.outerrel)?;
    let innerrel = root.rel(attempt.inputs.innerrel)?;
    let inner_cheapest_total = cheapest_total(innerrel)?;
    Ok(UnsortedInputs {
        outer_paths: outerrel.pathlist.clone(),
        outer_cheapest_total: cheapest_total(outerrel)?,
        inner_paths: innerrel.pathlist.clone(),
        inner_parameterized: innerrel.cheapest_parameterized().cloned().collect(),
        // useless if it needs the outer relation
        inner_cheapest_total: (!inner_cheapest_total.param_by_rel(&outerrel.relids)).then_some(inner_cheapest_total),
        inner_relids: innerrel.relids.clone(),
    })
}

pub fn match_unsorted_outer(root: &mut PlannerInfo, attempt: &JoinAttempt<'_>) -> PlannerResult<()> {
    let save_jointype = attempt.jointype;
    let nestjoin_ok = save_jointype.nestloop_ok();
    let use_all_clauses = save_jointype.requires_all_clauses();
    let attempt = match save_jointype {
        JoinType::UniqueOuter | JoinType::UniqueInner => attempt.as_jointype(JoinType::Inner),
        _ => *attempt,
    };
    let extra = attempt.extra;
    let mut inputs = snapshot(root, &attempt)?;

    let mut matpath = None;
    if save_jointype == JoinType::UniqueInner {
        let Some(inner) = &inputs.inner_cheapest_total else {
            return Ok(());
        };
        let unique = create_unique_path(root, inner, &extra.sjinfo)?;
        inputs.inner_cheapest_total = Some(unique);
    } else if nestjoin_ok && root.config.enable_material {
        if let Some(inner) = inputs.inner_cheapest_total.as_ref().filter(|p| !p.materializes_output()) {
            matpath = Some(Rc::new(create_material_path(root, inner)));
        }
    }

    for outer_path in &inputs.outer_paths {
        if outer_path.param_by_rel(&inputs.inner_relids) {
            continue;
        }
        let outer_path = if save_jointype == JoinType::UniqueOuter {
            if !Rc::ptr_eq(outer_path, &inputs.outer_cheapest_total) {
                continue;
            }
            create_unique_path(root, outer_path, &extra.sjinfo)?
        } else {
            Rc::clone(outer_path)
        };

        let merge_pathkeys = {
            let joinrel = root.rel(attempt.inputs.joinrel)?;
            build_join_pathkeys(root, joinrel, attempt.jointype, &outer_path.pathkeys)
        };

        if save_jointype == JoinType::UniqueInner {
            if let Some(inner) = &inputs.inner_cheapest_total {
                try_nestloop_path(root, &attempt, &outer_path, inner, &merge_pathkeys)?;
            }
        } else if nestjoin_ok {
            for inner in &inputs.inner_parameterized {
                try_nestloop_path(root, &attempt, &outer_path, inner, &merge_pathkeys)?;
            }
            if let Some(matpath) = &matpath {
                try_nestloop_path(root, &attempt, &outer_path, matpath, &merge_pathkeys)?;
            }
        }

        // a unique-ified outer has no useful ordering
        if save_jointype == JoinType::UniqueOuter {
            continue;
        }
        let Some(inner_cheapest_total) = &inputs.inner_cheapest_total else {
            continue;
        };

        let mergeclauses = find_mergeclauses_for_pathkeys(&outer_path.pathkeys, true, &extra.mergeclause_list);
        // a full join with no join clauses at all can still be merged
        if mergeclauses.is_empty() && attempt.jointype != JoinType::Full {
            continue;
        }
        if use_all_clauses && mergeclauses.len() != extra.mergeclause_list.len() {
            continue;
        }

        let innersortkeys = make_inner_pathkeys_for_merge(&mergeclauses, &outer_path.pathkeys);
        try_mergejoin_path(
            root,
            &attempt,
            MergeInputs {
                outer: Rc::clone(&outer_path),
                inner: Rc::clone(inner_cheapest_total),
                pathkeys: merge_pathkeys.clone(),
                mergeclauses: mergeclauses.clone(),
                outersortkeys: Vec::new(),
                innersortkeys: innersortkeys.clone(),
            },
        )?;

        if save_jointype == JoinType::UniqueInner {
            continue;
        }

        try_presorted_inner_paths(
            root,
            &attempt,
            PresortedSearch {
                outer_path: &outer_path,
                inner_cheapest_total,
                inner_paths: &inputs.inner_paths,
                merge_pathkeys: &merge_pathkeys,
                mergeclauses: &mergeclauses,
                innersortkeys: &innersortkeys,
                use_all_clauses,
            },
        )?;
    }
    Ok(())
}

struct PresortedSearch<'p> {
    outer_path: &'p Rc<Path>,
    inner_cheapest_total: &'p Rc<Path>,
    inner_paths: &'p [Rc<Path>],
    merge_pathkeys: &'p [PathKey],
    mergeclauses: &'p [ClassifiedClause],
    innersortkeys: &'p [PathKey],
    use_all_clauses: bool,
}

/// Merge joins against inner paths already sorted on the full inner key
/// list or a prefix of it.
///
/// A prefix only counts when it finds a path strictly cheaper than every
/// path found for a longer prefix; otherwise it would just give up merge
/// keys a known path already supports. Parameterized inner paths are not
/// considered.
fn try_presorted_inner_paths(
    root: &mut PlannerInfo,
    attempt: &JoinAttempt<'_>,
    search: PresortedSearch<'_>,
) -> PlannerResult<()> {
    let num_sortkeys = search.innersortkeys.len();

    // the explicitly sorted attempt already covers an inner path that
    // needed no sort
    let (mut cheapest_startup_inner, mut cheapest_total_inner) =
        if pathkeys_contained_in(search.innersortkeys, &search.inner_cheapest_total.pathkeys) {
            (
                Some(Rc::clone(search.inner_cheapest_total)),
                Some(Rc::clone(search.inner_cheapest_total)),
            )
        } else {
            (None, None)
        };

    for sortkeycnt in (1..=num_sortkeys).rev() {
        let trialsortkeys = &search.innersortkeys[..sortkeycnt];
        let mut newclauses: Option<Vec<ClassifiedClause>> = None;
        let clauses_for_trial = || {
            if sortkeycnt < num_sortkeys {
                find_mergeclauses_for_pathkeys(trialsortkeys, false, search.mergeclauses)
            } else {
                search.mergeclauses.to_vec()
            }
        };

        let total_inner = get_cheapest_path_for_pathkeys(
            search.inner_paths,
            trialsortkeys,
            &Relids::empty(),
            CostCriterion::Total,
        );
        if let Some(inner) = total_inner {
            let improves = cheapest_total_inner
                .as_ref()
                .is_none_or(|best| compare_path_costs(&inner, best, CostCriterion::Total) == Ordering::Less);
            if improves {
                let clauses = newclauses.get_or_insert_with(clauses_for_trial).clone();
                try_mergejoin_path(
                    root,
                    attempt,
                    MergeInputs {
                        outer: Rc::clone(search.outer_path),
                        inner: Rc::clone(&inner),
                        pathkeys: search.merge_pathkeys.to_vec(),
                        mergeclauses: clauses,
                        outersortkeys: Vec::new(),
                        innersortkeys: Vec::new(),
                    },
                )?;
                cheapest_total_inner = Some(inner);
            }
        }

        let startup_inner = get_cheapest_path_for_pathkeys(
            search.inner_paths,
            trialsortkeys,
            &Relids::empty(),
            CostCriterion::Startup,
        );
        if let Some(inner) = startup_inner {
            let improves = cheapest_startup_inner
                .as_ref()
                .is_none_or(|best| compare_path_costs(&inner, best, CostCriterion::Startup) == Ordering::Less);
            if improves {
                let already_tried = cheapest_total_inner.as_ref().is_some_and(|t| Rc::ptr_eq(t, &inner));
                if !already_tried {
                    let clauses = newclauses.get_or_insert_with(clauses_for_trial).clone();
                    try_mergejoin_path(
                        root,
                        attempt,
                        MergeInputs {
                            outer: Rc::clone(search.outer_path),
                            inner: Rc::clone(&inner),
                            pathkeys: search.merge_pathkeys.to_vec(),
                            mergeclauses: clauses,
                            outersortkeys: Vec::new(),
                            innersortkeys: Vec::new(),
                        },
                    )?;
                }
                cheapest_startup_inner = Some(inner);
            }
        }

        if search.use_all_clauses {
            break;
        }
    }
    Ok(())
}
