// Append Join Interchange
//
// Rewrites (A1 UNION ALL A2 ...) JOIN B into (A1 JOIN B') UNION ALL
// (A2 JOIN B'') ... where each Bn is B filtered by the CHECK constraints of
// the matching An, moved across the equality join clauses. Each branch join
// is planned through the full join path pipeline while the filtered scan of
// B is temporarily installed in B's path list.
//
// The rewrite is all-or-nothing: if any branch cannot be rewritten, no
// Append path is added.

use std::rc::Rc;

use log::debug;

use crate::common::{RelId, RelIndex};
use crate::planner::admission::set_cheapest;
use crate::planner::context::PlannerInfo;
use crate::planner::error::PlannerResult;
use crate::planner::expr::{ColumnRef, Expression};
use crate::planner::joinpath::{JoinAttempt, cheapest_total};
use crate::planner::joinrels::make_join_rel;
use crate::planner::path::{Path, PathKind};
use crate::planner::pathnode::{create_append_path, create_filtered_scan_path};
use crate::planner::relation::RelKind;
use crate::planner::restrictinfo::{RestrictInfo, clause_sides_match_join, make_restrictinfos_from_actual_clauses};
use crate::planner::substitute::substitute_join_keys;

/// Try to add an Append path to the join relation, built from joins of
/// each branch of an Append path of the outer relation with the inner
/// relation.
///
/// Called for inner joins only; see `add_paths_to_joinrel`.
pub fn try_append_pullup(root: &mut PlannerInfo, attempt: &JoinAttempt<'_>) -> PlannerResult<()> {
    let inputs = attempt.inputs;
    let (append_paths, inner_paths, join_clauses) = {
        let outerrel = root.rel(inputs.outerrel)?;
        let innerrel = root.rel(inputs.innerrel)?;
        if outerrel.kind != RelKind::Relation {
            return Ok(());
        }

        let join_clauses: Vec<Rc<RestrictInfo>> = attempt
            .extra
            .restrictlist
            .iter()
            .filter(|rinfo| clause_sides_match_join(rinfo, &outerrel.relids, &innerrel.relids).is_some())
            .cloned()
            .collect();
        if join_clauses.is_empty() {
            debug!("Append pullup: no join clauses between {} and {}", outerrel.relids, innerrel.relids);
            return Ok(());
        }

        // filtered copies of the inner scans cannot carry parameters
        if !innerrel.ppilist.is_empty() || innerrel.pathlist.iter().any(|p| p.param_info.is_some()) {
            debug!("Append pullup: inner relation {} is parameterized", innerrel.relids);
            return Ok(());
        }

        let append_paths: Vec<Rc<Path>> = outerrel.pathlist.iter().filter(|p| p.is_append()).cloned().collect();
        let inner_paths: Vec<Rc<Path>> = innerrel
            .pathlist
            .iter()
            .filter(|p| matches!(&p.kind, PathKind::Scan(method) if method.supports_filtered_copy()))
            .cloned()
            .collect();
        (append_paths, inner_paths, join_clauses)
    };

    for append_path in &append_paths {
        let PathKind::Append { subpaths } = &append_path.kind else {
            continue;
        };
        let mut rewritten = false;
        for inner_path in &inner_paths {
            let Some(branches) = join_branches(root, attempt, subpaths, inner_path, &join_clauses)? else {
                return Ok(());
            };
            let joinrel = root.rel(inputs.joinrel)?;
            let path = create_append_path(root, joinrel, branches);
            debug!(
                "Append pullup: offering Append path for {} (cost={:.2}..{:.2})",
                joinrel.relids, path.startup_cost, path.total_cost
            );
            root.add_path(inputs.joinrel, Rc::new(path))?;
            rewritten = true;
        }
        if rewritten {
            break;
        }
    }
    Ok(())
}

/// Cheapest join of every branch with a filtered copy of `inner_path`, or
/// `None` if some branch cannot be rewritten
fn join_branches(
    root: &mut PlannerInfo,
    attempt: &JoinAttempt<'_>,
    subpaths: &[Rc<Path>],
    inner_path: &Rc<Path>,
    join_clauses: &[Rc<RestrictInfo>],
) -> PlannerResult<Option<Vec<Rc<Path>>>> {
    let mut branches = Vec::with_capacity(subpaths.len());
    for subpath in subpaths {
        let Some(child_relid) = root.rel(subpath.parent)?.relid() else {
            debug!("Append pullup: branch {} is not a single relation", subpath.parent_relids);
            return Ok(None);
        };
        let Some(filters) = branch_filters(root, child_relid, join_clauses)? else {
            debug!("Append pullup: constraints of {} cannot be moved to the inner side", child_relid);
            return Ok(None);
        };

        propagate_attr_needed(root, attempt, subpath.parent, child_relid)?;

        let child_joinrel = if filters.is_empty() {
            make_join_rel(root, subpath.parent, attempt.inputs.innerrel)?
        } else {
            let filters = make_restrictinfos_from_actual_clauses(filters);
            let Some(filtered) = create_filtered_scan_path(root, inner_path, filters)? else {
                return Ok(None);
            };
            with_temporary_path(root, attempt.inputs.innerrel, Rc::new(filtered), |root| {
                make_join_rel(root, subpath.parent, attempt.inputs.innerrel)
            })?
        };
        let Some(child_joinrel) = child_joinrel else {
            debug!("Append pullup: branch {} cannot be joined", child_relid);
            return Ok(None);
        };
        let child_rel = root.rel_mut(child_joinrel)?;
        if !child_rel.has_paths() {
            debug!("Append pullup: no paths for branch join {}", child_rel.relids);
            return Ok(None);
        }
        set_cheapest(child_rel)?;
        branches.push(cheapest_total(child_rel)?);
    }
    Ok(Some(branches))
}

/// The branch's CHECK constraints rewritten onto the inner relation through
/// the join clauses; `None` if any constraint does not translate
fn branch_filters(
    root: &PlannerInfo,
    child_relid: RelId,
    join_clauses: &[Rc<RestrictInfo>],
) -> PlannerResult<Option<Vec<Expression>>> {
    let appinfo = root.find_appendrel_info(child_relid)?;
    let mut child_clauses = Vec::with_capacity(join_clauses.len());
    for rinfo in join_clauses {
        let Some(clause) = appinfo.adjust_appendrel_attrs(&rinfo.clause) else {
            return Ok(None);
        };
        child_clauses.push(Rc::new(rinfo.translated(clause)));
    }

    let child = root.rel(root.find_base_rel(child_relid)?)?;
    let mut filters = Vec::with_capacity(child.check_constraints.len());
    for constraint in &child.check_constraints {
        match substitute_join_keys(constraint, &child_clauses) {
            Some(filter) => filters.push(filter),
            None => return Ok(None),
        }
    }
    Ok(Some(filters))
}

/// Columns of the parent needed above the join are needed from the child
/// as well
fn propagate_attr_needed(
    root: &mut PlannerInfo,
    attempt: &JoinAttempt<'_>,
    child: RelIndex,
    child_relid: RelId,
) -> PlannerResult<()> {
    let joinrel_relids = root.rel(attempt.inputs.joinrel)?.relids.clone();
    let appinfo = root.find_appendrel_info(child_relid)?.clone();
    let parent_needed = root.rel(attempt.inputs.outerrel)?.attr_needed.clone();

    let child_rel = root.rel_mut(child)?;
    for (attno, needed) in parent_needed {
        let above = needed.difference(&joinrel_relids);
        if above.is_empty() {
            continue;
        }
        let parent_col = ColumnRef {
            relid: appinfo.parent_relid,
            attno,
        };
        let Some(child_col) = appinfo.translate(&parent_col) else {
            continue;
        };
        let entry = child_rel.attr_needed.entry(child_col.attno).or_default();
        *entry = entry.union(&above);
    }
    Ok(())
}

/// Run `body` with `path` present in the relation's path list, bypassing
/// admission, and remove it afterwards on every exit path
fn with_temporary_path<T>(
    root: &mut PlannerInfo,
    rel: RelIndex,
    path: Rc<Path>,
    body: impl FnOnce(&mut PlannerInfo) -> PlannerResult<T>,
) -> PlannerResult<T> {
    {
        let rel_info = root.rel_mut(rel)?;
        let position = rel_info
            .pathlist
            .partition_point(|p| p.total_cost <= path.total_cost);
        rel_info.pathlist.insert(position, Rc::clone(&path));
        set_cheapest(rel_info)?;
    }

    let result = body(root);

    let rel_info = root.rel_mut(rel)?;
    rel_info.pathlist.retain(|p| !Rc::ptr_eq(p, &path));
    let restored = set_cheapest(rel_info);
    let value = result?;
    restored?;
    Ok(value)
}
