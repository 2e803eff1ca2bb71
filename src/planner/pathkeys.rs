// Sort Orderings (PathKeys)
//
// An ordering is a list of equivalence classes with a direction each. This
// module answers the ordering questions the join generators ask: is one
// ordering satisfied by another, which merge clauses match an ordering, and
// which inner ordering a merge join needs.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::common::{EcId, Relids};
use crate::planner::context::PlannerInfo;
use crate::planner::joininfo::JoinType;
use crate::planner::path::{Path, compare_path_costs};
use crate::planner::relation::RelOptInfo;
use crate::planner::restrictinfo::ClassifiedClause;

/// One sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub eclass: EcId,
    pub descending: bool,
}

impl PathKey {
    pub fn ascending(eclass: EcId) -> Self {
        PathKey {
            eclass,
            descending: false,
        }
    }
}

/// Result of comparing two orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKeysComparison {
    Equal,
    /// The first ordering is strictly more sorted
    Better1,
    /// The second ordering is strictly more sorted
    Better2,
    Different,
}

/// Which cost a "cheapest" search minimizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostCriterion {
    Startup,
    Total,
}

pub fn compare_pathkeys(keys1: &[PathKey], keys2: &[PathKey]) -> PathKeysComparison {
    let common = keys1.len().min(keys2.len());
    if keys1[..common] != keys2[..common] {
        return PathKeysComparison::Different;
    }
    match keys1.len().cmp(&keys2.len()) {
        Ordering::Equal => PathKeysComparison::Equal,
        Ordering::Greater => PathKeysComparison::Better1,
        Ordering::Less => PathKeysComparison::Better2,
    }
}

/// True if data sorted by `keys2` is also sorted by `keys1`
pub fn pathkeys_contained_in(keys1: &[PathKey], keys2: &[PathKey]) -> bool {
    matches!(
        compare_pathkeys(keys1, keys2),
        PathKeysComparison::Equal | PathKeysComparison::Better2
    )
}

/// Cheapest path in `paths` that is sorted by `pathkeys` and requires no
/// relations beyond `required_outer`
pub fn get_cheapest_path_for_pathkeys(
    paths: &[Rc<Path>],
    pathkeys: &[PathKey],
    required_outer: &Relids,
    criterion: CostCriterion,
) -> Option<Rc<Path>> {
    let mut best: Option<&Rc<Path>> = None;
    for path in paths {
        if best.is_some_and(|b| compare_path_costs(b, path, criterion) != Ordering::Greater) {
            continue;
        }
        if pathkeys_contained_in(pathkeys, &path.pathkeys) && path.required_outer().is_subset(required_outer) {
            best = Some(path);
        }
    }
    best.cloned()
}

/// Ordering of a join's output, given the ordering of its outer input.
///
/// Right and full joins emit null-extended rows in no particular place, so
/// their output is unordered. Otherwise the outer ordering is kept as far as
/// it can still be useful above this join.
pub fn build_join_pathkeys(
    root: &PlannerInfo,
    joinrel: &RelOptInfo,
    jointype: JoinType,
    outer_pathkeys: &[PathKey],
) -> Vec<PathKey> {
    if jointype.requires_all_clauses() {
        return Vec::new();
    }
    truncate_useless_pathkeys(root, joinrel, outer_pathkeys)
}

/// Shorten an ordering to the prefix useful for the query's requested order
/// or for a later merge join
pub fn truncate_useless_pathkeys(root: &PlannerInfo, rel: &RelOptInfo, pathkeys: &[PathKey]) -> Vec<PathKey> {
    let useful = pathkeys_useful_for_merging(root, rel, pathkeys).max(pathkeys_useful_for_ordering(root, pathkeys));
    pathkeys[..useful].to_vec()
}

fn pathkeys_useful_for_merging(root: &PlannerInfo, rel: &RelOptInfo, pathkeys: &[PathKey]) -> usize {
    pathkeys
        .iter()
        .take_while(|pk| root.eclasses.reaches_beyond(pk.eclass, &rel.relids))
        .count()
}

fn pathkeys_useful_for_ordering(root: &PlannerInfo, pathkeys: &[PathKey]) -> usize {
    if root.query_pathkeys.is_empty() {
        return 0;
    }
    if pathkeys_contained_in(&root.query_pathkeys, pathkeys) {
        root.query_pathkeys.len()
    } else {
        0
    }
}

/// Merge clauses usable with an input sorted by `pathkeys`, in key order.
///
/// Stops at the first key no clause matches: later clauses cannot be merge
/// keys without it. `outer_keys` says which side of the clauses the ordering
/// belongs to.
pub fn find_mergeclauses_for_pathkeys(
    pathkeys: &[PathKey],
    outer_keys: bool,
    clauses: &[ClassifiedClause],
) -> Vec<ClassifiedClause> {
    let mut result: Vec<ClassifiedClause> = Vec::new();
    for pathkey in pathkeys {
        let matched: Vec<&ClassifiedClause> = clauses
            .iter()
            .filter(|c| {
                let ec = if outer_keys { c.outer_ec } else { c.inner_ec };
                ec == Some(pathkey.eclass)
            })
            .filter(|c| !result.iter().any(|r| Rc::ptr_eq(&r.rinfo, &c.rinfo)))
            .collect();
        if matched.is_empty() {
            break;
        }
        result.extend(matched.into_iter().cloned());
    }
    result
}

/// Inner ordering a merge join needs for `mergeclauses` when the outer is
/// sorted by `outer_pathkeys`
pub fn make_inner_pathkeys_for_merge(mergeclauses: &[ClassifiedClause], outer_pathkeys: &[PathKey]) -> Vec<PathKey> {
    let mut pathkeys: Vec<PathKey> = Vec::new();
    for clause in mergeclauses {
        let (Some(outer_ec), Some(inner_ec)) = (clause.outer_ec, clause.inner_ec) else {
            continue;
        };
        let descending = outer_pathkeys
            .iter()
            .find(|pk| pk.eclass == outer_ec)
            .is_some_and(|pk| pk.descending);
        let pathkey = PathKey {
            eclass: inner_ec,
            descending,
        };
        if !pathkeys.iter().any(|pk| pk.eclass == inner_ec) {
            pathkeys.push(pathkey);
        }
    }
    pathkeys
}

/// Candidate outer orderings for an explicitly sorted merge join.
///
/// Every merge clause's outer equivalence class appears exactly once. The
/// query's requested ordering comes first if the clauses cover all of it;
/// the remaining classes follow, those with the most members outside the
/// join relation first.
pub fn select_outer_pathkeys_for_merge(
    root: &PlannerInfo,
    mergeclauses: &[ClassifiedClause],
    joinrel: &RelOptInfo,
) -> Vec<PathKey> {
    let mut ecs: Vec<(EcId, usize)> = Vec::new();
    for clause in mergeclauses {
        let Some(ec) = clause.outer_ec else { continue };
        if ecs.iter().any(|(e, _)| *e == ec) {
            continue;
        }
        let score = root.eclasses.get(ec).map_or(0, |class| {
            class
                .members
                .iter()
                .filter(|m| {
                    let relids = m.relids();
                    !relids.is_empty() && !relids.overlaps(&joinrel.relids)
                })
                .count()
        });
        ecs.push((ec, score));
    }

    let mut pathkeys = Vec::with_capacity(ecs.len());
    let query_keys_available = !root.query_pathkeys.is_empty()
        && root
            .query_pathkeys
            .iter()
            .all(|qk| ecs.iter().any(|(e, _)| *e == qk.eclass));
    if query_keys_available {
        for qk in &root.query_pathkeys {
            if !pathkeys.iter().any(|pk: &PathKey| pk.eclass == qk.eclass) {
                pathkeys.push(*qk);
            }
        }
    }

    let mut remaining: Vec<(EcId, usize)> = ecs
        .into_iter()
        .filter(|(ec, _)| !pathkeys.iter().any(|pk| pk.eclass == *ec))
        .collect();
    // stable, so equal scores keep clause order
    remaining.sort_by(|a, b| b.1.cmp(&a.1));
    pathkeys.extend(remaining.into_iter().map(|(ec, _)| PathKey::ascending(ec)));
    pathkeys
}
