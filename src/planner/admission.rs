// Candidate Admission
//
// Decides which candidate paths a relation keeps. A new path survives only
// if no kept path is at least as cheap, at least as well ordered, no more
// parameterized and returns no more rows; kept paths it beats are evicted.

use std::cmp::Ordering;
use std::rc::Rc;

use log::trace;

use crate::common::Cost;
use crate::common::relids::{Relids, SubsetComparison};
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::path::{Path, compare_path_costs};
use crate::planner::pathkeys::{CostCriterion, PathKey, PathKeysComparison, compare_pathkeys};
use crate::planner::relation::RelOptInfo;

/// Fuzz used to decide that two costs differ by noise only
pub const STD_FUZZ_FACTOR: f64 = 1.01;

/// Tie-breaker fuzz for paths that are otherwise identical
const TIE_FUZZ_FACTOR: f64 = 1.0000000001;

/// Admission collaborator used by the join generators
pub trait PathAdmission {
    /// Cheap test run before a candidate is built: false if some kept path
    /// certainly dominates a candidate with these properties
    fn precheck(
        &self,
        rel: &RelOptInfo,
        startup_cost: Cost,
        total_cost: Cost,
        pathkeys: &[PathKey],
        required_outer: &Relids,
    ) -> bool;

    /// Insert `path` into the relation's path list unless dominated,
    /// evicting the paths it dominates
    fn submit(&self, rel: &mut RelOptInfo, path: Rc<Path>);
}

/// Outcome of a fuzzy two-cost comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostComparison {
    Equal,
    Better1,
    Better2,
    Different,
}

/// Compare startup and total cost, treating differences within `fuzz` as
/// equal
pub fn compare_path_costs_fuzzily(path1: &Path, path2: &Path, fuzz: f64) -> CostComparison {
    if path1.total_cost > path2.total_cost * fuzz {
        if path2.startup_cost > path1.startup_cost * fuzz {
            return CostComparison::Different;
        }
        return CostComparison::Better2;
    }
    if path2.total_cost > path1.total_cost * fuzz {
        if path1.startup_cost > path2.startup_cost * fuzz {
            return CostComparison::Different;
        }
        return CostComparison::Better1;
    }
    if path1.startup_cost > path2.startup_cost * fuzz {
        return CostComparison::Better2;
    }
    if path2.startup_cost > path1.startup_cost * fuzz {
        return CostComparison::Better1;
    }
    CostComparison::Equal
}

/// Orderings of parameterized paths are not compared; such paths are
/// rarely useful for their sort order
fn effective_pathkeys(path: &Path) -> &[PathKey] {
    if path.param_info.is_some() { &[] } else { &path.pathkeys }
}

/// Default admission: fuzzy cost dominance
#[derive(Debug, Clone)]
pub struct DominanceAdmission {
    fuzz_factor: f64,
}

impl Default for DominanceAdmission {
    fn default() -> Self {
        DominanceAdmission {
            fuzz_factor: STD_FUZZ_FACTOR,
        }
    }
}

impl DominanceAdmission {
    pub fn new(fuzz_factor: f64) -> Self {
        DominanceAdmission { fuzz_factor }
    }

    /// Verdict of comparing a new path with a kept one
    fn compare(&self, new_path: &Path, old_path: &Path) -> Verdict {
        let costcmp = compare_path_costs_fuzzily(new_path, old_path, self.fuzz_factor);
        if costcmp == CostComparison::Different {
            return Verdict::Neither;
        }
        let keyscmp = compare_pathkeys(effective_pathkeys(new_path), effective_pathkeys(old_path));
        if keyscmp == PathKeysComparison::Different {
            return Verdict::Neither;
        }

        let outercmp = new_path.required_outer().subset_compare(&old_path.required_outer());
        let new_less_param = matches!(outercmp, SubsetComparison::Equal | SubsetComparison::Subset1);
        let old_less_param = matches!(outercmp, SubsetComparison::Equal | SubsetComparison::Subset2);
        let new_fewer_rows = new_path.rows <= old_path.rows;
        let old_fewer_rows = new_path.rows >= old_path.rows;

        match costcmp {
            CostComparison::Equal => match keyscmp {
                PathKeysComparison::Better1 if new_less_param && new_fewer_rows => Verdict::RemoveOld,
                PathKeysComparison::Better2 if old_less_param && old_fewer_rows => Verdict::RejectNew,
                PathKeysComparison::Equal => match outercmp {
                    SubsetComparison::Equal => {
                        if new_path.rows < old_path.rows {
                            Verdict::RemoveOld
                        } else if new_path.rows > old_path.rows {
                            Verdict::RejectNew
                        } else if compare_path_costs_fuzzily(new_path, old_path, TIE_FUZZ_FACTOR)
                            == CostComparison::Better1
                        {
                            Verdict::RemoveOld
                        } else {
                            // still tied: keep the old path
                            Verdict::RejectNew
                        }
                    }
                    SubsetComparison::Subset1 if new_fewer_rows => Verdict::RemoveOld,
                    SubsetComparison::Subset2 if old_fewer_rows => Verdict::RejectNew,
                    _ => Verdict::Neither,
                },
                _ => Verdict::Neither,
            },
            CostComparison::Better1 if keyscmp != PathKeysComparison::Better2 && new_less_param && new_fewer_rows => {
                Verdict::RemoveOld
            }
            CostComparison::Better2 if keyscmp != PathKeysComparison::Better1 && old_less_param && old_fewer_rows => {
                Verdict::RejectNew
            }
            _ => Verdict::Neither,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    RemoveOld,
    RejectNew,
    Neither,
}

impl PathAdmission for DominanceAdmission {
    fn precheck(
        &self,
        rel: &RelOptInfo,
        startup_cost: Cost,
        total_cost: Cost,
        pathkeys: &[PathKey],
        required_outer: &Relids,
    ) -> bool {
        let new_pathkeys: &[PathKey] = if required_outer.is_empty() { pathkeys } else { &[] };

        for old_path in &rel.pathlist {
            // the list is sorted by total cost, nothing further on can dominate
            if total_cost < old_path.total_cost {
                break;
            }
            // a parameterized candidate cannot win on startup cost alone
            if startup_cost >= old_path.startup_cost || !required_outer.is_empty() {
                let keyscmp = compare_pathkeys(new_pathkeys, effective_pathkeys(old_path));
                if matches!(keyscmp, PathKeysComparison::Equal | PathKeysComparison::Better2)
                    && *required_outer == old_path.required_outer()
                {
                    trace!(
                        "Precheck rejected candidate for {} (cost={:.2}..{:.2})",
                        rel.relids, startup_cost, total_cost
                    );
                    return false;
                }
            }
        }
        true
    }

    fn submit(&self, rel: &mut RelOptInfo, path: Rc<Path>) {
        let mut accept_new = true;
        let mut insert_at = 0;
        let mut kept = Vec::with_capacity(rel.pathlist.len() + 1);

        let old_paths = std::mem::take(&mut rel.pathlist);
        let mut remaining = old_paths.into_iter();
        for old_path in remaining.by_ref() {
            match self.compare(&path, &old_path) {
                Verdict::RemoveOld => {
                    trace!("{} evicted by new {}", old_path.node_name(), path.node_name());
                    continue;
                }
                Verdict::RejectNew => accept_new = false,
                Verdict::Neither => {}
            }
            if path.total_cost >= old_path.total_cost {
                insert_at = kept.len() + 1;
            }
            kept.push(old_path);
            if !accept_new {
                break;
            }
        }
        kept.extend(remaining);

        if accept_new {
            trace!(
                "Added {} to {} (cost={:.2}..{:.2} rows={:.0} required_outer={})",
                path.node_name(),
                rel.relids,
                path.startup_cost,
                path.total_cost,
                path.rows,
                path.required_outer()
            );
            kept.insert(insert_at.min(kept.len()), path);
        } else {
            trace!("Rejected dominated {} for {}", path.node_name(), rel.relids);
        }
        rel.pathlist = kept;
    }
}

/// Recompute a relation's cheapest paths and its per-parameterization
/// index.
///
/// Paths carrying parameter information are indexed under their required
/// set, even an empty one, and never compete with unparameterized paths for
/// the cheapest slots.
pub fn set_cheapest(rel: &mut RelOptInfo) -> PlannerResult<()> {
    if rel.pathlist.is_empty() {
        return Err(PlannerError::NoPathsForRelation(rel.relids.clone()));
    }

    let mut cheapest_startup: Option<&Rc<Path>> = None;
    let mut cheapest_total: Option<&Rc<Path>> = None;
    let mut best_param: Option<&Rc<Path>> = None;
    let mut by_param: std::collections::BTreeMap<Option<Relids>, Rc<Path>> = Default::default();

    for path in &rel.pathlist {
        if path.param_info.is_some() {
            let key = Some(path.required_outer());
            let replace = by_param
                .get(&key)
                .is_none_or(|best| compare_path_costs(path, best, CostCriterion::Total) == Ordering::Less);
            if replace {
                by_param.insert(key, Rc::clone(path));
            }

            best_param = match best_param {
                None => Some(path),
                Some(best) => match path.required_outer().subset_compare(&best.required_outer()) {
                    SubsetComparison::Equal
                        if compare_path_costs(path, best, CostCriterion::Total) == Ordering::Less =>
                    {
                        Some(path)
                    }
                    SubsetComparison::Subset1 => Some(path),
                    _ => Some(best),
                },
            };
            continue;
        }

        cheapest_startup = Some(match cheapest_startup {
            None => path,
            Some(best) => {
                let cmp = compare_path_costs(best, path, CostCriterion::Startup);
                if cmp == Ordering::Greater
                    || (cmp == Ordering::Equal
                        && compare_pathkeys(&best.pathkeys, &path.pathkeys) == PathKeysComparison::Better2)
                {
                    path
                } else {
                    best
                }
            }
        });
        cheapest_total = Some(match cheapest_total {
            None => path,
            Some(best) => {
                let cmp = compare_path_costs(best, path, CostCriterion::Total);
                if cmp == Ordering::Greater
                    || (cmp == Ordering::Equal
                        && compare_pathkeys(&best.pathkeys, &path.pathkeys) == PathKeysComparison::Better2)
                {
                    path
                } else {
                    best
                }
            }
        });
    }

    if let Some(total) = cheapest_total {
        by_param.insert(None, Rc::clone(total));
    }
    rel.cheapest_startup_path = cheapest_startup.cloned();
    rel.cheapest_total_path = cheapest_total.or(best_param).cloned();
    rel.cheapest_parameterized_paths = by_param;
    Ok(())
}
