// Path Construction
//
// Builders for every path kind the join generators produce. Each builder
// asks the cost collaborator for its estimates and returns a finished,
// immutable Path; admission is left to the caller.

use std::rc::Rc;

use crate::common::{RelIndex, Relids};
use crate::planner::context::PlannerInfo;
use crate::planner::cost_model::{JoinCostWorkspace, clamp_row_est};
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::joininfo::{JoinType, SpecialJoinInfo};
use crate::planner::path::{JoinPathInfo, ParamPathInfo, Path, PathKind, ScanMethod};
use crate::planner::pathkeys::PathKey;
use crate::planner::relation::RelOptInfo;
use crate::planner::restrictinfo::{ClassifiedClause, RestrictInfo};

/// Inputs common to all join path builders
#[derive(Debug, Clone)]
pub struct JoinCandidate {
    pub jointype: JoinType,
    pub outer: Rc<Path>,
    pub inner: Rc<Path>,
    pub restrictlist: Vec<Rc<RestrictInfo>>,
    pub pathkeys: Vec<PathKey>,
    pub required_outer: Relids,
}

pub fn create_scan_path(
    root: &PlannerInfo,
    rel: RelIndex,
    method: ScanMethod,
    pathkeys: Vec<PathKey>,
    param_info: Option<Rc<ParamPathInfo>>,
) -> PlannerResult<Path> {
    let rel_info = root.rel(rel)?;
    let cost = root.cost_model.cost_scan(&method, rel_info, param_info.as_deref());
    Ok(Path {
        kind: PathKind::Scan(method),
        parent: rel,
        parent_relids: rel_info.relids.clone(),
        rows: cost.rows,
        startup_cost: cost.startup_cost,
        total_cost: cost.total_cost,
        pathkeys,
        param_info,
    })
}

/// Copy of an unparameterized scan that also applies `filters`.
///
/// The copy carries parameter information with an empty required set, so it
/// is indexed separately from the plain scans of the relation. Returns
/// `None` for scans that cannot take extra filters.
pub fn create_filtered_scan_path(
    root: &PlannerInfo,
    scan: &Path,
    filters: Vec<Rc<RestrictInfo>>,
) -> PlannerResult<Option<Path>> {
    let PathKind::Scan(method) = &scan.kind else {
        return Ok(None);
    };
    if !method.supports_filtered_copy() || scan.param_info.is_some() {
        return Ok(None);
    }
    let selectivity = root.cost_model.clauselist_selectivity(&filters);
    let param = ParamPathInfo {
        req_outer: Relids::empty(),
        rows: clamp_row_est(scan.rows * selectivity),
        clauses: filters,
    };
    create_scan_path(root, scan.parent, method.clone(), scan.pathkeys.clone(), Some(Rc::new(param))).map(Some)
}

pub fn create_material_path(root: &PlannerInfo, subpath: &Rc<Path>) -> Path {
    let cost = root.cost_model.cost_material(subpath);
    Path {
        kind: PathKind::Material {
            subpath: Rc::clone(subpath),
        },
        parent: subpath.parent,
        parent_relids: subpath.parent_relids.clone(),
        rows: cost.rows,
        startup_cost: cost.startup_cost,
        total_cost: cost.total_cost,
        pathkeys: subpath.pathkeys.clone(),
        param_info: subpath.param_info.clone(),
    }
}

/// Duplicate-eliminated wrapper of `subpath` on the semi join's right-hand
/// expressions, so the semi join can run as a plain inner join
pub fn create_unique_path(root: &PlannerInfo, subpath: &Rc<Path>, sjinfo: &SpecialJoinInfo) -> PlannerResult<Rc<Path>> {
    if sjinfo.semi_rhs_exprs.is_empty() {
        return Err(PlannerError::MissingSpecialJoinInfo(sjinfo.jointype));
    }
    let cost = root.cost_model.cost_unique(subpath, sjinfo.semi_rhs_exprs.len());
    Ok(Rc::new(Path {
        kind: PathKind::Unique {
            subpath: Rc::clone(subpath),
            exprs: sjinfo.semi_rhs_exprs.clone(),
        },
        parent: subpath.parent,
        parent_relids: subpath.parent_relids.clone(),
        rows: cost.rows,
        startup_cost: cost.startup_cost,
        total_cost: cost.total_cost,
        pathkeys: Vec::new(),
        param_info: subpath.param_info.clone(),
    }))
}

/// Row estimate and parameter information of a join path
fn join_path_rows(root: &PlannerInfo, joinrel: &RelOptInfo, candidate: &JoinCandidate) -> (f64, Option<Rc<ParamPathInfo>>) {
    if candidate.required_outer.is_empty() {
        return (joinrel.rows, None);
    }
    let rows = root.cost_model.join_rel_size(
        candidate.outer.rows,
        candidate.inner.rows,
        candidate.jointype,
        &candidate.restrictlist,
    );
    let param = ParamPathInfo {
        req_outer: candidate.required_outer.clone(),
        rows,
        clauses: Vec::new(),
    };
    (rows, Some(Rc::new(param)))
}

fn join_path(
    root: &PlannerInfo,
    joinrel: &RelOptInfo,
    workspace: &JoinCostWorkspace,
    candidate: JoinCandidate,
    make_kind: impl FnOnce(JoinPathInfo) -> PathKind,
) -> Path {
    let (rows, param_info) = join_path_rows(root, joinrel, &candidate);
    let (startup_cost, total_cost) = root
        .cost_model
        .final_cost_join(workspace, rows, candidate.restrictlist.len());
    let join = JoinPathInfo {
        jointype: candidate.jointype,
        outer: candidate.outer,
        inner: candidate.inner,
        joinrestrictinfo: candidate.restrictlist,
    };
    Path {
        kind: make_kind(join),
        parent: joinrel.index,
        parent_relids: joinrel.relids.clone(),
        rows,
        startup_cost,
        total_cost,
        pathkeys: candidate.pathkeys,
        param_info,
    }
}

pub fn create_nestloop_path(
    root: &PlannerInfo,
    joinrel: &RelOptInfo,
    workspace: &JoinCostWorkspace,
    mut candidate: JoinCandidate,
) -> Path {
    // clauses the parameterized inner side already enforces
    if let Some(ppi) = &candidate.inner.param_info {
        candidate
            .restrictlist
            .retain(|rinfo| !ppi.clauses.iter().any(|enforced| enforced.clause == rinfo.clause));
    }
    join_path(root, joinrel, workspace, candidate, PathKind::NestLoop)
}

pub fn create_mergejoin_path(
    root: &PlannerInfo,
    joinrel: &RelOptInfo,
    workspace: &JoinCostWorkspace,
    candidate: JoinCandidate,
    mergeclauses: Vec<ClassifiedClause>,
    outersortkeys: Vec<PathKey>,
    innersortkeys: Vec<PathKey>,
) -> Path {
    join_path(root, joinrel, workspace, candidate, |join| PathKind::MergeJoin {
        join,
        mergeclauses,
        outersortkeys,
        innersortkeys,
    })
}

pub fn create_hashjoin_path(
    root: &PlannerInfo,
    joinrel: &RelOptInfo,
    workspace: &JoinCostWorkspace,
    candidate: JoinCandidate,
    hashclauses: Vec<ClassifiedClause>,
) -> Path {
    join_path(root, joinrel, workspace, candidate, |join| PathKind::HashJoin { join, hashclauses })
}

/// Union of `subpaths`, all producing rows of `rel`
pub fn create_append_path(root: &PlannerInfo, rel: &RelOptInfo, subpaths: Vec<Rc<Path>>) -> Path {
    let cost = root.cost_model.cost_append(&subpaths);
    let required_outer = subpaths
        .iter()
        .fold(Relids::empty(), |acc, p| acc.union(&p.required_outer()));
    let param_info = (!required_outer.is_empty()).then(|| {
        Rc::new(ParamPathInfo {
            req_outer: required_outer,
            rows: cost.rows,
            clauses: Vec::new(),
        })
    });
    Path {
        kind: PathKind::Append { subpaths },
        parent: rel.index,
        parent_relids: rel.relids.clone(),
        rows: cost.rows,
        startup_cost: cost.startup_cost,
        total_cost: cost.total_cost,
        pathkeys: Vec::new(),
        param_info,
    }
}

/// Relations a nested loop still needs from outside: the outer side can
/// supply the inner side's parameters
pub fn calc_nestloop_required_outer(outer: &Path, inner: &Path) -> Relids {
    outer
        .required_outer()
        .union(&inner.required_outer().difference(&outer.parent_relids))
}

/// Relations a merge or hash join still needs from outside
pub fn calc_non_nestloop_required_outer(outer: &Path, inner: &Path) -> Relids {
    outer.required_outer().union(&inner.required_outer())
}
