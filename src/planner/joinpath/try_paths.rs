// Candidate Attempts
//
// One function per join method: compute what the result still requires,
// apply the parameterization rules, get a lower-bound cost, ask admission
// for a precheck, and only then build and submit the path.

use std::rc::Rc;

use log::trace;

use crate::common::Relids;
use crate::planner::context::PlannerInfo;
use crate::planner::error::PlannerResult;
use crate::planner::joinpath::JoinAttempt;
use crate::planner::joinpath::guards::{allow_star_schema_join, check_hazardous_phv};
use crate::planner::path::Path;
use crate::planner::pathkeys::{PathKey, pathkeys_contained_in};
use crate::planner::pathnode::{
    JoinCandidate, calc_nestloop_required_outer, calc_non_nestloop_required_outer, create_hashjoin_path,
    create_mergejoin_path, create_nestloop_path,
};
use crate::planner::restrictinfo::ClassifiedClause;

/// Inputs of one merge join attempt
pub struct MergeInputs {
    pub outer: Rc<Path>,
    pub inner: Rc<Path>,
    pub pathkeys: Vec<PathKey>,
    pub mergeclauses: Vec<ClassifiedClause>,
    /// Requested outer ordering; dropped if the outer path already has it
    pub outersortkeys: Vec<PathKey>,
    /// Requested inner ordering; dropped if the inner path already has it
    pub innersortkeys: Vec<PathKey>,
}

/// Merge and hash joins may only be parameterized by the accepted sources
fn non_nestloop_required_outer(attempt: &JoinAttempt<'_>, outer: &Path, inner: &Path) -> Option<Relids> {
    let required_outer = calc_non_nestloop_required_outer(outer, inner);
    if !required_outer.is_empty() && !required_outer.overlaps(&attempt.extra.param_source_rels) {
        return None;
    }
    Some(required_outer.union(&attempt.extra.extra_lateral_rels))
}

fn candidate(
    attempt: &JoinAttempt<'_>,
    outer: Rc<Path>,
    inner: Rc<Path>,
    pathkeys: Vec<PathKey>,
    required_outer: Relids,
) -> JoinCandidate {
    JoinCandidate {
        jointype: attempt.jointype,
        outer,
        inner,
        restrictlist: attempt.extra.restrictlist.clone(),
        pathkeys,
        required_outer,
    }
}

pub fn try_nestloop_path(
    root: &mut PlannerInfo,
    attempt: &JoinAttempt<'_>,
    outer: &Rc<Path>,
    inner: &Rc<Path>,
    pathkeys: &[PathKey],
) -> PlannerResult<()> {
    let required_outer = calc_nestloop_required_outer(outer, inner);
    if !required_outer.is_empty()
        && ((!required_outer.overlaps(&attempt.extra.param_source_rels) && !allow_star_schema_join(outer, inner))
            || !check_hazardous_phv(root, outer, inner))
    {
        trace!("Nested loop rejected: unwanted parameterization {}", required_outer);
        return Ok(());
    }
    let required_outer = required_outer.union(&attempt.extra.extra_lateral_rels);

    let workspace = root
        .cost_model
        .initial_cost_nestloop(attempt.jointype, outer, inner, attempt.extra.semifactors.as_ref());
    let joinrel = root.rel(attempt.inputs.joinrel)?;
    if !root.admission.precheck(
        joinrel,
        workspace.startup_cost,
        workspace.total_cost,
        pathkeys,
        &required_outer,
    ) {
        return Ok(());
    }

    let join = candidate(attempt, Rc::clone(outer), Rc::clone(inner), pathkeys.to_vec(), required_outer);
    let path = create_nestloop_path(root, joinrel, &workspace, join);
    root.add_path(attempt.inputs.joinrel, Rc::new(path))
}

pub fn try_mergejoin_path(root: &mut PlannerInfo, attempt: &JoinAttempt<'_>, merge: MergeInputs) -> PlannerResult<()> {
    let MergeInputs {
        outer,
        inner,
        pathkeys,
        mergeclauses,
        mut outersortkeys,
        mut innersortkeys,
    } = merge;

    let Some(required_outer) = non_nestloop_required_outer(attempt, &outer, &inner) else {
        trace!("Merge join rejected: unwanted parameterization");
        return Ok(());
    };

    if !outersortkeys.is_empty() && pathkeys_contained_in(&outersortkeys, &outer.pathkeys) {
        outersortkeys.clear();
    }
    if !innersortkeys.is_empty() && pathkeys_contained_in(&innersortkeys, &inner.pathkeys) {
        innersortkeys.clear();
    }

    let workspace = root.cost_model.initial_cost_mergejoin(
        attempt.jointype,
        mergeclauses.len(),
        &outer,
        &inner,
        !outersortkeys.is_empty(),
        !innersortkeys.is_empty(),
    );
    let joinrel = root.rel(attempt.inputs.joinrel)?;
    if !root.admission.precheck(
        joinrel,
        workspace.startup_cost,
        workspace.total_cost,
        &pathkeys,
        &required_outer,
    ) {
        return Ok(());
    }

    let join = candidate(attempt, outer, inner, pathkeys, required_outer);
    let path = create_mergejoin_path(root, joinrel, &workspace, join, mergeclauses, outersortkeys, innersortkeys);
    root.add_path(attempt.inputs.joinrel, Rc::new(path))
}

pub fn try_hashjoin_path(
    root: &mut PlannerInfo,
    attempt: &JoinAttempt<'_>,
    outer: &Rc<Path>,
    inner: &Rc<Path>,
    hashclauses: &[ClassifiedClause],
) -> PlannerResult<()> {
    let Some(required_outer) = non_nestloop_required_outer(attempt, outer, inner) else {
        trace!("Hash join rejected: unwanted parameterization");
        return Ok(());
    };

    let workspace = root.cost_model.initial_cost_hashjoin(
        attempt.jointype,
        hashclauses.len(),
        outer,
        inner,
        attempt.extra.semifactors.as_ref(),
    );
    let joinrel = root.rel(attempt.inputs.joinrel)?;
    // hash join output is unordered
    if !root.admission.precheck(
        joinrel,
        workspace.startup_cost,
        workspace.total_cost,
        &[],
        &required_outer,
    ) {
        return Ok(());
    }

    let join = candidate(attempt, Rc::clone(outer), Rc::clone(inner), Vec::new(), required_outer);
    let path = create_hashjoin_path(root, joinrel, &workspace, join, hashclauses.to_vec());
    root.add_path(attempt.inputs.joinrel, Rc::new(path))
}
