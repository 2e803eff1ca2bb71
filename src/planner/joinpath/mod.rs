// Join Path Generation
//
// This module enumerates the ways of joining one outer relation to one
// inner relation. The join-level context is computed first; then the
// append interchange rewrite and the three strategy generators propose
// candidates, which the admission collaborator filters into the join
// relation's path list.

pub mod context;
pub mod guards;
pub mod hash;
pub mod interchange;
pub mod merge;
pub mod try_paths;
pub mod unsorted;

use std::rc::Rc;

use log::debug;

use crate::common::RelIndex;
use crate::planner::context::PlannerInfo;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::joininfo::{JoinType, SpecialJoinInfo};
use crate::planner::path::Path;
use crate::planner::relation::RelOptInfo;
use crate::planner::restrictinfo::RestrictInfo;

pub use context::JoinPathExtraData;

/// The three relations taking part in one join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinInputs {
    pub joinrel: RelIndex,
    pub outerrel: RelIndex,
    pub innerrel: RelIndex,
}

/// One generator run: the pair, the join type as executed, and the shared
/// context
#[derive(Debug, Clone, Copy)]
pub struct JoinAttempt<'a> {
    pub inputs: JoinInputs,
    pub jointype: JoinType,
    pub extra: &'a JoinPathExtraData,
}

impl<'a> JoinAttempt<'a> {
    /// Same attempt executed as a different join type (e.g. a semi join
    /// run as an inner join over a unique-ified input)
    pub fn as_jointype(&self, jointype: JoinType) -> JoinAttempt<'a> {
        JoinAttempt { jointype, ..*self }
    }
}

/// Cheapest-total path of a relation whose paths have been indexed
pub(crate) fn cheapest_total(rel: &RelOptInfo) -> PlannerResult<Rc<Path>> {
    rel.cheapest_total_path
        .clone()
        .ok_or_else(|| PlannerError::NoPathsForRelation(rel.relids.clone()))
}

/// Check that `jointype` is a valid way to run a join with constraint
/// `sjinfo`
fn validate_jointype(jointype: JoinType, sjinfo: &SpecialJoinInfo) -> PlannerResult<()> {
    let expected: &[JoinType] = match jointype {
        JoinType::Inner => &[JoinType::Inner, JoinType::Semi],
        JoinType::Left | JoinType::Right => &[JoinType::Left],
        JoinType::Full => &[JoinType::Full],
        JoinType::Semi | JoinType::UniqueOuter | JoinType::UniqueInner => &[JoinType::Semi],
        JoinType::Anti => &[JoinType::Anti],
    };
    if expected.contains(&sjinfo.jointype) {
        Ok(())
    } else {
        Err(PlannerError::UnrecognizedJoinType(jointype))
    }
}

/// Add every worthwhile path for joining `outerrel` to `innerrel` to
/// `joinrel`.
///
/// The inputs must have their cheapest paths set. The join relation's own
/// cheapest paths are left for the caller to recompute.
pub fn add_paths_to_joinrel(
    root: &mut PlannerInfo,
    inputs: JoinInputs,
    jointype: JoinType,
    sjinfo: &SpecialJoinInfo,
    restrictlist: &[Rc<RestrictInfo>],
) -> PlannerResult<()> {
    validate_jointype(jointype, sjinfo)?;
    let extra = JoinPathExtraData::build(root, inputs, jointype, sjinfo, restrictlist)?;
    let attempt = JoinAttempt {
        inputs,
        jointype,
        extra: &extra,
    };
    debug!(
        "Generating {:?} join paths for {} x {}",
        jointype,
        root.rel(inputs.outerrel)?.relids,
        root.rel(inputs.innerrel)?.relids
    );

    // Only plain inner joins are pulled up. Branch joins are planned through
    // make_join_rel, and the join order constraints name the append parent,
    // not its members, so a semi or unique-ified join would come back as a
    // plain inner join of each member.
    if jointype == JoinType::Inner && root.config.enable_append_pullup {
        interchange::try_append_pullup(root, &attempt)?;
    }

    if extra.mergejoin_allowed {
        merge::sort_inner_and_outer(root, &attempt)?;
        unsorted::match_unsorted_outer(root, &attempt)?;
    }

    if root.config.enable_hashjoin || jointype == JoinType::Full {
        hash::hash_inner_and_outer(root, &attempt)?;
    }

    debug!(
        "{} now has {} paths",
        root.rel(inputs.joinrel)?.relids,
        root.rel(inputs.joinrel)?.pathlist.len()
    );
    Ok(())
}
