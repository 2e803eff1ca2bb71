// Parameterization Guards
//
// Extra legality checks for nested loops whose inner side takes parameters
// from the outer side.

use crate::planner::context::PlannerInfo;
use crate::planner::path::Path;

/// Accept a nested loop whose inner side needs parameters both from the
/// outer side and from elsewhere.
///
/// A large fact table scanned through an index on several small dimension
/// tables needs all of them as parameters, even though they are joined to it
/// one at a time.
pub fn allow_star_schema_join(outer_path: &Path, inner_path: &Path) -> bool {
    let inner_params = inner_path.required_outer();
    let outer_relids = &outer_path.parent_relids;
    inner_params.overlaps(outer_relids) && inner_params.nonempty_difference(outer_relids)
}

/// False if the nested loop would need a placeholder as a runtime
/// parameter: one the inner side requires in full, that the outer side
/// covers only partly.
pub fn check_hazardous_phv(root: &PlannerInfo, outer_path: &Path, inner_path: &Path) -> bool {
    let inner_params = inner_path.required_outer();
    let outer_relids = &outer_path.parent_relids;
    if !inner_params.overlaps(outer_relids) {
        return true;
    }
    !root.placeholder_list.iter().any(|phinfo| {
        phinfo.ph_eval_at.is_subset(&inner_params)
            && phinfo.ph_eval_at.overlaps(outer_relids)
            && !phinfo.ph_eval_at.is_subset(outer_relids)
    })
}
