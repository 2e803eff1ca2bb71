// Bayun Join Path Planner
//
// Two-relation join path generation for a cost-based query optimizer.

pub mod common;
pub mod planner;

// Re-export key items for convenient access
pub use common::Relids;
pub use planner::{
    CostEstimator, CostModel, DominanceAdmission, JoinInputs, JoinType, Path, PathAdmission, PathKind, PlannerConfig,
    PlannerError, PlannerInfo, PlannerResult, ScanMethod, add_paths_to_joinrel, make_join_rel,
};
