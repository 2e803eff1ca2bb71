// Join Planner Module
//
// This module holds the planner state, the path and relation model, and
// the join path generators with their cost and admission collaborators.

pub mod admission;
pub mod config;
pub mod context;
pub mod cost_model;
pub mod equivclass;
pub mod error;
pub mod expr;
pub mod expression_eval;
pub mod joininfo;
pub mod joinpath;
pub mod joinrels;
pub mod path;
pub mod pathkeys;
pub mod pathnode;
pub mod relation;
pub mod restrictinfo;
pub mod substitute;

// Export key types
pub use self::admission::{DominanceAdmission, PathAdmission, set_cheapest};
pub use self::config::PlannerConfig;
pub use self::context::PlannerInfo;
pub use self::cost_model::{CostEstimator, CostModel};
pub use self::error::{PlannerError, PlannerResult};
pub use self::joininfo::JoinType;
pub use self::joinpath::{JoinInputs, add_paths_to_joinrel};
pub use self::joinrels::make_join_rel;
pub use self::path::{Path, PathKind, ScanMethod};
