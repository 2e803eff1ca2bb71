// Planner Configuration
//
// Strategy switches and cost constants. Loadable from JSON so scenarios can
// be replayed with different settings.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::planner::error::PlannerResult;

/// Cost constants of the default cost model, in abstract units where one
/// sequential page fetch costs 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConstants {
    pub seq_page_cost: f64,
    pub random_page_cost: f64,
    pub cpu_tuple_cost: f64,
    pub cpu_index_tuple_cost: f64,
    pub cpu_operator_cost: f64,
    /// Added to the startup cost of a strategy that is switched off
    pub disable_cost: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        CostConstants {
            seq_page_cost: 1.0,
            random_page_cost: 4.0,
            cpu_tuple_cost: 0.01,
            cpu_index_tuple_cost: 0.005,
            cpu_operator_cost: 0.0025,
            disable_cost: 1.0e10,
        }
    }
}

/// Planner switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Generate merge joins (always on for full joins)
    pub enable_mergejoin: bool,
    /// Generate hash joins (always on for full joins)
    pub enable_hashjoin: bool,
    /// Nested loops are still generated when off, but priced out
    pub enable_nestloop: bool,
    /// Offer a materialized copy of the cheapest inner path to nested loops
    pub enable_material: bool,
    /// Try moving joins below append paths of partitioned tables
    pub enable_append_pullup: bool,
    /// Relative cost difference below which two paths count as equally
    /// expensive
    pub fuzz_factor: f64,
    pub costs: CostConstants,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            enable_mergejoin: true,
            enable_hashjoin: true,
            enable_nestloop: true,
            enable_material: true,
            enable_append_pullup: true,
            fuzz_factor: 1.01,
            costs: CostConstants::default(),
        }
    }
}

impl PlannerConfig {
    pub fn from_json_str(json: &str) -> PlannerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> PlannerResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> PlannerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
