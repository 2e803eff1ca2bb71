// Cost Model for Join Path Generation
//
// This module provides cost estimation for candidate paths. The join
// generators only rely on the CostEstimator trait; CostModel is the default
// implementation, with PostgreSQL-style constants.
//
// Join costing is split in two phases. The initial estimate is a cheap lower
// bound used to pre-check a candidate against the ones already kept; the
// final estimate adds the per-output-row work once the path is built.

use std::rc::Rc;

use crate::common::{Cost, TUPLES_PER_PAGE};
use crate::planner::config::{CostConstants, PlannerConfig};
use crate::planner::joininfo::JoinType;
use crate::planner::path::{ParamPathInfo, Path, ScanMethod};
use crate::planner::relation::RelOptInfo;
use crate::planner::restrictinfo::RestrictInfo;

/// Number of distinct values assumed when nothing better is known
pub const DEFAULT_NUM_DISTINCT: f64 = 200.0;

/// Join algorithms, for the per-strategy disable switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMethod {
    NestLoop,
    MergeJoin,
    HashJoin,
}

/// Result of a cheap first-phase join estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinCostWorkspace {
    pub method: JoinMethod,
    pub startup_cost: Cost,
    pub total_cost: Cost,
    pub outer_rows: f64,
    pub inner_rows: f64,
}

/// Correction factors for semi and anti joins, which stop scanning the
/// inner side at the first match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemiAntiJoinFactors {
    /// Fraction of outer rows with at least one match
    pub outer_match_frac: f64,
    /// Average matches per matched outer row
    pub match_count: f64,
}

/// Startup cost, total cost and rows of a non-join path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathCost {
    pub startup_cost: Cost,
    pub total_cost: Cost,
    pub rows: f64,
}

/// Cost collaborator used by the join generators. Estimates must be
/// deterministic for the same inputs.
pub trait CostEstimator {
    /// Scan of a base relation, optionally with extra parameterized or
    /// derived filter clauses
    fn cost_scan(&self, method: &ScanMethod, rel: &RelOptInfo, param: Option<&ParamPathInfo>) -> PathCost;

    /// Explicit sort of an input path
    fn cost_sort(&self, input: &Path) -> (Cost, Cost);

    fn cost_material(&self, subpath: &Path) -> PathCost;

    /// Duplicate elimination on `numkeys` expressions
    fn cost_unique(&self, subpath: &Path, numkeys: usize) -> PathCost;

    fn cost_append(&self, subpaths: &[Rc<Path>]) -> PathCost;

    fn initial_cost_nestloop(
        &self,
        jointype: JoinType,
        outer: &Path,
        inner: &Path,
        semifactors: Option<&SemiAntiJoinFactors>,
    ) -> JoinCostWorkspace;

    fn initial_cost_mergejoin(
        &self,
        jointype: JoinType,
        num_mergeclauses: usize,
        outer: &Path,
        inner: &Path,
        sort_outer: bool,
        sort_inner: bool,
    ) -> JoinCostWorkspace;

    fn initial_cost_hashjoin(
        &self,
        jointype: JoinType,
        num_hashclauses: usize,
        outer: &Path,
        inner: &Path,
        semifactors: Option<&SemiAntiJoinFactors>,
    ) -> JoinCostWorkspace;

    /// Complete a first-phase estimate for a join producing `rows` rows and
    /// checking `qual_count` clauses per candidate row pair
    fn final_cost_join(&self, workspace: &JoinCostWorkspace, rows: f64, qual_count: usize) -> (Cost, Cost);

    fn semi_anti_join_factors(
        &self,
        jointype: JoinType,
        outer_rows: f64,
        inner_rows: f64,
        clauses: &[Rc<RestrictInfo>],
    ) -> SemiAntiJoinFactors;

    /// Output rows of joining inputs of the given sizes
    fn join_rel_size(&self, outer_rows: f64, inner_rows: f64, jointype: JoinType, clauses: &[Rc<RestrictInfo>]) -> f64;

    /// Combined selectivity of a list of independent clauses
    fn clauselist_selectivity(&self, clauses: &[Rc<RestrictInfo>]) -> f64 {
        clauses.iter().map(|c| c.norm_selec).product()
    }
}

/// Round a row estimate and keep it at one or above
pub fn clamp_row_est(rows: f64) -> f64 {
    if rows.is_nan() || rows <= 1.0 { 1.0 } else { rows.round() }
}

/// Default cost model
#[derive(Debug, Clone)]
pub struct CostModel {
    constants: CostConstants,
    enable_nestloop: bool,
    enable_mergejoin: bool,
    enable_hashjoin: bool,
}

impl CostModel {
    /// Create a new cost model
    pub fn new(config: &PlannerConfig) -> Self {
        CostModel {
            constants: config.costs,
            enable_nestloop: config.enable_nestloop,
            enable_mergejoin: config.enable_mergejoin,
            enable_hashjoin: config.enable_hashjoin,
        }
    }

    fn disable_cost(&self, method: JoinMethod) -> Cost {
        let enabled = match method {
            JoinMethod::NestLoop => self.enable_nestloop,
            JoinMethod::MergeJoin => self.enable_mergejoin,
            JoinMethod::HashJoin => self.enable_hashjoin,
        };
        if enabled { 0.0 } else { self.constants.disable_cost }
    }

    fn pages(tuples: f64) -> f64 {
        (tuples / TUPLES_PER_PAGE).ceil().max(1.0)
    }

    /// Cost of fetching the rest of the inner side once per additional outer row
    fn inner_rescan_cost(&self, inner: &Path) -> Cost {
        if inner.materializes_output() {
            self.constants.cpu_operator_cost * inner.rows
        } else {
            inner.total_cost - inner.startup_cost
        }
    }
}

impl CostEstimator for CostModel {
    fn cost_scan(&self, method: &ScanMethod, rel: &RelOptInfo, param: Option<&ParamPathInfo>) -> PathCost {
        let c = &self.constants;
        let tuples = rel.tuples.max(rel.rows);
        let rows = clamp_row_est(param.map_or(rel.rows, |ppi| ppi.rows));
        let qual_cost = c.cpu_operator_cost * param.map_or(0, |ppi| ppi.clauses.len()) as f64;

        let (startup_cost, run_cost) = match method {
            ScanMethod::Seq => (
                0.0,
                c.seq_page_cost * Self::pages(tuples) + (c.cpu_tuple_cost + qual_cost) * tuples,
            ),
            ScanMethod::Sample => (
                0.0,
                c.random_page_cost * Self::pages(tuples) * 0.1 + (c.cpu_tuple_cost + qual_cost) * tuples * 0.1,
            ),
            ScanMethod::Index { .. } => (
                c.random_page_cost,
                c.random_page_cost * Self::pages(rows) + (c.cpu_index_tuple_cost + c.cpu_tuple_cost + qual_cost) * rows,
            ),
            ScanMethod::IndexOnly { .. } => (
                c.random_page_cost,
                c.seq_page_cost * Self::pages(rows) + (c.cpu_index_tuple_cost + qual_cost) * rows,
            ),
            ScanMethod::BitmapHeap => (
                c.cpu_index_tuple_cost * rows,
                c.seq_page_cost * Self::pages(rows) * 2.0 + (c.cpu_tuple_cost + qual_cost) * rows,
            ),
            ScanMethod::Tid => (0.0, c.random_page_cost * rows + (c.cpu_tuple_cost + qual_cost) * rows),
            ScanMethod::Function { .. } => (
                c.cpu_operator_cost * rows,
                (c.cpu_tuple_cost + qual_cost) * rows,
            ),
        };

        PathCost {
            startup_cost,
            total_cost: startup_cost + run_cost,
            rows,
        }
    }

    fn cost_sort(&self, input: &Path) -> (Cost, Cost) {
        let c = &self.constants;
        let tuples = input.rows.max(2.0);
        let comparison_cost = 2.0 * c.cpu_operator_cost;
        let startup = input.total_cost + comparison_cost * tuples * tuples.log2();
        (startup, startup + c.cpu_operator_cost * tuples)
    }

    fn cost_material(&self, subpath: &Path) -> PathCost {
        PathCost {
            startup_cost: subpath.startup_cost,
            total_cost: subpath.total_cost + 2.0 * self.constants.cpu_operator_cost * subpath.rows,
            rows: subpath.rows,
        }
    }

    fn cost_unique(&self, subpath: &Path, numkeys: usize) -> PathCost {
        let c = &self.constants;
        let groups = clamp_row_est(subpath.rows.min(DEFAULT_NUM_DISTINCT));
        let startup = subpath.total_cost + c.cpu_operator_cost * subpath.rows * numkeys.max(1) as f64;
        PathCost {
            startup_cost: startup,
            total_cost: startup + c.cpu_tuple_cost * groups,
            rows: groups,
        }
    }

    fn cost_append(&self, subpaths: &[Rc<Path>]) -> PathCost {
        let startup_cost = subpaths.first().map_or(0.0, |p| p.startup_cost);
        let total_cost = subpaths.iter().map(|p| p.total_cost).sum();
        let rows = subpaths.iter().map(|p| p.rows).sum();
        PathCost {
            startup_cost,
            total_cost,
            rows,
        }
    }

    fn initial_cost_nestloop(
        &self,
        jointype: JoinType,
        outer: &Path,
        inner: &Path,
        semifactors: Option<&SemiAntiJoinFactors>,
    ) -> JoinCostWorkspace {
        let outer_rows = outer.rows.max(1.0);
        let startup_cost = outer.startup_cost + inner.startup_cost + self.disable_cost(JoinMethod::NestLoop);
        let mut run_cost = outer.total_cost - outer.startup_cost;

        let inner_run_cost = inner.total_cost - inner.startup_cost;
        let inner_rescan = self.inner_rescan_cost(inner);
        let mut rescans = inner_run_cost + (outer_rows - 1.0) * inner_rescan;
        if let (JoinType::Semi | JoinType::Anti, Some(factors)) = (jointype, semifactors) {
            // matched outer rows stop at the first inner match
            let matched_fraction = factors.outer_match_frac / (factors.match_count + 1.0);
            rescans *= 1.0 - matched_fraction;
        }
        run_cost += rescans;

        JoinCostWorkspace {
            method: JoinMethod::NestLoop,
            startup_cost,
            total_cost: startup_cost + run_cost,
            outer_rows,
            inner_rows: inner.rows.max(1.0),
        }
    }

    fn initial_cost_mergejoin(
        &self,
        _jointype: JoinType,
        num_mergeclauses: usize,
        outer: &Path,
        inner: &Path,
        sort_outer: bool,
        sort_inner: bool,
    ) -> JoinCostWorkspace {
        let c = &self.constants;
        let (outer_startup, outer_total) = if sort_outer {
            self.cost_sort(outer)
        } else {
            (outer.startup_cost, outer.total_cost)
        };
        let (inner_startup, inner_total) = if sort_inner {
            self.cost_sort(inner)
        } else {
            (inner.startup_cost, inner.total_cost)
        };
        let outer_rows = outer.rows.max(1.0);
        let inner_rows = inner.rows.max(1.0);

        let startup_cost = outer_startup + inner_startup + self.disable_cost(JoinMethod::MergeJoin);
        let run_cost = (outer_total - outer_startup)
            + (inner_total - inner_startup)
            + c.cpu_operator_cost * num_mergeclauses as f64 * (outer_rows + inner_rows);

        JoinCostWorkspace {
            method: JoinMethod::MergeJoin,
            startup_cost,
            total_cost: startup_cost + run_cost,
            outer_rows,
            inner_rows,
        }
    }

    fn initial_cost_hashjoin(
        &self,
        jointype: JoinType,
        num_hashclauses: usize,
        outer: &Path,
        inner: &Path,
        semifactors: Option<&SemiAntiJoinFactors>,
    ) -> JoinCostWorkspace {
        let c = &self.constants;
        let outer_rows = outer.rows.max(1.0);
        let inner_rows = inner.rows.max(1.0);
        let hash_cost = c.cpu_operator_cost * num_hashclauses as f64;

        // build the whole inner hash table before returning anything
        let startup_cost = outer.startup_cost
            + inner.total_cost
            + (hash_cost + c.cpu_tuple_cost) * inner_rows
            + self.disable_cost(JoinMethod::HashJoin);
        let mut probe_cost = hash_cost * outer_rows;
        if let (JoinType::Semi | JoinType::Anti, Some(factors)) = (jointype, semifactors) {
            probe_cost *= 1.0 - factors.outer_match_frac * 0.5;
        }
        let run_cost = (outer.total_cost - outer.startup_cost) + probe_cost;

        JoinCostWorkspace {
            method: JoinMethod::HashJoin,
            startup_cost,
            total_cost: startup_cost + run_cost,
            outer_rows,
            inner_rows,
        }
    }

    fn final_cost_join(&self, workspace: &JoinCostWorkspace, rows: f64, qual_count: usize) -> (Cost, Cost) {
        let c = &self.constants;
        let candidate_pairs = match workspace.method {
            JoinMethod::NestLoop => workspace.outer_rows * workspace.inner_rows,
            // only rows with equal keys are compared
            JoinMethod::MergeJoin | JoinMethod::HashJoin => rows.max(workspace.outer_rows),
        };
        let qual_cost = c.cpu_operator_cost * qual_count as f64 * candidate_pairs;
        let output_cost = c.cpu_tuple_cost * rows;
        (workspace.startup_cost, workspace.total_cost + qual_cost + output_cost)
    }

    fn semi_anti_join_factors(
        &self,
        _jointype: JoinType,
        _outer_rows: f64,
        inner_rows: f64,
        clauses: &[Rc<RestrictInfo>],
    ) -> SemiAntiJoinFactors {
        let selec = self.clauselist_selectivity(clauses);
        let expected_matches = inner_rows.max(1.0) * selec;
        SemiAntiJoinFactors {
            outer_match_frac: expected_matches.min(1.0),
            match_count: expected_matches.max(1.0),
        }
    }

    fn join_rel_size(&self, outer_rows: f64, inner_rows: f64, jointype: JoinType, clauses: &[Rc<RestrictInfo>]) -> f64 {
        let selec = self.clauselist_selectivity(clauses);
        let joined = outer_rows * inner_rows * selec;
        let rows = match jointype {
            JoinType::Inner | JoinType::UniqueOuter | JoinType::UniqueInner => joined,
            JoinType::Left => joined.max(outer_rows),
            JoinType::Right => joined.max(inner_rows),
            JoinType::Full => joined.max(outer_rows).max(inner_rows),
            JoinType::Semi | JoinType::Anti => {
                let factors = self.semi_anti_join_factors(jointype, outer_rows, inner_rows, clauses);
                if jointype == JoinType::Semi {
                    outer_rows * factors.outer_match_frac
                } else {
                    outer_rows * (1.0 - factors.outer_match_frac)
                }
            }
        };
        clamp_row_est(rows)
    }
}
