// Planner State
//
// PlannerInfo owns every relation of the query in an arena indexed by
// RelIndex, plus the query-wide facts the join generators consult: join
// order constraints, lateral references, placeholders, append members,
// equivalence classes and the registered join clauses.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::common::{AttrNumber, RelId, RelIndex, Relids};
use crate::planner::admission::{DominanceAdmission, PathAdmission, set_cheapest};
use crate::planner::config::PlannerConfig;
use crate::planner::cost_model::{CostEstimator, CostModel};
use crate::planner::equivclass::EquivalenceClasses;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::expr::{ColumnRef, Expression};
use crate::planner::joininfo::{LateralJoinInfo, PlaceHolderInfo, SpecialJoinInfo};
use crate::planner::path::{ParamPathInfo, Path, ScanMethod};
use crate::planner::pathkeys::PathKey;
use crate::planner::pathnode::create_scan_path;
use crate::planner::relation::{AppendRelInfo, RelKind, RelOptInfo};
use crate::planner::restrictinfo::RestrictInfo;

/// Query-wide planner state
pub struct PlannerInfo {
    pub config: PlannerConfig,
    pub cost_model: Box<dyn CostEstimator>,
    pub admission: Box<dyn PathAdmission>,
    pub rels: Vec<RelOptInfo>,
    base_rel_map: HashMap<RelId, RelIndex>,
    join_rel_map: HashMap<Relids, RelIndex>,
    pub join_info_list: Vec<SpecialJoinInfo>,
    pub lateral_info_list: Vec<LateralJoinInfo>,
    pub placeholder_list: Vec<PlaceHolderInfo>,
    pub append_rel_list: Vec<AppendRelInfo>,
    pub eclasses: EquivalenceClasses,
    /// Ordering requested by the query, if any
    pub query_pathkeys: Vec<PathKey>,
    /// Every join clause of the query
    pub join_clauses: Vec<Rc<RestrictInfo>>,
    /// All base relations, append members excluded
    pub all_baserels: Relids,
}

impl PlannerInfo {
    /// Planner with the default cost model and admission rule
    pub fn new(config: PlannerConfig) -> Self {
        let cost_model = Box::new(CostModel::new(&config));
        let admission = Box::new(DominanceAdmission::new(config.fuzz_factor));
        Self::with_collaborators(config, cost_model, admission)
    }

    pub fn with_collaborators(
        config: PlannerConfig,
        cost_model: Box<dyn CostEstimator>,
        admission: Box<dyn PathAdmission>,
    ) -> Self {
        PlannerInfo {
            config,
            cost_model,
            admission,
            rels: Vec::new(),
            base_rel_map: HashMap::new(),
            join_rel_map: HashMap::new(),
            join_info_list: Vec::new(),
            lateral_info_list: Vec::new(),
            placeholder_list: Vec::new(),
            append_rel_list: Vec::new(),
            eclasses: EquivalenceClasses::new(),
            query_pathkeys: Vec::new(),
            join_clauses: Vec::new(),
            all_baserels: Relids::empty(),
        }
    }

    pub fn rel(&self, index: RelIndex) -> PlannerResult<&RelOptInfo> {
        self.rels.get(index.0).ok_or(PlannerError::RelationNotFound(index))
    }

    pub fn rel_mut(&mut self, index: RelIndex) -> PlannerResult<&mut RelOptInfo> {
        self.rels.get_mut(index.0).ok_or(PlannerError::RelationNotFound(index))
    }

    pub fn find_base_rel(&self, relid: RelId) -> PlannerResult<RelIndex> {
        self.base_rel_map
            .get(&relid)
            .copied()
            .ok_or(PlannerError::BaseRelationNotFound(relid))
    }

    pub fn find_join_rel(&self, relids: &Relids) -> Option<RelIndex> {
        self.join_rel_map.get(relids).copied()
    }

    pub(crate) fn register_join_rel(&mut self, rel: RelOptInfo) -> RelIndex {
        let index = RelIndex(self.rels.len());
        self.join_rel_map.insert(rel.relids.clone(), index);
        self.rels.push(RelOptInfo { index, ..rel });
        index
    }

    fn push_base_rel(&mut self, relid: RelId, name: &str, kind: RelKind, natts: AttrNumber, tuples: f64) -> RelIndex {
        let index = RelIndex(self.rels.len());
        let mut rel = RelOptInfo::new(index, name, kind, Relids::singleton(relid));
        rel.tuples = tuples;
        rel.rows = tuples;
        rel.reltarget = (1..=natts).map(|attno| ColumnRef { relid, attno }).collect();
        self.rels.push(rel);
        self.base_rel_map.insert(relid, index);
        index
    }

    /// Register a plain table with `natts` columns
    pub fn add_base_rel(&mut self, relid: RelId, name: &str, natts: AttrNumber, tuples: f64) -> RelIndex {
        self.all_baserels = self.all_baserels.union(&Relids::singleton(relid));
        self.push_base_rel(relid, name, RelKind::Relation, natts, tuples)
    }

    /// Register a relation that is not a plain table (e.g. a subquery)
    pub fn add_subquery_rel(&mut self, relid: RelId, name: &str, natts: AttrNumber, rows: f64) -> RelIndex {
        self.all_baserels = self.all_baserels.union(&Relids::singleton(relid));
        self.push_base_rel(relid, name, RelKind::Subquery, natts, rows)
    }

    /// Register a member (partition) of an append parent, with its
    /// row-admission constraints written over the member's own columns
    pub fn add_append_member(
        &mut self,
        parent_relid: RelId,
        child_relid: RelId,
        name: &str,
        tuples: f64,
        check_constraints: Vec<Expression>,
    ) -> PlannerResult<RelIndex> {
        let parent = self.find_base_rel(parent_relid)?;
        let natts = self.rel(parent)?.reltarget.len() as AttrNumber;
        let index = self.push_base_rel(
            child_relid,
            name,
            RelKind::AppendMember { parent: parent_relid },
            natts,
            tuples,
        );
        self.rel_mut(index)?.check_constraints = check_constraints;
        self.append_rel_list
            .push(AppendRelInfo::identity(parent_relid, child_relid, natts));
        Ok(index)
    }

    pub fn find_appendrel_info(&self, child_relid: RelId) -> PlannerResult<&AppendRelInfo> {
        self.append_rel_list
            .iter()
            .find(|info| info.child_relid == child_relid)
            .ok_or(PlannerError::NotAppendMember(child_relid))
    }

    /// Register an inner-join clause. Mergejoinable clauses make their two
    /// sides equivalent.
    pub fn add_join_clause(&mut self, rinfo: RestrictInfo) -> Rc<RestrictInfo> {
        let rinfo = match (rinfo.merge_opfamily, rinfo.left_ec, rinfo.clause.binary_operands()) {
            (Some(_), None, Some((left, _, right))) => {
                let ec = self.eclasses.make_equivalence(left, right);
                rinfo.clone().with_eclasses(ec, ec)
            }
            _ => rinfo,
        };
        self.push_join_clause(rinfo)
    }

    /// Register an outer-join clause. Its sides get separate equivalence
    /// classes, which are never merged or treated as redundant.
    pub fn add_outer_join_clause(&mut self, rinfo: RestrictInfo) -> Rc<RestrictInfo> {
        let rinfo = match (rinfo.merge_opfamily, rinfo.clause.binary_operands()) {
            (Some(_), Some((left, _, right))) => {
                let left_ec = self.eclasses.get_or_create(left, true);
                let right_ec = self.eclasses.get_or_create(right, true);
                rinfo.clone().with_eclasses(left_ec, right_ec)
            }
            _ => rinfo,
        };
        self.push_join_clause(rinfo)
    }

    fn push_join_clause(&mut self, rinfo: RestrictInfo) -> Rc<RestrictInfo> {
        let rinfo = Rc::new(rinfo);
        debug!("Registered join clause {}", rinfo);
        self.join_clauses.push(Rc::clone(&rinfo));
        rinfo
    }

    /// Ascending pathkey on the equivalence class of `expr`
    pub fn pathkey_for(&mut self, expr: &Expression) -> PathKey {
        let ec = self.eclasses.get_or_create(expr, false);
        PathKey::ascending(self.eclasses.canonical(ec))
    }

    /// Join clauses to check when joining `outer_relids` with
    /// `inner_relids`: those covered by the pair but by neither side alone.
    /// Clauses on an append parent are translated to its members.
    pub fn build_joinrel_restrictlist(&self, outer_relids: &Relids, inner_relids: &Relids) -> Vec<Rc<RestrictInfo>> {
        let joinrelids = outer_relids.union(inner_relids);
        let mut result = Vec::new();
        for rinfo in &self.join_clauses {
            let Some(rinfo) = self.translate_to_members(rinfo, &joinrelids) else {
                continue;
            };
            let relids = &rinfo.clause_relids;
            if relids.is_subset(&joinrelids) && !relids.is_subset(outer_relids) && !relids.is_subset(inner_relids) {
                result.push(rinfo);
            }
        }
        result
    }

    fn translate_to_members(&self, rinfo: &Rc<RestrictInfo>, joinrelids: &Relids) -> Option<Rc<RestrictInfo>> {
        let mut current = Rc::clone(rinfo);
        for appinfo in &self.append_rel_list {
            if joinrelids.contains(appinfo.child_relid)
                && !joinrelids.contains(appinfo.parent_relid)
                && current.clause_relids.contains(appinfo.parent_relid)
            {
                let clause = appinfo.adjust_appendrel_attrs(&current.clause)?;
                current = Rc::new(current.translated(clause));
            }
        }
        Some(current)
    }

    /// Build a scan path and submit it for admission
    pub fn add_scan_path(
        &mut self,
        rel: RelIndex,
        method: ScanMethod,
        pathkeys: Vec<PathKey>,
        param: Option<ParamPathInfo>,
    ) -> PlannerResult<()> {
        let param = param.map(Rc::new);
        let path = create_scan_path(self, rel, method, pathkeys, param.clone())?;
        let rel_info = self.rel_mut(rel)?;
        if let Some(ppi) = param {
            if !ppi.req_outer.is_empty() {
                rel_info.ppilist.push(ppi);
            }
        }
        self.add_path(rel, Rc::new(path))
    }

    /// Submit a candidate to the relation's admission
    pub fn add_path(&mut self, rel: RelIndex, path: Rc<Path>) -> PlannerResult<()> {
        let rel_info = self.rels.get_mut(rel.0).ok_or(PlannerError::RelationNotFound(rel))?;
        self.admission.submit(rel_info, path);
        Ok(())
    }

    pub fn set_cheapest(&mut self, rel: RelIndex) -> PlannerResult<()> {
        set_cheapest(self.rel_mut(rel)?)
    }
}
