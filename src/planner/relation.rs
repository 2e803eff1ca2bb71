// Relation Descriptors
//
// A RelOptInfo describes a base table, an append member (partition) or the
// result of joining two smaller relations, along with every candidate path
// found for it so far.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::common::{AttrNumber, RelId, RelIndex, Relids};
use crate::planner::expr::{ColumnRef, Expression};
use crate::planner::path::{ParamPathInfo, Path};

/// What a relation is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelKind {
    /// Plain table
    Relation,
    /// Subquery in FROM
    Subquery,
    /// Member of an append (partition of a parent table)
    AppendMember { parent: RelId },
    /// Join of two or more base relations
    Join,
}

/// Planner state of one relation
#[derive(Debug, Clone)]
pub struct RelOptInfo {
    pub index: RelIndex,
    pub name: String,
    pub kind: RelKind,
    pub relids: Relids,
    /// Tuples stored in the table (base relations only)
    pub tuples: f64,
    /// Estimated output rows after restrictions
    pub rows: f64,
    /// Non-dominated candidates, sorted by total cost
    pub pathlist: Vec<Rc<Path>>,
    pub cheapest_startup_path: Option<Rc<Path>>,
    pub cheapest_total_path: Option<Rc<Path>>,
    /// Cheapest candidate per required-parameter set. `None` holds the
    /// cheapest unparameterized candidate.
    pub cheapest_parameterized_paths: BTreeMap<Option<Relids>, Rc<Path>>,
    /// Parameterizations already handed out for this relation
    pub ppilist: Vec<Rc<ParamPathInfo>>,
    /// Output columns
    pub reltarget: Vec<ColumnRef>,
    /// For each output attribute, the relations above this one that use it
    pub attr_needed: BTreeMap<AttrNumber, Relids>,
    /// Row-admission (CHECK) constraints, in terms of this relation's columns
    pub check_constraints: Vec<Expression>,
}

impl RelOptInfo {
    pub fn new(index: RelIndex, name: &str, kind: RelKind, relids: Relids) -> Self {
        RelOptInfo {
            index,
            name: name.to_string(),
            kind,
            relids,
            tuples: 0.0,
            rows: 0.0,
            pathlist: Vec::new(),
            cheapest_startup_path: None,
            cheapest_total_path: None,
            cheapest_parameterized_paths: BTreeMap::new(),
            ppilist: Vec::new(),
            reltarget: Vec::new(),
            attr_needed: BTreeMap::new(),
            check_constraints: Vec::new(),
        }
    }

    /// Single base relation id, for base relations
    pub fn relid(&self) -> Option<RelId> {
        if self.relids.len() == 1 {
            self.relids.iter().next()
        } else {
            None
        }
    }

    /// Cheapest candidate per parameterization, unparameterized first
    pub fn cheapest_parameterized(&self) -> impl Iterator<Item = &Rc<Path>> {
        self.cheapest_parameterized_paths.values()
    }

    pub fn has_paths(&self) -> bool {
        !self.pathlist.is_empty()
    }
}

/// Column translation from an append parent to one of its members
#[derive(Debug, Clone)]
pub struct AppendRelInfo {
    pub parent_relid: RelId,
    pub child_relid: RelId,
    /// `translated_vars[i]` is the child column for parent attribute `i + 1`
    pub translated_vars: Vec<ColumnRef>,
}

impl AppendRelInfo {
    /// Member whose attributes line up one-to-one with the parent's
    pub fn identity(parent_relid: RelId, child_relid: RelId, natts: AttrNumber) -> Self {
        AppendRelInfo {
            parent_relid,
            child_relid,
            translated_vars: (1..=natts)
                .map(|attno| ColumnRef {
                    relid: child_relid,
                    attno,
                })
                .collect(),
        }
    }

    /// Child column for a parent column
    pub fn translate(&self, col: &ColumnRef) -> Option<ColumnRef> {
        if col.relid != self.parent_relid {
            return Some(*col);
        }
        let index = usize::try_from(col.attno).ok()?.checked_sub(1)?;
        self.translated_vars.get(index).copied()
    }

    /// Rewrite an expression on the parent into one on the child; `None`
    /// if a parent column has no child counterpart
    pub fn adjust_appendrel_attrs(&self, expr: &Expression) -> Option<Expression> {
        expr.map_columns(&mut |col| self.translate(col).map(Expression::Column))
    }
}
