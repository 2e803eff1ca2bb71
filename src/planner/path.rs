// Plan Candidates (Paths)
//
// A Path is one proposed way of producing the rows of a relation. Paths are
// immutable once built and shared through `Rc`; the same inner path may be
// referenced by many join candidates. Path identity (`Rc::ptr_eq`) matters
// to the generators, which skip pairings they have already tried.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::common::{Cost, RelIndex, Relids};
use crate::planner::expr::Expression;
use crate::planner::joininfo::JoinType;
use crate::planner::pathkeys::{CostCriterion, PathKey};
use crate::planner::restrictinfo::{ClassifiedClause, RestrictInfo};

/// Base relation access methods
#[derive(Debug, Clone, PartialEq)]
pub enum ScanMethod {
    Seq,
    Sample,
    Index { index_name: String },
    IndexOnly { index_name: String },
    BitmapHeap,
    Tid,
    Function { name: String },
}

impl ScanMethod {
    /// Scan kinds whose cost can be re-estimated with extra filter clauses
    pub fn supports_filtered_copy(&self) -> bool {
        !matches!(self, ScanMethod::Function { .. })
    }

    fn label(&self) -> String {
        match self {
            ScanMethod::Seq => "Seq Scan".to_string(),
            ScanMethod::Sample => "Sample Scan".to_string(),
            ScanMethod::Index { index_name } => format!("Index Scan using {}", index_name),
            ScanMethod::IndexOnly { index_name } => format!("Index Only Scan using {}", index_name),
            ScanMethod::BitmapHeap => "Bitmap Heap Scan".to_string(),
            ScanMethod::Tid => "Tid Scan".to_string(),
            ScanMethod::Function { name } => format!("Function Scan {}", name),
        }
    }
}

/// Parameterization of a path: outside relations it needs and the clauses
/// it enforces with their values
#[derive(Debug, Clone)]
pub struct ParamPathInfo {
    pub req_outer: Relids,
    /// Estimated rows once the clauses are applied
    pub rows: f64,
    pub clauses: Vec<Rc<RestrictInfo>>,
}

/// Inputs shared by all join path kinds
#[derive(Debug, Clone)]
pub struct JoinPathInfo {
    pub jointype: JoinType,
    pub outer: Rc<Path>,
    pub inner: Rc<Path>,
    /// Clauses checked at this join
    pub joinrestrictinfo: Vec<Rc<RestrictInfo>>,
}

#[derive(Debug, Clone)]
pub enum PathKind {
    Scan(ScanMethod),
    Material {
        subpath: Rc<Path>,
    },
    /// Duplicate elimination on `exprs`
    Unique {
        subpath: Rc<Path>,
        exprs: Vec<Expression>,
    },
    NestLoop(JoinPathInfo),
    MergeJoin {
        join: JoinPathInfo,
        mergeclauses: Vec<ClassifiedClause>,
        /// Explicit sort of the outer input; empty when already ordered
        outersortkeys: Vec<PathKey>,
        /// Explicit sort of the inner input; empty when already ordered
        innersortkeys: Vec<PathKey>,
    },
    HashJoin {
        join: JoinPathInfo,
        hashclauses: Vec<ClassifiedClause>,
    },
    Append {
        subpaths: Vec<Rc<Path>>,
    },
}

/// A candidate plan for one relation
#[derive(Debug, Clone)]
pub struct Path {
    pub kind: PathKind,
    pub parent: RelIndex,
    pub parent_relids: Relids,
    pub rows: f64,
    pub startup_cost: Cost,
    pub total_cost: Cost,
    /// Output ordering; empty if unordered
    pub pathkeys: Vec<PathKey>,
    pub param_info: Option<Rc<ParamPathInfo>>,
}

impl Path {
    /// Relations this path needs values from; empty if unparameterized
    pub fn required_outer(&self) -> Relids {
        self.param_info
            .as_ref()
            .map_or_else(Relids::empty, |ppi| ppi.req_outer.clone())
    }

    /// True if the path needs values from any of `relids`
    pub fn param_by_rel(&self, relids: &Relids) -> bool {
        self.param_info.as_ref().is_some_and(|ppi| ppi.req_outer.overlaps(relids))
    }

    pub fn join_info(&self) -> Option<&JoinPathInfo> {
        match &self.kind {
            PathKind::NestLoop(join) => Some(join),
            PathKind::MergeJoin { join, .. } => Some(join),
            PathKind::HashJoin { join, .. } => Some(join),
            _ => None,
        }
    }

    pub fn is_scan(&self) -> bool {
        matches!(self.kind, PathKind::Scan(_))
    }

    pub fn is_append(&self) -> bool {
        matches!(self.kind, PathKind::Append { .. })
    }

    /// Rescanning the output is cheap, so another material wrapper adds
    /// nothing
    pub fn materializes_output(&self) -> bool {
        matches!(
            self.kind,
            PathKind::Material { .. } | PathKind::Scan(ScanMethod::Function { .. })
        )
    }

    pub fn node_name(&self) -> &'static str {
        match &self.kind {
            PathKind::Scan(_) => "Scan",
            PathKind::Material { .. } => "Material",
            PathKind::Unique { .. } => "Unique",
            PathKind::NestLoop(_) => "Nested Loop",
            PathKind::MergeJoin { .. } => "Merge Join",
            PathKind::HashJoin { .. } => "Hash Join",
            PathKind::Append { .. } => "Append",
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let arrow = if depth > 0 { "-> " } else { "" };
        let title = match &self.kind {
            PathKind::Scan(method) => format!("{} on r{}", method.label(), self.parent_relids),
            PathKind::NestLoop(join)
            | PathKind::MergeJoin { join, .. }
            | PathKind::HashJoin { join, .. } => format!("{} ({:?})", self.node_name(), join.jointype),
            _ => self.node_name().to_string(),
        };
        write!(
            f,
            "{}{}{}  (cost={:.2}..{:.2} rows={:.0})",
            indent, arrow, title, self.startup_cost, self.total_cost, self.rows
        )?;
        if !self.pathkeys.is_empty() {
            let keys = self
                .pathkeys
                .iter()
                .map(|pk| format!("ec{}{}", pk.eclass, if pk.descending { " desc" } else { "" }))
                .collect::<Vec<_>>();
            write!(f, " order=[{}]", keys.join(", "))?;
        }
        if let Some(ppi) = &self.param_info {
            write!(f, " required_outer={}", ppi.req_outer)?;
        }
        writeln!(f)?;

        let detail = "  ".repeat(depth + 2);
        if let Some(ppi) = &self.param_info {
            for clause in &ppi.clauses {
                writeln!(f, "{}Filter: {}", detail, clause)?;
            }
        }
        match &self.kind {
            PathKind::Scan(_) => Ok(()),
            PathKind::Material { subpath } => subpath.fmt_tree(f, depth + 1),
            PathKind::Unique { subpath, exprs } => {
                let exprs = exprs.iter().map(|e| e.to_string()).collect::<Vec<_>>();
                writeln!(f, "{}Key: {}", detail, exprs.join(", "))?;
                subpath.fmt_tree(f, depth + 1)
            }
            PathKind::NestLoop(join) => {
                for clause in &join.joinrestrictinfo {
                    writeln!(f, "{}Join Filter: {}", detail, clause)?;
                }
                join.outer.fmt_tree(f, depth + 1)?;
                join.inner.fmt_tree(f, depth + 1)
            }
            PathKind::MergeJoin {
                join,
                mergeclauses,
                outersortkeys,
                innersortkeys,
            } => {
                let conds = mergeclauses.iter().map(|c| c.rinfo.to_string()).collect::<Vec<_>>();
                writeln!(f, "{}Merge Cond: {}", detail, conds.join(" AND "))?;
                if !outersortkeys.is_empty() {
                    writeln!(f, "{}Sort Outer: {} keys", detail, outersortkeys.len())?;
                }
                if !innersortkeys.is_empty() {
                    writeln!(f, "{}Sort Inner: {} keys", detail, innersortkeys.len())?;
                }
                join.outer.fmt_tree(f, depth + 1)?;
                join.inner.fmt_tree(f, depth + 1)
            }
            PathKind::HashJoin { join, hashclauses } => {
                let conds = hashclauses.iter().map(|c| c.rinfo.to_string()).collect::<Vec<_>>();
                writeln!(f, "{}Hash Cond: {}", detail, conds.join(" AND "))?;
                join.outer.fmt_tree(f, depth + 1)?;
                join.inner.fmt_tree(f, depth + 1)
            }
            PathKind::Append { subpaths } => {
                for subpath in subpaths {
                    subpath.fmt_tree(f, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

/// Compare two paths on the given cost, breaking ties with the other one
pub fn compare_path_costs(path1: &Path, path2: &Path, criterion: CostCriterion) -> Ordering {
    let (first1, second1, first2, second2) = match criterion {
        CostCriterion::Startup => (path1.startup_cost, path1.total_cost, path2.startup_cost, path2.total_cost),
        CostCriterion::Total => (path1.total_cost, path1.startup_cost, path2.total_cost, path2.startup_cost),
    };
    first1
        .partial_cmp(&first2)
        .filter(|o| *o != Ordering::Equal)
        .or_else(|| second1.partial_cmp(&second2))
        .unwrap_or(Ordering::Equal)
}
