use thiserror::Error;

use crate::common::{RelIndex, Relids};
use crate::planner::joininfo::JoinType;

/// Errors raised by the join planner.
///
/// A join strategy that turns out to be infeasible is not an error; these
/// variants cover broken invariants and unusable inputs, all of which
/// abort planning.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Unrecognized join type {0:?} for this join level")]
    UnrecognizedJoinType(JoinType),
    #[error("Join type {0:?} requires semi-join information")]
    MissingSpecialJoinInfo(JoinType),
    #[error("{jointype:?} merge join must use all {required} merge clauses, got {used}")]
    IncompleteMergeClauses {
        jointype: JoinType,
        used: usize,
        required: usize,
    },
    #[error("Relation {0} not found")]
    RelationNotFound(RelIndex),
    #[error("Base relation {0} not found")]
    BaseRelationNotFound(u32),
    #[error("Relation {0} has no paths")]
    NoPathsForRelation(Relids),
    #[error("Relation {0} is not an append member")]
    NotAppendMember(u32),
    #[error("Evaluation error: {0}")]
    Evaluation(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Numeric overflow")]
    NumericOverflow,
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Planner result type
pub type PlannerResult<T> = Result<T, PlannerError>;
