// Planner Expression Trees
//
// Expressions appearing in restriction clauses, row-admission (CHECK)
// constraints and relation target lists. Column references are resolved
// to base relation ids so relation sets can be derived directly.

use std::fmt;

use crate::common::{AttrNumber, RelId, Relids};

/// Column reference resolved to a base relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub relid: RelId,
    pub attno: AttrNumber,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

/// Operators usable in binary and unary expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessEquals,
    GreaterEquals,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Not,
}

impl Operator {
    /// Comparison operators yield booleans from two scalar inputs
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Equals
                | Operator::NotEquals
                | Operator::LessThan
                | Operator::GreaterThan
                | Operator::LessEquals
                | Operator::GreaterEquals
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "<>",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessEquals => "<=",
            Operator::GreaterEquals => ">=",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Not => "NOT",
        }
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(Value),
    /// Column of a base relation
    Column(ColumnRef),
    /// Binary operation (e.g., a + b, x = y)
    BinaryOp {
        left: Box<Expression>,
        op: Operator,
        right: Box<Expression>,
    },
    /// Unary operation (NOT x, -x)
    UnaryOp {
        op: Operator,
        expr: Box<Expression>,
    },
    /// Function call
    Function {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn column(relid: RelId, attno: AttrNumber) -> Self {
        Expression::Column(ColumnRef { relid, attno })
    }

    pub fn integer(value: i64) -> Self {
        Expression::Literal(Value::Integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Value::Boolean(value))
    }

    pub fn binary(left: Expression, op: Operator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::binary(left, Operator::Equals, right)
    }

    pub fn function(name: &str, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.to_string(),
            args,
        }
    }

    /// True for a bare literal (e.g. the `false` of `FULL JOIN ... ON false`)
    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Left and right operands of a binary operator clause
    pub fn binary_operands(&self) -> Option<(&Expression, Operator, &Expression)> {
        match self {
            Expression::BinaryOp { left, op, right } => Some((left, *op, right)),
            _ => None,
        }
    }

    /// Set of base relations referenced anywhere in the expression
    pub fn relids(&self) -> Relids {
        let mut ids = Vec::new();
        self.collect_relids(&mut ids);
        ids.into_iter().collect()
    }

    fn collect_relids(&self, ids: &mut Vec<RelId>) {
        match self {
            Expression::Column(col) => ids.push(col.relid),
            Expression::BinaryOp { left, right, .. } => {
                left.collect_relids(ids);
                right.collect_relids(ids);
            }
            Expression::UnaryOp { expr, .. } => expr.collect_relids(ids),
            Expression::Function { args, .. } => {
                for arg in args {
                    arg.collect_relids(ids);
                }
            }
            Expression::Literal(_) => {}
        }
    }

    /// Rebuild the tree, replacing every column with the result of `f`.
    ///
    /// Returns `None` as soon as `f` refuses a column; no partially
    /// rewritten tree ever escapes.
    pub fn map_columns<F>(&self, f: &mut F) -> Option<Expression>
    where
        F: FnMut(&ColumnRef) -> Option<Expression>,
    {
        match self {
            Expression::Column(col) => f(col),
            Expression::Literal(_) => Some(self.clone()),
            Expression::BinaryOp { left, op, right } => Some(Expression::BinaryOp {
                left: Box::new(left.map_columns(f)?),
                op: *op,
                right: Box::new(right.map_columns(f)?),
            }),
            Expression::UnaryOp { op, expr } => Some(Expression::UnaryOp {
                op: *op,
                expr: Box::new(expr.map_columns(f)?),
            }),
            Expression::Function { name, args } => {
                let mut mapped = Vec::with_capacity(args.len());
                for arg in args {
                    mapped.push(arg.map_columns(f)?);
                }
                Some(Expression::Function {
                    name: name.clone(),
                    args: mapped,
                })
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Column(col) => write!(f, "r{}.c{}", col.relid, col.attno),
            Expression::BinaryOp { left, op, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::UnaryOp { op, expr } => match op {
                Operator::Minus => write!(f, "-{}", expr),
                _ => write!(f, "{} {}", op.symbol(), expr),
            },
            Expression::Function { name, args } => {
                let args = args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
                write!(f, "{}({})", name, args.join(", "))
            }
        }
    }
}
