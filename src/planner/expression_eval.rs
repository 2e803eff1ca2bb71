// Expression Evaluation Utility
//
// Evaluates restriction expressions against a single row binding. Used to
// check that a filter moved across join clauses admits exactly the rows
// its source constraint does, and to run candidate paths over sample rows.

use std::cmp::Ordering;

use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::expr::{ColumnRef, Expression, Operator, Value};

/// Source of column values for one row
pub trait RowBinding {
    fn value_of(&self, col: &ColumnRef) -> Option<Value>;
}

impl<F> RowBinding for F
where
    F: Fn(&ColumnRef) -> Option<Value>,
{
    fn value_of(&self, col: &ColumnRef) -> Option<Value> {
        self(col)
    }
}

// Evaluate an expression in the context of a single row.
pub fn evaluate_expression(expr: &Expression, row: &dyn RowBinding) -> PlannerResult<Value> {
    match expr {
        Expression::Literal(val) => Ok(val.clone()),
        Expression::Column(col) => row.value_of(col).ok_or_else(|| {
            PlannerError::Evaluation(format!("Column r{}.c{} is not bound", col.relid, col.attno))
        }),
        Expression::BinaryOp { left, op, right } => {
            let left_val = evaluate_expression(left, row)?;
            let right_val = evaluate_expression(right, row)?;

            if left_val == Value::Null || right_val == Value::Null {
                return Ok(Value::Null);
            }

            match op {
                Operator::Equals => Ok(Value::Boolean(compare(&left_val, &right_val)? == Ordering::Equal)),
                Operator::NotEquals => Ok(Value::Boolean(compare(&left_val, &right_val)? != Ordering::Equal)),
                Operator::LessThan => Ok(Value::Boolean(compare(&left_val, &right_val)? == Ordering::Less)),
                Operator::GreaterThan => Ok(Value::Boolean(compare(&left_val, &right_val)? == Ordering::Greater)),
                Operator::LessEquals => Ok(Value::Boolean(compare(&left_val, &right_val)? != Ordering::Greater)),
                Operator::GreaterEquals => Ok(Value::Boolean(compare(&left_val, &right_val)? != Ordering::Less)),
                Operator::Plus => arithmetic(left_val, right_val, i64::checked_add, |l, r| l + r, "+"),
                Operator::Minus => arithmetic(left_val, right_val, i64::checked_sub, |l, r| l - r, "-"),
                Operator::Multiply => arithmetic(left_val, right_val, i64::checked_mul, |l, r| l * r, "*"),
                Operator::Divide => match (left_val, right_val) {
                    (_, Value::Integer(0)) => Err(PlannerError::DivisionByZero),
                    (_, Value::Float(r)) if r == 0.0 => Err(PlannerError::DivisionByZero),
                    (l, r) => arithmetic(l, r, i64::checked_div, |l, r| l / r, "/"),
                },
                Operator::Modulo => match (left_val, right_val) {
                    (Value::Integer(_), Value::Integer(0)) => Err(PlannerError::DivisionByZero),
                    // Euclidean remainder so that partition keys map onto 0..n
                    (Value::Integer(l), Value::Integer(r)) => {
                        Ok(Value::Integer(l.checked_rem_euclid(r).ok_or(PlannerError::NumericOverflow)?))
                    }
                    _ => Err(PlannerError::Evaluation("Modulo operator only supports integers".to_string())),
                },
                Operator::And => match (left_val, right_val) {
                    (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(l && r)),
                    _ => Err(PlannerError::Evaluation("AND requires boolean operands".to_string())),
                },
                Operator::Or => match (left_val, right_val) {
                    (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(l || r)),
                    _ => Err(PlannerError::Evaluation("OR requires boolean operands".to_string())),
                },
                Operator::Not => Err(PlannerError::Evaluation("NOT is a unary operator".to_string())),
            }
        }
        Expression::UnaryOp { op, expr } => {
            let val = evaluate_expression(expr, row)?;
            match (op, val) {
                (_, Value::Null) => Ok(Value::Null),
                (Operator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                (Operator::Minus, Value::Integer(i)) => {
                    Ok(Value::Integer(i.checked_neg().ok_or(PlannerError::NumericOverflow)?))
                }
                (Operator::Minus, Value::Float(f)) => Ok(Value::Float(-f)),
                (op, val) => Err(PlannerError::Evaluation(format!(
                    "Unary {:?} not supported for {:?}",
                    op, val
                ))),
            }
        }
        Expression::Function { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate_expression(arg, row)?);
            }
            evaluate_function(name, &values)
        }
    }
}

/// Evaluate a predicate; NULL counts as not satisfied
pub fn evaluate_predicate(expr: &Expression, row: &dyn RowBinding) -> PlannerResult<bool> {
    match evaluate_expression(expr, row)? {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(PlannerError::Evaluation(format!(
            "Predicate {} evaluated to non-boolean {:?}",
            expr, other
        ))),
    }
}

fn evaluate_function(name: &str, values: &[Value]) -> PlannerResult<Value> {
    if values.iter().any(|v| *v == Value::Null) {
        return Ok(Value::Null);
    }
    match (name.to_ascii_lowercase().as_str(), values) {
        ("abs", [Value::Integer(i)]) => Ok(Value::Integer(i.checked_abs().ok_or(PlannerError::NumericOverflow)?)),
        ("abs", [Value::Float(f)]) => Ok(Value::Float(f.abs())),
        ("mod", [Value::Integer(_), Value::Integer(0)]) => Err(PlannerError::DivisionByZero),
        ("mod", [Value::Integer(l), Value::Integer(r)]) => {
            Ok(Value::Integer(l.checked_rem_euclid(*r).ok_or(PlannerError::NumericOverflow)?))
        }
        ("hash", [Value::Integer(i)]) => Ok(Value::Integer(hash_integer(*i))),
        ("hash", [Value::String(s)]) => Ok(Value::Integer(hash_bytes(s.as_bytes()))),
        _ => Err(PlannerError::Evaluation(format!(
            "Unsupported function {}({} args)",
            name,
            values.len()
        ))),
    }
}

// FNV-1a, folded to a non-negative integer
fn hash_bytes(bytes: &[u8]) -> i64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash >> 1) as i64
}

fn hash_integer(value: i64) -> i64 {
    hash_bytes(&value.to_le_bytes())
}

fn compare(left: &Value, right: &Value) -> PlannerResult<Ordering> {
    let ordering = match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::Integer(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
        (Value::Float(l), Value::Integer(r)) => l.partial_cmp(&(*r as f64)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
        _ => None,
    };
    ordering.ok_or_else(|| PlannerError::Evaluation(format!("Cannot compare {:?} with {:?}", left, right)))
}

fn arithmetic(
    left: Value,
    right: Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    symbol: &str,
) -> PlannerResult<Value> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => {
            Ok(Value::Integer(int_op(l, r).ok_or(PlannerError::NumericOverflow)?))
        }
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(float_op(l, r))),
        (Value::Integer(l), Value::Float(r)) => Ok(Value::Float(float_op(l as f64, r))),
        (Value::Float(l), Value::Integer(r)) => Ok(Value::Float(float_op(l, r as f64))),
        _ => Err(PlannerError::Evaluation(format!("Unsupported types for {} operator", symbol))),
    }
}
