//! Operator semantics shared by the vm and the interpreter
//!
//! Both execution strategies funnel every arithmetic, bitwise, comparison and equality
//! operation through [`binary`] and [`unary`], so they can not disagree about what a
//! program computes.

use strum_macros::IntoStaticStr;
use thiserror::Error;

use crate::core::{Value, ValueKind};

/// Operators known to the value model. The names double as the vm mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Neg,
    And,
    Or,
    Xor,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    #[error("Unsupported operator {op} between {left} and {right}.")]
    Operands {
        op: &'static str,
        left: ValueKind,
        right: ValueKind,
    },

    #[error("Unsupported operator {op} with {operand}.")]
    Operand {
        op: &'static str,
        operand: ValueKind,
    },

    #[error("Division by zero.")]
    DivisionByZero,
}

pub type Result<T> = std::result::Result<T, OpError>;

impl Operator {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// applies a binary operator. `Neg` is not binary and is rejected like a type mismatch
pub fn binary(op: Operator, left: Value, right: Value) -> Result<Value> {
    use Operator::*;
    use Value::{Bool, Number, Str};

    Ok(match (op, left, right) {
        (Add, Number(l), Number(r)) => Number(l + r),
        (Add, l @ Str(_), r) | (Add, l, r @ Str(_)) => Str(format!("{}{}", l, r)),
        (Sub, Number(l), Number(r)) => Number(l - r),
        (Mul, Number(l), Number(r)) => Number(l * r),
        (Div, Number(_), Number(r)) if r == 0.0 => return Err(OpError::DivisionByZero),
        (Div, Number(l), Number(r)) => Number(l / r),
        (Mod, Number(_), Number(r)) if r == 0.0 => return Err(OpError::DivisionByZero),
        (Mod, Number(l), Number(r)) => Number(floored_mod(l, r)),
        (Exp, Number(l), Number(r)) => Number(l.powf(r)),

        (And, Number(l), Number(r)) => Number(((l as i64) & (r as i64)) as f64),
        (Or, Number(l), Number(r)) => Number(((l as i64) | (r as i64)) as f64),
        (Xor, Number(l), Number(r)) => Number(((l as i64) ^ (r as i64)) as f64),
        (And, Bool(l), Bool(r)) => Bool(l && r),
        (Or, Bool(l), Bool(r)) => Bool(l || r),
        (Xor, Bool(l), Bool(r)) => Bool(l ^ r),

        (Lt, Number(l), Number(r)) => Bool(l < r),
        (Gt, Number(l), Number(r)) => Bool(l > r),
        (Le, Number(l), Number(r)) => Bool(l <= r),
        (Ge, Number(l), Number(r)) => Bool(l >= r),
        (Lt, Str(l), Str(r)) => Bool(l < r),
        (Gt, Str(l), Str(r)) => Bool(l > r),
        (Le, Str(l), Str(r)) => Bool(l <= r),
        (Ge, Str(l), Str(r)) => Bool(l >= r),

        (Eq, Number(l), Number(r)) => Bool(l == r),
        (Eq, Str(l), Str(r)) => Bool(l == r),
        (Eq, Bool(l), Bool(r)) => Bool(l == r),
        (Ne, Number(l), Number(r)) => Bool(l != r),
        (Ne, Str(l), Str(r)) => Bool(l != r),
        (Ne, Bool(l), Bool(r)) => Bool(l != r),

        (op, l, r) => {
            return Err(OpError::Operands {
                op: op.name(),
                left: l.kind(),
                right: r.kind(),
            })
        }
    })
}

/// applies a unary operator, only `Neg` exists
pub fn unary(op: Operator, operand: Value) -> Result<Value> {
    match (op, operand) {
        (Operator::Neg, Value::Number(x)) => Ok(Value::Number(-x)),
        (op, v) => Err(OpError::Operand {
            op: op.name(),
            operand: v.kind(),
        }),
    }
}

/// modulo whose result has the sign of the divisor
fn floored_mod(l: f64, r: f64) -> f64 {
    let m = l % r;
    if m != 0.0 && (m < 0.0) != (r < 0.0) {
        m + r
    } else {
        m
    }
}
