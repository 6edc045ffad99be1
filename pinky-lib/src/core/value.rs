//! Deals with run-time data representation
//!
//! Values are small tagged scalars. The compiler embeds them in `PUSH` instructions, the vm
//! keeps them on its stack and in the global store, and the interpreter passes them around
//! directly. They are always copied, never shared.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use std::fmt;

/// A tagged runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
}

/// The tag of a [`Value`], used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ValueKind {
    #[display(fmt = "NUMBER")]
    Number,
    #[display(fmt = "STRING")]
    Str,
    #[display(fmt = "BOOL")]
    Bool,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Str(_) => ValueKind::Str,
            Value::Bool(_) => ValueKind::Bool,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Value::Number(x as f64)
    }
}

/// The canonical stringification: booleans are `true`/`false`, integral numbers have no
/// fractional part
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(x) if *x == 0.0 => write!(f, "0"),
            Value::Number(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.0}", x),
            Value::Number(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Replaces escape sequences like `\n` by the characters they stand for.
///
/// Unknown sequences are kept as they are, backslash included.
pub fn decode_escapes(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            res.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => res.push('\n'),
            Some('t') => res.push('\t'),
            Some('r') => res.push('\r'),
            Some('0') => res.push('\0'),
            Some('\\') => res.push('\\'),
            Some('\'') => res.push('\''),
            Some('"') => res.push('"'),
            Some(other) => {
                res.push('\\');
                res.push(other);
            }
            None => res.push('\\'),
        }
    }
    res
}
