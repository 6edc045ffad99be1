//! This file defines the instruction set of the vm.
//!
//! An instruction is an opcode with at most one operand. Jumps and calls refer to labels by
//! name, the vm resolves those names to indices before it starts executing.

use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use std::fmt;

use crate::core::{Operator, Value};

/// One vm instruction. The instruction stream is a flat `Vec<Instruction>`, and the index of
/// an instruction is its address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    /// push a constant
    Push(Value),
    /// drop the stack top
    Pop,
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
    /// pop and write without a newline
    Print,
    /// pop and write followed by a newline
    Println,
    /// marks a jump target, does nothing at runtime
    Label(String),
    Jmp(String),
    /// pops a bool, jumps if it is false
    Jmpz(String),
    /// jumps to a function label. The arguments are already on the stack.
    Call(CallTarget),
    /// pops the result, drops the callee frame, pushes the result and returns to the caller
    Return,
    StoreGlobal(usize),
    LoadGlobal(usize),
    /// slot relative to the base of the current frame
    StoreLocal(usize),
    LoadLocal(usize),
    Halt,
}

/// The operand of [`Instruction::Call`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTarget {
    pub label: String,
    pub argc: usize,
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// the operator that this instruction applies, if any
    pub fn operator(&self) -> Option<Operator> {
        use Instruction::*;
        Some(match self {
            Add => Operator::Add,
            Sub => Operator::Sub,
            Mul => Operator::Mul,
            Div => Operator::Div,
            Mod => Operator::Mod,
            Exp => Operator::Exp,
            Neg => Operator::Neg,
            And => Operator::And,
            Or => Operator::Or,
            Xor => Operator::Xor,
            Lt => Operator::Lt,
            Gt => Operator::Gt,
            Le => Operator::Le,
            Ge => Operator::Ge,
            Eq => Operator::Eq,
            Ne => Operator::Ne,
            _ => return None,
        })
    }

    /// the label this instruction refers to, labels themselves don't count
    pub fn label_ref(&self) -> Option<&str> {
        match self {
            Instruction::Jmp(l) | Instruction::Jmpz(l) => Some(l),
            Instruction::Call(target) => Some(&target.label),
            _ => None,
        }
    }
}

impl From<Operator> for Instruction {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Add => Instruction::Add,
            Operator::Sub => Instruction::Sub,
            Operator::Mul => Instruction::Mul,
            Operator::Div => Instruction::Div,
            Operator::Mod => Instruction::Mod,
            Operator::Exp => Instruction::Exp,
            Operator::Neg => Instruction::Neg,
            Operator::And => Instruction::And,
            Operator::Or => Instruction::Or,
            Operator::Xor => Instruction::Xor,
            Operator::Lt => Instruction::Lt,
            Operator::Gt => Instruction::Gt,
            Operator::Le => Instruction::Le,
            Operator::Ge => Instruction::Ge,
            Operator::Eq => Instruction::Eq,
            Operator::Ne => Instruction::Ne,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        let name = self.mnemonic();
        match self {
            Push(Value::Str(s)) => write!(f, "{} {:?}", name, s),
            Push(v) => write!(f, "{} {}", name, v),
            Label(l) => write!(f, "{}:", l),
            Jmp(l) | Jmpz(l) => write!(f, "{} {}", name, l),
            Call(CallTarget { label, argc }) => write!(f, "{} {}/{}", name, label, argc),
            StoreGlobal(slot) | LoadGlobal(slot) | StoreLocal(slot) | LoadLocal(slot) => {
                write!(f, "{} {}", name, slot)
            }
            _ => write!(f, "{}", name),
        }
    }
}
