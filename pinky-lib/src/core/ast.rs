//! Contains the AST types. All anonymous structs and variants start with a usize, which is
//! the source line the node starts on. Named variants carry it in a `line` field.

use crate::core::Operator;

/// represents multiple statements that are executed one after another
#[derive(Debug, Clone, PartialEq)]
pub struct Block(pub usize, pub Vec<Stmt>);

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `print x` or `println x`
    Print {
        line: usize,
        value: Expr,
        newline: bool,
    },
    If {
        line: usize,
        test: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        line: usize,
        test: Expr,
        body: Block,
    },
    /// `for i := start, end, step do ... end`
    For {
        line: usize,
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Block,
    },
    FuncDecl(FuncDecl),
    /// `ret value`
    Ret { line: usize, value: Expr },
    /// `name := value`, declares the variable if it doesn't exist yet
    Assign {
        line: usize,
        name: String,
        value: Expr,
    },
    /// `local name := value`, always declares a new variable in the current scope
    LocalAssign {
        line: usize,
        name: String,
        value: Expr,
    },
    /// a function call whose result is discarded
    Call(Call),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub line: usize,
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub line: usize,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(usize, i64),
    FloatLit(usize, f64),
    StrLit(usize, String),
    BoolLit(usize, bool),
    /// a variable read
    Ident(usize, String),
    /// `( inner )`
    Grouping(usize, Box<Expr>),
    Unary {
        line: usize,
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        line: usize,
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `and` / `or`, they are separate from binary ops because they may short circuit
    Logical {
        line: usize,
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call(Call),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Plus,
    /// `~x`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::IntLit(line, _)
            | Expr::FloatLit(line, _)
            | Expr::StrLit(line, _)
            | Expr::BoolLit(line, _)
            | Expr::Ident(line, _)
            | Expr::Grouping(line, _) => *line,
            Expr::Unary { line, .. } | Expr::Binary { line, .. } | Expr::Logical { line, .. } => {
                *line
            }
            Expr::Call(call) => call.line,
        }
    }
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Print { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Ret { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::LocalAssign { line, .. } => *line,
            Stmt::FuncDecl(decl) => decl.line,
            Stmt::Call(call) => call.line,
        }
    }
}

impl From<BinaryOp> for Operator {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Operator::Add,
            BinaryOp::Sub => Operator::Sub,
            BinaryOp::Mul => Operator::Mul,
            BinaryOp::Div => Operator::Div,
            BinaryOp::Mod => Operator::Mod,
            BinaryOp::Exp => Operator::Exp,
            BinaryOp::Lt => Operator::Lt,
            BinaryOp::Gt => Operator::Gt,
            BinaryOp::Le => Operator::Le,
            BinaryOp::Ge => Operator::Ge,
            BinaryOp::Eq => Operator::Eq,
            BinaryOp::Ne => Operator::Ne,
        }
    }
}
