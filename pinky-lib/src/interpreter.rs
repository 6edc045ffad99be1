//! A tree walking interpreter that executes the AST directly.
//!
//! It shares the value model and the operator semantics with the vm, and it resolves names
//! the way the compiler does: code at depth 0 creates globals, every block opens a scope, and
//! a function call gets a fresh frame that can only see its own scopes and the globals.

use thiserror::Error;

use std::collections::HashMap;
use std::io::Write;

use crate::core::ops::{self, OpError};
use crate::core::*;
use crate::utils::bug;

#[derive(Error, Debug)]
#[error("[Line {line}]: {kind}")]
pub struct Error {
    pub line: usize,
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error(transparent)]
    Op(#[from] OpError),

    #[error("Condition must be a BOOL, found {0}.")]
    NonBooleanCondition(ValueKind),

    #[error("Variable {0} is not defined.")]
    UndefinedVariable(String),

    #[error("Not found declaration for function {0}")]
    UndefinedFunction(String),

    #[error("Function expected {expected} params but {found} args were passed")]
    ArityMismatch { expected: usize, found: usize },

    #[error("ret can only be used inside of a function.")]
    ReturnOutsideFunction,

    #[error("Stack overflow.")]
    StackOverflow,

    #[error("Could not write output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! bail {
    ($line:expr, $($kind:tt)+) => {
        return Err(Error {
            line: $line,
            kind: ErrorKind::$($kind)+,
        })
    };
}

/// attaches a line to errors that don't know it yet
trait AtLine<T> {
    fn at(self, line: usize) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> AtLine<T> for std::result::Result<T, E> {
    fn at(self, line: usize) -> Result<T> {
        self.map_err(|e| Error {
            line,
            kind: e.into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// the maximum number of nested calls
    pub max_call_depth: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        InterpreterOptions {
            max_call_depth: 200,
        }
    }
}

/// how the execution of a statement ended
enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<W: Write> {
    globals: HashMap<String, Value>,
    /// one entry per active call, the top level code has one too
    frames: Vec<Scopes<String, Value>>,
    functions: HashMap<String, FuncDecl>,
    out: W,
    options: InterpreterOptions,
}

/// interprets a whole program
pub fn interpret<W: Write>(ast: &Block, out: W, options: &InterpreterOptions) -> Result<()> {
    let mut interpreter = Interpreter::new(out, options.clone());
    interpreter.run(ast)
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W, options: InterpreterOptions) -> Self {
        Interpreter {
            globals: HashMap::new(),
            frames: vec![Scopes::default()],
            functions: HashMap::new(),
            out,
            options,
        }
    }

    pub fn globals(&self) -> &HashMap<String, Value> {
        &self.globals
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run(&mut self, ast: &Block) -> Result<()> {
        if let Flow::Return(_) = self.exec_stmts(ast)? {
            bail!(ast.0, ReturnOutsideFunction);
        }
        self.out.flush().at(ast.0)
    }

    fn frame(&mut self) -> &mut Scopes<String, Value> {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => bug!("the top level frame is never popped"),
        }
    }

    fn in_function(&self) -> bool {
        self.frames.len() > 1
    }

    fn exec_stmts(&mut self, block: &Block) -> Result<Flow> {
        for stmt in &block.1 {
            if let Flow::Return(val) = self.exec(stmt)? {
                return Ok(Flow::Return(val));
            }
        }
        Ok(Flow::Normal)
    }

    /// runs a block in a new scope
    fn exec_scoped(&mut self, block: &Block) -> Result<Flow> {
        self.frame().open_new();
        let res = self.exec_stmts(block);
        self.frame().collapse_innermost();
        res
    }

    fn condition(&mut self, test: &Expr) -> Result<bool> {
        match self.eval(test)? {
            Value::Bool(b) => Ok(b),
            other => bail!(test.line(), NonBooleanCondition(other.kind())),
        }
    }

    /// assigns to an existing variable, or creates it in the innermost scope
    fn assign(&mut self, name: &str, val: Value) {
        if let Some(entry) = self.frame().find_entry_mut(name) {
            *entry = val;
            return;
        }
        if let Some(entry) = self.globals.get_mut(name) {
            *entry = val;
            return;
        }
        self.declare(name, val);
    }

    fn declare(&mut self, name: &str, val: Value) {
        if self.frame().is_empty() {
            self.globals.insert(name.into(), val);
        } else {
            self.frame().add_entry(name.into(), val);
        }
    }

    fn lookup(&self, line: usize, name: &str) -> Result<Value> {
        let local = self.frames.last().and_then(|f| f.find_entry(name));
        match local.or_else(|| self.globals.get(name)) {
            Some(val) => Ok(val.clone()),
            None => bail!(line, UndefinedVariable(name.into())),
        }
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow> {
        let line = stmt.line();
        match stmt {
            Stmt::Print { value, newline, .. } => {
                let text = decode_escapes(&self.eval(value)?.to_string());
                if *newline {
                    writeln!(self.out, "{}", text).at(line)?;
                } else {
                    write!(self.out, "{}", text).at(line)?;
                }
            }
            Stmt::If {
                test,
                then_block,
                else_block,
                ..
            } => {
                if self.condition(test)? {
                    return self.exec_scoped(then_block);
                } else if let Some(else_block) = else_block {
                    return self.exec_scoped(else_block);
                }
            }
            Stmt::While { test, body, .. } => {
                while self.condition(test)? {
                    if let Flow::Return(val) = self.exec_scoped(body)? {
                        return Ok(Flow::Return(val));
                    }
                }
            }
            Stmt::For {
                var,
                start,
                end,
                step,
                body,
                ..
            } => return self.exec_for(line, var, start, end, step.as_ref(), body),
            Stmt::FuncDecl(decl) => {
                self.functions.insert(decl.name.clone(), decl.clone());
            }
            Stmt::Ret { value, .. } => {
                if !self.in_function() {
                    bail!(line, ReturnOutsideFunction);
                }
                return Ok(Flow::Return(self.eval(value)?));
            }
            Stmt::Assign { name, value, .. } => {
                let val = self.eval(value)?;
                self.assign(name, val);
            }
            Stmt::LocalAssign { name, value, .. } => {
                let val = self.eval(value)?;
                if self.frame().is_empty() {
                    self.assign(name, val);
                } else {
                    self.declare(name, val);
                }
            }
            Stmt::Call(call) => {
                self.call(call)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        line: usize,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Block,
    ) -> Result<Flow> {
        let start = self.eval(start)?;
        let end = self.eval(end)?;
        let step = match step {
            Some(step) => self.eval(step)?,
            None => match ops::binary(Operator::Le, start.clone(), end.clone()).at(line)? {
                Value::Bool(true) => Value::Number(1.0),
                _ => Value::Number(-1.0),
            },
        };

        self.frame().open_new();
        self.frame().add_entry(var.into(), start);
        let res = self.for_loop(line, var, &end, &step, body);
        self.frame().collapse_innermost();
        res
    }

    fn for_loop(
        &mut self,
        line: usize,
        var: &str,
        end: &Value,
        step: &Value,
        body: &Block,
    ) -> Result<Flow> {
        let ascending = ops::binary(Operator::Ge, step.clone(), Value::Number(0.0)).at(line)?;
        let cmp = if ascending == Value::Bool(true) {
            Operator::Le
        } else {
            Operator::Ge
        };
        loop {
            let current = self.lookup(line, var)?;
            if ops::binary(cmp, current, end.clone()).at(line)? != Value::Bool(true) {
                return Ok(Flow::Normal);
            }
            if let Flow::Return(val) = self.exec_scoped(body)? {
                return Ok(Flow::Return(val));
            }
            let current = self.lookup(line, var)?;
            let next = ops::binary(Operator::Add, current, step.clone()).at(line)?;
            self.assign(var, next);
        }
    }

    fn call(&mut self, call: &Call) -> Result<Value> {
        let Call { line, name, args } = call;
        let line = *line;
        let decl = match self.functions.get(name) {
            Some(decl) => decl.clone(),
            None => bail!(line, UndefinedFunction(name.clone())),
        };
        if decl.params.len() != args.len() {
            bail!(
                line,
                ArityMismatch {
                    expected: decl.params.len(),
                    found: args.len()
                }
            );
        }
        if self.frames.len() > self.options.max_call_depth {
            bail!(line, StackOverflow);
        }

        let mut frame = Scopes::default();
        frame.open_new();
        for (param, arg) in decl.params.iter().zip(args) {
            frame.add_entry(param.clone(), self.eval(arg)?);
        }

        self.frames.push(frame);
        let res = self.exec_stmts(&decl.body);
        self.frames.pop();
        Ok(match res? {
            Flow::Return(val) => val,
            Flow::Normal => Value::Bool(false),
        })
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value> {
        let line = expr.line();
        Ok(match expr {
            Expr::IntLit(_, x) => Value::from(*x),
            Expr::FloatLit(_, x) => Value::Number(*x),
            Expr::StrLit(_, s) => Value::Str(s.clone()),
            Expr::BoolLit(_, b) => Value::Bool(*b),
            Expr::Ident(_, name) => self.lookup(line, name)?,
            Expr::Grouping(_, inner) => self.eval(inner)?,
            Expr::Unary { op, operand, .. } => {
                let val = self.eval(operand)?;
                match op {
                    UnaryOp::Neg => ops::unary(Operator::Neg, val).at(line)?,
                    UnaryOp::Plus => val,
                    UnaryOp::Not => ops::binary(Operator::Xor, val, Value::Bool(true)).at(line)?,
                }
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                ops::binary((*op).into(), left, right).at(line)?
            }
            Expr::Logical {
                op, left, right, ..
            } => {
                let left = self.condition(left)?;
                match (op, left) {
                    (LogicalOp::And, false) => Value::Bool(false),
                    (LogicalOp::Or, true) => Value::Bool(true),
                    _ => self.eval(right)?,
                }
            }
            Expr::Call(call) => self.call(call)?,
        })
    }
}
