//! Compiles an AST into a [`Program`].
//!
//! Every AST node implements [`Compilable`], which appends the node's instructions to a
//! [`Compiler`]. The compiler owns all the book keeping of one compilation: the symbol
//! table, the label counter and the code that has been emitted so far.

use im::Vector;
use thiserror::Error;

use crate::core::*;

/// switches that change the generated code
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// compile `and` and `or` with conditional jumps, so the right operand is only evaluated
    /// when it is needed. Otherwise both operands are evaluated and combined by `AND`/`OR`.
    pub short_circuit: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            short_circuit: true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("[Line {line}]: {kind}")]
pub struct CompileError {
    pub line: usize,
    pub kind: CompileErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileErrorKind {
    #[error("Variable {0} is not defined.")]
    UndefinedVariable(String),

    #[error("A function with the name {0} was already declared.")]
    FunctionAlreadyDeclared(String),

    #[error("A variable with the name {0} was already defined in this scope.")]
    VariableAlreadyDefined(String),

    #[error("Not found declaration for function {0}")]
    UndefinedFunction(String),

    #[error("Function expected {expected} params but {found} args were passed")]
    ArityMismatch { expected: usize, found: usize },

    #[error("ret can only be used inside of a function.")]
    ReturnOutsideFunction,
}

pub type CompileResult<T> = Result<T, CompileError>;

macro_rules! compilation_error {
    ($line:expr, $($kind:tt)+) => {
        return Err(CompileError {
            line: $line,
            kind: CompileErrorKind::$($kind)+,
        })
    };
}

/// Implemented by everything that can be turned into instructions
pub trait Compilable {
    fn compile(&self, c: &mut Compiler) -> CompileResult<()>;
}

macro_rules! impl_compilable {
    ($t:ty: $self:ident, $c:ident => $code:block) => {
        impl Compilable for $t {
            fn compile(&$self, $c: &mut Compiler) -> CompileResult<()> $code
        }
    };
}

/// The state of one compilation
#[derive(Debug, Default)]
pub struct Compiler {
    /// the instructions emitted so far
    code: Vector<Instruction>,
    /// the source line for each instruction in code
    lines: Vector<usize>,
    symbols: SymbolTable,
    label_count: usize,
    options: CompileOptions,
}

/// compiles a whole program, the result ends with `HALT`
pub fn compile(ast: &Block, options: &CompileOptions) -> CompileResult<Program> {
    let mut compiler = Compiler::new(options.clone());
    ast.compile(&mut compiler)?;
    let last_line = compiler.lines.last().copied().unwrap_or(ast.0);
    compiler.emit(last_line, Instruction::Halt);
    Ok(compiler.finish())
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Compiler {
            options,
            ..Default::default()
        }
    }

    /// turns the emitted code into a program
    pub fn finish(self) -> Program {
        let mut program = Program::new(self.code.into_iter().collect());
        program.debug.lines = self.lines.into_iter().collect();
        program.debug.globals = self.symbols.global_names().map(String::from).collect();
        program
    }

    fn emit(&mut self, line: usize, instruction: impl Into<Instruction>) {
        self.code.push_back(instruction.into());
        self.lines.push_back(line);
    }

    /// creates a label name that can not clash with a function name
    fn new_label(&mut self) -> String {
        self.label_count += 1;
        format!(".L{}", self.label_count)
    }

    /// compiles a block in a nested scope and pops the locals it declared
    fn scoped(&mut self, block: &Block) -> CompileResult<()> {
        self.symbols.begin_block();
        block.compile(self)?;
        self.end_scope(block.0);
        Ok(())
    }

    fn end_scope(&mut self, line: usize) {
        for _ in 0..self.symbols.end_block() {
            self.emit(line, Instruction::Pop);
        }
    }

    /// declares a variable whose value is the current stack top. Globals are stored, locals
    /// just stay where they are.
    fn declare(&mut self, line: usize, name: &str) -> CompileResult<()> {
        if self.symbols.function(name).is_some() {
            compilation_error!(line, FunctionAlreadyDeclared(name.into()));
        }
        if let Location::Global(slot) = self.symbols.declare_variable(name) {
            self.emit(line, Instruction::StoreGlobal(slot));
        }
        Ok(())
    }

    fn store(&mut self, line: usize, location: Location) {
        match location {
            Location::Global(slot) => self.emit(line, Instruction::StoreGlobal(slot)),
            Location::Local(slot) => self.emit(line, Instruction::StoreLocal(slot)),
        }
    }

    fn load(&mut self, line: usize, location: Location) {
        match location {
            Location::Global(slot) => self.emit(line, Instruction::LoadGlobal(slot)),
            Location::Local(slot) => self.emit(line, Instruction::LoadLocal(slot)),
        }
    }

    /// a hidden local, which was just declared, by name
    fn hidden(&self, line: usize, name: &str) -> CompileResult<Location> {
        match self.symbols.resolve_variable(name) {
            Some(location) => Ok(location),
            None => compilation_error!(line, UndefinedVariable(name.into())),
        }
    }

    fn compile_logical(
        &mut self,
        line: usize,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
    ) -> CompileResult<()> {
        left.compile(self)?;
        if !self.options.short_circuit {
            right.compile(self)?;
            match op {
                LogicalOp::And => self.emit(line, Instruction::And),
                LogicalOp::Or => self.emit(line, Instruction::Or),
            }
            return Ok(());
        }

        let other = self.new_label();
        let end = self.new_label();
        self.emit(line, Instruction::Jmpz(other.clone()));
        match op {
            LogicalOp::And => {
                right.compile(self)?;
                self.emit(line, Instruction::Jmp(end.clone()));
                self.emit(line, Instruction::Label(other));
                self.emit(line, Instruction::Push(false.into()));
            }
            LogicalOp::Or => {
                self.emit(line, Instruction::Push(true.into()));
                self.emit(line, Instruction::Jmp(end.clone()));
                self.emit(line, Instruction::Label(other));
                right.compile(self)?;
            }
        }
        self.emit(line, Instruction::Label(end));
        Ok(())
    }

    fn compile_call(&mut self, call: &Call) -> CompileResult<()> {
        let Call { line, name, args } = call;
        let arity = match self.symbols.function(name).map(|s| s.kind) {
            Some(SymbolKind::Function { arity }) => arity,
            _ => compilation_error!(*line, UndefinedFunction(name.clone())),
        };
        if arity != args.len() {
            compilation_error!(
                *line,
                ArityMismatch {
                    expected: arity,
                    found: args.len()
                }
            );
        }
        for arg in args {
            arg.compile(self)?;
        }
        self.emit(
            *line,
            Instruction::Call(CallTarget {
                label: name.clone(),
                argc: args.len(),
            }),
        );
        Ok(())
    }

    fn compile_function(&mut self, decl: &FuncDecl) -> CompileResult<()> {
        let FuncDecl {
            line,
            name,
            params,
            body,
        } = decl;
        let line = *line;
        if self.symbols.function(name).is_some() {
            compilation_error!(line, FunctionAlreadyDeclared(name.clone()));
        }
        if self.symbols.resolve_variable(name).is_some() {
            compilation_error!(line, VariableAlreadyDefined(name.clone()));
        }
        self.symbols.declare_function(name, params.len());

        let end = self.new_label();
        self.emit(line, Instruction::Jmp(end.clone()));
        self.emit(line, Instruction::Label(name.clone()));

        self.symbols.begin_function();
        self.symbols.begin_block();
        for (i, param) in params.iter().enumerate() {
            if params[..i].contains(param) {
                compilation_error!(line, VariableAlreadyDefined(param.clone()));
            }
            if self.symbols.function(param).is_some() {
                compilation_error!(line, FunctionAlreadyDeclared(param.clone()));
            }
            self.symbols.declare_variable(param);
        }
        body.compile(self)?;
        let end_line = self.lines.last().copied().unwrap_or(line);
        self.end_scope(end_line);
        self.symbols.end_function();

        self.emit(end_line, Instruction::Push(false.into()));
        self.emit(end_line, Instruction::Return);
        self.emit(end_line, Instruction::Label(end));
        Ok(())
    }

    fn compile_for(
        &mut self,
        line: usize,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Block,
    ) -> CompileResult<()> {
        self.symbols.begin_block();

        // the bounds are evaluated before the loop variable exists, so they see the
        // enclosing variables. They stay on the stack in slot order.
        start.compile(self)?;
        end.compile(self)?;
        if let Some(step) = step {
            step.compile(self)?;
        }
        self.declare(line, var)?;
        let var = self.hidden(line, var)?;
        self.declare(line, "for#end")?;
        let limit = self.hidden(line, "for#end")?;

        if step.is_none() {
            let descending = self.new_label();
            let done = self.new_label();
            self.load(line, var);
            self.load(line, limit);
            self.emit(line, Operator::Le);
            self.emit(line, Instruction::Jmpz(descending.clone()));
            self.emit(line, Instruction::Push(Value::Number(1.0)));
            self.emit(line, Instruction::Jmp(done.clone()));
            self.emit(line, Instruction::Label(descending));
            self.emit(line, Instruction::Push(Value::Number(-1.0)));
            self.emit(line, Instruction::Label(done));
        }
        self.declare(line, "for#step")?;
        let step = self.hidden(line, "for#step")?;

        let test = self.new_label();
        let down = self.new_label();
        let check = self.new_label();
        let exit = self.new_label();
        self.emit(line, Instruction::Label(test.clone()));
        self.load(line, step);
        self.emit(line, Instruction::Push(Value::Number(0.0)));
        self.emit(line, Operator::Ge);
        self.emit(line, Instruction::Jmpz(down.clone()));
        self.load(line, var);
        self.load(line, limit);
        self.emit(line, Operator::Le);
        self.emit(line, Instruction::Jmp(check.clone()));
        self.emit(line, Instruction::Label(down));
        self.load(line, var);
        self.load(line, limit);
        self.emit(line, Operator::Ge);
        self.emit(line, Instruction::Label(check));
        self.emit(line, Instruction::Jmpz(exit.clone()));

        self.scoped(body)?;

        self.load(line, var);
        self.load(line, step);
        self.emit(line, Operator::Add);
        self.store(line, var);
        self.emit(line, Instruction::Jmp(test));
        self.emit(line, Instruction::Label(exit));

        self.end_scope(line);
        Ok(())
    }
}

impl_compilable! { Block: self, c => {
    for stmt in &self.1 {
        stmt.compile(c)?;
    }
    Ok(())
}}

impl_compilable! { Stmt: self, c => {
    let line = self.line();
    match self {
        Stmt::Print { value, newline, .. } => {
            value.compile(c)?;
            if *newline {
                c.emit(line, Instruction::Println);
            } else {
                c.emit(line, Instruction::Print);
            }
        }
        Stmt::If { test, then_block, else_block, .. } => {
            let else_label = c.new_label();
            let exit = c.new_label();
            test.compile(c)?;
            c.emit(line, Instruction::Jmpz(else_label.clone()));
            c.scoped(then_block)?;
            c.emit(line, Instruction::Jmp(exit.clone()));
            c.emit(line, Instruction::Label(else_label));
            if let Some(else_block) = else_block {
                c.scoped(else_block)?;
            }
            c.emit(line, Instruction::Label(exit));
        }
        Stmt::While { test, body, .. } => {
            let test_label = c.new_label();
            let exit = c.new_label();
            c.emit(line, Instruction::Label(test_label.clone()));
            test.compile(c)?;
            c.emit(line, Instruction::Jmpz(exit.clone()));
            c.scoped(body)?;
            c.emit(line, Instruction::Jmp(test_label));
            c.emit(line, Instruction::Label(exit));
        }
        Stmt::For { var, start, end, step, body, .. } => {
            c.compile_for(line, var, start, end, step.as_ref(), body)?;
        }
        Stmt::FuncDecl(decl) => c.compile_function(decl)?,
        Stmt::Ret { value, .. } => {
            if !c.symbols.in_function() {
                compilation_error!(line, ReturnOutsideFunction);
            }
            value.compile(c)?;
            c.emit(line, Instruction::Return);
        }
        Stmt::Assign { name, value, .. } => {
            value.compile(c)?;
            match c.symbols.resolve_variable(name) {
                Some(location) => c.store(line, location),
                None => c.declare(line, name)?,
            }
        }
        Stmt::LocalAssign { name, value, .. } => {
            value.compile(c)?;
            match c.symbols.resolve_variable(name) {
                Some(location) if c.symbols.depth() == 0 => c.store(line, location),
                _ => c.declare(line, name)?,
            }
        }
        Stmt::Call(call) => {
            c.compile_call(call)?;
            c.emit(line, Instruction::Pop);
        }
    }
    Ok(())
}}

impl_compilable! { Expr: self, c => {
    let line = self.line();
    match self {
        Expr::IntLit(_, x) => c.emit(line, Instruction::Push((*x).into())),
        Expr::FloatLit(_, x) => c.emit(line, Instruction::Push((*x).into())),
        Expr::StrLit(_, s) => c.emit(line, Instruction::Push(s.as_str().into())),
        Expr::BoolLit(_, b) => c.emit(line, Instruction::Push((*b).into())),
        Expr::Ident(_, name) => match c.symbols.resolve_variable(name) {
            Some(location) => c.load(line, location),
            None => compilation_error!(line, UndefinedVariable(name.clone())),
        },
        Expr::Grouping(_, inner) => inner.compile(c)?,
        Expr::Unary { op, operand, .. } => {
            operand.compile(c)?;
            match op {
                UnaryOp::Neg => c.emit(line, Instruction::Neg),
                UnaryOp::Plus => {}
                UnaryOp::Not => {
                    c.emit(line, Instruction::Push(true.into()));
                    c.emit(line, Instruction::Xor);
                }
            }
        }
        Expr::Binary { op, left, right, .. } => {
            left.compile(c)?;
            right.compile(c)?;
            c.emit(line, Operator::from(*op));
        }
        Expr::Logical { op, left, right, .. } => c.compile_logical(line, *op, left, right)?,
        Expr::Call(call) => c.compile_call(call)?,
    }
    Ok(())
}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use Instruction::*;
    use Instruction::Call;

    fn compile_src(src: &str) -> CompileResult<Program> {
        compile(&parse(src).unwrap(), &CompileOptions::default())
    }

    fn code(src: &str) -> Vec<Instruction> {
        compile_src(src).unwrap().code
    }

    fn error(src: &str) -> CompileError {
        compile_src(src).unwrap_err()
    }

    fn num(x: f64) -> Instruction {
        Push(Value::Number(x))
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            code("print 2 * 9 + 13"),
            vec![
                num(2.0),
                num(9.0),
                Mul,
                num(13.0),
                Add,
                Print,
                Halt
            ]
        );
    }

    #[test]
    fn not_and_unary_plus() {
        assert_eq!(
            code("println ~+true"),
            vec![Push(true.into()), Push(true.into()), Xor, Println, Halt]
        );
    }

    #[test]
    fn globals_get_slots_in_declaration_order() {
        let program = compile_src("x := 5\ny := x\nx := y").unwrap();
        assert_eq!(
            program.code,
            vec![
                num(5.0),
                StoreGlobal(0),
                LoadGlobal(0),
                StoreGlobal(1),
                LoadGlobal(1),
                StoreGlobal(0),
                Halt
            ]
        );
        assert_eq!(program.debug.globals, ["x", "y"]);
        assert_eq!(program.debug.lines, [1, 1, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn block_locals_are_popped() {
        let code = code("if true then\n  x := 1\n  x := 2\nend");
        assert_eq!(
            code,
            vec![
                Push(true.into()),
                Jmpz(".L1".into()),
                num(1.0),
                num(2.0),
                StoreLocal(0),
                Pop,
                Jmp(".L2".into()),
                Label(".L1".into()),
                Label(".L2".into()),
                Halt
            ]
        );
    }

    #[test]
    fn while_loop_layout() {
        let code = code("i := 0\nwhile i < 3 do i := i + 1 end");
        assert_eq!(code[2], Label(".L1".into()));
        assert_eq!(code[6], Jmpz(".L2".into()));
        assert_eq!(code[code.len() - 3], Jmp(".L1".into()));
        assert_eq!(code[code.len() - 2], Label(".L2".into()));
    }

    #[test]
    fn short_circuit_and_eager_logic() {
        assert_eq!(
            code("print true and false"),
            vec![
                Push(true.into()),
                Jmpz(".L1".into()),
                Push(false.into()),
                Jmp(".L2".into()),
                Label(".L1".into()),
                Push(false.into()),
                Label(".L2".into()),
                Print,
                Halt
            ]
        );
        let eager = CompileOptions {
            short_circuit: false,
        };
        let program = compile(&parse("print true or false").unwrap(), &eager).unwrap();
        assert_eq!(
            program.code,
            vec![Push(true.into()), Push(false.into()), Or, Print, Halt]
        );
    }

    #[test]
    fn functions() {
        let code = code("func add(a, b)\n  ret a + b\nend\nprint add(1, 2)");
        assert_eq!(
            code,
            vec![
                Jmp(".L1".into()),
                Label("add".into()),
                LoadLocal(0),
                LoadLocal(1),
                Add,
                Return,
                Pop,
                Pop,
                Push(false.into()),
                Return,
                Label(".L1".into()),
                num(1.0),
                num(2.0),
                Call(CallTarget {
                    label: "add".into(),
                    argc: 2
                }),
                Print,
                Halt
            ]
        );
    }

    #[test]
    fn call_statements_discard_the_result() {
        let code = code("func f() end\nf()");
        assert_eq!(&code[code.len() - 3..], &[
            Call(CallTarget {
                label: "f".into(),
                argc: 0
            }),
            Pop,
            Halt
        ]);
    }

    #[test]
    fn function_locals_are_frame_relative() {
        let code = code("if true then\n  x := 1\n  func f(a)\n    b := a\n    ret b\n  end\nend");
        assert!(code.contains(&LoadLocal(1)));
        assert!(code.contains(&LoadLocal(0)));
        assert!(!code.iter().any(|i| matches!(i, LoadLocal(n) if *n > 1)));
    }

    #[test]
    fn functions_can_not_see_enclosing_locals() {
        let err = error("if true then\n  x := 1\n  func f()\n    ret x\n  end\nend");
        assert_eq!(err.kind, CompileErrorKind::UndefinedVariable("x".into()));
        assert_eq!(err.line, 4);
    }

    #[test]
    fn local_shadows_at_depth() {
        let code = code("x := 1\nif true then\n  local x := 2\n  x := 3\nend");
        assert!(code.contains(&StoreLocal(0)));
        assert_eq!(code.iter().filter(|i| **i == StoreGlobal(0)).count(), 1);
    }

    #[test]
    fn for_loop_uses_hidden_locals() {
        let code = code("for i := 1, 3 do print i end");
        assert!(code.contains(&LoadLocal(2)));
        assert_eq!(code.iter().filter(|i| **i == Pop).count(), 3);
        assert_eq!(code.last(), Some(&Halt));
    }

    #[test]
    fn for_bounds_are_compiled_before_the_loop_variable() {
        let code = code("i := 5\nfor i := 1, i do end");
        assert_eq!(&code[..4], &[num(5.0), StoreGlobal(0), num(1.0), LoadGlobal(0)]);
    }

    #[test]
    fn undefined_variables() {
        let err = error("print x");
        assert_eq!(err.to_string(), "[Line 1]: Variable x is not defined.");
        let err = error("if true then\n  y := 1\nend\nprint y");
        assert_eq!(err.to_string(), "[Line 4]: Variable y is not defined.");
    }

    #[test]
    fn arity_is_checked() {
        let err = error("func add(a, b)\n  ret a + b\nend\nprint add(1)");
        assert_eq!(
            err.to_string(),
            "[Line 4]: Function expected 2 params but 1 args were passed"
        );
    }

    #[test]
    fn name_collisions() {
        let err = error("func f() end\nfunc f() end");
        assert_eq!(
            err.to_string(),
            "[Line 2]: A function with the name f was already declared."
        );
        let err = error("f := 1\nfunc f() end");
        assert_eq!(
            err.to_string(),
            "[Line 2]: A variable with the name f was already defined in this scope."
        );
        let err = error("func f() end\nf := 1");
        assert_eq!(err.kind, CompileErrorKind::FunctionAlreadyDeclared("f".into()));
        let err = error("func f(a, a) end");
        assert_eq!(err.kind, CompileErrorKind::VariableAlreadyDefined("a".into()));
    }

    #[test]
    fn undeclared_functions() {
        let err = error("print g()");
        assert_eq!(err.to_string(), "[Line 1]: Not found declaration for function g");
    }

    #[test]
    fn ret_outside_function() {
        assert_eq!(error("ret 1").kind, CompileErrorKind::ReturnOutsideFunction);
    }

    #[test]
    fn recursion_is_allowed() {
        let code = code("func f(n)\n  if n > 0 then ret f(n - 1) end\n  ret 0\nend");
        assert!(code.contains(&Call(CallTarget {
            label: "f".into(),
            argc: 1
        })));
    }
}
