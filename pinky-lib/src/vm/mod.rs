//! The stack based virtual machine that executes a [`Program`]
//!
//! Before the first instruction runs, all labels are collected into a [`LabelTable`] and
//! every jump target is checked. After that the vm fetches, advances and dispatches until it
//! executes `HALT` or an instruction fails. Failures are fatal and carry the program counter
//! of the failing instruction.

use thiserror::Error;

use std::io::Write;

use crate::core::ops::{self, OpError};
use crate::core::*;
use crate::utils::bug;

pub mod labels;
pub use labels::LabelTable;

pub mod memory;
pub use memory::{Frame, Memory};

#[derive(Error, Debug)]
#[error("[PC {pc}]: {kind}")]
pub struct Error {
    pub pc: usize,
    pub kind: ErrorKind,
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error(transparent)]
    Op(#[from] OpError),

    #[error("Condition must be a BOOL, found {0}.")]
    NonBooleanCondition(ValueKind),

    #[error("Label {0} is not defined.")]
    UnresolvedLabel(String),

    #[error("Label {0} is defined more than once.")]
    DuplicateLabel(String),

    #[error("Stack underflow.")]
    StackUnderflow,

    #[error("Local slot {0} is outside of the current frame.")]
    InvalidLocal(usize),

    #[error("Global slot {0} is read before it was written.")]
    UninitializedGlobal(usize),

    #[error("RETURN outside of a function call.")]
    ReturnOutsideCall,

    #[error("Stack overflow.")]
    StackOverflow,

    #[error("The program counter left the program.")]
    ProgramOverrun,

    #[error("Could not write output: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// runtime switches
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// write every executed instruction to stderr
    pub trace: bool,
    /// the maximum number of nested calls
    pub max_frames: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions {
            trace: false,
            max_frames: 10_000,
        }
    }
}

/// returned by [`Vm::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Halted,
}

pub struct Vm<'p, W: Write> {
    program: &'p Program,
    labels: LabelTable,
    memory: Memory,
    pc: usize,
    running: bool,
    out: W,
    options: VmOptions,
}

/// runs a program to completion
pub fn run<W: Write>(program: &Program, out: W, options: &VmOptions) -> Result<()> {
    Vm::new(program, out, options.clone())?.run()
}

impl<'p, W: Write> Vm<'p, W> {
    /// prepares the execution of a program. Fails if a jump or call target does not exist
    pub fn new(program: &'p Program, out: W, options: VmOptions) -> Result<Self> {
        Ok(Vm {
            program,
            labels: LabelTable::scan(&program.code)?,
            memory: Memory::default(),
            pc: 0,
            running: true,
            out,
            options,
        })
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// what the program has written so far
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run(&mut self) -> Result<()> {
        while self.step()? == StepResult::Continue {}
        self.out.flush().map_err(|e| Error {
            pc: self.pc,
            kind: e.into(),
        })
    }

    /// executes a single instruction
    pub fn step(&mut self) -> Result<StepResult> {
        if !self.running {
            return Ok(StepResult::Halted);
        }
        let pc = self.pc;
        let program = self.program;
        let instruction = program.code.get(pc).ok_or(Error {
            pc,
            kind: ErrorKind::ProgramOverrun,
        })?;
        if self.options.trace {
            eprintln!(
                "[trace] {:08} {:<24} stack: {}",
                pc,
                instruction.to_string(),
                self.memory.stack.len()
            );
        }
        self.pc = self
            .exec(instruction)
            .map_err(|kind| Error { pc, kind })?;
        Ok(if self.running {
            StepResult::Continue
        } else {
            StepResult::Halted
        })
    }

    fn jump_target(&self, label: &str) -> std::result::Result<usize, ErrorKind> {
        self.labels
            .resolve(label)
            .ok_or_else(|| ErrorKind::UnresolvedLabel(label.into()))
    }

    /// executes an instruction and returns the next pc
    fn exec(&mut self, instruction: &Instruction) -> std::result::Result<usize, ErrorKind> {
        use Instruction::*;
        let mem = &mut self.memory;
        let next = self.pc + 1;

        match instruction {
            Push(val) => mem.push(val.clone()),
            Pop => {
                mem.pop()?;
            }
            Neg => {
                let val = mem.pop()?;
                mem.push(ops::unary(Operator::Neg, val)?);
            }
            Add | Sub | Mul | Div | Mod | Exp | And | Or | Xor | Lt | Gt | Le | Ge | Eq | Ne => {
                let Some(op) = instruction.operator() else {
                    bug!("{} has no operator", instruction);
                };
                let right = mem.pop()?;
                let left = mem.pop()?;
                mem.push(ops::binary(op, left, right)?);
            }
            Print | Println => {
                let val = mem.pop()?;
                let text = decode_escapes(&val.to_string());
                if matches!(instruction, Println) {
                    writeln!(self.out, "{}", text)?;
                } else {
                    write!(self.out, "{}", text)?;
                }
            }
            Label(_) => {}
            Jmp(label) => return self.jump_target(label),
            Jmpz(label) => match mem.pop()? {
                Value::Bool(false) => return self.jump_target(label),
                Value::Bool(true) => {}
                other => return Err(ErrorKind::NonBooleanCondition(other.kind())),
            },
            Instruction::Call(CallTarget { label, argc }) => {
                if mem.frames.len() >= self.options.max_frames {
                    return Err(ErrorKind::StackOverflow);
                }
                mem.push_frame(next, *argc)?;
                return self.jump_target(label);
            }
            Return => return mem.pop_frame(),
            StoreGlobal(slot) => mem.store_global(*slot)?,
            LoadGlobal(slot) => mem.load_global(*slot)?,
            StoreLocal(slot) => mem.store_local(*slot)?,
            LoadLocal(slot) => mem.load_local(*slot)?,
            Halt => {
                self.running = false;
                return Ok(self.pc);
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileOptions};
    use crate::parser::parse;

    fn run_program(program: &Program) -> Result<String> {
        let mut out = vec![];
        run(program, &mut out, &VmOptions::default())?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn run_src(src: &str) -> Result<String> {
        let program = compile(&parse(src).unwrap(), &CompileOptions::default()).unwrap();
        run_program(&program)
    }

    fn num(x: f64) -> Instruction {
        Instruction::Push(Value::Number(x))
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run_src("print 2 * 9 + 13").unwrap(), "31");
        assert_eq!(run_src("println 7 / 2\nprint -2 ^ 2").unwrap(), "3.5\n-4");
        assert_eq!(run_src("print 'a' + 1 + true").unwrap(), "a1true");
    }

    #[test]
    fn globals_and_control_flow() {
        assert_eq!(run_src("x := 5; print x").unwrap(), "5");
        assert_eq!(
            run_src("if 1 > 0 then print \"yes\" else print \"no\" end").unwrap(),
            "yes"
        );
        assert_eq!(
            run_src("i := 0; while i < 3 do print i; i := i + 1 end").unwrap(),
            "012"
        );
    }

    #[test]
    fn escapes_are_decoded_when_printing() {
        assert_eq!(run_src(r"print 'a\tb\n'").unwrap(), "a\tb\n");
    }

    #[test]
    fn block_locals_keep_the_stack_balanced() {
        let src = "
            x := 0
            while x < 3 do
                a := x * 2
                if a > 2 then
                    b := a + 1
                    print b
                end
                x := x + 1
            end";
        let program = compile(&parse(src).unwrap(), &CompileOptions::default()).unwrap();
        let mut vm = Vm::new(&program, vec![], VmOptions::default()).unwrap();
        vm.run().unwrap();
        assert!(vm.memory().stack.is_empty());
        assert_eq!(String::from_utf8(vm.into_output()).unwrap(), "5");
    }

    #[test]
    fn recursion_uses_frames() {
        let src = "
            func fib(n)
                if n < 2 then ret n end
                ret fib(n - 1) + fib(n - 2)
            end
            println fib(15)";
        assert_eq!(run_src(src).unwrap(), "610\n");
    }

    #[test]
    fn functions_called_from_blocks() {
        let src = "
            func add(a, b)
                local sum := a + b
                ret sum
            end
            if true then
                x := 10
                y := add(x, 5)
                print y
                print x
            end";
        assert_eq!(run_src(src).unwrap(), "1510");
    }

    #[test]
    fn implicit_return_value_is_false() {
        assert_eq!(run_src("func f() x := 1 end\nprint f()").unwrap(), "false");
    }

    #[test]
    fn for_loops() {
        assert_eq!(run_src("for i := 1, 4 do print i end").unwrap(), "1234");
        assert_eq!(run_src("for i := 3, 1 do print i end").unwrap(), "321");
        assert_eq!(run_src("for i := 0, 10, 5 do print i end").unwrap(), "0510");
        assert_eq!(run_src("for i := 1, 0, 1 do print i end").unwrap(), "");
    }

    #[test]
    fn logical_operators_short_circuit() {
        let src = "
            func loud()
                print 'called'
                ret true
            end
            print false and loud()
            print true or loud()
            print true and loud()";
        assert_eq!(run_src(src).unwrap(), "falsetruecalledtrue");
    }

    #[test]
    fn non_boolean_conditions_fail() {
        let err = run_src("if 1 then print 1 end").unwrap_err();
        assert_eq!(err.pc, 1);
        assert!(matches!(
            err.kind,
            ErrorKind::NonBooleanCondition(ValueKind::Number)
        ));
        assert_eq!(err.to_string(), "[PC 1]: Condition must be a BOOL, found NUMBER.");
    }

    #[test]
    fn operator_errors_carry_the_pc() {
        let err = run_src("x := 1\nprint x / 0").unwrap_err();
        assert_eq!(err.to_string(), "[PC 4]: Division by zero.");
        let err = run_src("print 1 < 'a'").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Op(OpError::Operands { .. })));
    }

    #[test]
    fn unresolved_labels_fail_before_execution() {
        let program = Program::new(vec![
            Instruction::Push(Value::from("side effect")),
            Instruction::Println,
            Instruction::Jmp("nowhere".into()),
        ]);
        let mut out = vec![];
        let err = run(&program, &mut out, &VmOptions::default()).unwrap_err();
        assert_eq!(err.pc, 2);
        assert!(out.is_empty());
    }

    #[test]
    fn deep_recursion_overflows() {
        let src = "func f(n) ret f(n + 1) end\nprint f(0)";
        let program = compile(&parse(src).unwrap(), &CompileOptions::default()).unwrap();
        let options = VmOptions {
            max_frames: 50,
            ..Default::default()
        };
        let err = run(&program, vec![], &options).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::StackOverflow));
    }

    #[test]
    fn stepping() {
        let program = Program::new(vec![num(1.0), Instruction::Pop, Instruction::Halt]);
        let mut vm = Vm::new(&program, vec![], VmOptions::default()).unwrap();
        assert_eq!(vm.step().unwrap(), StepResult::Continue);
        assert_eq!(vm.memory().stack, vec![Value::Number(1.0)]);
        assert_eq!(vm.step().unwrap(), StepResult::Continue);
        assert_eq!(vm.step().unwrap(), StepResult::Halted);
        assert!(!vm.is_running());
        assert_eq!(vm.pc(), 2);
        assert_eq!(vm.step().unwrap(), StepResult::Halted);
    }

    #[test]
    fn running_off_the_end_fails() {
        let program = Program::new(vec![num(1.0)]);
        let err = run(&program, vec![], &VmOptions::default()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ProgramOverrun));
        assert_eq!(err.pc, 1);
    }
}
