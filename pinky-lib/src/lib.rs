//! What you need to do to execute a script is the following:
//! 1. load a source file into a string.
//! 1. convert it to an ast using [`parser::parse`]
//! 1. either hand the ast to [`interpreter::interpret`], or
//! 1. compile it to a [`core::Program`] using [`compiler::compile`], which calls the
//!    `.compile()` method that every ast node gets from the [`compiler::Compilable`] trait.
//!    A program can be stored with [`core::Program::to_bytes`] and loaded again with
//!    [`core::Program::from_bytes`]
//! 1. run the program with [`vm::run`], or create a [`vm::Vm`] and call
//!    [`vm::Vm::step`] in a loop:
//!
//!    ```
//!    use pinky_lib::{compiler, parser, vm};
//!
//!    let ast = parser::parse("print 2 * 9 + 13").unwrap();
//!    let program = compiler::compile(&ast, &Default::default()).unwrap();
//!    let mut vm = vm::Vm::new(&program, vec![], Default::default()).unwrap();
//!    while vm.step().unwrap() == vm::StepResult::Continue {}
//!    assert_eq!(vm.into_output(), b"31");
//!    ```
//!
//! The functions in this module do all of that in one go.

use thiserror::Error;

use std::io::Write;

pub mod compiler;
pub mod core;
pub mod interpreter;
pub mod parser;
pub mod utils;
pub mod vm;

use crate::compiler::CompileOptions;
use crate::core::Program;
use crate::interpreter::InterpreterOptions;
use crate::vm::VmOptions;

/// Any error that can stop a script
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] parser::ParseError),

    #[error(transparent)]
    Compile(#[from] compiler::CompileError),

    #[error(transparent)]
    Vm(#[from] vm::Error),

    #[error(transparent)]
    Interpreter(#[from] interpreter::Error),

    #[error(transparent)]
    Load(#[from] core::LoadError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// parses and compiles source code
pub fn compile_source(src: &str, options: &CompileOptions) -> Result<Program> {
    let ast = parser::parse(src)?;
    Ok(compiler::compile(&ast, options)?)
}

/// compiles source code and runs it on the vm
pub fn run_source<W: Write>(
    src: &str,
    out: W,
    compile_options: &CompileOptions,
    vm_options: &VmOptions,
) -> Result<()> {
    let program = compile_source(src, compile_options)?;
    Ok(vm::run(&program, out, vm_options)?)
}

/// runs source code with the tree walking interpreter
pub fn interpret_source<W: Write>(src: &str, out: W, options: &InterpreterOptions) -> Result<()> {
    let ast = parser::parse(src)?;
    Ok(interpreter::interpret(&ast, out, options)?)
}

/// loads a bytecode file's content and runs it on the vm
pub fn run_bytecode<W: Write>(bytes: &[u8], out: W, options: &VmOptions) -> Result<()> {
    let program = Program::from_bytes(bytes)?;
    Ok(vm::run(&program, out, options)?)
}
