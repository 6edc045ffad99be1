use anyhow::{Context, Result};
use clap::Parser;

use pinky_lib::compiler::CompileOptions;
use pinky_lib::core::Program;
use pinky_lib::interpreter::{self, InterpreterOptions};
use pinky_lib::vm::{self, VmOptions};
use pinky_lib::{compiler, parser};

use std::fs;
use std::io::{stdout, BufWriter};
use std::path::PathBuf;

#[cfg(feature = "dev")]
mod debugger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// the script to run, or a bytecode file if --bytecode is given
    script: PathBuf,

    /// run the script with the tree walking interpreter instead of the vm
    #[arg(short, long, conflicts_with_all = ["bytecode", "emit"])]
    interpret: bool,

    /// evaluate both operands of `and` and `or`
    #[arg(long)]
    eager_logic: bool,

    /// print every executed instruction to stderr
    #[arg(short, long)]
    trace: bool,

    /// the maximum number of nested function calls
    #[arg(long, default_value_t = VmOptions::default().max_frames)]
    max_frames: usize,

    /// write the compiled program to this file instead of running it
    #[arg(short, long, value_name = "FILE")]
    emit: Option<PathBuf>,

    /// the script is a bytecode file that was written with --emit
    #[arg(short, long)]
    bytecode: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 'a', long)]
    show_ast: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 's', long)]
    show_bytecode: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 'd', long)]
    debug_bytecode: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let vm_options = VmOptions {
        trace: cli.trace,
        max_frames: cli.max_frames,
    };

    if cli.bytecode {
        let bytes = fs::read(&cli.script)
            .with_context(|| format!("reading {}", cli.script.display()))?;
        let program = Program::from_bytes(&bytes)?;
        return execute(cli, &program, None, &vm_options);
    }

    let src = fs::read_to_string(&cli.script)
        .with_context(|| format!("reading {}", cli.script.display()))?;
    let ast = parser::parse(&src)?;

    #[cfg(feature = "dev")]
    if cli.show_ast {
        println!("{:#?}", ast);
        return Ok(());
    }

    if cli.interpret {
        let out = BufWriter::new(stdout().lock());
        interpreter::interpret(&ast, out, &InterpreterOptions::default())?;
        return Ok(());
    }

    let compile_options = CompileOptions {
        short_circuit: !cli.eager_logic,
    };
    let program = compiler::compile(&ast, &compile_options)?;

    if let Some(path) = &cli.emit {
        fs::write(path, program.to_bytes()?)
            .with_context(|| format!("writing {}", path.display()))?;
        return Ok(());
    }

    execute(cli, &program, Some(&src), &vm_options)
}

#[allow(unused_variables)]
fn execute(cli: &Cli, program: &Program, src: Option<&str>, options: &VmOptions) -> Result<()> {
    #[cfg(feature = "dev")]
    {
        if cli.show_bytecode {
            print!("{}", program);
            return Ok(());
        }
        if cli.debug_bytecode {
            return debugger::run(program, src.unwrap_or_default(), options);
        }
    }

    let out = BufWriter::new(stdout().lock());
    vm::run(program, out, options)?;
    Ok(())
}
