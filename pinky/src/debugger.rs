use std::io::{stdout, Stdout, Write};

use anyhow::{anyhow, bail, Result};
use crossterm::{self as ct, terminal};
use pinky_lib::core::Program;
use pinky_lib::vm::{StepResult, Vm, VmOptions};
use rustyline::{error::ReadlineError, DefaultEditor};

#[derive(PartialEq, Clone)]
enum UserCommand {
    Next,
    Continue,
    LastCommand,
    ShowStack,
    ShowGlobals,
    ShowStackAt(usize),
    ShowGlobalAt(usize),
    Quit,
}

/// steps through a program on the alternate screen
pub fn run(program: &Program, src: &str, options: &VmOptions) -> Result<()> {
    let mut stdout = stdout();
    ct::execute!(stdout, terminal::EnterAlternateScreen)?;
    let res = debug(program, src, options, &mut stdout);
    ct::execute!(stdout, terminal::LeaveAlternateScreen)?;
    let output = res?;
    print!("{}", output);
    stdout.flush()?;
    Ok(())
}

/// returns everything the program printed
fn debug(program: &Program, src: &str, options: &VmOptions, stdout: &mut Stdout) -> Result<String> {
    let mut vm = Vm::new(program, vec![], options.clone())?;
    let mut rl = DefaultEditor::new()?;
    let mut last_cmd = None;

    use UserCommand::*;
    loop {
        render_state(stdout, &vm, src)?;
        stdout.flush()?;
        let mut cmd = read_line(&mut rl)?;
        if cmd == LastCommand {
            if let Some(last) = &last_cmd {
                cmd = last.clone();
            }
        }
        match &cmd {
            LastCommand => {
                // there was no last command, so this is a noop
            }
            Next => {
                if step(&mut vm)? == StepResult::Halted {
                    break;
                }
            }
            Continue => while step(&mut vm)? == StepResult::Continue {},
            ShowStack => {
                for (i, elem) in vm.memory().stack.iter().enumerate().rev() {
                    println!("{}: {:?}", i, elem);
                }
            }
            ShowGlobals => {
                for (i, elem) in vm.memory().globals.iter().enumerate() {
                    println!("{} {}: {:?}", i, global_name(program, i), elem);
                }
            }
            ShowStackAt(i) => match vm.memory().stack.get(*i) {
                Some(elem) => println!("{:?}", elem),
                None => println!("Invalid stack index"),
            },
            ShowGlobalAt(i) => match vm.memory().globals.get(*i) {
                Some(elem) => println!("{:?}", elem),
                None => println!("Invalid global slot"),
            },
            Quit => break,
        }
        if !vm.is_running() {
            break;
        }
        last_cmd = Some(cmd);
    }
    Ok(String::from_utf8_lossy(vm.output()).into_owned())
}

fn step(vm: &mut Vm<Vec<u8>>) -> Result<StepResult> {
    Ok(vm.step()?)
}

fn global_name(program: &Program, slot: usize) -> &str {
    program
        .debug
        .globals
        .get(slot)
        .map(String::as_str)
        .unwrap_or("?")
}

fn read_line(rl: &mut DefaultEditor) -> Result<UserCommand> {
    loop {
        let line = rl.readline("> ");
        use ReadlineError::*;
        match line {
            Ok(line) => match parse_line(&line) {
                Ok(cmd) => return Ok(cmd),
                Err(e) => eprintln!("Error: {}", e),
            },
            Err(Interrupted | Eof) => return Ok(UserCommand::Quit),
            Err(other) => return Err(other.into()),
        }
    }
}

fn parse_line(line: &str) -> Result<UserCommand> {
    use UserCommand::*;
    let elems: Vec<_> = line.split_whitespace().collect();

    match elems.first().copied() {
        None => Ok(LastCommand),
        Some("n" | "next") => Ok(Next),
        Some("c" | "continue") => Ok(Continue),
        Some("q" | "quit") => Ok(Quit),
        Some("s" | "show") => parse_show(&elems[1..]),
        Some(_) => Err(anyhow!("Invalid Command")),
    }
}

fn parse_show(elems: &[&str]) -> Result<UserCommand> {
    match elems {
        [] => Err(anyhow!("show needs an argument")),
        ["s" | "stack"] => Ok(UserCommand::ShowStack),
        ["g" | "globals"] => Ok(UserCommand::ShowGlobals),
        [what, "at", idx] => {
            let mker: fn(usize) -> UserCommand = match *what {
                "s" | "stack" => UserCommand::ShowStackAt,
                "g" | "globals" => UserCommand::ShowGlobalAt,
                _ => bail!("Invalid word after show"),
            };
            Ok(mker(idx.parse()?))
        }
        _ => bail!("Invalid Command"),
    }
}

struct Rect {
    w: u16,
    h: u16,
    x: u16,
    y: u16,
}

struct Rects {
    bc: Rect,
    src: Rect,
    stack: Rect,
    globals: Rect,
    output: Rect,
}

impl Rect {
    pub fn render(
        &self,
        stdout: &mut Stdout,
        lines: impl IntoIterator<Item = String>,
    ) -> Result<()> {
        let wu = self.w as usize;
        let mut counter = 0;
        for line in lines.into_iter().take(self.h.into()) {
            ct::queue!(stdout, ct::cursor::MoveTo(self.x, self.y + counter))?;
            let line: String = line.chars().take(wu).collect();
            let pad = wu - line.chars().count();
            write!(stdout, "{}{}", line, " ".repeat(pad))?;
            counter += 1;
        }
        while counter < self.h {
            ct::queue!(stdout, ct::cursor::MoveTo(self.x, self.y + counter))?;
            write!(stdout, "{}", " ".repeat(wu))?;
            counter += 1;
        }
        Ok(())
    }
}

fn render_state(stdout: &mut Stdout, vm: &Vm<Vec<u8>>, src: &str) -> Result<()> {
    let curr_cursor = ct::cursor::position()?;
    let rects = compute_rects(terminal::size()?);
    let program = vm.program();
    let pc = vm.pc();

    render_src(stdout, &rects.src, src, program.line_of(pc))?;
    render_bc(stdout, &rects.bc, program, pc)?;
    render_stack(stdout, &rects.stack, vm)?;
    render_globals(stdout, &rects.globals, vm)?;
    let output = String::from_utf8_lossy(vm.output());
    let output_lines: Vec<String> = output.lines().map(String::from).collect();
    let skip = output_lines.len().saturating_sub(rects.output.h as usize);
    rects
        .output
        .render(stdout, output_lines.into_iter().skip(skip))?;
    ct::queue!(stdout, ct::cursor::MoveTo(curr_cursor.0, curr_cursor.1))?;
    Ok(())
}

fn render_src(stdout: &mut Stdout, rect: &Rect, src: &str, line: Option<usize>) -> Result<()> {
    let current = line.unwrap_or(0);
    let lines = src.lines().enumerate().map(|(i, l)| {
        let marker = if i + 1 == current { ">" } else { " " };
        format!("{}{:4} {}", marker, i + 1, l)
    });
    // keep the current line in view
    let skip = current.saturating_sub(rect.h as usize / 2);
    rect.render(stdout, lines.skip(skip))
}

fn render_bc(stdout: &mut Stdout, rect: &Rect, program: &Program, pc: usize) -> Result<()> {
    let lines = program
        .code
        .iter()
        .enumerate()
        .skip(pc)
        .map(|(i, inst)| format!("{:08} {}", i, inst));
    rect.render(stdout, lines)
}

fn render_stack(stdout: &mut Stdout, rect: &Rect, vm: &Vm<Vec<u8>>) -> Result<()> {
    let mem = vm.memory();
    let base = mem.base();
    let stack_lines = mem.stack.iter().enumerate().rev().map(|(i, entry)| {
        let marker = if i == base && !mem.frames.is_empty() { "*" } else { " " };
        format!("{}{}: {:?}", marker, i, entry)
    });
    let lines = std::iter::once(format!("Stack ({} frames):", mem.frames.len())).chain(stack_lines);
    rect.render(stdout, lines)
}

fn render_globals(stdout: &mut Stdout, rect: &Rect, vm: &Vm<Vec<u8>>) -> Result<()> {
    let program = vm.program();
    let lines = std::iter::once("Globals:".into()).chain(
        vm.memory().globals.iter().enumerate().map(|(i, g)| match g {
            Some(val) => format!("{} {}: {:?}", i, global_name(program, i), val),
            None => format!("{} {}: -", i, global_name(program, i)),
        }),
    );
    rect.render(stdout, lines)
}

fn compute_rects((term_w, term_h): (u16, u16)) -> Rects {
    let width14 = term_w / 4;
    let width12 = term_w / 2;
    let width34 = term_w * 3 / 4;
    let height35 = term_h * 3 / 5;
    let height15 = term_h / 5;
    let height12 = term_h / 2;

    Rects {
        src: Rect {
            x: 0,
            y: 0,
            w: width12,
            h: height35,
        },
        output: Rect {
            x: 0,
            y: height35,
            w: width34,
            h: height15,
        },
        bc: Rect {
            x: width12,
            y: 0,
            w: width14,
            h: height35,
        },
        stack: Rect {
            x: width34,
            y: 0,
            w: width14,
            h: height12,
        },
        globals: Rect {
            x: width34,
            y: height12,
            w: width14,
            h: height12,
        },
    }
}
