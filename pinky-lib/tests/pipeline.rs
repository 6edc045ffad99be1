use pinky_lib::compiler::{compile, CompileErrorKind, CompileOptions};
use pinky_lib::core::{Instruction, Program};
use pinky_lib::interpreter::{interpret, InterpreterOptions};
use pinky_lib::parser::parse;
use pinky_lib::vm::{self, LabelTable, VmOptions};
use pinky_lib::{compile_source, interpret_source, run_bytecode, run_source, Error};

fn on_vm(src: &str) -> String {
    let mut out = vec![];
    run_source(
        src,
        &mut out,
        &CompileOptions::default(),
        &VmOptions::default(),
    )
    .unwrap();
    String::from_utf8(out).unwrap()
}

fn on_interpreter(src: &str) -> String {
    let mut out = vec![];
    interpret_source(src, &mut out, &InterpreterOptions::default()).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn scenarios() {
    let cases = [
        ("print 2 * 9 + 13", "31"),
        ("x := 5; print x", "5"),
        ("if 1 > 0 then print \"yes\" else print \"no\" end", "yes"),
        ("i := 0; while i < 3 do print i; i := i + 1 end", "012"),
        ("print 42", "42"),
        ("print 4.0", "4"),
        ("print 2.5", "2.5"),
    ];
    for (src, expected) in cases {
        assert_eq!(on_vm(src), expected, "{}", src);
        assert_eq!(on_interpreter(src), expected, "{}", src);
    }
}

#[test]
fn both_engines_agree_on_numbers() {
    let exprs = [
        "1 + 2 * 3 - 4 / 8",
        "2 ^ 10 % 7",
        "-(3 - 10) * 1.5",
        "17 % -5",
        "((((1))))",
        "100 / 3 / 3",
    ];
    for expr in exprs {
        let src = format!("print {}", expr);
        assert_eq!(on_vm(&src), on_interpreter(&src), "{}", expr);
    }
}

#[test]
fn block_locals_are_not_visible_afterwards() {
    for src in [
        "if true then a := 1 end\nprint a",
        "i := 0\nwhile i < 1 do a := 1 i := i + 1 end\nprint a",
    ] {
        let err = compile_source(src, &CompileOptions::default()).unwrap_err();
        let err = match err {
            Error::Compile(err) => err,
            other => panic!("expected a compile error, got {:?}", other),
        };
        assert_eq!(err.kind, CompileErrorKind::UndefinedVariable("a".into()));
        assert!(err.to_string().starts_with("[Line "));
    }
    assert_eq!(on_vm("g := 1\nif true then g := 2 end\nprint g"), "2");
}

#[test]
fn for_bounds_see_the_enclosing_variable() {
    let cases = [
        ("i := 5\nfor i := 1, i do print i end", "12345"),
        ("s := 2\nfor s := 0, 6, s do print s end", "0246"),
        (
            "if true then\n  local n := 2\n  for n := n, 0 do print n end\nend",
            "210",
        ),
    ];
    for (src, expected) in cases {
        assert_eq!(on_vm(src), expected, "{}", src);
        assert_eq!(on_interpreter(src), expected, "{}", src);
    }
}

#[test]
fn for_variable_shadows_the_enclosing_one() {
    let src = "i := 10\nfor i := 1, 3 do end\nprint i";
    assert_eq!(on_vm(src), "10");
    assert_eq!(on_interpreter(src), "10");
}

#[test]
fn arity_is_enforced_at_call_sites() {
    let src = "func add(a, b)\n  ret a + b\nend\nprint add(1, 2, 3)";
    let err = compile_source(src, &CompileOptions::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "[Line 4]: Function expected 2 params but 3 args were passed"
    );
    assert_eq!(on_vm("func add(a, b)\n  ret a + b\nend\nprint add(1, 2)"), "3");
}

#[test]
fn label_resolution_is_idempotent() {
    let src = "func f(n)\n  if n > 0 then ret f(n - 1) end\n  ret 0\nend\nwhile false do end\nprint f(3)";
    let program = compile_source(src, &CompileOptions::default()).unwrap();
    let first = LabelTable::scan(&program.code).unwrap();
    let second = LabelTable::scan(&program.code).unwrap();
    assert_eq!(first, second);
    let vm = vm::Vm::new(&program, vec![], VmOptions::default()).unwrap();
    assert_eq!(vm.labels(), &first);
    for (pc, instruction) in program.code.iter().enumerate() {
        if let Instruction::Label(name) = instruction {
            assert_eq!(first.resolve(name), Some(pc));
        }
    }
}

#[test]
fn eager_logic_evaluates_both_operands() {
    let src = "func t()\n  print 'evaluated '\n  ret true\nend\nprint false and t()";
    let eager = CompileOptions {
        short_circuit: false,
    };
    let mut out = vec![];
    run_source(src, &mut out, &eager, &VmOptions::default()).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "evaluated false");
    assert_eq!(on_vm(src), "false");
}

#[test]
fn bytecode_files_run_like_source() {
    let src = "for i := 1, 3 do print i * i end";
    let program = compile_source(src, &CompileOptions::default()).unwrap();
    let bytes = program.to_bytes().unwrap();
    let mut out = vec![];
    run_bytecode(&bytes, &mut out, &VmOptions::default()).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "149");
    assert_eq!(Program::from_bytes(&bytes).unwrap(), program);
}

#[test]
fn runtime_errors_name_the_pc() {
    let ast = parse("x := 'a'\nprint x - 1").unwrap();
    let program = compile(&ast, &CompileOptions::default()).unwrap();
    let err = vm::run(&program, vec![], &VmOptions::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "[PC 4]: Unsupported operator SUB between STRING and NUMBER."
    );
    let err = interpret(&ast, vec![], &InterpreterOptions::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "[Line 2]: Unsupported operator SUB between STRING and NUMBER."
    );
}

#[test]
fn parse_errors_name_the_line() {
    let err = compile_source("x := 1\ny := (2 + ", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(ref e) if e.line == 2), "{}", err);
}
