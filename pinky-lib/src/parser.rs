//! Turns source code into an AST.
//!
//! Lexing and parsing are done by pest with the grammar in `grammar.pest`, this module
//! walks the resulting parse tree and builds the [`Block`](crate::core::Block) that the
//! compiler and the interpreter consume.

use pest::error::{Error as PestError, ErrorVariant, LineColLocation};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::core::*;
use crate::utils::bug;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct PinkyParser;

pub type Pair<'a> = pest::iterators::Pair<'a, Rule>;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("[Line {line}]: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

pub type ParseResult<T> = Result<T, ParseError>;

impl From<PestError<Rule>> for ParseError {
    fn from(e: PestError<Rule>) -> Self {
        let line = match e.line_col {
            LineColLocation::Pos((line, _)) | LineColLocation::Span((line, _), _) => line,
        };
        let message = match e.variant {
            ErrorVariant::ParsingError {
                positives,
                negatives,
            } => parsing_message(&positives, &negatives),
            ErrorVariant::CustomError { message } => message,
        };
        ParseError { line, message }
    }
}

/// like pest's message, but every name is listed once
fn parsing_message(positives: &[Rule], negatives: &[Rule]) -> String {
    match (rule_names(negatives), rule_names(positives)) {
        (neg, pos) if neg.is_empty() && pos.is_empty() => "unknown parsing error".into(),
        (neg, pos) if neg.is_empty() => format!("expected {}", enumerate(&pos)),
        (neg, pos) if pos.is_empty() => format!("unexpected {}", enumerate(&neg)),
        (neg, pos) => format!("unexpected {}; expected {}", enumerate(&neg), enumerate(&pos)),
    }
}

fn rule_names(rules: &[Rule]) -> Vec<String> {
    let mut names = Vec::new();
    for name in rules.iter().map(rule_name) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn enumerate(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [single] => single.clone(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

/// parses a whole source file
pub fn parse(src: &str) -> ParseResult<Block> {
    let mut pairs = PinkyParser::parse(Rule::file, src)?;
    let file = next_pair(&mut pairs);
    let mut inner = file.into_inner();
    let block = parse_block(next_pair(&mut inner))?;
    if !matches!(inner.next().map(|p| p.as_rule()), Some(Rule::EOI)) {
        bug!("a file must end with EOI");
    }
    Ok(block)
}

fn parse_block(pair: Pair) -> ParseResult<Block> {
    assert!(matches!(pair.as_rule(), Rule::block));
    let line = line_of(&pair);
    let stmts = pair
        .into_inner()
        .map(parse_stmt)
        .collect::<ParseResult<_>>()?;
    Ok(Block(line, stmts))
}

fn parse_stmt(pair: Pair) -> ParseResult<Stmt> {
    let line = line_of(&pair);
    let rule = pair.as_rule();
    let print_newline = pair
        .clone()
        .into_inner()
        .next()
        .map(|p| p.as_str() == "println")
        .unwrap_or(false);
    let mut inner = significant(pair.clone());

    Ok(match rule {
        Rule::print_stmt => Stmt::Print {
            line,
            value: parse_expr(next_pair(&mut inner))?,
            newline: print_newline,
        },
        Rule::if_stmt => {
            let test = parse_expr(next_pair(&mut inner))?;
            let then_block = parse_block(next_pair(&mut inner))?;
            let else_block = match inner.next() {
                Some(else_branch) => {
                    let mut else_inner = significant(else_branch);
                    Some(parse_block(next_pair(&mut else_inner))?)
                }
                None => None,
            };
            Stmt::If {
                line,
                test,
                then_block,
                else_block,
            }
        }
        Rule::while_stmt => Stmt::While {
            line,
            test: parse_expr(next_pair(&mut inner))?,
            body: parse_block(next_pair(&mut inner))?,
        },
        Rule::for_stmt => {
            let var = next_pair(&mut inner).as_str().to_owned();
            let start = parse_expr(next_pair(&mut inner))?;
            let end = parse_expr(next_pair(&mut inner))?;
            let mut rest: Vec<Pair> = inner.collect();
            let body = match rest.pop() {
                Some(block) => parse_block(block)?,
                None => bug!("for loop without body"),
            };
            let step = rest.pop().map(parse_expr).transpose()?;
            Stmt::For {
                line,
                var,
                start,
                end,
                step,
                body,
            }
        }
        Rule::func_decl => {
            let name = next_pair(&mut inner).as_str().to_owned();
            let mut rest: Vec<Pair> = inner.collect();
            let body = match rest.pop() {
                Some(block) => parse_block(block)?,
                None => bug!("function declaration without body"),
            };
            let params = rest.iter().map(|p| p.as_str().to_owned()).collect();
            Stmt::FuncDecl(FuncDecl {
                line,
                name,
                params,
                body,
            })
        }
        Rule::ret_stmt => Stmt::Ret {
            line,
            value: parse_expr(next_pair(&mut inner))?,
        },
        Rule::assignment | Rule::local_assign => {
            let name = next_pair(&mut inner).as_str().to_owned();
            let value = parse_expr(next_pair(&mut inner))?;
            if rule == Rule::assignment {
                Stmt::Assign { line, name, value }
            } else {
                Stmt::LocalAssign { line, name, value }
            }
        }
        Rule::call_stmt => Stmt::Call(parse_call(next_pair(&mut inner))?),
        other => bug!("unexpected statement rule: {:?}", other),
    })
}

fn parse_expr(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    Ok(match pair.as_rule() {
        Rule::expr => parse_expr(next_pair(&mut pair.into_inner()))?,
        Rule::or_expr
        | Rule::and_expr
        | Rule::equality
        | Rule::comparison
        | Rule::addition
        | Rule::multiplication => parse_chain(pair)?,
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner);
            if first.as_rule() == Rule::unary_op {
                let op = match first.as_str() {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    _ => UnaryOp::Not,
                };
                Expr::Unary {
                    line,
                    op,
                    operand: Box::new(parse_expr(next_pair(&mut inner))?),
                }
            } else {
                parse_expr(first)?
            }
        }
        Rule::exponent => {
            let mut inner = pair.into_inner();
            let base = parse_expr(next_pair(&mut inner))?;
            match inner.next() {
                Some(power) => Expr::Binary {
                    line,
                    op: BinaryOp::Exp,
                    left: Box::new(base),
                    right: Box::new(parse_expr(power)?),
                },
                None => base,
            }
        }
        Rule::integer => {
            let value = pair.as_str().parse().map_err(|_| ParseError {
                line,
                message: format!("Integer literal {} is too large.", pair.as_str()),
            })?;
            Expr::IntLit(line, value)
        }
        Rule::float => {
            let value = pair.as_str().parse().map_err(|_| ParseError {
                line,
                message: format!("Invalid float literal {}.", pair.as_str()),
            })?;
            Expr::FloatLit(line, value)
        }
        Rule::boolean => Expr::BoolLit(line, pair.as_str() == "true"),
        Rule::string => {
            let quoted = pair.as_str();
            Expr::StrLit(line, quoted[1..quoted.len() - 1].to_owned())
        }
        Rule::grouping => Expr::Grouping(
            line,
            Box::new(parse_expr(next_pair(&mut pair.into_inner()))?),
        ),
        Rule::func_call => Expr::Call(parse_call(pair)?),
        Rule::ident => Expr::Ident(line, pair.as_str().to_owned()),
        other => bug!("unexpected expression rule: {:?}", other),
    })
}

/// parses a left associative chain like `a + b - c`
fn parse_chain(pair: Pair) -> ParseResult<Expr> {
    let mut inner = pair.into_inner();
    let mut lhs = parse_expr(next_pair(&mut inner))?;
    while let Some(op) = inner.next() {
        let line = line_of(&op);
        let rhs = Box::new(parse_expr(next_pair(&mut inner))?);
        let left = Box::new(lhs);
        let op = match (op.as_rule(), op.as_str()) {
            (Rule::kw_or, _) => Err(LogicalOp::Or),
            (Rule::kw_and, _) => Err(LogicalOp::And),
            (_, "==") => Ok(BinaryOp::Eq),
            (_, "~=") => Ok(BinaryOp::Ne),
            (_, ">") => Ok(BinaryOp::Gt),
            (_, ">=") => Ok(BinaryOp::Ge),
            (_, "<") => Ok(BinaryOp::Lt),
            (_, "<=") => Ok(BinaryOp::Le),
            (_, "+") => Ok(BinaryOp::Add),
            (_, "-") => Ok(BinaryOp::Sub),
            (_, "*") => Ok(BinaryOp::Mul),
            (_, "/") => Ok(BinaryOp::Div),
            (_, "%") => Ok(BinaryOp::Mod),
            (_, other) => bug!("unexpected operator: {}", other),
        };
        lhs = match op {
            Ok(op) => Expr::Binary {
                line,
                op,
                left,
                right: rhs,
            },
            Err(op) => Expr::Logical {
                line,
                op,
                left,
                right: rhs,
            },
        };
    }
    Ok(lhs)
}

fn parse_call(pair: Pair) -> ParseResult<Call> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner).as_str().to_owned();
    let args = inner.map(parse_expr).collect::<ParseResult<_>>()?;
    Ok(Call { line, name, args })
}

/// the children of a pair without the keywords
fn significant<'a>(pair: Pair<'a>) -> impl Iterator<Item = Pair<'a>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn is_keyword(rule: Rule) -> bool {
    use Rule::*;
    matches!(
        rule,
        print_kw
            | kw_if
            | kw_then
            | kw_else
            | kw_end
            | kw_while
            | kw_do
            | kw_for
            | kw_func
            | kw_ret
            | kw_local
            | kw_and
            | kw_or
    )
}

fn next_pair<'a>(pairs: &mut impl Iterator<Item = Pair<'a>>) -> Pair<'a> {
    match pairs.next() {
        Some(pair) => pair,
        None => bug!("the parse tree is missing a child"),
    }
}

fn line_of(pair: &Pair) -> usize {
    pair.as_span().start_pos().line_col().0
}

/// names used for rules in error messages
fn rule_name(rule: &Rule) -> String {
    use Rule::*;
    match rule {
        EOI => "end of input",
        block => "statement",
        expr | or_expr | and_expr | equality | comparison | addition | multiplication
        | unary | exponent => "expression",
        print_kw => "'print'",
        kw_if => "'if'",
        kw_then => "'then'",
        kw_else => "'else'",
        kw_end => "'end'",
        kw_while => "'while'",
        kw_do => "'do'",
        kw_for => "'for'",
        kw_func => "'func'",
        kw_ret => "'ret'",
        kw_local => "'local'",
        kw_and => "'and'",
        kw_or => "'or'",
        eq_op | cmp_op | add_op | mul_op => "operator",
        unary_op => "unary operator",
        ident => "identifier",
        integer | float => "number",
        string => "string",
        func_call => "function call",
        other => return format!("{:?}", other),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_stmt(src: &str) -> Stmt {
        let Block(_, mut stmts) = parse(src).unwrap();
        assert_eq!(stmts.len(), 1, "{:#?}", stmts);
        stmts.remove(0)
    }

    fn print_value(src: &str) -> Expr {
        match single_stmt(src) {
            Stmt::Print { value, .. } => value,
            other => panic!("expected print, found {:#?}", other),
        }
    }

    #[test]
    fn precedence() {
        let expr = print_value("print 2 * 9 + 13");
        let Expr::Binary { op, left, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Mul, .. }));
        assert_eq!(*right, Expr::IntLit(1, 13));
    }

    #[test]
    fn exponent_is_right_associative_and_binds_tighter_than_minus() {
        let expr = print_value("print -2 ^ 3 ^ 2");
        let Expr::Unary { op: UnaryOp::Neg, operand, .. } = expr else {
            panic!("expected negation");
        };
        let Expr::Binary { op: BinaryOp::Exp, right, .. } = *operand else {
            panic!("expected exponent");
        };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Exp, .. }));
    }

    #[test]
    fn literals() {
        assert_eq!(print_value("print 7.7"), Expr::FloatLit(1, 7.7));
        assert_eq!(print_value("print false"), Expr::BoolLit(1, false));
        assert_eq!(print_value("print 42"), Expr::IntLit(1, 42));
        assert_eq!(
            print_value(r#"print "a\nb""#),
            Expr::StrLit(1, r"a\nb".into())
        );
        assert_eq!(print_value("print 'single'"), Expr::StrLit(1, "single".into()));
    }

    #[test]
    fn logical_and_comparison() {
        let expr = print_value("print 1 < 2 and ~false or x ~= y");
        let Expr::Logical { op: LogicalOp::Or, left, right, .. } = expr else {
            panic!("expected or");
        };
        assert!(matches!(*left, Expr::Logical { op: LogicalOp::And, .. }));
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Ne, .. }));
    }

    #[test]
    fn statements_separated_by_semicolons_and_newlines() {
        let Block(_, stmts) = parse("x := 5; print x\nprintln x -- comment\n").unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(matches!(&stmts[0], Stmt::Assign { name, .. } if name == "x"));
        assert!(matches!(stmts[1], Stmt::Print { newline: false, .. }));
        assert!(matches!(stmts[2], Stmt::Print { newline: true, line: 2, .. }));
    }

    #[test]
    fn if_else() {
        let stmt = single_stmt("if 1 > 0 then print \"yes\" else print \"no\" end");
        let Stmt::If { then_block, else_block, .. } = stmt else {
            panic!("expected if");
        };
        assert_eq!(then_block.1.len(), 1);
        assert_eq!(else_block.map(|b| b.1.len()), Some(1));
    }

    #[test]
    fn while_and_for() {
        let stmt = single_stmt("while i < 3 do print i; i := i + 1 end");
        assert!(matches!(stmt, Stmt::While { body: Block(_, ref s), .. } if s.len() == 2));

        let stmt = single_stmt("for i := 1, 10 do print i end");
        assert!(matches!(stmt, Stmt::For { step: None, .. }));
        let stmt = single_stmt("for i := 10, 1, -2 do print i end");
        assert!(matches!(stmt, Stmt::For { step: Some(_), ref var, .. } if var == "i"));
    }

    #[test]
    fn functions() {
        let src = "func add(a, b)\n  ret a + b\nend\nprint add(1, 2)\nnoop()";
        let Block(_, stmts) = parse(src).unwrap();
        let Stmt::FuncDecl(decl) = &stmts[0] else {
            panic!("expected a function");
        };
        assert_eq!(decl.name, "add");
        assert_eq!(decl.params, ["a", "b"]);
        assert!(matches!(decl.body.1[0], Stmt::Ret { line: 2, .. }));
        assert!(matches!(&stmts[1], Stmt::Print { value: Expr::Call(c), .. } if c.args.len() == 2));
        assert!(matches!(&stmts[2], Stmt::Call(c) if c.args.is_empty() && c.line == 5));
    }

    #[test]
    fn local_assignment() {
        let stmt = single_stmt("local x := 1");
        assert!(matches!(stmt, Stmt::LocalAssign { .. }));
    }

    #[test]
    fn keywords_are_no_identifiers() {
        assert!(parse("end := 3").is_err());
        assert!(matches!(single_stmt("ending := 3"), Stmt::Assign { .. }));
    }

    #[test]
    fn errors_carry_the_line() {
        let err = parse("x := 1\nif x then\nprint x").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.to_string().starts_with("[Line 3]: "), "{}", err);

        let err = parse("x := 1\ny := \"unterminated").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn error_messages_name_each_rule_once() {
        let err = parse("print 1e3").unwrap_err();
        let expected = match err.message.rsplit_once("expected ") {
            Some((_, rest)) => rest.to_string(),
            None => panic!("no expectation in {}", err.message),
        };
        let names: Vec<_> = expected
            .split(", ")
            .flat_map(|part| part.split(" or "))
            .map(|name| name.trim_start_matches("or ").trim())
            .filter(|name| !name.is_empty())
            .collect();
        for (i, name) in names.iter().enumerate() {
            assert!(!names[..i].contains(name), "{} repeated in {}", name, err);
        }
    }

    #[test]
    fn parsing_messages() {
        use Rule::*;
        assert_eq!(
            parsing_message(&[add_op, mul_op, ident], &[]),
            "expected operator or identifier"
        );
        assert_eq!(
            parsing_message(&[EOI, eq_op, cmp_op, string], &[]),
            "expected end of input, operator, or string"
        );
        assert_eq!(parsing_message(&[], &[ident]), "unexpected identifier");
    }

    #[test]
    fn huge_integers_are_rejected() {
        let err = parse("print 99999999999999999999").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
