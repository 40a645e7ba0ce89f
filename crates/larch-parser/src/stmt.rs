use std::collections::HashSet;

use crate::ast::{BinOp, Expr, Param, ParamKind, StmtKind, Target};
use crate::error::{ParseError, Result};
use crate::expr::Parser;
use crate::lexer::{tokenize, Tok, Token};
use crate::lines::leading_word;

/// Rewrite `show x` into `show(x)` for registered command names.
pub fn apply_command_syntax(text: &str, commands: &[String]) -> Option<String> {
    let key = leading_word(text);
    if key.is_empty() || !commands.iter().any(|c| c == key) || text.contains('\n') {
        return None;
    }
    let rest = text[key.len()..].trim();
    if rest.is_empty() {
        return Some(format!("{}()", key));
    }
    if rest.starts_with('(') && rest.ends_with(')') {
        return None;
    }
    // Assignments, attribute access and operators keep their usual meaning.
    let first = rest.chars().next().unwrap_or(' ');
    if "=.[,+-*/%<>!&|^)".contains(first) {
        return None;
    }
    Some(format!("{}({})", key, rest))
}

/// Parse a simple (non-block) line, which may hold several `;`-separated
/// statements.
pub fn parse_simple_line(text: &str, line: usize) -> Result<Vec<StmtKind>> {
    let tokens = tokenize(text, line)?;
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.tok {
            Tok::Op("(") | Tok::Op("[") | Tok::Op("{") => depth += 1,
            Tok::Op(")") | Tok::Op("]") | Tok::Op("}") => depth = depth.saturating_sub(1),
            Tok::Op(";") if depth == 0 => {
                if i > start {
                    statements.push(parse_statement(&tokens[start..i], line)?);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() {
        statements.push(parse_statement(&tokens[start..], line)?);
    }
    Ok(statements)
}

fn parse_statement(tokens: &[Token], line: usize) -> Result<StmtKind> {
    let mut p = Parser::new(tokens, line);
    let keyword = match p.peek() {
        Some(Tok::Name(name)) => name.as_str(),
        _ => "",
    };
    let kind = match keyword {
        "pass" => {
            p.bump();
            StmtKind::Pass
        }
        "break" => {
            p.bump();
            StmtKind::Break
        }
        "continue" => {
            p.bump();
            StmtKind::Continue
        }
        "return" => {
            p.bump();
            if p.at_end() {
                StmtKind::Return(None)
            } else {
                StmtKind::Return(Some(p.parse_testlist()?))
            }
        }
        "del" => {
            p.bump();
            let targets = match p.parse_testlist()? {
                Expr::Tuple(items) => items,
                single => vec![single],
            };
            let targets = targets
                .into_iter()
                .map(|e| Target::from_expr(e).map_err(|m| p.error(m)))
                .collect::<Result<Vec<_>>>()?;
            StmtKind::Delete(targets)
        }
        "assert" => {
            p.bump();
            let test = p.parse_expr()?;
            let msg = if p.eat_op(",") {
                Some(p.parse_expr()?)
            } else {
                None
            };
            StmtKind::Assert { test, msg }
        }
        "raise" => {
            p.bump();
            parse_raise(&mut p)?
        }
        "import" => {
            p.bump();
            let mut modules = Vec::new();
            loop {
                let module = parse_dotted(&mut p)?;
                let alias = if p.eat_keyword("as") {
                    Some(p.expect_name()?)
                } else {
                    None
                };
                modules.push((module, alias));
                if !p.eat_op(",") {
                    break;
                }
            }
            StmtKind::Import(modules)
        }
        "from" => {
            p.bump();
            let module = parse_dotted(&mut p)?;
            p.expect_keyword("import")?;
            let parens = p.eat_op("(");
            let mut names = Vec::new();
            loop {
                let name = if p.eat_op("*") {
                    "*".to_string()
                } else {
                    p.expect_name()?
                };
                let alias = if p.eat_keyword("as") {
                    Some(p.expect_name()?)
                } else {
                    None
                };
                names.push((name, alias));
                if !p.eat_op(",") || (parens && p.at_op(")")) {
                    break;
                }
            }
            if parens {
                p.expect_op(")")?;
            }
            StmtKind::FromImport { module, names }
        }
        "elif" | "else" | "except" | "finally" | "endif" | "endfor" | "endwhile" | "enddef"
        | "endtry" | "if" | "for" | "while" | "def" | "try" => {
            return Err(ParseError::new(
                format!("invalid syntax: misplaced '{}'", keyword),
                line,
            ));
        }
        _ => parse_expression_statement(&mut p)?,
    };
    p.expect_end()?;
    Ok(kind)
}

fn parse_expression_statement(p: &mut Parser<'_>) -> Result<StmtKind> {
    let first = p.parse_testlist()?;

    if let Some(Tok::Op(op)) = p.peek() {
        if let Some(binop) = BinOp::from_augmented(op) {
            p.bump();
            let target = Target::from_expr(first).map_err(|m| p.error(m))?;
            if matches!(target, Target::Unpack(_)) {
                return Err(p.error("illegal expression for augmented assignment"));
            }
            let value = p.parse_testlist()?;
            return Ok(StmtKind::AugAssign {
                target,
                op: binop,
                value,
            });
        }
    }

    if !p.at_op("=") {
        return Ok(StmtKind::Expr(first));
    }
    let mut exprs = vec![first];
    while p.eat_op("=") {
        exprs.push(p.parse_testlist()?);
    }
    let value = exprs.pop().ok_or_else(|| p.error("invalid assignment"))?;
    let targets = exprs
        .into_iter()
        .map(|e| Target::from_expr(e).map_err(|m| p.error(m)))
        .collect::<Result<Vec<_>>>()?;
    Ok(StmtKind::Assign { targets, value })
}

fn looks_like_error_kind(name: &str) -> bool {
    name.ends_with("Error") || name == "Exception" || name == "KeyboardInterrupt"
}

fn parse_raise(p: &mut Parser<'_>) -> Result<StmtKind> {
    if p.at_end() {
        return Ok(StmtKind::Raise {
            kind: None,
            msg: None,
        });
    }
    let expr = p.parse_expr()?;
    Ok(match expr {
        Expr::Name(name) if looks_like_error_kind(&name) => StmtKind::Raise {
            kind: Some(name),
            msg: None,
        },
        Expr::Call(func, mut args) => match *func {
            Expr::Name(name) if looks_like_error_kind(&name) && args.len() <= 1 => {
                let msg = match args.pop() {
                    Some(crate::ast::Argument::Positional(msg)) => Some(msg),
                    Some(_) => return Err(p.error("raise expects a single message argument")),
                    None => None,
                };
                StmtKind::Raise {
                    kind: Some(name),
                    msg,
                }
            }
            func => StmtKind::Raise {
                kind: None,
                msg: Some(Expr::Call(Box::new(func), args)),
            },
        },
        other => StmtKind::Raise {
            kind: None,
            msg: Some(other),
        },
    })
}

fn parse_dotted(p: &mut Parser<'_>) -> Result<String> {
    let mut name = p.expect_name()?;
    while p.eat_op(".") {
        name.push('.');
        name.push_str(&p.expect_name()?);
    }
    Ok(name)
}

pub fn parse_condition(text: &str, line: usize) -> Result<Expr> {
    let tokens = tokenize(text, line)?;
    if tokens.is_empty() {
        return Err(ParseError::new("expected an expression", line));
    }
    let mut p = Parser::new(&tokens, line);
    let expr = p.parse_testlist()?;
    p.expect_end()?;
    Ok(expr)
}

/// `target in iterable` from a `for` header.
pub fn parse_for_header(text: &str, line: usize) -> Result<(Target, Expr)> {
    let tokens = tokenize(text, line)?;
    let mut p = Parser::new(&tokens, line);
    let target = p.parse_target_list()?;
    p.expect_keyword("in")?;
    let iter = p.parse_testlist()?;
    p.expect_end()?;
    Ok((target, iter))
}

/// `name(params)` from a `def` header.
pub fn parse_def_header(text: &str, line: usize) -> Result<(String, Vec<Param>)> {
    let tokens = tokenize(text, line)?;
    let mut p = Parser::new(&tokens, line);
    let name = p.expect_name()?;
    p.expect_op("(")?;

    let mut params: Vec<Param> = Vec::new();
    let mut seen = HashSet::new();
    while !p.eat_op(")") {
        if params
            .iter()
            .any(|param| param.kind == ParamKind::VarKwargs)
        {
            return Err(p.error("no parameters may follow '**' parameter"));
        }
        let (kind, param_name, default) = if p.eat_op("**") {
            (ParamKind::VarKwargs, p.expect_name()?, None)
        } else if p.eat_op("*") {
            if params.iter().any(|param| param.kind == ParamKind::VarArgs) {
                return Err(p.error("only one '*' parameter is allowed"));
            }
            (ParamKind::VarArgs, p.expect_name()?, None)
        } else {
            if params.iter().any(|param| param.kind == ParamKind::VarArgs) {
                return Err(p.error("positional parameters must precede '*' parameter"));
            }
            let param_name = p.expect_name()?;
            let default = if p.eat_op("=") {
                Some(p.parse_expr()?)
            } else {
                if params.iter().any(|param| param.default.is_some()) {
                    return Err(p.error(format!(
                        "non-default parameter '{}' follows default parameter",
                        param_name
                    )));
                }
                None
            };
            (ParamKind::Positional, param_name, default)
        };
        if !seen.insert(param_name.clone()) {
            return Err(p.error(format!(
                "duplicate parameter '{}' in definition of {}()",
                param_name, name
            )));
        }
        params.push(Param {
            name: param_name,
            default,
            kind,
        });
        if !p.eat_op(",") {
            p.expect_op(")")?;
            break;
        }
    }
    p.expect_end()?;
    Ok((name, params))
}

/// `except`, `except Kind`, `except (A, B)`, `except Kind as name`.
pub fn parse_except_header(text: &str, line: usize) -> Result<(Vec<String>, Option<String>)> {
    let tokens = tokenize(text, line)?;
    let mut p = Parser::new(&tokens, line);
    if p.at_end() {
        return Ok((Vec::new(), None));
    }
    let mut kinds = Vec::new();
    if p.eat_op("(") {
        loop {
            kinds.push(p.expect_name()?);
            if !p.eat_op(",") || p.at_op(")") {
                break;
            }
        }
        p.expect_op(")")?;
    } else {
        kinds.push(p.expect_name()?);
    }
    let name = if p.eat_keyword("as") || p.eat_op(",") {
        Some(p.expect_name()?)
    } else {
        None
    };
    p.expect_end()?;
    Ok((kinds, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands() -> Vec<String> {
        vec!["show".to_string(), "run".to_string(), "help".to_string()]
    }

    #[test]
    fn test_command_syntax() {
        let cmds = commands();
        assert_eq!(apply_command_syntax("show x", &cmds).as_deref(), Some("show(x)"));
        assert_eq!(apply_command_syntax("help", &cmds).as_deref(), Some("help()"));
        assert_eq!(
            apply_command_syntax("run 'a.lar'", &cmds).as_deref(),
            Some("run('a.lar')")
        );
        assert_eq!(apply_command_syntax("show(x)", &cmds), None);
        assert_eq!(apply_command_syntax("show = 3", &cmds), None);
        assert_eq!(apply_command_syntax("shower x", &cmds), None);
        assert_eq!(apply_command_syntax("print x", &cmds), None);
    }

    #[test]
    fn test_assignments() {
        let stmts = parse_simple_line("a = b = 3", 1).unwrap();
        match &stmts[0] {
            StmtKind::Assign { targets, value } => {
                assert_eq!(targets.len(), 2);
                assert_eq!(*value, Expr::Int(3));
            }
            other => panic!("expected assignment, got {:?}", other),
        }

        let stmts = parse_simple_line("x, y = 1, 2; z += 1", 1).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(
            &stmts[0],
            StmtKind::Assign { targets, .. } if matches!(targets[0], Target::Unpack(_))
        ));
        assert!(matches!(
            &stmts[1],
            StmtKind::AugAssign { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_simple_line("f() = 3", 4).unwrap_err();
        assert!(err.message.contains("cannot assign"));
        assert_eq!(err.line, 4);
    }

    #[test]
    fn test_raise_forms() {
        let stmts = parse_simple_line("raise ValueError('bad')", 1).unwrap();
        assert!(matches!(
            &stmts[0],
            StmtKind::Raise { kind: Some(k), msg: Some(_) } if k == "ValueError"
        ));
        let stmts = parse_simple_line("raise 'plain message'", 1).unwrap();
        assert!(matches!(&stmts[0], StmtKind::Raise { kind: None, msg: Some(_) }));
    }

    #[test]
    fn test_imports() {
        let stmts = parse_simple_line("import mod.sub as m, other", 1).unwrap();
        assert_eq!(
            stmts[0],
            StmtKind::Import(vec![
                ("mod.sub".to_string(), Some("m".to_string())),
                ("other".to_string(), None)
            ])
        );
        let stmts = parse_simple_line("from mod import a, b as c", 1).unwrap();
        assert!(matches!(&stmts[0], StmtKind::FromImport { names, .. } if names.len() == 2));
    }

    #[test]
    fn test_def_header() {
        let (name, params) = parse_def_header("f(a, b=2, *args, **kws)", 1).unwrap();
        assert_eq!(name, "f");
        assert_eq!(params.len(), 4);
        assert_eq!(params[2].kind, ParamKind::VarArgs);
        assert_eq!(params[3].kind, ParamKind::VarKwargs);

        assert!(parse_def_header("f(a, a)", 1).is_err());
        assert!(parse_def_header("f(*args, b)", 1).is_err());
        assert!(parse_def_header("f(**kws, *args)", 1).is_err());
        assert!(parse_def_header("f(a=1, b)", 1).is_err());
    }

    #[test]
    fn test_except_header() {
        assert_eq!(parse_except_header("", 1).unwrap(), (vec![], None));
        assert_eq!(
            parse_except_header("(NameError, TypeError) as e", 1).unwrap(),
            (
                vec!["NameError".to_string(), "TypeError".to_string()],
                Some("e".to_string())
            )
        );
    }

    #[test]
    fn test_misplaced_block_keyword() {
        assert!(parse_simple_line("else", 1).is_err());
    }
}
