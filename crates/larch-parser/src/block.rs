//! Keyword-delimited block structure.
//!
//! Blocks open with `if`, `for`, `while`, `def` or `try` as the first word
//! of a line whose header ends in `:`, and close with `endif`, `endfor`,
//! `endwhile`, `enddef`, `endtry` (or the `#endif` comment forms).
//! Indentation is not significant.

use std::fmt;
use std::rc::Rc;

use crate::ast::{ExceptHandler, Expr, FunctionDef, Param, Stmt, StmtKind, Target};
use crate::error::{ParseError, Result};
use crate::lines::{comment_closer, find_header_colon, leading_word, split_logical_lines, strip_comment};
use crate::stmt::{
    apply_command_syntax, parse_condition, parse_def_header, parse_except_header,
    parse_for_header, parse_simple_line,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKeyword {
    If,
    For,
    While,
    Def,
    Try,
}

impl BlockKeyword {
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "if" => BlockKeyword::If,
            "for" => BlockKeyword::For,
            "while" => BlockKeyword::While,
            "def" => BlockKeyword::Def,
            "try" => BlockKeyword::Try,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKeyword::If => "if",
            BlockKeyword::For => "for",
            BlockKeyword::While => "while",
            BlockKeyword::Def => "def",
            BlockKeyword::Try => "try",
        }
    }

    pub fn closer(&self) -> String {
        format!("end{}", self.as_str())
    }
}

impl fmt::Display for BlockKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Branch {
    Elif,
    Else,
    Except,
    Finally,
}

impl Branch {
    fn as_str(&self) -> &'static str {
        match self {
            Branch::Elif => "elif",
            Branch::Else => "else",
            Branch::Except => "except",
            Branch::Finally => "finally",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineKind<'a> {
    Open {
        keyword: BlockKeyword,
        header: &'a str,
        rest: &'a str,
    },
    Branch {
        branch: Branch,
        header: &'a str,
        rest: &'a str,
    },
    Close(BlockKeyword),
    MissingColon(&'static str),
    Simple,
}

/// Classify one logical line by its leading keyword.
pub(crate) fn classify(text: &str) -> LineKind<'_> {
    let text = text.trim();
    if text.starts_with('#') {
        return match comment_closer(text).and_then(|c| BlockKeyword::from_word(&c[3..])) {
            Some(keyword) => LineKind::Close(keyword),
            None => LineKind::Simple,
        };
    }
    let word = leading_word(text);
    let after = &text[word.len()..];

    if let Some(keyword) = BlockKeyword::from_word(word) {
        return match find_header_colon(after) {
            Some(colon) => LineKind::Open {
                keyword,
                header: after[..colon].trim(),
                rest: strip_comment(&after[colon + 1..]).trim(),
            },
            None if keyword == BlockKeyword::Try && strip_comment(after).trim().is_empty() => {
                LineKind::Open {
                    keyword,
                    header: "",
                    rest: "",
                }
            }
            None => LineKind::MissingColon(keyword.as_str()),
        };
    }

    let branch = match word {
        "elif" => Branch::Elif,
        "else" => Branch::Else,
        "except" => Branch::Except,
        "finally" => Branch::Finally,
        _ => {
            if let Some(keyword) = word.strip_prefix("end").and_then(BlockKeyword::from_word) {
                if strip_comment(after).trim().is_empty() {
                    return LineKind::Close(keyword);
                }
            }
            return LineKind::Simple;
        }
    };
    match find_header_colon(after) {
        Some(colon) => LineKind::Branch {
            branch,
            header: after[..colon].trim(),
            rest: strip_comment(&after[colon + 1..]).trim(),
        },
        None if branch != Branch::Elif && strip_comment(after).trim().is_empty() => {
            LineKind::Branch {
                branch,
                header: "",
                rest: "",
            }
        }
        None => LineKind::MissingColon(branch.as_str()),
    }
}

enum BlockState {
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Option<Vec<Stmt>>,
    },
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Option<Vec<Stmt>>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Option<Vec<Stmt>>,
    },
    Def {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Option<Vec<Stmt>>,
        finalbody: Option<Vec<Stmt>>,
    },
}

struct OpenBlock {
    keyword: BlockKeyword,
    line: usize,
    source: String,
    state: BlockState,
}

impl OpenBlock {
    fn open(keyword: BlockKeyword, header: &str, line: usize, source: &str) -> Result<Self> {
        let state = match keyword {
            BlockKeyword::If => BlockState::If {
                branches: vec![(parse_condition(header, line)?, Vec::new())],
                orelse: None,
            },
            BlockKeyword::For => {
                let (target, iter) = parse_for_header(header, line)?;
                BlockState::For {
                    target,
                    iter,
                    body: Vec::new(),
                    orelse: None,
                }
            }
            BlockKeyword::While => BlockState::While {
                test: parse_condition(header, line)?,
                body: Vec::new(),
                orelse: None,
            },
            BlockKeyword::Def => {
                let (name, params) = parse_def_header(header, line)?;
                BlockState::Def {
                    name,
                    params,
                    body: Vec::new(),
                }
            }
            BlockKeyword::Try => {
                if !header.is_empty() {
                    return Err(ParseError::new("invalid syntax after 'try'", line));
                }
                BlockState::Try {
                    body: Vec::new(),
                    handlers: Vec::new(),
                    orelse: None,
                    finalbody: None,
                }
            }
        };
        Ok(OpenBlock {
            keyword,
            line,
            source: source.to_string(),
            state,
        })
    }

    fn body_mut(&mut self) -> &mut Vec<Stmt> {
        match &mut self.state {
            BlockState::If { branches, orelse } => match orelse {
                Some(orelse) => orelse,
                None => match branches.last_mut() {
                    Some((_, body)) => body,
                    None => unreachable!("if block always has a first branch"),
                },
            },
            BlockState::For { body, orelse, .. } | BlockState::While { body, orelse, .. } => {
                match orelse {
                    Some(orelse) => orelse,
                    None => body,
                }
            }
            BlockState::Def { body, .. } => body,
            BlockState::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                if let Some(finalbody) = finalbody {
                    finalbody
                } else if let Some(orelse) = orelse {
                    orelse
                } else if let Some(handler) = handlers.last_mut() {
                    &mut handler.body
                } else {
                    body
                }
            }
        }
    }

    fn branch(&mut self, branch: Branch, header: &str, line: usize) -> Result<()> {
        let misplaced = || {
            ParseError::new(
                format!(
                    "'{}' is not valid inside '{}' block",
                    branch.as_str(),
                    self.keyword
                ),
                line,
            )
        };
        let duplicate = |what: &str| {
            ParseError::new(format!("'{}' after '{}'", branch.as_str(), what), line)
        };
        match (&mut self.state, branch) {
            (BlockState::If { branches, orelse }, Branch::Elif) => {
                if orelse.is_some() {
                    return Err(duplicate("else"));
                }
                branches.push((parse_condition(header, line)?, Vec::new()));
            }
            (BlockState::If { orelse, .. }, Branch::Else)
            | (BlockState::For { orelse, .. }, Branch::Else)
            | (BlockState::While { orelse, .. }, Branch::Else) => {
                if orelse.is_some() {
                    return Err(duplicate("else"));
                }
                *orelse = Some(Vec::new());
            }
            (
                BlockState::Try {
                    handlers,
                    orelse,
                    finalbody,
                    ..
                },
                Branch::Except,
            ) => {
                if finalbody.is_some() {
                    return Err(duplicate("finally"));
                }
                if orelse.is_some() {
                    return Err(duplicate("else"));
                }
                let (kinds, name) = parse_except_header(header, line)?;
                handlers.push(ExceptHandler {
                    kinds,
                    name,
                    body: Vec::new(),
                    line,
                });
            }
            (
                BlockState::Try {
                    handlers,
                    orelse,
                    finalbody,
                    ..
                },
                Branch::Else,
            ) => {
                if handlers.is_empty() {
                    return Err(ParseError::new("'else' in 'try' block requires 'except'", line));
                }
                if finalbody.is_some() {
                    return Err(duplicate("finally"));
                }
                if orelse.is_some() {
                    return Err(duplicate("else"));
                }
                *orelse = Some(Vec::new());
            }
            (BlockState::Try { finalbody, .. }, Branch::Finally) => {
                if finalbody.is_some() {
                    return Err(duplicate("finally"));
                }
                *finalbody = Some(Vec::new());
            }
            _ => return Err(misplaced()),
        }
        if branch != Branch::Elif && branch != Branch::Except && !header.is_empty() {
            return Err(ParseError::new(
                format!("invalid syntax after '{}'", branch.as_str()),
                line,
            ));
        }
        Ok(())
    }

    fn finish(self) -> Result<Stmt> {
        let kind = match self.state {
            BlockState::If { branches, orelse } => StmtKind::If {
                branches,
                orelse: orelse.unwrap_or_default(),
            },
            BlockState::For {
                target,
                iter,
                body,
                orelse,
            } => StmtKind::For {
                target,
                iter,
                body,
                orelse: orelse.unwrap_or_default(),
            },
            BlockState::While { test, body, orelse } => StmtKind::While {
                test,
                body,
                orelse: orelse.unwrap_or_default(),
            },
            BlockState::Def { name, params, body } => {
                let doc = match body.first().map(|s| &s.kind) {
                    Some(StmtKind::Expr(Expr::Str(doc))) => Some(doc.clone()),
                    _ => None,
                };
                StmtKind::Def(Rc::new(FunctionDef {
                    name,
                    params,
                    body,
                    doc,
                    line: self.line,
                }))
            }
            BlockState::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                if handlers.is_empty() && finalbody.is_none() {
                    return Err(ParseError::new(
                        "'try' block requires an 'except' or 'finally' clause",
                        self.line,
                    )
                    .with_source(&self.source));
                }
                StmtKind::Try {
                    body,
                    handlers,
                    orelse: orelse.unwrap_or_default(),
                    finalbody: finalbody.unwrap_or_default(),
                }
            }
        };
        Ok(Stmt {
            kind,
            line: self.line,
            source: self.source,
        })
    }
}

struct BlockBuilder<'c> {
    stack: Vec<OpenBlock>,
    top: Vec<Stmt>,
    commands: &'c [String],
}

impl<'c> BlockBuilder<'c> {
    fn emit(&mut self, stmt: Stmt) {
        match self.stack.last_mut() {
            Some(block) => block.body_mut().push(stmt),
            None => self.top.push(stmt),
        }
    }

    fn push_line(&mut self, text: &str, line: usize, source: &str) -> Result<()> {
        match classify(text) {
            LineKind::Open {
                keyword,
                header,
                rest,
            } => {
                let block = OpenBlock::open(keyword, header, line, source)?;
                self.stack.push(block);
                if !rest.is_empty() {
                    self.push_line(rest, line, source)?;
                }
            }
            LineKind::Branch {
                branch,
                header,
                rest,
            } => {
                let block = self.stack.last_mut().ok_or_else(|| {
                    ParseError::new(
                        format!("'{}' outside of any block", branch.as_str()),
                        line,
                    )
                })?;
                block.branch(branch, header, line)?;
                if !rest.is_empty() {
                    self.push_line(rest, line, source)?;
                }
            }
            LineKind::Close(keyword) => {
                let block = self.stack.pop().ok_or_else(|| {
                    ParseError::new(format!("unexpected '{}'", keyword.closer()), line)
                })?;
                if block.keyword != keyword {
                    return Err(ParseError::new(
                        format!(
                            "'{}' does not match '{}' opened at line {}",
                            keyword.closer(),
                            block.keyword,
                            block.line
                        ),
                        line,
                    ));
                }
                let stmt = block.finish()?;
                self.emit(stmt);
            }
            LineKind::MissingColon(word) => {
                return Err(ParseError::new(
                    format!("expected ':' after '{}' clause", word),
                    line,
                ));
            }
            LineKind::Simple => {
                let rewritten = apply_command_syntax(text, self.commands);
                let text = rewritten.as_deref().unwrap_or(text);
                for kind in parse_simple_line(text, line)? {
                    self.emit(Stmt {
                        kind,
                        line,
                        source: source.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<Stmt>> {
        if let Some(block) = self.stack.last() {
            return Err(ParseError::new(
                format!(
                    "un-terminated '{}' block (opened at line {}), expected '{}'",
                    block.keyword,
                    block.line,
                    block.keyword.closer()
                ),
                block.line,
            )
            .with_source(&block.source));
        }
        Ok(self.top)
    }
}

/// Parse a complete unit of source into statements. `first_line` is the
/// line number of the first line of `text`; `commands` lists names that
/// accept `name args` command syntax.
pub fn parse_unit(text: &str, first_line: usize, commands: &[String]) -> Result<Vec<Stmt>> {
    let mut builder = BlockBuilder {
        stack: Vec::new(),
        top: Vec::new(),
        commands,
    };
    for logical in split_logical_lines(text, first_line) {
        builder
            .push_line(&logical.text, logical.line, &logical.source)
            .map_err(|e| e.with_source(&logical.source))?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Stmt> {
        parse_unit(text, 1, &[]).unwrap()
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify("if x > 1:"),
            LineKind::Open {
                keyword: BlockKeyword::If,
                header: "x > 1",
                rest: ""
            }
        ));
        assert!(matches!(
            classify("def sq(n): return n*n"),
            LineKind::Open {
                keyword: BlockKeyword::Def,
                rest: "return n*n",
                ..
            }
        ));
        assert_eq!(classify("endif"), LineKind::Close(BlockKeyword::If));
        assert_eq!(classify("#endfor"), LineKind::Close(BlockKeyword::For));
        assert_eq!(classify("# endfor"), LineKind::Simple);
        assert_eq!(classify("iffy = 3"), LineKind::Simple);
        assert_eq!(classify("if x"), LineKind::MissingColon("if"));
        assert!(matches!(
            classify("else"),
            LineKind::Branch {
                branch: Branch::Else,
                ..
            }
        ));
    }

    #[test]
    fn test_if_elif_else() {
        let stmts = parse("if x > 1:\n  y = 1\nelif x < 0:\n  y = 2\nelse:\n  y = 3\nendif");
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StmtKind::If { branches, orelse } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(orelse.len(), 1);
                assert_eq!(orelse[0].line, 6);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_indentation_is_not_significant() {
        let a = parse("for i in range(3):\nprint(i)\nendfor");
        let b = parse("for i in range(3):\n        print(i)\n   endfor");
        assert_eq!(a[0].kind, b[0].kind);
    }

    #[test]
    fn test_def_with_docstring_and_inline_body() {
        let stmts = parse("def sq(n):\n  'square a number'\n  return n*n\nenddef");
        match &stmts[0].kind {
            StmtKind::Def(def) => {
                assert_eq!(def.name, "sq");
                assert_eq!(def.doc.as_deref(), Some("square a number"));
                assert_eq!(def.body.len(), 2);
            }
            other => panic!("expected def, got {:?}", other),
        }

        let stmts = parse("def sq(n): return n*n\nenddef");
        match &stmts[0].kind {
            StmtKind::Def(def) => assert!(matches!(def.body[0].kind, StmtKind::Return(Some(_)))),
            other => panic!("expected def, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_blocks_with_comment_closers() {
        let text = "for i in [1,2,3,4]:\n  if i == 3:\n    break\n  #endif\n  total = i\n#endfor";
        let stmts = parse(text);
        match &stmts[0].kind {
            StmtKind::For { body, .. } => {
                assert_eq!(body.len(), 2);
                assert!(matches!(body[0].kind, StmtKind::If { .. }));
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_try_except_else_finally() {
        let text = "try:\n  x = 1/0\nexcept ZeroDivisionError as e:\n  x = 0\nelse:\n  x = 2\nfinally:\n  done = True\nendtry";
        match &parse(text)[0].kind {
            StmtKind::Try {
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                assert_eq!(handlers.len(), 1);
                assert_eq!(handlers[0].kinds, vec!["ZeroDivisionError".to_string()]);
                assert_eq!(handlers[0].name.as_deref(), Some("e"));
                assert_eq!(orelse.len(), 1);
                assert_eq!(finalbody.len(), 1);
            }
            other => panic!("expected try, got {:?}", other),
        }
    }

    #[test]
    fn test_block_errors() {
        let err = parse_unit("if x:\n  y = 1", 1, &[]).unwrap_err();
        assert!(err.message.contains("un-terminated 'if'"));

        let err = parse_unit("endif", 3, &[]).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("unexpected 'endif'"));

        let err = parse_unit("for i in x:\n  pass\nendif", 1, &[]).unwrap_err();
        assert!(err.message.contains("does not match"));

        let err = parse_unit("try:\n  pass\nendtry", 1, &[]).unwrap_err();
        assert!(err.message.contains("requires"));

        let err = parse_unit("while x:\n  pass\nexcept:\n  pass\nendwhile", 1, &[]).unwrap_err();
        assert!(err.message.contains("not valid"));
    }

    #[test]
    fn test_command_lines() {
        let commands = vec!["show".to_string()];
        let stmts = parse_unit("show x", 1, &commands).unwrap();
        assert!(matches!(stmts[0].kind, StmtKind::Expr(Expr::Call(..))));
    }

    #[test]
    fn test_source_lines_recorded() {
        let stmts = parse("a = 1\n\nb = 2");
        assert_eq!(stmts[1].line, 3);
        assert_eq!(stmts[1].source, "b = 2");
    }
}
