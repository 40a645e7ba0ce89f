mod ast;
mod block;
mod error;
mod expr;
mod input;
mod lexer;
mod lines;
mod stmt;

pub use ast::{
    Argument, BinOp, CmpOp, CompClause, ExceptHandler, Expr, FunctionDef, Index, Param,
    ParamKind, Stmt, StmtKind, Target, UnaryOp,
};
pub use block::{parse_unit, BlockKeyword};
pub use error::{ParseError, Result};
pub use input::{InputBuffer, SourceUnit, CONTINUATION_PROMPT, PRIMARY_PROMPT};

/// Parse a single expression, e.g. for `eval`-style helpers and tests.
pub fn parse_expression(text: &str) -> Result<Expr> {
    let tokens = lexer::tokenize(text, 1)?;
    let mut parser = expr::Parser::new(&tokens, 1);
    let expr = parser.parse_testlist()?;
    parser.expect_end()?;
    Ok(expr)
}
