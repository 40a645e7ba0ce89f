use crate::ast::{Argument, BinOp, CmpOp, CompClause, Expr, Index, Target, UnaryOp};
use crate::error::{ParseError, Result};
use crate::lexer::{is_keyword, Tok, Token};

/// Recursive-descent expression parser over the tokens of one statement.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    line: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token], line: usize) -> Self {
        Parser {
            tokens,
            pos: 0,
            line,
        }
    }

    pub fn peek(&self) -> Option<&'t Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Tok> {
        self.tokens.get(self.pos + offset).map(|t| &t.tok)
    }

    pub fn bump(&mut self) -> Option<&'t Tok> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Some(Tok::Op(o)) if *o == op)
    }

    pub fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", op)))
        }
    }

    pub fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Name(n)) if n == kw)
    }

    pub fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", kw)))
        }
    }

    pub fn expect_end(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("invalid syntax"))
        }
    }

    pub fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(Tok::Name(name)) if !is_keyword(name) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected("expected a name")),
        }
    }

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line)
    }

    pub fn unexpected(&self, message: &str) -> ParseError {
        match self.peek() {
            Some(tok) => self.error(format!("{} near {}", message, describe(tok))),
            None => self.error(format!("{} at end of line", message)),
        }
    }

    /// Comma-separated expressions; more than one (or a trailing comma)
    /// yields a tuple.
    pub fn parse_testlist(&mut self) -> Result<Expr> {
        let first = self.parse_expr()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_expr_end() {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_expr_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(Tok::Op(op)) => matches!(*op, ")" | "]" | "}" | "=" | ";" | ":")
                || crate::ast::BinOp::from_augmented(op).is_some(),
            Some(Tok::Name(kw)) => kw == "in",
            _ => false,
        }
    }

    /// Targets of a `for` clause: stops before the `in` keyword.
    pub fn parse_target_list(&mut self) -> Result<Target> {
        let first = self.parse_bitor()?;
        if !self.at_op(",") {
            return Target::from_expr(first).map_err(|m| self.error(m));
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_keyword("in") {
                break;
            }
            items.push(self.parse_bitor()?);
        }
        Target::from_expr(Expr::Tuple(items)).map_err(|m| self.error(m))
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        let body = self.parse_or()?;
        if self.at_keyword("if") {
            self.pos += 1;
            let test = self.parse_or()?;
            self.expect_keyword("else")?;
            let orelse = self.parse_expr()?;
            return Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            });
        }
        Ok(body)
    }

    pub fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek()? {
            Tok::Op("==") => CmpOp::Eq,
            Tok::Op("!=") => CmpOp::NotEq,
            Tok::Op("<") => CmpOp::Lt,
            Tok::Op("<=") => CmpOp::LtE,
            Tok::Op(">") => CmpOp::Gt,
            Tok::Op(">=") => CmpOp::GtE,
            Tok::Name(n) if n == "in" => CmpOp::In,
            Tok::Name(n) if n == "not" => {
                if matches!(self.peek_at(1), Some(Tok::Name(n)) if n == "in") {
                    self.pos += 1;
                    CmpOp::NotIn
                } else {
                    return None;
                }
            }
            Tok::Name(n) if n == "is" => {
                if matches!(self.peek_at(1), Some(Tok::Name(n)) if n == "not") {
                    self.pos += 1;
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_bitor()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.parse_bitor()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), rest))
        }
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = next(self)?;
        'outer: loop {
            for (sym, op) in ops {
                if self.eat_op(sym) {
                    let right = next(self)?;
                    left = Expr::Binary(Box::new(left), *op, Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("|", BinOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("^", BinOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("&", BinOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[("<<", BinOp::LShift), (">>", BinOp::RShift)],
            Self::parse_arith,
        )
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                ("*", BinOp::Mul),
                ("/", BinOp::Div),
                ("//", BinOp::FloorDiv),
                ("%", BinOp::Mod),
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Tok::Op("-")) => UnaryOp::Neg,
            Some(Tok::Op("+")) => UnaryOp::Pos,
            Some(Tok::Op("~")) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let operand = self.parse_factor()?;
        // Fold negative literals so `-1` stays a constant.
        Ok(match (op, operand) {
            (UnaryOp::Neg, Expr::Int(n)) => Expr::Int(-n),
            (UnaryOp::Neg, Expr::Float(x)) => Expr::Float(-x),
            (op, operand) => Expr::Unary(op, Box::new(operand)),
        })
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.eat_op("**") {
            let exponent = self.parse_factor()?;
            return Ok(Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat_op("(") {
                let args = self.parse_call_args()?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat_op("[") {
                let index = self.parse_subscript()?;
                self.expect_op("]")?;
                expr = Expr::Subscript(Box::new(expr), Box::new(index));
            } else if self.eat_op(".") {
                let attr = match self.bump() {
                    Some(Tok::Name(name)) => name.clone(),
                    _ => return Err(self.error("expected attribute name after '.'")),
                };
                expr = Expr::Attribute(Box::new(expr), attr);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Argument>> {
        let mut args = Vec::new();
        while !self.eat_op(")") {
            if self.eat_op("**") {
                args.push(Argument::StarStar(self.parse_expr()?));
            } else if self.eat_op("*") {
                args.push(Argument::Star(self.parse_expr()?));
            } else if let (Some(Tok::Name(name)), Some(Tok::Op("="))) =
                (self.peek(), self.peek_at(1))
            {
                self.pos += 2;
                args.push(Argument::Named(name.clone(), self.parse_expr()?));
            } else {
                let value = self.parse_expr()?;
                if self.at_keyword("for") {
                    let clauses = self.parse_comp_clauses()?;
                    args.push(Argument::Positional(Expr::ListComp(
                        Box::new(value),
                        clauses,
                    )));
                } else {
                    args.push(Argument::Positional(value));
                }
            }
            if !self.eat_op(",") {
                self.expect_op(")")?;
                break;
            }
        }
        Ok(args)
    }

    fn parse_subscript(&mut self) -> Result<Index> {
        let lower = if self.at_op(":") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        if !self.eat_op(":") {
            let lower = lower.ok_or_else(|| self.error("empty subscript"))?;
            if self.at_op(",") {
                let mut items = vec![lower];
                while self.eat_op(",") {
                    if self.at_op("]") {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                return Ok(Index::Single(Expr::Tuple(items)));
            }
            return Ok(Index::Single(lower));
        }
        let upper = if self.at_op(":") || self.at_op("]") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let step = if self.eat_op(":") && !self.at_op("]") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Index::Slice { lower, upper, step })
    }

    fn parse_comp_clauses(&mut self) -> Result<Vec<CompClause>> {
        let mut clauses = Vec::new();
        while self.eat_keyword("for") {
            let target = self.parse_target_list()?;
            self.expect_keyword("in")?;
            let iter = self.parse_or()?;
            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.parse_or()?);
            }
            clauses.push(CompClause { target, iter, ifs });
        }
        Ok(clauses)
    }

    fn parse_sequence(&mut self, close: &str) -> Result<(Vec<Expr>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        while !self.eat_op(close) {
            items.push(self.parse_expr()?);
            trailing_comma = self.eat_op(",");
            if !trailing_comma {
                self.expect_op(close)?;
                break;
            }
        }
        Ok((items, trailing_comma))
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let Some(tok) = self.bump() else {
            return Err(self.error("unexpected end of line"));
        };
        match tok {
            Tok::Int(n) => Ok(Expr::Int(*n)),
            Tok::Float(x) => Ok(Expr::Float(*x)),
            Tok::Str(s) => {
                let mut s = s.clone();
                while let Some(Tok::Str(more)) = self.peek() {
                    s.push_str(more);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Tok::Name(name) => match name.as_str() {
                "None" => Ok(Expr::None),
                "True" => Ok(Expr::Bool(true)),
                "False" => Ok(Expr::Bool(false)),
                kw if is_keyword(kw) => {
                    Err(self.error(format!("invalid syntax near keyword '{}'", kw)))
                }
                _ => Ok(Expr::Name(name.clone())),
            },
            Tok::Op("(") => {
                if self.eat_op(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.at_keyword("for") {
                    let clauses = self.parse_comp_clauses()?;
                    self.expect_op(")")?;
                    return Ok(Expr::ListComp(Box::new(first), clauses));
                }
                if self.eat_op(")") {
                    return Ok(first);
                }
                self.expect_op(",")?;
                let (mut rest, _) = self.parse_sequence(")")?;
                rest.insert(0, first);
                Ok(Expr::Tuple(rest))
            }
            Tok::Op("[") => {
                if self.eat_op("]") {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.at_keyword("for") {
                    let clauses = self.parse_comp_clauses()?;
                    self.expect_op("]")?;
                    return Ok(Expr::ListComp(Box::new(first), clauses));
                }
                if self.eat_op("]") {
                    return Ok(Expr::List(vec![first]));
                }
                self.expect_op(",")?;
                let (mut rest, _) = self.parse_sequence("]")?;
                rest.insert(0, first);
                Ok(Expr::List(rest))
            }
            Tok::Op("{") => {
                let mut pairs = Vec::new();
                while !self.eat_op("}") {
                    let key = self.parse_expr()?;
                    if !self.eat_op(":") {
                        return Err(self.error("set literals are not supported"));
                    }
                    let value = self.parse_expr()?;
                    pairs.push((key, value));
                    if !self.eat_op(",") {
                        self.expect_op("}")?;
                        break;
                    }
                }
                Ok(Expr::Dict(pairs))
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("invalid syntax near {}", describe(other))))
            }
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Name(n) => format!("'{}'", n),
        Tok::Int(n) => format!("'{}'", n),
        Tok::Float(x) => format!("'{}'", x),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Op(op) => format!("'{}'", op),
    }
}
