use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
        }
    }

    pub(crate) fn from_augmented(op: &str) -> Option<BinOp> {
        Some(match op {
            "+=" => BinOp::Add,
            "-=" => BinOp::Sub,
            "*=" => BinOp::Mul,
            "/=" => BinOp::Div,
            "//=" => BinOp::FloorDiv,
            "%=" => BinOp::Mod,
            "**=" => BinOp::Pow,
            "&=" => BinOp::BitAnd,
            "|=" => BinOp::BitOr,
            "^=" => BinOp::BitXor,
            "<<=" => BinOp::LShift,
            ">>=" => BinOp::RShift,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Attribute(Box<Expr>, String),
    Subscript(Box<Expr>, Box<Index>),
    Call(Box<Expr>, Vec<Argument>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    ListComp(Box<Expr>, Vec<CompClause>),
}

impl Expr {
    /// `a.b.c` for a chain of attribute accesses rooted at a plain name.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Name(name) => Some(name.clone()),
            Expr::Attribute(value, attr) => value
                .dotted_name()
                .map(|prefix| format!("{}.{}", prefix, attr)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Index {
    Single(Expr),
    Slice {
        lower: Option<Expr>,
        upper: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expr),
    Named(String, Expr),
    Star(Expr),
    StarStar(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompClause {
    pub target: Target,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Attribute(Expr, String),
    Subscript(Expr, Index),
    Unpack(Vec<Target>),
}

impl Target {
    pub(crate) fn from_expr(expr: Expr) -> std::result::Result<Target, String> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Attribute(value, attr) => Ok(Target::Attribute(*value, attr)),
            Expr::Subscript(value, index) => Ok(Target::Subscript(*value, *index)),
            Expr::Tuple(items) | Expr::List(items) => items
                .into_iter()
                .map(Target::from_expr)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Target::Unpack),
            other => Err(format!("cannot assign to {}", other)),
        }
    }

    /// Dotted symbol name when the target is a pure name path.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Target::Name(name) => Some(name.clone()),
            Target::Attribute(value, attr) => value
                .dotted_name()
                .map(|prefix| format!("{}.{}", prefix, attr)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Positional,
    VarArgs,
    VarKwargs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub doc: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub kinds: Vec<String>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        targets: Vec<Target>,
        value: Expr,
    },
    AugAssign {
        target: Target,
        op: BinOp,
        value: Expr,
    },
    Delete(Vec<Target>),
    Pass,
    Break,
    Continue,
    Return(Option<Expr>),
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Raise {
        kind: Option<String>,
        msg: Option<Expr>,
    },
    Import(Vec<(String, Option<String>)>),
    FromImport {
        module: String,
        names: Vec<(String, Option<String>)>,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Target,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    Def(Rc<FunctionDef>),
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Binary(..)
        | Expr::And(..)
        | Expr::Or(..)
        | Expr::Compare(..)
        | Expr::IfExp { .. }
        | Expr::Unary(UnaryOp::Not, _) => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::None => write!(f, "None"),
            Expr::Bool(true) => write!(f, "True"),
            Expr::Bool(false) => write!(f, "False"),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Expr::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Expr::Name(name) => write!(f, "{}", name),
            Expr::List(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Expr::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Expr::Dict(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Expr::Attribute(value, attr) => {
                write_operand(f, value)?;
                write!(f, ".{}", attr)
            }
            Expr::Subscript(value, index) => {
                write_operand(f, value)?;
                write!(f, "[{}]", index)
            }
            Expr::Call(func, args) => {
                write_operand(f, func)?;
                write!(f, "(")?;
                write_joined(f, args)?;
                write!(f, ")")
            }
            Expr::Unary(op, operand) => {
                match op {
                    UnaryOp::Neg => write!(f, "-")?,
                    UnaryOp::Pos => write!(f, "+")?,
                    UnaryOp::Not => write!(f, "not ")?,
                    UnaryOp::Invert => write!(f, "~")?,
                }
                write_operand(f, operand)
            }
            Expr::Binary(left, op, right) => {
                write_operand(f, left)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right)
            }
            Expr::And(left, right) => {
                write_operand(f, left)?;
                write!(f, " and ")?;
                write_operand(f, right)
            }
            Expr::Or(left, right) => {
                write_operand(f, left)?;
                write!(f, " or ")?;
                write_operand(f, right)
            }
            Expr::Compare(left, rest) => {
                write_operand(f, left)?;
                for (op, right) in rest {
                    write!(f, " {} ", op.symbol())?;
                    write_operand(f, right)?;
                }
                Ok(())
            }
            Expr::IfExp { test, body, orelse } => {
                write!(f, "{} if {} else {}", body, test, orelse)
            }
            Expr::ListComp(elt, clauses) => {
                write!(f, "[{}", elt)?;
                for clause in clauses {
                    write!(f, " for {} in {}", clause.target, clause.iter)?;
                    for cond in &clause.ifs {
                        write!(f, " if {}", cond)?;
                    }
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Single(expr) => write!(f, "{}", expr),
            Index::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    write!(f, "{}", lower)?;
                }
                write!(f, ":")?;
                if let Some(upper) = upper {
                    write!(f, "{}", upper)?;
                }
                if let Some(step) = step {
                    write!(f, ":{}", step)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Positional(expr) => write!(f, "{}", expr),
            Argument::Named(name, expr) => write!(f, "{}={}", name, expr),
            Argument::Star(expr) => write!(f, "*{}", expr),
            Argument::StarStar(expr) => write!(f, "**{}", expr),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Name(name) => write!(f, "{}", name),
            Target::Attribute(value, attr) => write!(f, "{}.{}", value, attr),
            Target::Subscript(value, index) => write!(f, "{}[{}]", value, index),
            Target::Unpack(items) => write_joined(f, items),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.default) {
            (ParamKind::VarArgs, _) => write!(f, "*{}", self.name),
            (ParamKind::VarKwargs, _) => write!(f, "**{}", self.name),
            (ParamKind::Positional, Some(default)) => write!(f, "{}={}", self.name, default),
            (ParamKind::Positional, None) => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_name() {
        let expr = Expr::Attribute(
            Box::new(Expr::Attribute(Box::new(Expr::Name("a".into())), "b".into())),
            "c".into(),
        );
        assert_eq!(expr.dotted_name().as_deref(), Some("a.b.c"));

        let call = Expr::Attribute(
            Box::new(Expr::Call(Box::new(Expr::Name("f".into())), vec![])),
            "x".into(),
        );
        assert_eq!(call.dotted_name(), None);
    }

    #[test]
    fn test_display_parenthesizes_nested_operators() {
        let expr = Expr::Binary(
            Box::new(Expr::Binary(
                Box::new(Expr::Int(1)),
                BinOp::Add,
                Box::new(Expr::Int(2)),
            )),
            BinOp::Mul,
            Box::new(Expr::Name("x".into())),
        );
        assert_eq!(expr.to_string(), "(1 + 2) * x");
    }

    #[test]
    fn test_target_from_expr_rejects_literals() {
        assert!(Target::from_expr(Expr::Int(3)).is_err());
        let target = Target::from_expr(Expr::Tuple(vec![
            Expr::Name("a".into()),
            Expr::Name("b".into()),
        ]))
        .unwrap();
        assert_eq!(
            target,
            Target::Unpack(vec![Target::Name("a".into()), Target::Name("b".into())])
        );
    }
}
