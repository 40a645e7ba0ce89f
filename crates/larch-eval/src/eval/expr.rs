use indexmap::IndexMap;

use larch_core::{check_hashable, Group, Kwargs, LarchError, Result, Value};
use larch_parser::{Argument, CompClause, Expr, Index};

use super::ops::{self, Subscript};
use super::Evaluator;

impl Evaluator {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(x) => Ok(Value::Float(*x)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),

            Expr::Name(name) => self
                .symtable
                .lookup(name)
                .ok_or_else(|| LarchError::undefined(name)),

            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),

            Expr::Dict(pairs) => {
                let mut map = IndexMap::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key = self.eval_expr(k)?;
                    check_hashable(&key)?;
                    let value = self.eval_expr(v)?;
                    map.insert(key, value);
                }
                Ok(Value::dict(map))
            }

            Expr::Attribute(object, attr) => {
                let object = self.eval_expr(object)?;
                get_attribute(&object, attr)
            }

            Expr::Subscript(object, index) => {
                let object = self.eval_expr(object)?;
                let index = self.eval_index(index)?;
                ops::get_item(&object, &index)
            }

            Expr::Call(func, args) => {
                let func = self.eval_expr(func)?;
                let (args, kwargs) = self.eval_arguments(args)?;
                self.call_value(&func, args, kwargs)
            }

            Expr::Unary(op, operand) => {
                let value = self.eval_expr(operand)?;
                ops::unary(*op, &value)
            }

            Expr::Binary(left, op, right) => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                ops::binary(*op, &left, &right)
            }

            Expr::And(left, right) => {
                let left = self.eval_expr(left)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval_expr(right)
            }

            Expr::Or(left, right) => {
                let left = self.eval_expr(left)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.eval_expr(right)
            }

            Expr::Compare(first, rest) => {
                let mut left = self.eval_expr(first)?;
                if let [(op, right)] = rest.as_slice() {
                    let right = self.eval_expr(right)?;
                    return ops::compare(*op, &left, &right);
                }
                for (op, right) in rest {
                    let right = self.eval_expr(right)?;
                    if !ops::compare(*op, &left, &right)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }

            Expr::IfExp { test, body, orelse } => {
                if self.eval_expr(test)?.is_truthy() {
                    self.eval_expr(body)
                } else {
                    self.eval_expr(orelse)
                }
            }

            Expr::ListComp(element, clauses) => {
                let mut out = Vec::new();
                self.eval_comprehension(element, clauses, &mut out)?;
                Ok(Value::list(out))
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e)).collect()
    }

    /// Items a `for` header or comprehension clause walks over. A direct
    /// call to the builtin `range` is iterated without building its list.
    pub(crate) fn loop_items(&mut self, iter: &Expr) -> Result<Box<dyn Iterator<Item = Value>>> {
        let Expr::Call(func, args) = iter else {
            return Ok(Box::new(self.eval_expr(iter)?.iterate()?.into_iter()));
        };
        let func = self.eval_expr(func)?;
        let (args, kwargs) = self.eval_arguments(args)?;
        let builtin_range = self.symtable.builtin().borrow().get("range");
        if builtin_range.map_or(false, |range| range.is_same(&func)) {
            let (start, stop, step) =
                ops::range_bounds(&args).map_err(|e| e.with_cause("range"))?;
            return Ok(Box::new(ops::range_iter(start, stop, step).map(Value::Int)));
        }
        let items = self.call_value(&func, args, kwargs)?.iterate()?;
        Ok(Box::new(items.into_iter()))
    }

    /// Comprehension targets are bound in the current scope.
    fn eval_comprehension(
        &mut self,
        element: &Expr,
        clauses: &[CompClause],
        out: &mut Vec<Value>,
    ) -> Result<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            out.push(self.eval_expr(element)?);
            return Ok(());
        };
        for item in self.loop_items(&clause.iter)? {
            self.interrupt.check()?;
            self.assign(&clause.target, item)?;
            let mut keep = true;
            for cond in &clause.ifs {
                if !self.eval_expr(cond)?.is_truthy() {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.eval_comprehension(element, rest, out)?;
            }
        }
        Ok(())
    }

    pub(crate) fn eval_index(&mut self, index: &Index) -> Result<Subscript> {
        match index {
            Index::Single(expr) => Ok(Subscript::Item(self.eval_expr(expr)?)),
            Index::Slice { lower, upper, step } => {
                let mut bound = |expr: &Option<Expr>| -> Result<Option<i64>> {
                    match expr {
                        None => Ok(None),
                        Some(e) => match self.eval_expr(e)? {
                            Value::None => Ok(None),
                            value => value.as_int().map(Some).map_err(|_| {
                                LarchError::type_error("slice indices must be integers or None")
                            }),
                        },
                    }
                };
                Ok(Subscript::Slice(bound(lower)?, bound(upper)?, bound(step)?))
            }
        }
    }

    pub(crate) fn eval_arguments(&mut self, args: &[Argument]) -> Result<(Vec<Value>, Kwargs)> {
        let mut positional = Vec::new();
        let mut kwargs = Kwargs::new();
        for arg in args {
            match arg {
                Argument::Positional(expr) => positional.push(self.eval_expr(expr)?),
                Argument::Star(expr) => positional.extend(self.eval_expr(expr)?.iterate()?),
                Argument::Named(name, expr) => {
                    let value = self.eval_expr(expr)?;
                    if kwargs.insert(name.clone(), value).is_some() {
                        return Err(LarchError::argument(format!(
                            "keyword argument repeated: {}",
                            name
                        )));
                    }
                }
                Argument::StarStar(expr) => {
                    let entries = match self.eval_expr(expr)? {
                        Value::Dict(map) => map
                            .borrow()
                            .iter()
                            .map(|(k, v)| match k.as_str() {
                                Ok(key) => Ok((key.to_string(), v.clone())),
                                Err(_) => Err(LarchError::type_error("keywords must be strings")),
                            })
                            .collect::<Result<Vec<_>>>()?,
                        Value::Group(group) => group.borrow().items(),
                        other => {
                            return Err(LarchError::type_error(format!(
                                "argument after ** must be a mapping, not {}",
                                other.type_name()
                            )))
                        }
                    };
                    for (key, value) in entries {
                        if kwargs.contains_key(&key) {
                            return Err(LarchError::argument(format!(
                                "got multiple values for keyword argument '{}'",
                                key
                            )));
                        }
                        kwargs.insert(key, value);
                    }
                }
            }
        }
        Ok((positional, kwargs))
    }
}

pub(crate) fn get_attribute(object: &Value, attr: &str) -> Result<Value> {
    object.get_attr(attr).ok_or_else(|| match object {
        Value::Group(group) => LarchError::lookup(format!(
            "group '{}' has no symbol '{}'",
            Group::path(group),
            attr
        )),
        other => LarchError::attribute(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            attr
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn eval(src: &str) -> Result<Value> {
        let mut ev = Evaluator::with_writer(Box::new(CaptureWriter::new()));
        ev.exec_unit(src, "<test>", 1)
    }

    #[test]
    fn test_short_circuit_returns_operand() {
        assert_eq!(eval("0 or 'fallback'").unwrap(), Value::from("fallback"));
        assert_eq!(eval("[] and undefined_name").unwrap(), Value::list(vec![]));
    }

    #[test]
    fn test_duplicate_keyword_from_mapping() {
        let err = eval("def f(a, b=0):\n  return a\nenddef\nf(a=1, **{'a': 2})").unwrap_err();
        assert_eq!(err.kind(), "ArgumentError");
        assert_eq!(err.to_string(), "got multiple values for keyword argument 'a'");
        let sum = eval("def f(a, b=0):\n  return a + b\nenddef\nf(1, **{'b': 2})").unwrap();
        assert_eq!(sum, Value::Int(3));
    }

    #[test]
    fn test_loop_over_builtin_range_is_lazy() {
        let src = "n = 0\nfor i in range(3000000000):\n  n += i\n  if i == 3:\n    break\n  endif\nendfor\nn";
        assert_eq!(eval(src).unwrap(), Value::Int(6));
        let src = "def range(n):\n  return ['a', 'b']\nenddef\n[x for x in range(10**12)]";
        assert_eq!(eval(src).unwrap(), Value::list(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(eval("for i in range(1, 2, 0):\n  pass\nendfor").unwrap_err().kind(), "ValueError");
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval("1 < 2 < 3").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 < 3 < 2").unwrap(), Value::Bool(false));
        assert_eq!(eval("'a' in 'cat' and 4 not in [1, 2]").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_comprehension_with_filter() {
        assert_eq!(
            eval("[x*x for x in range(6) if x % 2 == 0]").unwrap(),
            Value::list(vec![Value::Int(0), Value::Int(4), Value::Int(16)])
        );
        assert_eq!(
            eval("[(a, b) for a in [1, 2] for b in 'xy'][-1]").unwrap(),
            Value::tuple(vec![Value::Int(2), Value::from("y")])
        );
    }

    #[test]
    fn test_star_arguments() {
        let src = "def f(a, b, c=0):\n  return a + b + c\nenddef\nargs = [1, 2]\nf(*args, **{'c': 10})";
        assert_eq!(eval(src).unwrap(), Value::Int(13));
    }

    #[test]
    fn test_attribute_errors() {
        let err = eval("g = group(a=1)\ng.b").unwrap_err();
        assert_eq!(err.kind(), "LookupError");
        let err = eval("x = 3\nx.real").unwrap_err();
        assert_eq!(err.kind(), "AttributeError");
    }

    #[test]
    fn test_conditional_expression_and_slices() {
        assert_eq!(eval("'yes' if 2 > 1 else 'no'").unwrap(), Value::from("yes"));
        assert_eq!(eval("'abcdef'[1:5:2]").unwrap(), Value::from("bd"));
        assert_eq!(eval("[1, 2, 3][::-1][0]").unwrap(), Value::Int(3));
    }
}
