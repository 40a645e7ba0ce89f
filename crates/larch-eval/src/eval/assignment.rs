use larch_core::{Group, LarchError, Result, Value};
use larch_parser::{BinOp, Expr, Target};

use super::expr::get_attribute;
use super::ops;
use super::Evaluator;

impl Evaluator {
    pub(crate) fn assign(&mut self, target: &Target, value: Value) -> Result<()> {
        match target {
            Target::Name(name) => self.symtable.set_symbol(name, value),

            Target::Attribute(object, attr) => {
                if let Some(dotted) = target.dotted_name() {
                    return self.symtable.set_symbol(&dotted, value);
                }
                match self.eval_expr(object)? {
                    Value::Group(group) => Group::set(&group, attr, value),
                    other => Err(LarchError::attribute(format!(
                        "cannot set attribute '{}' on '{}' object",
                        attr,
                        other.type_name()
                    ))),
                }
            }

            Target::Subscript(object, index) => {
                let object = self.eval_expr(object)?;
                let index = self.eval_index(index)?;
                ops::set_item(&object, &index, value)
            }

            Target::Unpack(targets) => {
                let items = value.iterate()?;
                if items.len() != targets.len() {
                    return Err(LarchError::value(if items.len() > targets.len() {
                        format!("too many values to unpack (expected {})", targets.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    }));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
        }
    }

    fn target_value(&mut self, target: &Target) -> Result<Value> {
        match target {
            Target::Name(name) => self
                .symtable
                .lookup(name)
                .ok_or_else(|| LarchError::undefined(name)),
            Target::Attribute(object, attr) => {
                let object = self.eval_expr(object)?;
                get_attribute(&object, attr)
            }
            Target::Subscript(object, index) => {
                let object = self.eval_expr(object)?;
                let index = self.eval_index(index)?;
                ops::get_item(&object, &index)
            }
            Target::Unpack(_) => Err(LarchError::syntax(
                "illegal expression for augmented assignment",
            )),
        }
    }

    pub(crate) fn aug_assign(&mut self, target: &Target, op: BinOp, value: &Expr) -> Result<()> {
        let current = self.target_value(target)?;
        let rhs = self.eval_expr(value)?;
        let updated = ops::augmented(op, &current, &rhs)?;
        self.assign(target, updated)
    }

    pub(crate) fn delete(&mut self, target: &Target) -> Result<()> {
        match target {
            Target::Name(name) => self.symtable.del_symbol(name),
            Target::Attribute(object, attr) => {
                if let Some(dotted) = target.dotted_name() {
                    return self.symtable.del_symbol(&dotted);
                }
                let group = self.eval_expr(object)?.as_group()?;
                let removed = group.borrow_mut().remove(attr);
                removed.map(|_| ()).ok_or_else(|| {
                    LarchError::lookup(format!("no symbol '{}' to delete", attr))
                })
            }
            Target::Subscript(object, index) => {
                let object = self.eval_expr(object)?;
                let index = self.eval_index(index)?;
                ops::del_item(&object, &index)
            }
            Target::Unpack(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn evaluator() -> Evaluator {
        Evaluator::with_writer(Box::new(CaptureWriter::new()))
    }

    #[test]
    fn test_unpacking_and_chained_targets() {
        let mut ev = evaluator();
        ev.exec_unit("a, (b, c) = 1, [2, 3]\nx = y = 0", "<test>", 1).unwrap();
        assert_eq!(ev.symtable.lookup("c"), Some(Value::Int(3)));
        assert_eq!(ev.symtable.lookup("y"), Some(Value::Int(0)));
        let err = ev.exec_unit("p, q = 1, 2, 3", "<test>", 1).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_dotted_assignment_creates_groups() {
        let mut ev = evaluator();
        ev.exec_unit("data.scan1.energy = 8333.0", "<test>", 1).unwrap();
        assert!(ev.symtable.has_group("data.scan1"));
        assert_eq!(
            ev.symtable.get_symbol("data.scan1.energy", false).unwrap(),
            Value::Float(8333.0)
        );
    }

    #[test]
    fn test_augmented_assignment() {
        let mut ev = evaluator();
        ev.exec_unit(
            "n = 1\nn += 2\nn **= 2\nitems = [1]\nalias = items\nitems += [2]\nd = {'k': 1}\nd['k'] -= 5",
            "<test>",
            1,
        )
        .unwrap();
        assert_eq!(ev.symtable.lookup("n"), Some(Value::Int(9)));
        assert_eq!(
            ev.symtable.lookup("alias"),
            Some(Value::list(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(ev.exec_unit("d['k']", "<test>", 1).unwrap(), Value::Int(-4));
    }

    #[test]
    fn test_delete_targets() {
        let mut ev = evaluator();
        ev.exec_unit(
            "g = group(a=1, b=2)\ndel g.a\nlst = [1, 2, 3]\ndel lst[0]",
            "<test>",
            1,
        )
        .unwrap();
        assert!(!ev.symtable.has_symbol("g.a"));
        assert_eq!(ev.exec_unit("lst", "<test>", 1).unwrap(), Value::list(vec![Value::Int(2), Value::Int(3)]));
    }
}
