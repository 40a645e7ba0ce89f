use std::path::PathBuf;
use std::rc::Rc;

use larch_core::{Frame, Group, GroupRef, LarchError, Procedure, Result, Value};
use larch_parser::{ExceptHandler, Stmt, StmtKind};
use tracing::debug;

use super::Evaluator;

/// How a statement finished. Loops consume `Break`/`Continue`, procedure
/// calls consume `Return`.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Evaluator {
    pub(crate) fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.interrupt.check()?;
        self.exec_kind(stmt).map_err(|e| self.locate(e, stmt))
    }

    fn exec_kind(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)?;
            }

            StmtKind::Assign { targets, value } => {
                let value = self.eval_expr(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }

            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(target, *op, value)?;
            }

            StmtKind::Delete(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
            }

            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),

            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }

            StmtKind::Assert { test, msg } => {
                if !self.eval_expr(test)?.is_truthy() {
                    let message = match msg {
                        Some(m) => self.eval_expr(m)?.to_display_string(),
                        None => String::new(),
                    };
                    return Err(LarchError::Assertion { message });
                }
            }

            StmtKind::Raise { kind, msg } => {
                let message = match msg {
                    Some(m) => self.eval_expr(m)?.to_display_string(),
                    None => String::new(),
                };
                return Err(match kind {
                    Some(kind) => LarchError::from_kind(kind, message),
                    None => match self.handling.last() {
                        Some(current) => current.clone(),
                        None => LarchError::runtime("no active exception to re-raise"),
                    },
                });
            }

            StmtKind::Import(modules) => {
                for (name, alias) in modules {
                    let module = self.import_module(name)?;
                    let bound = alias.as_deref().unwrap_or(name);
                    self.symtable.set_symbol(bound, Value::Group(module))?;
                }
            }

            StmtKind::FromImport { module, names } => {
                let group = self.import_module(module)?;
                for (name, alias) in names {
                    let value = group.borrow().get(name).ok_or_else(|| LarchError::Import {
                        message: format!("cannot import name '{}' from '{}'", name, module),
                    })?;
                    self.symtable
                        .set_symbol(alias.as_deref().unwrap_or(name), value)?;
                }
            }

            StmtKind::If { branches, orelse } => {
                for (test, body) in branches {
                    if self.eval_expr(test)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(orelse);
            }

            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                for item in self.loop_items(iter)? {
                    self.interrupt.check()?;
                    self.assign(target, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(orelse);
            }

            StmtKind::While { test, body, orelse } => {
                loop {
                    self.interrupt.check()?;
                    if !self.eval_expr(test)?.is_truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                return self.exec_block(orelse);
            }

            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let outcome = match self.exec_block(body) {
                    Ok(Flow::Normal) => self.exec_block(orelse),
                    Ok(flow) => Ok(flow),
                    Err(err) if err.is_catchable() => {
                        let handler = handlers.iter().find(|h| {
                            h.kinds.is_empty() || h.kinds.iter().any(|k| err.matches_kind(k))
                        });
                        match handler {
                            Some(handler) => self.run_handler(handler, err),
                            None => Err(err),
                        }
                    }
                    Err(err) => Err(err),
                };
                if !finalbody.is_empty() {
                    match self.exec_block(finalbody)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                return outcome;
            }

            StmtKind::Def(def) => {
                let defining = self.symtable.assignment_group();
                debug!(procedure = %def.name, group = %Group::path(&defining), "define");
                let procedure = Procedure::new(def.clone(), defining, self.current_file.clone());
                self.symtable
                    .set_symbol(&def.name, Value::Procedure(Rc::new(procedure)))?;
            }
        }
        Ok(Flow::Normal)
    }

    fn run_handler(&mut self, handler: &ExceptHandler, err: LarchError) -> Result<Flow> {
        let record = err.to_record();
        self.symtable
            .set_last_error(&record.kind, &record.message, &record.filename, record.lineno);
        if let Some(name) = &handler.name {
            self.symtable
                .set_symbol(name, Value::from(record.message.clone()))?;
        }
        self.handling.push(err);
        let result = self.exec_block(&handler.body);
        self.handling.pop();
        result
    }

    /// Load `name.lar` from `_sys.path` once, running it in its own group
    /// registered under `_sys.modules`.
    pub(crate) fn import_module(&mut self, name: &str) -> Result<GroupRef> {
        let modules = self.symtable.modules()?;
        if let Some(Value::Group(group)) = modules.borrow().get(name) {
            return Ok(group);
        }

        let relative: PathBuf = format!("{}.lar", name.replace('.', "/")).into();
        let path = self
            .symtable
            .module_path()
            .into_iter()
            .map(|dir| PathBuf::from(dir).join(&relative))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LarchError::Import {
                message: format!("no module named '{}'", name),
            })?;

        debug!(module = name, path = %path.display(), "import");
        let short = name.rsplit('.').next().unwrap_or(name);
        let group = Group::new_child(short, &modules);
        if short != name {
            modules.borrow_mut().remove(short);
            modules
                .borrow_mut()
                .insert(name, Value::Group(group.clone()));
        }

        self.symtable.push_frame(Frame {
            local: group.clone(),
            defining: group.clone(),
        });
        let result = self.run_path(&path);
        self.symtable.pop_frame();

        if let Err(err) = result {
            modules.borrow_mut().remove(name);
            return Err(err);
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> (Evaluator, String) {
        let out = CaptureWriter::new();
        let mut ev = Evaluator::with_writer(Box::new(out.clone()));
        ev.exec_unit(src, "<test>", 1).unwrap();
        (ev, out.take())
    }

    #[test]
    fn test_if_elif_else() {
        let src = "x = 5\nif x < 3:\n  print('low')\nelif x < 10:\n  print('mid')\nelse:\n  print('high')\nendif";
        assert_eq!(run(src).1, "mid\n");
    }

    #[test]
    fn test_loops_break_continue_else() {
        let src = "for i in range(6):\n  if i == 1:\n    continue\n  endif\n  if i == 4:\n    break\n  endif\n  print(i)\nelse:\n  print('done')\nendfor";
        assert_eq!(run(src).1, "0\n2\n3\n");

        let src = "n = 0\nwhile n < 3:\n  n += 1\nelse:\n  print('exhausted', n)\nendwhile";
        assert_eq!(run(src).1, "exhausted 3\n");
    }

    #[test]
    fn test_try_except_else_finally() {
        let src = "try:\n  x = 1/0\nexcept ZeroDivisionError as e:\n  print('caught', e)\nelse:\n  print('no error')\nfinally:\n  print('cleanup')\nendtry";
        let (ev, out) = run(src);
        assert_eq!(out, "caught division by zero\ncleanup\n");
        let mut st = ev.symtable;
        assert_eq!(
            st.get_symbol("_sys.last_error.kind", false).unwrap(),
            Value::from("ZeroDivisionError")
        );
    }

    #[test]
    fn test_unmatched_handler_propagates() {
        let out = CaptureWriter::new();
        let mut ev = Evaluator::with_writer(Box::new(out.clone()));
        let err = ev
            .exec_unit(
                "try:\n  undefined_thing\nexcept ValueError:\n  print('no')\nfinally:\n  print('fin')\nendtry",
                "<test>",
                1,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "NameError");
        assert_eq!(out.contents(), "fin\n");
    }

    #[test]
    fn test_raise_and_reraise() {
        let src = "try:\n  try:\n    raise ValueError('bad')\n  except:\n    raise\n  endtry\nexcept ValueError as err:\n  print(err)\nendtry";
        assert_eq!(run(src).1, "bad\n");
    }

    #[test]
    fn test_assert_and_delete() {
        let out = CaptureWriter::new();
        let mut ev = Evaluator::with_writer(Box::new(out));
        let err = ev.exec_unit("assert 1 > 2, 'nope'", "<test>", 1).unwrap_err();
        assert_eq!(err.kind(), "AssertionError");
        assert_eq!(err.inner().to_string(), "nope");

        ev.exec_unit("tmp = 1\ndel tmp", "<test>", 1).unwrap();
        assert!(!ev.symtable.has_symbol("tmp"));
    }

    #[test]
    fn test_def_captures_current_group() {
        let src = "def area(w, h=2):\n  'rectangle area'\n  return w * h\nenddef\nprint(area(3))";
        let (mut ev, out) = run(src);
        assert_eq!(out, "6\n");
        match ev.symtable.get_symbol("area", false).unwrap() {
            Value::Procedure(p) => {
                assert_eq!(p.doc(), Some("rectangle area"));
                assert_eq!(Group::path(&p.defining), "_main");
            }
            other => panic!("expected procedure, got {:?}", other),
        }
    }
}
