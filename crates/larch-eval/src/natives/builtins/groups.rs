use larch_core::{check_arity, Group, GroupRef, Host, Kwargs, Result, Value};

fn fill(group: &GroupRef, kwargs: Kwargs) -> Result<()> {
    for (name, value) in kwargs {
        Group::set(group, &name, value)?;
    }
    Ok(())
}

/// `group(**kws)`: an anonymous group, named when first bound.
pub fn group(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("group", &args, 0, 0)?;
    let group = Group::new("");
    fill(&group, kwargs)?;
    Ok(Value::Group(group))
}

pub fn newgroup(host: &mut dyn Host, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("newgroup", &args, 0, 1)?;
    let name = match args.first() {
        Some(name) => Some(name.as_str()?.to_string()),
        None => None,
    };
    let group = host.symtable().new_group(name.as_deref(), None)?;
    fill(&group, kwargs)?;
    Ok(Value::Group(group))
}

pub fn subgroups(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("subgroups", &args, 1, 1)?;
    let group = args[0].as_group()?;
    let names = group
        .borrow()
        .subgroups()
        .into_iter()
        .map(|(name, _)| Value::from(name))
        .collect();
    Ok(Value::list(names))
}

pub fn group_items(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("group_items", &args, 1, 1)?;
    let group = args[0].as_group()?;
    let items = group
        .borrow()
        .items()
        .into_iter()
        .map(|(name, value)| Value::tuple(vec![Value::from(name), value]))
        .collect();
    Ok(Value::list(items))
}

fn group_name(value: &Value) -> Result<String> {
    match value {
        Value::Group(g) => Ok(Group::path(g)),
        other => Ok(other.as_str()?.to_string()),
    }
}

pub fn set_datagroup(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("set_datagroup", &args, 1, 1)?;
    let name = group_name(&args[0])?;
    let group = host.symtable().set_default_data_group(&name)?;
    Ok(Value::Group(group))
}

pub fn set_funcgroup(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("set_funcgroup", &args, 1, 1)?;
    let name = group_name(&args[0])?;
    let group = host.symtable().set_default_func_group(&name)?;
    Ok(Value::Group(group))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Evaluator;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn evaluator() -> Evaluator {
        Evaluator::with_writer(Box::new(CaptureWriter::new()))
    }

    #[test]
    fn test_anonymous_group_named_on_binding() {
        let mut ev = evaluator();
        ev.exec_unit("scan = group(e0=8333.0)", "<test>", 1).unwrap();
        let scan = ev.symtable.lookup("scan").unwrap().as_group().unwrap();
        assert_eq!(scan.borrow().name(), "scan");
        assert_eq!(scan.borrow().get("e0"), Some(Value::Float(8333.0)));
    }

    #[test]
    fn test_newgroup_names_and_collisions() {
        let mut ev = evaluator();
        ev.exec_unit("newgroup('fits', a=1)\nnewgroup()", "<test>", 1).unwrap();
        assert!(ev.symtable.has_group("fits"));
        assert!(ev.symtable.has_group("group001"));
        let err = ev.exec_unit("newgroup('fits')", "<test>", 1).unwrap_err();
        assert_eq!(err.kind(), "NameCollisionError");
    }

    #[test]
    fn test_subgroups_and_items() {
        let mut ev = evaluator();
        ev.exec_unit("g = group(x=1)\ng.sub = group()", "<test>", 1).unwrap();
        assert_eq!(ev.exec_unit("subgroups(g)", "<test>", 1).unwrap().repr(), "['sub']");
        assert_eq!(
            ev.exec_unit("group_items(g)[0]", "<test>", 1).unwrap().repr(),
            "('x', 1)"
        );
        assert_eq!(ev.exec_unit("subgroups(3)", "<test>", 1).unwrap_err().kind(), "TypeError");
    }

    #[test]
    fn test_set_datagroup_redirects_assignment() {
        let mut ev = evaluator();
        ev.exec_unit("set_datagroup('work')\nx = 5", "<test>", 1).unwrap();
        assert_eq!(
            ev.symtable.get_symbol("work.x", false).unwrap(),
            Value::Int(5)
        );
        assert!(ev.symtable.root().borrow().get("x").is_none());
        assert_eq!(ev.exec_unit("x", "<test>", 1).unwrap(), Value::Int(5));
    }
}
