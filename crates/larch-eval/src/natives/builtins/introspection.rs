use colored::Color;

use larch_core::{check_arity, Group, GroupRef, Host, Kwargs, LarchError, Result, Value};

/// Arrays longer than this are summarised by `show`.
const SHOW_ARRAY_LIMIT: usize = 10;

/// A group argument, or the group unqualified assignments currently land in.
fn target_group(host: &mut dyn Host, value: Option<&Value>) -> Result<GroupRef> {
    match value {
        None | Some(Value::None) => Ok(host.symtable().assignment_group()),
        Some(Value::String(name)) => host.symtable().get_symbol(name, false)?.as_group(),
        Some(other) => other.as_group(),
    }
}

pub fn dir(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("dir", &args, 0, 1)?;
    let group = target_group(host, args.first())?;
    let mut names = group.borrow().names();
    names.sort();
    Ok(Value::list(names.into_iter().map(Value::from).collect()))
}

fn summary(value: &Value) -> String {
    match value {
        Value::Array(data) if data.borrow().len() > SHOW_ARRAY_LIMIT => {
            format!("array<shape=({},), type=float64>", data.borrow().len())
        }
        Value::Group(g) => format!("<Group {}>", Group::path(g)),
        other => other.repr(),
    }
}

fn show_group(host: &mut dyn Host, group: &GroupRef) {
    let mut items = group.borrow().items();
    items.retain(|(name, _)| !name.starts_with("__"));
    items.sort_by(|a, b| a.0.cmp(&b.0));

    let title = format!("== {}: {} symbols ==\n", Group::path(group), items.len());
    let writer = host.writer();
    writer.write_styled(&title, Some(Color::Cyan), true);
    for (name, value) in items {
        writer.write(&format!("  {}: {}\n", name, summary(&value)));
    }
}

pub fn show(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("show", &args, 0, 1)?;
    match args.first() {
        None | Some(Value::Group(_)) | Some(Value::None) => {
            let group = target_group(host, args.first())?;
            show_group(host, &group);
        }
        Some(other) => {
            let text = format!("{}\n", summary(other));
            host.writer().write(&text);
        }
    }
    Ok(Value::None)
}

/// Full dotted path of the group that supplies `name`, with the name appended.
fn resolve_path(host: &mut dyn Host, name: &str) -> Option<String> {
    let (first, rest) = match name.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };
    let owner = host
        .symtable()
        .search_order()
        .into_iter()
        .find(|group| group.borrow().contains(first))?;
    if rest.is_some() {
        host.symtable().try_get_symbol(name)?;
    }
    Some(format!("{}.{}", Group::path(&owner), name))
}

pub fn which(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("which", &args, 1, 1)?;
    let name = args[0].as_str()?;
    Ok(match resolve_path(host, name) {
        Some(path) => Value::from(path),
        None => Value::None,
    })
}

pub fn exists(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("exists", &args, 1, 1)?;
    let name = args[0].as_str()?;
    Ok(Value::Bool(resolve_path(host, name).is_some()))
}

/// `isgroup(obj, *names)`: whether `obj` (or the symbol it names) is a
/// group containing every one of `names`.
pub fn isgroup(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    let Some((first, names)) = args.split_first() else {
        return Err(LarchError::argument("isgroup() takes at least 1 argument (0 given)"));
    };
    let object = match first {
        Value::String(name) => match host.symtable().try_get_symbol(name) {
            Some(value) => value,
            None => return Ok(Value::Bool(false)),
        },
        other => other.clone(),
    };
    let Value::Group(group) = object else {
        return Ok(Value::Bool(false));
    };
    for name in names {
        if !group.borrow().contains(name.as_str()?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

pub fn help(host: &mut dyn Host, args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("help", &args, 0, 1)?;
    let text = match args.first() {
        None => "Larch interactive help. Use help(name) for a procedure or group, \
                 show(group) to list its contents, and dir() for the current group.\n"
            .to_string(),
        Some(Value::Procedure(p)) => match p.doc() {
            Some(doc) => format!("{}\n  {}\n", p.signature(), doc.trim()),
            None => format!("{}\n", p.signature()),
        },
        Some(Value::NativeFunction(f)) => match &f.doc {
            Some(doc) => format!("{}\n", doc),
            None => format!("<builtin function {}>\n", f.name),
        },
        Some(Value::Group(g)) => {
            let doc = g.borrow().doc().map(str::to_string);
            if let Some(doc) = doc {
                host.writer().write(&format!("{}\n", doc));
            }
            show_group(host, g);
            return Ok(Value::None);
        }
        Some(Value::String(name)) => {
            let value = host.symtable().get_symbol(name, false)?;
            return help(host, vec![value], Kwargs::new());
        }
        Some(other) => format!("{}: {}\n", other.type_name(), summary(other)),
    };
    host.writer().write(&text);
    Ok(Value::None)
}
