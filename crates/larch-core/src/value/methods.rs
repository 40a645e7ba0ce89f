use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{
    check_arity, check_hashable, percent_format, sequence_len, Kwargs, NativeFunction, Value,
};
use crate::error::{LarchError, Result};

fn method<F>(name: &str, f: F) -> Option<Value>
where
    F: Fn(Vec<Value>, Kwargs) -> Result<Value> + 'static,
{
    Some(Value::from(NativeFunction::pure(name, f)))
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

pub fn string_method(s: Rc<String>, name: &str) -> Option<Value> {
    match name {
        "upper" => method(name, move |args, _| {
            check_arity("upper", &args, 0, 0)?;
            Ok(Value::from(s.to_uppercase()))
        }),
        "lower" => method(name, move |args, _| {
            check_arity("lower", &args, 0, 0)?;
            Ok(Value::from(s.to_lowercase()))
        }),
        "title" => method(name, move |_, _| {
            let mut out = String::with_capacity(s.len());
            let mut start = true;
            for c in s.chars() {
                if c.is_alphabetic() {
                    if start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    start = false;
                } else {
                    out.push(c);
                    start = true;
                }
            }
            Ok(Value::from(out))
        }),
        "capitalize" => method(name, move |_, _| {
            let mut chars = s.chars();
            let out: String = match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            };
            Ok(Value::from(out))
        }),
        "strip" | "lstrip" | "rstrip" => {
            let which = name.to_string();
            method(name, move |args, _| {
                check_arity(&which, &args, 0, 1)?;
                let chars: Option<Vec<char>> = match args.first() {
                    Some(Value::None) | None => None,
                    Some(v) => Some(v.as_str()?.chars().collect()),
                };
                let pred = |c: char| match &chars {
                    Some(set) => set.contains(&c),
                    None => c.is_whitespace(),
                };
                let out = match which.as_str() {
                    "lstrip" => s.trim_start_matches(pred),
                    "rstrip" => s.trim_end_matches(pred),
                    _ => s.trim_matches(pred),
                };
                Ok(Value::from(out))
            })
        }
        "split" => method(name, move |args, kwargs| {
            check_arity("split", &args, 0, 2)?;
            let sep = args.first().or_else(|| kwargs.get("sep")).cloned();
            let maxsplit = match args.get(1).or_else(|| kwargs.get("maxsplit")) {
                Some(v) => v.as_int()?,
                None => -1,
            };
            let parts: Vec<Value> = match sep {
                Some(Value::None) | None => {
                    if maxsplit < 0 {
                        s.split_whitespace().map(Value::from).collect()
                    } else {
                        let mut parts = Vec::new();
                        let mut rest = s.trim_start();
                        while !rest.is_empty() && (parts.len() as i64) < maxsplit {
                            match rest.find(char::is_whitespace) {
                                Some(end) => {
                                    parts.push(Value::from(&rest[..end]));
                                    rest = rest[end..].trim_start();
                                }
                                None => {
                                    parts.push(Value::from(rest));
                                    rest = "";
                                }
                            }
                        }
                        if !rest.is_empty() {
                            parts.push(Value::from(rest));
                        }
                        parts
                    }
                }
                Some(sep) => {
                    let sep = sep.as_str()?;
                    if sep.is_empty() {
                        return Err(LarchError::value("empty separator"));
                    }
                    if maxsplit < 0 {
                        s.split(sep).map(Value::from).collect()
                    } else {
                        s.splitn(maxsplit as usize + 1, sep).map(Value::from).collect()
                    }
                }
            };
            Ok(Value::list(parts))
        }),
        "splitlines" => method(name, move |_, _| {
            Ok(Value::list(s.lines().map(Value::from).collect()))
        }),
        "join" => method(name, move |args, _| {
            check_arity("join", &args, 1, 1)?;
            let parts = args[0]
                .iterate()?
                .iter()
                .map(|v| match v {
                    Value::String(p) => Ok(p.as_str().to_string()),
                    other => Err(LarchError::type_error(format!(
                        "sequence item: expected str instance, {} found",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::from(parts.join(s.as_str())))
        }),
        "replace" => method(name, move |args, _| {
            check_arity("replace", &args, 2, 3)?;
            let old = args[0].as_str()?;
            let new = args[1].as_str()?;
            let out = match args.get(2) {
                Some(count) => s.replacen(old, new, count.as_int()?.max(0) as usize),
                None => s.replace(old, new),
            };
            Ok(Value::from(out))
        }),
        "startswith" | "endswith" => {
            let starts = name == "startswith";
            method(name, move |args, _| {
                check_arity(if starts { "startswith" } else { "endswith" }, &args, 1, 1)?;
                let candidates = match &args[0] {
                    Value::Tuple(items) => items.as_ref().clone(),
                    other => vec![other.clone()],
                };
                for candidate in candidates {
                    let candidate = candidate.as_str()?;
                    let hit = if starts {
                        s.starts_with(candidate)
                    } else {
                        s.ends_with(candidate)
                    };
                    if hit {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            })
        }
        "find" | "index" => {
            let strict = name == "index";
            method(name, move |args, _| {
                check_arity(if strict { "index" } else { "find" }, &args, 1, 1)?;
                let needle = args[0].as_str()?;
                match s.find(needle) {
                    Some(byte) => Ok(Value::Int(s[..byte].chars().count() as i64)),
                    None if strict => Err(LarchError::value("substring not found")),
                    None => Ok(Value::Int(-1)),
                }
            })
        }
        "count" => method(name, move |args, _| {
            check_arity("count", &args, 1, 1)?;
            let needle = args[0].as_str()?;
            if needle.is_empty() {
                return Ok(Value::Int(s.chars().count() as i64 + 1));
            }
            Ok(Value::Int(s.matches(needle).count() as i64))
        }),
        "isdigit" => method(name, move |_, _| {
            Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
        }),
        "isalpha" => method(name, move |_, _| {
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
        }),
        "isspace" => method(name, move |_, _| {
            Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)))
        }),
        "zfill" => method(name, move |args, _| {
            check_arity("zfill", &args, 1, 1)?;
            let width = sequence_len(1, args[0].as_int()?)?;
            let len = s.chars().count();
            if len >= width {
                return Ok(Value::String(s.clone()));
            }
            let (sign, digits) = match s.chars().next() {
                Some(c @ ('-' | '+')) => (c.to_string(), &s[1..]),
                _ => (String::new(), s.as_str()),
            };
            Ok(Value::from(format!("{}{}{}", sign, "0".repeat(width - len), digits)))
        }),
        "format" => method(name, move |args, kwargs| brace_format(&s, &args, &kwargs)),
        _ => None,
    }
}

/// `str.format` with `{}`, `{0}`, `{name}` and printf-like `{:.3f}` specs.
fn brace_format(template: &str, args: &[Value], kwargs: &Kwargs) -> Result<Value> {
    let mut out = String::new();
    let mut auto = 0;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(LarchError::value("unmatched '{' in format string")),
                    }
                }
                let (key, spec) = match field.split_once(':') {
                    Some((key, spec)) => (key.to_string(), Some(spec.to_string())),
                    None => (field, None),
                };
                let value = if key.is_empty() {
                    let value = args.get(auto).cloned();
                    auto += 1;
                    value
                } else if let Ok(position) = key.parse::<usize>() {
                    args.get(position).cloned()
                } else {
                    kwargs.get(&key).cloned()
                };
                let value = value.ok_or_else(|| {
                    LarchError::Index {
                        message: format!("format field '{}' has no matching argument", key),
                    }
                })?;
                match spec {
                    Some(spec) if !spec.is_empty() => {
                        let spec = spec.replace('<', "-").replace('>', "");
                        let spec = if spec.ends_with(|c: char| c.is_ascii_alphabetic()) {
                            spec
                        } else {
                            format!("{}s", spec)
                        };
                        out.push_str(&percent_format(&format!("%{}", spec), &value)?);
                    }
                    _ => out.push_str(&value.to_display_string()),
                }
            }
            c => out.push(c),
        }
    }
    Ok(Value::from(out))
}

pub fn list_method(list: Rc<RefCell<Vec<Value>>>, name: &str) -> Option<Value> {
    match name {
        "append" => method(name, move |args, _| {
            check_arity("append", &args, 1, 1)?;
            list.borrow_mut().extend(args);
            Ok(Value::None)
        }),
        "extend" => method(name, move |args, _| {
            check_arity("extend", &args, 1, 1)?;
            let items = args[0].iterate()?;
            list.borrow_mut().extend(items);
            Ok(Value::None)
        }),
        "insert" => method(name, move |args, _| {
            check_arity("insert", &args, 2, 2)?;
            let mut items = list.borrow_mut();
            let len = items.len() as i64;
            let index = args[0].as_int()?;
            let index = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(index as usize, args[1].clone());
            Ok(Value::None)
        }),
        "pop" => method(name, move |args, _| {
            check_arity("pop", &args, 0, 1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(LarchError::index("pop from empty list"));
            }
            let index = match args.first() {
                Some(i) => normalize_index(i.as_int()?, items.len())
                    .ok_or_else(|| LarchError::index("pop index out of range"))?,
                None => items.len() - 1,
            };
            Ok(items.remove(index))
        }),
        "remove" => method(name, move |args, _| {
            check_arity("remove", &args, 1, 1)?;
            let mut items = list.borrow_mut();
            match items.iter().position(|v| *v == args[0]) {
                Some(i) => {
                    items.remove(i);
                    Ok(Value::None)
                }
                None => Err(LarchError::value("list.remove(x): x not in list")),
            }
        }),
        "index" => method(name, move |args, _| {
            check_arity("index", &args, 1, 1)?;
            list.borrow()
                .iter()
                .position(|v| *v == args[0])
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| LarchError::value(format!("{} is not in list", args[0].repr())))
        }),
        "count" => method(name, move |args, _| {
            check_arity("count", &args, 1, 1)?;
            Ok(Value::Int(
                list.borrow().iter().filter(|v| **v == args[0]).count() as i64,
            ))
        }),
        "reverse" => method(name, move |_, _| {
            list.borrow_mut().reverse();
            Ok(Value::None)
        }),
        "sort" => method(name, move |args, kwargs| {
            check_arity("sort", &args, 0, 0)?;
            let reverse = kwargs.get("reverse").map_or(false, Value::is_truthy);
            let mut items = list.borrow().clone();
            let mut failure = None;
            items.sort_by(|a, b| {
                a.compare(b).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    std::cmp::Ordering::Equal
                })
            });
            if let Some(err) = failure {
                return Err(err);
            }
            if reverse {
                items.reverse();
            }
            *list.borrow_mut() = items;
            Ok(Value::None)
        }),
        "copy" => method(name, move |_, _| Ok(Value::list(list.borrow().clone()))),
        "clear" => method(name, move |_, _| {
            list.borrow_mut().clear();
            Ok(Value::None)
        }),
        _ => None,
    }
}

pub fn dict_method(dict: Rc<RefCell<IndexMap<Value, Value>>>, name: &str) -> Option<Value> {
    match name {
        "keys" => method(name, move |_, _| {
            Ok(Value::list(dict.borrow().keys().cloned().collect()))
        }),
        "values" => method(name, move |_, _| {
            Ok(Value::list(dict.borrow().values().cloned().collect()))
        }),
        "items" => method(name, move |_, _| {
            Ok(Value::list(
                dict.borrow()
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }),
        "get" => method(name, move |args, _| {
            check_arity("get", &args, 1, 2)?;
            Ok(dict
                .borrow()
                .get(&args[0])
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
        }),
        "has_key" => method(name, move |args, _| {
            check_arity("has_key", &args, 1, 1)?;
            Ok(Value::Bool(dict.borrow().contains_key(&args[0])))
        }),
        "update" => method(name, move |args, kwargs| {
            check_arity("update", &args, 0, 1)?;
            let mut pairs: Vec<(Value, Value)> = Vec::new();
            if let Some(Value::Dict(other)) = args.first() {
                pairs.extend(other.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
            } else if let Some(other) = args.first() {
                return Err(LarchError::type_error(format!(
                    "update() expects a dict, got {}",
                    other.type_name()
                )));
            }
            pairs.extend(kwargs.into_iter().map(|(k, v)| (Value::from(k), v)));
            let mut map = dict.borrow_mut();
            for (k, v) in pairs {
                map.insert(k, v);
            }
            Ok(Value::None)
        }),
        "pop" => method(name, move |args, _| {
            check_arity("pop", &args, 1, 2)?;
            match dict.borrow_mut().shift_remove(&args[0]) {
                Some(v) => Ok(v),
                None => args.get(1).cloned().ok_or_else(|| LarchError::Key {
                    key: args[0].repr(),
                }),
            }
        }),
        "setdefault" => method(name, move |args, _| {
            check_arity("setdefault", &args, 1, 2)?;
            check_hashable(&args[0])?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            Ok(dict
                .borrow_mut()
                .entry(args[0].clone())
                .or_insert(default)
                .clone())
        }),
        "copy" => method(name, move |_, _| Ok(Value::dict(dict.borrow().clone()))),
        "clear" => method(name, move |_, _| {
            dict.borrow_mut().clear();
            Ok(Value::None)
        }),
        _ => None,
    }
}

fn reduce(data: &[f64], name: &str) -> Result<f64> {
    if data.is_empty() {
        return Err(LarchError::value(format!(
            "{}() of an empty array",
            name
        )));
    }
    Ok(match name {
        "min" => data.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => data.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "mean" => data.iter().sum::<f64>() / data.len() as f64,
        "std" => {
            let mean = data.iter().sum::<f64>() / data.len() as f64;
            let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
            var.sqrt()
        }
        _ => data.iter().sum(),
    })
}

pub fn array_attr(data: Rc<RefCell<Vec<f64>>>, name: &str) -> Option<Value> {
    match name {
        "size" => Some(Value::Int(data.borrow().len() as i64)),
        "shape" => Some(Value::tuple(vec![Value::Int(data.borrow().len() as i64)])),
        "ndim" => Some(Value::Int(1)),
        "dtype" => Some(Value::from("float64")),
        "sum" => method(name, move |_, _| Ok(Value::Float(data.borrow().iter().sum()))),
        "mean" | "min" | "max" | "std" => {
            let which = name.to_string();
            method(name, move |_, _| Ok(Value::Float(reduce(&data.borrow(), &which)?)))
        }
        "argmin" | "argmax" => {
            let want_max = name == "argmax";
            method(name, move |_, _| {
                let data = data.borrow();
                let mut best: Option<(usize, f64)> = None;
                for (i, x) in data.iter().enumerate() {
                    let better = match best {
                        None => true,
                        Some((_, b)) => if want_max { *x > b } else { *x < b },
                    };
                    if better {
                        best = Some((i, *x));
                    }
                }
                best.map(|(i, _)| Value::Int(i as i64))
                    .ok_or_else(|| LarchError::value("argmin/argmax of an empty array"))
            })
        }
        "copy" => method(name, move |_, _| Ok(Value::array(data.borrow().clone()))),
        "tolist" => method(name, move |_, _| {
            Ok(Value::list(data.borrow().iter().map(|x| Value::Float(*x)).collect()))
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(value: &Value, name: &str, args: Vec<Value>) -> Result<Value> {
        match value.get_attr(name) {
            Some(Value::NativeFunction(f)) => {
                let func = f.func.clone();
                let mut host = crate::host::NullHost::default();
                func(&mut host, args, Kwargs::new())
            }
            other => panic!("no method {}: {:?}", name, other),
        }
    }

    #[test]
    fn test_zfill() {
        let s = Value::from("-42");
        assert_eq!(call(&s, "zfill", vec![Value::Int(6)]).unwrap(), Value::from("-00042"));
        assert_eq!(call(&s, "zfill", vec![Value::Int(-1)]).unwrap(), Value::from("-42"));
        let err = call(&s, "zfill", vec![Value::Int(1 << 62)]).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_string_methods() {
        let s = Value::from("  Hello World ");
        assert_eq!(call(&s, "strip", vec![]).unwrap(), Value::from("Hello World"));
        assert_eq!(call(&s, "upper", vec![]).unwrap(), Value::from("  HELLO WORLD "));
        assert_eq!(
            call(&s, "split", vec![]).unwrap(),
            Value::list(vec![Value::from("Hello"), Value::from("World")])
        );
        let csv = Value::from("a,b,c");
        assert_eq!(
            call(&csv, "split", vec![Value::from(","), Value::Int(1)]).unwrap(),
            Value::list(vec![Value::from("a"), Value::from("b,c")])
        );
        assert_eq!(
            call(&Value::from("-"), "join", vec![Value::list(vec![Value::from("x"), Value::from("y")])])
                .unwrap(),
            Value::from("x-y")
        );
        assert_eq!(call(&csv, "find", vec![Value::from("c")]).unwrap(), Value::Int(4));
    }

    #[test]
    fn test_string_format() {
        let t = Value::from("{} + {name} = {:.2f}");
        let f = match t.get_attr("format") {
            Some(Value::NativeFunction(f)) => f,
            _ => panic!("format missing"),
        };
        let mut kwargs = Kwargs::new();
        kwargs.insert("name".into(), Value::from("b"));
        let mut host = crate::host::NullHost::default();
        let out = f
            .call(&mut host, vec![Value::from("a"), Value::Float(3.14159)], kwargs)
            .unwrap();
        assert_eq!(out, Value::from("a + b = 3.14"));
    }

    #[test]
    fn test_list_methods_mutate_in_place() {
        let list = Value::list(vec![Value::Int(3), Value::Int(1)]);
        call(&list, "append", vec![Value::Int(2)]).unwrap();
        call(&list, "sort", vec![]).unwrap();
        assert_eq!(
            list,
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(call(&list, "pop", vec![]).unwrap(), Value::Int(3));
        assert!(call(&list, "remove", vec![Value::Int(9)]).is_err());
        assert!(call(&list, "append", vec![]).is_err());
    }

    #[test]
    fn test_dict_methods() {
        let d = Value::dict(IndexMap::new());
        call(&d, "setdefault", vec![Value::from("k"), Value::Int(1)]).unwrap();
        assert_eq!(call(&d, "get", vec![Value::from("k")]).unwrap(), Value::Int(1));
        assert_eq!(
            call(&d, "get", vec![Value::from("missing"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
        assert!(call(&d, "pop", vec![Value::from("missing")]).is_err());
    }

    #[test]
    fn test_array_attributes() {
        let a = Value::array(vec![1.0, 5.0, 3.0]);
        assert_eq!(a.get_attr("size"), Some(Value::Int(3)));
        assert_eq!(call(&a, "max", vec![]).unwrap(), Value::Float(5.0));
        assert_eq!(call(&a, "argmax", vec![]).unwrap(), Value::Int(1));
        assert_eq!(call(&a, "mean", vec![]).unwrap(), Value::Float(3.0));
    }
}
