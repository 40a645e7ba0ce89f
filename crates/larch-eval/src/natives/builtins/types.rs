use indexmap::IndexMap;

use larch_core::{check_arity, check_hashable, Kwargs, LarchError, Result, Value};

pub fn to_str(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("str", &args, 0, 1)?;
    Ok(match args.first() {
        Some(value) => Value::from(value.to_display_string()),
        None => Value::from(""),
    })
}

pub fn repr(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("repr", &args, 1, 1)?;
    Ok(Value::from(args[0].repr()))
}

pub fn to_int(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("int", &args, 0, 2)?;
    let base = match args.get(1).or_else(|| kwargs.get("base")) {
        Some(base) => Some(base.as_int()?),
        None => None,
    };
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };

    match (value, base) {
        (Value::String(s), base) => parse_int(s.trim(), base.unwrap_or(10)),
        (_, Some(_)) => Err(LarchError::type_error(
            "int() can't convert non-string with explicit base",
        )),
        (Value::Int(i), None) => Ok(Value::Int(*i)),
        (Value::Bool(b), None) => Ok(Value::Int(i64::from(*b))),
        (Value::Float(x), None) => {
            if !x.is_finite() {
                return Err(LarchError::value(format!(
                    "cannot convert float {} to integer",
                    value.to_display_string()
                )));
            }
            Ok(Value::Int(x.trunc() as i64))
        }
        (other, None) => Err(LarchError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn parse_int(text: &str, base: i64) -> Result<Value> {
    let invalid = || {
        LarchError::value(format!(
            "invalid literal for int() with base {}: '{}'",
            base, text
        ))
    };
    if !(2..=36).contains(&base) && base != 0 {
        return Err(LarchError::value("int() base must be >= 2 and <= 36, or 0"));
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, digits) = match (base, lower.get(..2)) {
        (0 | 16, Some("0x")) => (16, &digits[2..]),
        (0 | 8, Some("0o")) => (8, &digits[2..]),
        (0 | 2, Some("0b")) => (2, &digits[2..]),
        (0, _) => (10, digits),
        (base, _) => (base as u32, digits),
    };
    let digits = digits.replace('_', "");
    let magnitude = i64::from_str_radix(&digits, radix).map_err(|_| invalid())?;
    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

pub fn to_float(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("float", &args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::String(s) => {
            let text = s.trim();
            let parsed = match text.to_ascii_lowercase().as_str() {
                "nan" | "+nan" | "-nan" => Ok(f64::NAN),
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                _ => text.parse::<f64>(),
            };
            parsed.map(Value::Float).map_err(|_| {
                LarchError::value(format!("could not convert string to float: '{}'", text))
            })
        }
        other => other.as_float().map(Value::Float).map_err(|_| {
            LarchError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
        }),
    }
}

pub fn to_bool(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("bool", &args, 0, 1)?;
    Ok(Value::Bool(args.first().map_or(false, Value::is_truthy)))
}

pub fn to_list(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("list", &args, 0, 1)?;
    match args.first() {
        Some(value) => Ok(Value::list(value.iterate()?)),
        None => Ok(Value::list(Vec::new())),
    }
}

pub fn to_tuple(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("tuple", &args, 0, 1)?;
    match args.first() {
        Some(value) => Ok(Value::tuple(value.iterate()?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

/// `dict()`, `dict(mapping)`, `dict(pairs)`, plus keyword entries.
pub fn to_dict(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("dict", &args, 0, 1)?;
    let mut map = IndexMap::new();
    match args.first() {
        None => {}
        Some(Value::Dict(d)) => {
            for (key, value) in d.borrow().iter() {
                map.insert(key.clone(), value.clone());
            }
        }
        Some(Value::Group(g)) => {
            for (name, value) in g.borrow().items() {
                map.insert(Value::from(name), value);
            }
        }
        Some(other) => {
            for (i, pair) in other.iterate()?.into_iter().enumerate() {
                let items = pair.iterate().map_err(|_| {
                    LarchError::type_error(format!(
                        "cannot convert dictionary update sequence element #{} to a sequence",
                        i
                    ))
                })?;
                let [key, value]: [Value; 2] = items.try_into().map_err(|items: Vec<Value>| {
                    LarchError::value(format!(
                        "dictionary update sequence element #{} has length {}; 2 is required",
                        i,
                        items.len()
                    ))
                })?;
                check_hashable(&key)?;
                map.insert(key, value);
            }
        }
    }
    for (key, value) in kwargs {
        map.insert(Value::from(key), value);
    }
    Ok(Value::dict(map))
}

pub fn type_of(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("type", &args, 1, 1)?;
    Ok(Value::from(args[0].type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(Vec<Value>, Kwargs) -> Result<Value>, args: Vec<Value>) -> Result<Value> {
        f(args, Kwargs::new())
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(call(to_int, vec![Value::from(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call(to_int, vec![Value::Float(-3.9)]).unwrap(), Value::Int(-3));
        assert_eq!(
            call(to_int, vec![Value::from("ff"), Value::Int(16)]).unwrap(),
            Value::Int(255)
        );
        assert_eq!(
            call(to_int, vec![Value::from("0b101"), Value::Int(0)]).unwrap(),
            Value::Int(5)
        );
        let err = call(to_int, vec![Value::from("4x")]).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
        let err = call(to_int, vec![Value::Float(f64::NAN)]).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_float_conversions() {
        assert_eq!(call(to_float, vec![Value::from("2.5e3")]).unwrap(), Value::Float(2500.0));
        assert_eq!(call(to_float, vec![Value::Int(2)]).unwrap(), Value::Float(2.0));
        match call(to_float, vec![Value::from("-inf")]).unwrap() {
            Value::Float(x) => assert!(x.is_infinite() && x < 0.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(call(to_float, vec![Value::list(vec![])]).is_err());
    }

    #[test]
    fn test_dict_from_pairs_and_keywords() {
        let pairs = Value::list(vec![
            Value::tuple(vec![Value::from("a"), Value::Int(1)]),
            Value::tuple(vec![Value::from("b"), Value::Int(2)]),
        ]);
        let mut kwargs = Kwargs::new();
        kwargs.insert("c".into(), Value::Int(3));
        let d = to_dict(vec![pairs], kwargs).unwrap();
        assert_eq!(d.repr(), "{'a': 1, 'b': 2, 'c': 3}");

        let bad = Value::list(vec![Value::tuple(vec![Value::Int(1)])]);
        assert_eq!(call(to_dict, vec![bad]).unwrap_err().kind(), "ValueError");
    }

    #[test]
    fn test_str_and_type() {
        assert_eq!(call(to_str, vec![Value::Float(1.0)]).unwrap(), Value::from("1.0"));
        assert_eq!(call(repr, vec![Value::from("a")]).unwrap(), Value::from("'a'"));
        assert_eq!(call(type_of, vec![Value::None]).unwrap(), Value::from("NoneType"));
        assert_eq!(call(to_bool, vec![Value::list(vec![])]).unwrap(), Value::Bool(false));
    }
}
