use std::cmp::Ordering;

use larch_core::{check_arity, Kwargs, LarchError, Result, Value};
use larch_parser::BinOp;

use crate::eval::ops;

/// Items for min/max: a single iterable argument is unpacked.
fn candidates(name: &str, args: Vec<Value>) -> Result<Vec<Value>> {
    if args.is_empty() {
        return Err(LarchError::argument(format!(
            "{}() requires at least one argument",
            name
        )));
    }
    let items = match args.as_slice() {
        [single] if !matches!(single, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
            single.iterate()?
        }
        _ => args,
    };
    if items.is_empty() {
        return Err(LarchError::value(format!(
            "{}() arg is an empty sequence",
            name
        )));
    }
    Ok(items)
}

fn extreme(name: &str, args: Vec<Value>, keep: Ordering) -> Result<Value> {
    let mut items = candidates(name, args)?.into_iter();
    let mut best = match items.next() {
        Some(first) => first,
        None => return Err(LarchError::value(format!("{}() arg is an empty sequence", name))),
    };
    for item in items {
        if item.compare(&best)? == keep {
            best = item;
        }
    }
    Ok(best)
}

pub fn min(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    extreme("min", args, Ordering::Less)
}

pub fn max(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    extreme("max", args, Ordering::Greater)
}

pub fn sum(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("sum", &args, 1, 2)?;
    let mut total = args
        .get(1)
        .or_else(|| kwargs.get("start"))
        .cloned()
        .unwrap_or(Value::Int(0));
    if let Value::Array(data) = &args[0] {
        return ops::binary(BinOp::Add, &total, &Value::Float(data.borrow().iter().sum()));
    }
    for item in args[0].iterate()? {
        total = ops::binary(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

pub fn abs(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("abs", &args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| LarchError::value("integer overflow")),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        Value::Array(data) => Ok(Value::array(data.borrow().iter().map(|x| x.abs()).collect())),
        other => Err(LarchError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// Round half to even; `round(x)` gives an int, `round(x, n)` a float.
pub fn round(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("round", &args, 1, 2)?;
    let digits = match args.get(1).or_else(|| kwargs.get("ndigits")) {
        Some(Value::None) | None => None,
        Some(n) => Some(n.as_int()?),
    };
    match (&args[0], digits) {
        (Value::Int(i), _) => Ok(Value::Int(*i)),
        (Value::Bool(b), _) => Ok(Value::Int(i64::from(*b))),
        (Value::Float(x), None) => {
            if !x.is_finite() {
                return Err(LarchError::value(format!(
                    "cannot convert float {} to integer",
                    args[0].to_display_string()
                )));
            }
            Ok(Value::Int(x.round_ties_even() as i64))
        }
        (Value::Float(x), Some(n)) => {
            let scale = 10f64.powi(n.clamp(-308, 308) as i32);
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
        (other, _) => Err(LarchError::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_forms() {
        let list = Value::list(vec![Value::Int(4), Value::Float(1.5), Value::Int(9)]);
        assert_eq!(min(vec![list.clone()], Kwargs::new()).unwrap(), Value::Float(1.5));
        assert_eq!(max(vec![list], Kwargs::new()).unwrap(), Value::Int(9));
        assert_eq!(
            max(vec![Value::from("pear"), Value::from("apple")], Kwargs::new()).unwrap(),
            Value::from("pear")
        );
        let err = min(vec![Value::list(vec![])], Kwargs::new()).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }

    #[test]
    fn test_sum_uses_addition_rules() {
        let ints = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(sum(vec![ints], Kwargs::new()).unwrap(), Value::Int(6));
        let lists = Value::list(vec![Value::list(vec![Value::Int(1)]), Value::list(vec![Value::Int(2)])]);
        let joined = sum(vec![lists, Value::list(vec![])], Kwargs::new()).unwrap();
        assert_eq!(joined.repr(), "[1, 2]");
        let arr = Value::array(vec![0.5, 0.25]);
        assert_eq!(sum(vec![arr], Kwargs::new()).unwrap(), Value::Float(0.75));
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round(vec![Value::Float(2.5)], Kwargs::new()).unwrap(), Value::Int(2));
        assert_eq!(round(vec![Value::Float(3.5)], Kwargs::new()).unwrap(), Value::Int(4));
        assert_eq!(
            round(vec![Value::Float(1.234), Value::Int(2)], Kwargs::new()).unwrap(),
            Value::Float(1.23)
        );
        assert_eq!(abs(vec![Value::Int(-3)], Kwargs::new()).unwrap(), Value::Int(3));
    }
}
