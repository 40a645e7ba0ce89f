use std::rc::Rc;

use larch_core::{
    array_from_values, check_hashable, percent_format, sequence_len, Group, LarchError, Result,
    Value,
};
use larch_parser::{BinOp, CmpOp, UnaryOp};

/// An evaluated subscript: `a[i]` or `a[lo:hi:step]`.
#[derive(Debug, Clone)]
pub(crate) enum Subscript {
    Item(Value),
    Slice(Option<i64>, Option<i64>, Option<i64>),
}

fn unsupported(op: &str, left: &Value, right: &Value) -> LarchError {
    LarchError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn overflow() -> LarchError {
    LarchError::value("integer overflow")
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_) | Value::Bool(_))
}

fn is_int(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Bool(_))
}

pub(crate) fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, v) if is_int(v) => v.as_int()?.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Value::Array(a)) => Ok(Value::array(a.borrow().iter().map(|x| -x).collect())),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v.clone()),
        (UnaryOp::Pos, Value::Array(a)) => Ok(Value::array(a.borrow().clone())),
        (UnaryOp::Invert, v) if is_int(v) => Ok(Value::Int(!v.as_int()?)),
        (op, v) => {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Invert => "~",
                UnaryOp::Not => "not",
            };
            Err(LarchError::type_error(format!(
                "bad operand type for unary {}: '{}'",
                symbol,
                v.type_name()
            )))
        }
    }
}

fn floor_div_int(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(LarchError::zero_division("integer division or modulo by zero"));
    }
    let q = a.checked_div(b).ok_or_else(overflow)?;
    Ok(if (a % b != 0) && ((a < 0) != (b < 0)) { q - 1 } else { q })
}

fn mod_int(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(LarchError::zero_division("integer division or modulo by zero"));
    }
    let r = a.checked_rem(b).ok_or_else(overflow)?;
    Ok(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
}

fn mod_float(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> Result<Value> {
    let value = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinOp::Div => {
            if b == 0 {
                return Err(LarchError::zero_division("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => floor_div_int(a, b)?,
        BinOp::Mod => mod_int(a, b)?,
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(LarchError::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exp).ok_or_else(overflow)?
        }
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::LShift | BinOp::RShift => {
            if b < 0 {
                return Err(LarchError::value("negative shift count"));
            }
            let shift = u32::try_from(b).map_err(|_| overflow())?;
            if op == BinOp::LShift {
                let shifted = a.checked_shl(shift).ok_or_else(overflow)?;
                if shifted >> shift != a {
                    return Err(overflow());
                }
                shifted
            } else {
                a.checked_shr(shift).unwrap_or(if a < 0 { -1 } else { 0 })
            }
        }
    };
    Ok(Value::Int(value))
}

fn float_op(op: BinOp, a: f64, b: f64) -> Result<f64> {
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div => {
            if b == 0.0 {
                return Err(LarchError::zero_division("float division by zero"));
            }
            Ok(a / b)
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(LarchError::zero_division("float divmod()"));
            }
            Ok((a / b).floor())
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(LarchError::zero_division("float modulo"));
            }
            Ok(mod_float(a, b))
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(LarchError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            Ok(a.powf(b))
        }
        _ => Err(LarchError::type_error(format!(
            "unsupported operand type(s) for {}: 'float'",
            op.symbol()
        ))),
    }
}

/// Element-wise arithmetic; division by zero follows IEEE rules.
fn array_element(op: BinOp, a: f64, b: f64) -> Result<f64> {
    match op {
        BinOp::Div => Ok(a / b),
        BinOp::FloorDiv => Ok((a / b).floor()),
        BinOp::Mod => Ok(if b == 0.0 { f64::NAN } else { mod_float(a, b) }),
        BinOp::Pow => Ok(a.powf(b)),
        _ => float_op(op, a, b),
    }
}

/// Pair up array operands: equal lengths, or one side a scalar.
pub(crate) fn broadcast(left: &Value, right: &Value) -> Result<Vec<(f64, f64)>> {
    let a = array_from_values(left)?;
    let b = array_from_values(right)?;
    let scalar_left = is_number(left);
    let scalar_right = is_number(right);
    if scalar_left {
        return Ok(b.iter().map(|y| (a[0], *y)).collect());
    }
    if scalar_right {
        return Ok(a.iter().map(|x| (*x, b[0])).collect());
    }
    if a.len() != b.len() {
        return Err(LarchError::value(format!(
            "operands could not be broadcast together with shapes ({},) ({},)",
            a.len(),
            b.len()
        )));
    }
    Ok(a.into_iter().zip(b).collect())
}

fn array_binary(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    let data = broadcast(left, right)?
        .into_iter()
        .map(|(x, y)| array_element(op, x, y))
        .collect::<Result<Vec<f64>>>()?;
    Ok(Value::array(data))
}

/// Start, stop and step of `range(args)`.
pub(crate) fn range_bounds(args: &[Value]) -> Result<(i64, i64, i64)> {
    let (start, stop, step) = match args {
        [stop] => (0, stop.as_int()?, 1),
        [start, stop] => (start.as_int()?, stop.as_int()?, 1),
        [start, stop, step] => (start.as_int()?, stop.as_int()?, step.as_int()?),
        _ => {
            return Err(LarchError::argument(format!(
                "range() takes from 1 to 3 arguments ({} given)",
                args.len()
            )))
        }
    };
    if step == 0 {
        return Err(LarchError::value("range() arg 3 must not be zero"));
    }
    Ok((start, stop, step))
}

/// Number of values a range produces.
pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> u64 {
    let (span, stride) = if step > 0 {
        (i128::from(stop) - i128::from(start), i128::from(step))
    } else {
        (i128::from(start) - i128::from(stop), -i128::from(step))
    };
    if span <= 0 {
        0
    } else {
        ((span + stride - 1) / stride) as u64
    }
}

/// The values of a range, produced one at a time.
pub(crate) fn range_iter(start: i64, stop: i64, step: i64) -> impl Iterator<Item = i64> {
    std::iter::successors(Some(start), move |i| i.checked_add(step))
        .take_while(move |i| if step > 0 { *i < stop } else { *i > stop })
}

fn repeat<T: Clone>(items: &[T], count: i64) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(sequence_len(items.len(), count)?);
    if !items.is_empty() {
        for _ in 0..count.max(0) {
            out.extend_from_slice(items);
        }
    }
    Ok(out)
}

pub(crate) fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Array(_), _) | (_, Value::Array(_)) => array_binary(op, left, right),

        (Value::Bool(a), Value::Bool(b)) if matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor) => {
            Ok(Value::Bool(match op {
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                _ => a ^ b,
            }))
        }
        (l, r) if is_int(l) && is_int(r) => int_op(op, l.as_int()?, r.as_int()?),
        (l, r) if is_number(l) && is_number(r) => {
            float_op(op, l.as_float()?, r.as_float()?).map(Value::Float)
        }

        (Value::String(a), Value::String(b)) if op == BinOp::Add => {
            Ok(Value::from(format!("{}{}", a, b)))
        }
        (Value::String(s), n) | (n, Value::String(s)) if op == BinOp::Mul && is_int(n) => {
            let count = n.as_int()?;
            if sequence_len(s.len(), count)? == 0 {
                return Ok(Value::from(""));
            }
            Ok(Value::from(s.repeat(count as usize)))
        }
        (Value::String(template), args) if op == BinOp::Mod => {
            Ok(Value::from(percent_format(template, args)?))
        }

        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::List(l), n) | (n, Value::List(l)) if op == BinOp::Mul && is_int(n) => {
            Ok(Value::list(repeat(l.borrow().as_slice(), n.as_int()?)?))
        }
        (Value::Tuple(a), Value::Tuple(b)) if op == BinOp::Add => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        (Value::Tuple(t), n) | (n, Value::Tuple(t)) if op == BinOp::Mul && is_int(n) => {
            Ok(Value::tuple(repeat(t.as_slice(), n.as_int()?)?))
        }

        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

fn array_compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value> {
    let data = broadcast(left, right)?
        .into_iter()
        .map(|(x, y)| {
            let hit = match op {
                CmpOp::Eq => x == y,
                CmpOp::NotEq => x != y,
                CmpOp::Lt => x < y,
                CmpOp::LtE => x <= y,
                CmpOp::Gt => x > y,
                _ => x >= y,
            };
            if hit {
                1.0
            } else {
                0.0
            }
        })
        .collect();
    Ok(Value::array(data))
}

/// Apply one comparison operator. Arrays compare element-wise and give a
/// 0/1 mask.
pub(crate) fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Value> {
    let array_operands = matches!(left, Value::Array(_)) || matches!(right, Value::Array(_));
    let result = match op {
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
        CmpOp::Is => left.is_same(right),
        CmpOp::IsNot => !left.is_same(right),
        _ if array_operands => return array_compare(op, left, right),
        CmpOp::Eq => left == right,
        CmpOp::NotEq => left != right,
        CmpOp::Lt => left.compare(right)?.is_lt(),
        CmpOp::LtE => left.compare(right)?.is_le(),
        CmpOp::Gt => left.compare(right)?.is_gt(),
        CmpOp::GtE => left.compare(right)?.is_ge(),
    };
    Ok(Value::Bool(result))
}

pub(crate) fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v == item)),
        Value::Tuple(items) => Ok(items.iter().any(|v| v == item)),
        Value::Dict(map) => Ok(map.borrow().contains_key(item)),
        Value::String(s) => match item {
            Value::String(sub) => Ok(s.contains(sub.as_str())),
            other => Err(LarchError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Group(group) => Ok(item
            .as_str()
            .map(|name| group.borrow().contains(name))
            .unwrap_or(false)),
        Value::Array(data) => {
            let x = item.as_float()?;
            Ok(data.borrow().iter().any(|v| *v == x))
        }
        other => Err(LarchError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn normalize(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

/// Positions selected by a slice, with Python's clamping rules.
pub(crate) fn slice_indices(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(LarchError::value("slice step cannot be zero"));
    }
    let len = len as i64;
    let adjust = |bound: Option<i64>, default: i64, lo: i64, hi: i64| match bound {
        None => default,
        Some(v) => {
            let v = if v < 0 { v + len } else { v };
            v.clamp(lo, hi)
        }
    };
    let mut out = Vec::new();
    if step > 0 {
        let start = adjust(lower, 0, 0, len);
        let stop = adjust(upper, len, 0, len);
        let mut i = start;
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        let start = adjust(lower, len - 1, -1, len - 1);
        let stop = adjust(upper, -1, -1, len - 1);
        let mut i = start;
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    Ok(out)
}

fn index_of(value: &Value, len: usize, what: &str) -> Result<usize> {
    let index = match value {
        Value::Int(_) | Value::Bool(_) => value.as_int()?,
        Value::Float(x) if x.fract() == 0.0 && what == "array" => *x as i64,
        other => {
            return Err(LarchError::type_error(format!(
                "{} indices must be integers, not {}",
                what,
                other.type_name()
            )))
        }
    };
    normalize(index, len).ok_or_else(|| LarchError::index(format!("{} index out of range", what)))
}

pub(crate) fn get_item(target: &Value, index: &Subscript) -> Result<Value> {
    match (target, index) {
        (Value::List(items), Subscript::Item(i)) => {
            let items = items.borrow();
            Ok(items[index_of(i, items.len(), "list")?].clone())
        }
        (Value::Tuple(items), Subscript::Item(i)) => {
            Ok(items[index_of(i, items.len(), "tuple")?].clone())
        }
        (Value::String(s), Subscript::Item(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::from(chars[index_of(i, chars.len(), "string")?].to_string()))
        }
        (Value::Array(data), Subscript::Item(i)) => {
            let data = data.borrow();
            Ok(Value::Float(data[index_of(i, data.len(), "array")?]))
        }
        (Value::Dict(map), Subscript::Item(key)) => {
            check_hashable(key)?;
            map.borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| LarchError::Key { key: key.repr() })
        }
        (Value::Group(group), Subscript::Item(name)) => {
            let name = name.as_str()?;
            group.borrow().get(name).ok_or_else(|| {
                LarchError::lookup(format!(
                    "group '{}' has no symbol '{}'",
                    Group::path(group),
                    name
                ))
            })
        }

        (Value::List(items), Subscript::Slice(lo, hi, step)) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), *lo, *hi, *step)?;
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        (Value::Tuple(items), Subscript::Slice(lo, hi, step)) => {
            let picked = slice_indices(items.len(), *lo, *hi, *step)?;
            Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        (Value::String(s), Subscript::Slice(lo, hi, step)) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), *lo, *hi, *step)?;
            Ok(Value::from(picked.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        (Value::Array(data), Subscript::Slice(lo, hi, step)) => {
            let data = data.borrow();
            let picked = slice_indices(data.len(), *lo, *hi, *step)?;
            Ok(Value::array(picked.into_iter().map(|i| data[i]).collect()))
        }

        (other, _) => Err(LarchError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub(crate) fn set_item(target: &Value, index: &Subscript, value: Value) -> Result<()> {
    match (target, index) {
        (Value::List(items), Subscript::Item(i)) => {
            let mut items = items.borrow_mut();
            let pos = index_of(i, items.len(), "list")?;
            items[pos] = value;
            Ok(())
        }
        (Value::List(items), Subscript::Slice(lo, hi, None | Some(1))) => {
            let replacement = value.iterate()?;
            let mut items = items.borrow_mut();
            let picked = slice_indices(items.len(), *lo, *hi, None)?;
            let start = match (picked.first(), lo) {
                (Some(first), _) => *first,
                (None, Some(lo)) => {
                    let lo = if *lo < 0 { *lo + items.len() as i64 } else { *lo };
                    lo.clamp(0, items.len() as i64) as usize
                }
                (None, None) => 0,
            };
            let _replaced: Vec<Value> = items.splice(start..start + picked.len(), replacement).collect();
            Ok(())
        }
        (Value::Array(data), Subscript::Item(i)) => {
            let x = value.as_float()?;
            let mut data = data.borrow_mut();
            let pos = index_of(i, data.len(), "array")?;
            data[pos] = x;
            Ok(())
        }
        (Value::Array(data), Subscript::Slice(lo, hi, step)) => {
            let mut data = data.borrow_mut();
            let picked = slice_indices(data.len(), *lo, *hi, *step)?;
            let values = if is_number(&value) {
                vec![value.as_float()?; picked.len()]
            } else {
                array_from_values(&value)?
            };
            if values.len() != picked.len() {
                return Err(LarchError::value(format!(
                    "could not broadcast {} values into a slice of {}",
                    values.len(),
                    picked.len()
                )));
            }
            for (pos, x) in picked.into_iter().zip(values) {
                data[pos] = x;
            }
            Ok(())
        }
        (Value::Dict(map), Subscript::Item(key)) => {
            check_hashable(key)?;
            map.borrow_mut().insert(key.clone(), value);
            Ok(())
        }
        (Value::Group(group), Subscript::Item(name)) => Group::set(group, name.as_str()?, value),
        (other, _) => Err(LarchError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

pub(crate) fn del_item(target: &Value, index: &Subscript) -> Result<()> {
    match (target, index) {
        (Value::List(items), Subscript::Item(i)) => {
            let mut items = items.borrow_mut();
            let pos = index_of(i, items.len(), "list")?;
            items.remove(pos);
            Ok(())
        }
        (Value::List(items), Subscript::Slice(lo, hi, step)) => {
            let mut items = items.borrow_mut();
            let mut picked = slice_indices(items.len(), *lo, *hi, *step)?;
            picked.sort_unstable();
            for pos in picked.into_iter().rev() {
                items.remove(pos);
            }
            Ok(())
        }
        (Value::Dict(map), Subscript::Item(key)) => map
            .borrow_mut()
            .shift_remove(key)
            .map(|_| ())
            .ok_or_else(|| LarchError::Key { key: key.repr() }),
        (Value::Group(group), Subscript::Item(name)) => {
            let name = name.as_str()?;
            group
                .borrow_mut()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| LarchError::lookup(format!("no symbol '{}' to delete", name)))
        }
        (other, _) => Err(LarchError::type_error(format!(
            "'{}' object does not support item deletion",
            other.type_name()
        ))),
    }
}

/// `a += b` on a list extends it in place; everything else rebinds.
pub(crate) fn augmented(op: BinOp, current: &Value, rhs: &Value) -> Result<Value> {
    if let (BinOp::Add, Value::List(items)) = (op, current) {
        let extra = rhs.iterate()?;
        items.borrow_mut().extend(extra);
        return Ok(Value::List(Rc::clone(items)));
    }
    binary(op, current, rhs)
}
