use std::cmp::Ordering;

use larch_core::{check_arity, sequence_len, Kwargs, Result, Value};

use crate::eval::ops::{range_bounds, range_iter, range_len};

pub fn len(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("len", &args, 1, 1)?;
    Ok(Value::Int(args[0].len()? as i64))
}

pub fn range(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    let (start, stop, step) = range_bounds(&args)?;
    let count = range_len(start, stop, step);
    let count = sequence_len(1, i64::try_from(count).unwrap_or(i64::MAX))?;
    let mut items = Vec::with_capacity(count);
    items.extend(range_iter(start, stop, step).map(Value::Int));
    Ok(Value::list(items))
}

pub fn enumerate(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("enumerate", &args, 1, 2)?;
    let start = match args.get(1).or_else(|| kwargs.get("start")) {
        Some(start) => start.as_int()?,
        None => 0,
    };
    let items = args[0]
        .iterate()?
        .into_iter()
        .enumerate()
        .map(|(i, item)| Value::tuple(vec![Value::Int(start + i as i64), item]))
        .collect();
    Ok(Value::list(items))
}

pub fn zip(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    let columns = args
        .iter()
        .map(Value::iterate)
        .collect::<Result<Vec<_>>>()?;
    let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
    let rows = (0..shortest)
        .map(|i| Value::tuple(columns.iter().map(|col| col[i].clone()).collect()))
        .collect();
    Ok(Value::list(rows))
}

pub fn sorted(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("sorted", &args, 1, 1)?;
    let reverse = kwargs.get("reverse").map_or(false, Value::is_truthy);
    let mut items = args[0].iterate()?;

    let mut failure = None;
    items.sort_by(|a, b| match a.compare(b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            Ordering::Equal
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if reverse {
        items.reverse();
    }
    Ok(Value::list(items))
}

pub fn reversed(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("reversed", &args, 1, 1)?;
    let mut items = args[0].iterate()?;
    items.reverse();
    Ok(Value::list(items))
}
