//! The `_math` group: constants, element-wise functions and array
//! constructors.

use std::f64::consts;

use larch_core::{
    array_from_values, check_arity, sequence_len, Kwargs, LarchError, NativeFunction, Result,
    Value,
};

use crate::eval::Evaluator;

pub fn register(evaluator: &mut Evaluator) {
    evaluator.register_math("pi", Value::Float(consts::PI));
    evaluator.register_math("e", Value::Float(consts::E));
    evaluator.register_math("inf", Value::Float(f64::INFINITY));
    evaluator.register_math("nan", Value::Float(f64::NAN));

    let unary: [(&'static str, fn(f64) -> f64); 12] = [
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log10", f64::log10),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
    ];
    for (name, f) in unary {
        let native = NativeFunction::pure(name, move |args, _kwargs| elementwise(name, f, &args));
        evaluator.register_math(name, Value::from(native));
    }

    let binary: [(&'static str, fn(f64, f64) -> f64); 2] = [("atan2", f64::atan2), ("hypot", f64::hypot)];
    for (name, f) in binary {
        let native = NativeFunction::pure(name, move |args, _kwargs| pairwise(name, f, &args));
        evaluator.register_math(name, Value::from(native));
    }

    for native in [
        NativeFunction::pure("array", array).with_doc("array(values): 1-D float array"),
        NativeFunction::pure("arange", arange).with_doc("arange([start,] stop[, step])"),
        NativeFunction::pure("linspace", linspace).with_doc("linspace(start, stop, num=50)"),
        NativeFunction::pure("zeros", zeros),
        NativeFunction::pure("ones", ones),
        NativeFunction::pure("mean", mean),
    ] {
        let name = native.name.clone();
        evaluator.register_math(&name, Value::from(native));
    }
}

/// Apply `f` to a number (giving a float) or to each element of an array
/// or sequence (giving an array).
fn elementwise(name: &str, f: fn(f64) -> f64, args: &[Value]) -> Result<Value> {
    check_arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(Value::Float(f(args[0].as_float()?))),
        other => Ok(Value::array(
            array_from_values(other)?.into_iter().map(f).collect(),
        )),
    }
}

fn pairwise(name: &str, f: fn(f64, f64) -> f64, args: &[Value]) -> Result<Value> {
    check_arity(name, args, 2, 2)?;
    let scalar = |v: &Value| matches!(v, Value::Int(_) | Value::Float(_) | Value::Bool(_));
    if scalar(&args[0]) && scalar(&args[1]) {
        return Ok(Value::Float(f(args[0].as_float()?, args[1].as_float()?)));
    }
    let pairs = crate::eval::ops::broadcast(&args[0], &args[1])?;
    Ok(Value::array(pairs.into_iter().map(|(a, b)| f(a, b)).collect()))
}

fn array(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("array", &args, 1, 1)?;
    Ok(Value::array(array_from_values(&args[0])?))
}

fn arange(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    let (start, stop, step) = match args.as_slice() {
        [stop] => (0.0, stop.as_float()?, 1.0),
        [start, stop] => (start.as_float()?, stop.as_float()?, 1.0),
        [start, stop, step] => (start.as_float()?, stop.as_float()?, step.as_float()?),
        _ => {
            return Err(LarchError::argument(format!(
                "arange() takes from 1 to 3 arguments ({} given)",
                args.len()
            )))
        }
    };
    if step == 0.0 || !step.is_finite() {
        return Err(LarchError::value("arange() step must be a non-zero number"));
    }
    let count = ((stop - start) / step).ceil();
    if !count.is_finite() {
        return Err(LarchError::value("arange() bounds must be finite"));
    }
    let count = sequence_len(1, count.max(0.0) as i64)?;
    Ok(Value::array((0..count).map(|i| start + i as f64 * step).collect()))
}

fn linspace(args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
    check_arity("linspace", &args, 2, 3)?;
    let start = args[0].as_float()?;
    let stop = args[1].as_float()?;
    let num = match args.get(2).or_else(|| kwargs.get("num")) {
        Some(n) => n.as_int()?,
        None => 50,
    };
    if num < 0 {
        return Err(LarchError::value(format!(
            "number of samples, {}, must be non-negative",
            num
        )));
    }
    sequence_len(1, num)?;
    let data = match num {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            let mut data: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            if let Some(last) = data.last_mut() {
                *last = stop;
            }
            data
        }
    };
    Ok(Value::array(data))
}

fn filled(name: &str, args: &[Value], fill: f64) -> Result<Value> {
    check_arity(name, args, 1, 1)?;
    let n = args[0].as_int()?;
    if n < 0 {
        return Err(LarchError::value("negative dimensions are not allowed"));
    }
    Ok(Value::array(vec![fill; sequence_len(1, n)?]))
}

fn zeros(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    filled("zeros", &args, 0.0)
}

fn ones(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    filled("ones", &args, 1.0)
}

fn mean(args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
    check_arity("mean", &args, 1, 1)?;
    let data = array_from_values(&args[0])?;
    if data.is_empty() {
        return Ok(Value::Float(f64::NAN));
    }
    Ok(Value::Float(data.iter().sum::<f64>() / data.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use larch_core::CaptureWriter;
    use pretty_assertions::assert_eq;

    fn eval(src: &str) -> Value {
        let mut ev = Evaluator::with_writer(Box::new(CaptureWriter::new()));
        ev.exec_unit(src, "<test>", 1).unwrap()
    }

    #[test]
    fn test_math_group_resolves_after_builtins() {
        assert_eq!(eval("sqrt(16)"), Value::Float(4.0));
        assert_eq!(eval("_math.floor(2.7)"), Value::Float(2.0));
        assert_eq!(eval("round(pi, 4)"), Value::Float(3.1416));
        assert_eq!(eval("hypot(3, 4)"), Value::Float(5.0));
    }

    #[test]
    fn test_elementwise_on_arrays() {
        assert_eq!(eval("sqrt([1, 4, 9])"), Value::array(vec![1.0, 2.0, 3.0]));
        assert_eq!(eval("atan2(zeros(2), 1)"), Value::array(vec![0.0, 0.0]));
        match eval("log(-1)") {
            Value::Float(x) => assert!(x.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_array_constructors() {
        assert_eq!(eval("arange(3)"), Value::array(vec![0.0, 1.0, 2.0]));
        assert_eq!(eval("arange(1, 2, 0.25)"), Value::array(vec![1.0, 1.25, 1.5, 1.75]));
        assert_eq!(eval("linspace(0, 1, 5)"), Value::array(vec![0.0, 0.25, 0.5, 0.75, 1.0]));
        assert_eq!(eval("len(linspace(0, 1))"), Value::Int(50));
        assert_eq!(eval("ones(2) * 3"), Value::array(vec![3.0, 3.0]));
        assert_eq!(eval("mean(array([1, 2, 3, 6]))"), Value::Float(3.0));
    }

    #[test]
    fn test_constructor_errors() {
        let mut ev = Evaluator::with_writer(Box::new(CaptureWriter::new()));
        for src in ["arange(0, 1, 0)", "zeros(-1)", "linspace(0, 1, -2)", "ones(2**62)", "arange(1e300)", "linspace(0, 1, 2**40)"] {
            let err = ev.exec_unit(src, "<test>", 1).unwrap_err();
            assert_eq!(err.kind(), "ValueError", "{}", src);
        }
        let err = ev.exec_unit("array(['a'])", "<test>", 1).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }
}
