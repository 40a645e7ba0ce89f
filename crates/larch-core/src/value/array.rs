use super::Value;
use crate::error::{LarchError, Result};

/// Shortest text that reads back as the same float, with `.0` on whole
/// numbers and exponent form for very large or small magnitudes.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{:e}", x);
        return match text.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(digits) => ('-', digits),
                    None => ('+', exp),
                };
                format!("{}e{}{:0>2}", mantissa, sign, digits)
            }
            None => text,
        };
    }
    if x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        x.to_string()
    }
}

/// Flatten numbers, lists, tuples and arrays into array data.
pub fn array_from_values(value: &Value) -> Result<Vec<f64>> {
    match value {
        Value::Array(a) => Ok(a.borrow().clone()),
        Value::List(_) | Value::Tuple(_) => value
            .iterate()?
            .iter()
            .map(|item| item.as_float())
            .collect::<Result<Vec<f64>>>()
            .map_err(|_| LarchError::type_error("array elements must be numbers")),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(vec![value.as_float()?]),
        other => Err(LarchError::type_error(format!(
            "cannot convert {} to array",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_array_from_values() {
        let list = Value::list(vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(array_from_values(&list).unwrap(), vec![1.0, 2.5]);
        assert!(array_from_values(&Value::list(vec![Value::from("x")])).is_err());
        assert_eq!(array_from_values(&Value::Int(3)).unwrap(), vec![3.0]);
    }
}
