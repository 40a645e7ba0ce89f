//! printf-style `%` formatting for strings.

use super::{Value, MAX_SEQUENCE_LEN};
use crate::error::{LarchError, Result};

#[derive(Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

fn pad(spec: &Spec, body: String, numeric: bool) -> String {
    let width = spec.width.unwrap_or(0);
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if spec.left {
        format!("{}{}", body, " ".repeat(fill))
    } else if spec.zero && numeric {
        let (sign, digits) = match body.chars().next() {
            Some(c @ ('-' | '+' | ' ')) => (c.to_string(), body[1..].to_string()),
            _ => (String::new(), body),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn signed(spec: &Spec, negative: bool, digits: String) -> String {
    if negative {
        format!("-{}", digits)
    } else if spec.plus {
        format!("+{}", digits)
    } else if spec.space {
        format!(" {}", digits)
    } else {
        digits
    }
}

fn python_exponent(text: String) -> String {
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => text,
    }
}

fn format_general(x: f64, precision: usize, alternate_upper: bool) -> String {
    let p = precision.max(1);
    if x == 0.0 {
        return "0".into();
    }
    let exp = x.abs().log10().floor() as i32;
    let text = if exp < -4 || exp >= p as i32 {
        let text = python_exponent(format!("{:.*e}", p - 1, x));
        match text.split_once('e') {
            Some((m, e)) if m.contains('.') => {
                format!("{}e{}", m.trim_end_matches('0').trim_end_matches('.'), e)
            }
            _ => text,
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        let text = format!("{:.*}", decimals, x);
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        }
    };
    if alternate_upper {
        text.to_uppercase()
    } else {
        text
    }
}

fn format_one(spec: &Spec, conv: char, value: &Value) -> Result<String> {
    let numeric_error = || {
        LarchError::type_error(format!(
            "%{} format: a number is required, not {}",
            conv,
            value.type_name()
        ))
    };
    let out = match conv {
        's' => {
            let mut s = value.to_display_string();
            if let Some(p) = spec.precision {
                s = s.chars().take(p).collect();
            }
            return Ok(pad(spec, s, false));
        }
        'r' => return Ok(pad(spec, value.repr(), false)),
        'c' => {
            let s = match value {
                Value::String(s) if s.chars().count() == 1 => s.to_string(),
                Value::Int(n) => u32::try_from(*n)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
                    .ok_or_else(|| LarchError::value("%c arg not in range"))?,
                _ => return Err(LarchError::type_error("%c requires int or char")),
            };
            return Ok(pad(spec, s, false));
        }
        'd' | 'i' | 'u' => {
            let n = match value {
                Value::Float(x) => x.trunc() as i64,
                other => other.as_int().map_err(|_| numeric_error())?,
            };
            signed(spec, n < 0, n.unsigned_abs().to_string())
        }
        'x' | 'X' | 'o' => {
            let n = value.as_int().map_err(|_| numeric_error())?;
            let digits = match conv {
                'x' => format!("{:x}", n.unsigned_abs()),
                'X' => format!("{:X}", n.unsigned_abs()),
                _ => format!("{:o}", n.unsigned_abs()),
            };
            signed(spec, n < 0, digits)
        }
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
            let x = value.as_float().map_err(|_| numeric_error())?;
            let precision = spec.precision.unwrap_or(6);
            let digits = match conv {
                'f' | 'F' => format!("{:.*}", precision, x.abs()),
                'e' => python_exponent(format!("{:.*e}", precision, x.abs())),
                'E' => python_exponent(format!("{:.*e}", precision, x.abs())).to_uppercase(),
                'g' => format_general(x.abs(), precision, false),
                _ => format_general(x.abs(), precision, true),
            };
            signed(spec, x.is_sign_negative() && x != 0.0, digits)
        }
        other => {
            return Err(LarchError::value(format!(
                "unsupported format character '{}'",
                other
            )))
        }
    };
    Ok(pad(spec, out, true))
}

/// Apply `template % args`. A tuple supplies one value per conversion,
/// a dict supplies `%(key)s` lookups, anything else is a single value.
pub fn percent_format(template: &str, args: &Value) -> Result<String> {
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    let mut next = 0;
    let mut out = String::with_capacity(template.len());
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.get(i) == Some(&'%') {
            out.push('%');
            i += 1;
            continue;
        }

        let mut keyed: Option<Value> = None;
        if chars.get(i) == Some(&'(') {
            let close = chars[i..]
                .iter()
                .position(|&c| c == ')')
                .ok_or_else(|| LarchError::value("incomplete format key"))?;
            let key: String = chars[i + 1..i + close].iter().collect();
            i += close + 1;
            let Value::Dict(map) = args else {
                return Err(LarchError::type_error("format requires a mapping"));
            };
            let found = map.borrow().get(&Value::from(key.as_str())).cloned();
            keyed = Some(found.ok_or(LarchError::Key { key: key.clone() })?);
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.get(i) {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => {}
                _ => break,
            }
            i += 1;
        }
        let take_number = |i: &mut usize| -> Option<usize> {
            let start = *i;
            while chars.get(*i).map_or(false, |c| c.is_ascii_digit()) {
                *i += 1;
            }
            chars[start..*i].iter().collect::<String>().parse().ok()
        };
        spec.width = take_number(&mut i);
        if chars.get(i) == Some(&'.') {
            i += 1;
            spec.precision = Some(take_number(&mut i).unwrap_or(0));
        }
        if spec.width.max(spec.precision).map_or(false, |n| n > MAX_SEQUENCE_LEN) {
            return Err(LarchError::value("format width is too large"));
        }
        let conv = *chars
            .get(i)
            .ok_or_else(|| LarchError::value("incomplete format"))?;
        i += 1;

        let value = match keyed {
            Some(value) => value,
            None => {
                let value = values
                    .get(next)
                    .cloned()
                    .ok_or_else(|| LarchError::type_error("not enough arguments for format string"))?;
                next += 1;
                value
            }
        };
        out.push_str(&format_one(&spec, conv, &value)?);
    }

    if matches!(args, Value::Tuple(_)) && next < values.len() {
        return Err(LarchError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn fmt(template: &str, args: Value) -> String {
        percent_format(template, &args).unwrap()
    }

    #[test]
    fn test_basic_conversions() {
        assert_eq!(fmt("x = %d", Value::Int(7)), "x = 7");
        assert_eq!(fmt("%.3f", Value::Float(3.14159)), "3.142");
        assert_eq!(fmt("%5.1f|", Value::Float(2.25)), "  2.2|");
        assert_eq!(fmt("%-4s|", Value::from("ab")), "ab  |");
        assert_eq!(fmt("%05d", Value::Int(-42)), "-0042");
        assert_eq!(fmt("%x", Value::Int(255)), "ff");
        assert_eq!(fmt("%e", Value::Float(12345.678)), "1.234568e+04");
        assert_eq!(fmt("%g", Value::Float(0.0001)), "0.0001");
        assert_eq!(fmt("%g", Value::Float(1234567.0)), "1.23457e+06");
        assert_eq!(fmt("100%%", Value::None), "100%");
    }

    #[test]
    fn test_tuple_and_mapping_args() {
        let args = Value::tuple(vec![Value::from("a"), Value::Int(2)]);
        assert_eq!(fmt("%s=%r", args), "a=2");

        let mut map = IndexMap::new();
        map.insert(Value::from("n"), Value::Int(3));
        assert_eq!(fmt("%(n)d items", Value::dict(map)), "3 items");
    }

    #[test]
    fn test_argument_count_errors() {
        let args = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        assert!(percent_format("%d", &args).is_err());
        assert!(percent_format("%d %d", &Value::tuple(vec![Value::Int(1)])).is_err());
        assert!(percent_format("%d", &Value::from("x")).is_err());
        let err = percent_format("%99999999999d", &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind(), "ValueError");
    }
}
