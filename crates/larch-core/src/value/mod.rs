mod array;
mod format;
mod functions;
mod group;
mod methods;

pub use array::{array_from_values, format_float};
pub use format::percent_format;
pub use functions::{check_arity, Kwargs, NativeFn, NativeFunction, Procedure};
pub use group::{Group, GroupRef};

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{LarchError, Result};

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Rc<String>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<IndexMap<Value, Value>>>),
    Array(Rc<RefCell<Vec<f64>>>),
    Group(GroupRef),
    Procedure(Rc<Procedure>),
    NativeFunction(Rc<NativeFunction>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({:?})", s.as_str()),
            Value::List(l) => write!(f, "List({:?})", l.borrow()),
            Value::Tuple(t) => write!(f, "Tuple({:?})", t.as_ref()),
            Value::Dict(d) => write!(f, "Dict({} items)", d.borrow().len()),
            Value::Array(a) => write!(f, "Array({:?})", a.borrow()),
            Value::Group(g) => write!(f, "Group({})", g.borrow().name()),
            Value::Procedure(p) => write!(f, "Procedure({})", p.name),
            Value::NativeFunction(func) => write!(f, "NativeFunction({})", func.name),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::new(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::new(s))
    }
}

impl From<GroupRef> for Value {
    fn from(g: GroupRef) -> Self {
        Value::Group(g)
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Value::NativeFunction(Rc::new(f))
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(map: IndexMap<Value, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn array(data: Vec<f64>) -> Value {
        Value::Array(Rc::new(RefCell::new(data)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Array(_) => "array",
            Value::Group(_) => "group",
            Value::Procedure(_) => "procedure",
            Value::NativeFunction(_) => "builtin_function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Tuple(t) => !t.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Procedure(_) | Value::NativeFunction(_))
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => Err(LarchError::type_error(format!(
                "expected int, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => Err(LarchError::type_error(format!(
                "expected a number, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            _ => Err(LarchError::type_error(format!(
                "expected str, got {}",
                self.type_name()
            ))),
        }
    }

    pub fn as_group(&self) -> Result<GroupRef> {
        match self {
            Value::Group(g) => Ok(g.clone()),
            _ => Err(LarchError::type_error(format!(
                "expected group, got {}",
                self.type_name()
            ))),
        }
    }

    /// Elements produced by iterating the value, as `for` does.
    pub fn iterate(&self) -> Result<Vec<Value>> {
        match self {
            Value::List(l) => Ok(l.borrow().clone()),
            Value::Tuple(t) => Ok(t.as_ref().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Dict(d) => Ok(d.borrow().keys().cloned().collect()),
            Value::Array(a) => Ok(a.borrow().iter().map(|x| Value::Float(*x)).collect()),
            Value::Group(g) => Ok(g
                .borrow()
                .names()
                .into_iter()
                .map(Value::from)
                .collect()),
            _ => Err(LarchError::type_error(format!(
                "'{}' object is not iterable",
                self.type_name()
            ))),
        }
    }

    pub fn len(&self) -> Result<usize> {
        match self {
            Value::String(s) => Ok(s.chars().count()),
            Value::List(l) => Ok(l.borrow().len()),
            Value::Tuple(t) => Ok(t.len()),
            Value::Dict(d) => Ok(d.borrow().len()),
            Value::Array(a) => Ok(a.borrow().len()),
            Value::Group(g) => Ok(g.borrow().len()),
            _ => Err(LarchError::type_error(format!(
                "object of type '{}' has no len()",
                self.type_name()
            ))),
        }
    }

    /// Identity comparison for `is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Group(a), Value::Group(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering used by `<`, `sorted`, `min` and `max`.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        let unordered = || {
            LarchError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))
        };
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (
                Value::Int(_) | Value::Float(_) | Value::Bool(_),
                Value::Int(_) | Value::Float(_) | Value::Bool(_),
            ) => {
                let (a, b) = (self.as_float()?, other.as_float()?);
                a.partial_cmp(&b).ok_or_else(unordered)
            }
            (Value::List(_), Value::List(_)) | (Value::Tuple(_), Value::Tuple(_)) => {
                let (a, b) = (self.iterate()?, other.iterate()?);
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Ok(ord),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => Err(unordered()),
        }
    }

    pub fn to_display_string(&self) -> String {
        self.display_in(&mut Vec::new())
    }

    /// `seen` holds the containers currently being printed, so a list or
    /// dict that contains itself prints as `[...]` or `{...}`.
    fn display_in(&self, seen: &mut Vec<usize>) -> String {
        match self {
            Value::None => "None".into(),
            Value::Bool(b) => if *b { "True" } else { "False" }.into(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => format_float(*x),
            Value::String(s) => s.as_ref().clone(),
            Value::List(l) => {
                let id = Rc::as_ptr(l) as usize;
                if seen.contains(&id) {
                    return "[...]".into();
                }
                seen.push(id);
                let items: Vec<String> = l.borrow().iter().map(|v| v.repr_in(seen)).collect();
                seen.pop();
                format!("[{}]", items.join(", "))
            }
            Value::Tuple(t) => {
                let items: Vec<String> = t.iter().map(|v| v.repr_in(seen)).collect();
                if t.len() == 1 {
                    format!("({},)", items[0])
                } else {
                    format!("({})", items.join(", "))
                }
            }
            Value::Dict(d) => {
                let id = Rc::as_ptr(d) as usize;
                if seen.contains(&id) {
                    return "{...}".into();
                }
                seen.push(id);
                let items: Vec<String> = d
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr_in(seen), v.repr_in(seen)))
                    .collect();
                seen.pop();
                format!("{{{}}}", items.join(", "))
            }
            Value::Array(a) => {
                let items: Vec<String> = a.borrow().iter().map(|x| format_float(*x)).collect();
                format!("array([{}])", items.join(", "))
            }
            Value::Group(g) => format!("<Group {}>", g.borrow().name()),
            Value::Procedure(p) => format!("<Procedure {}, file={}>", p.signature(), p.filename),
            Value::NativeFunction(f) => format!("<builtin function {}>", f.name),
        }
    }

    pub fn repr(&self) -> String {
        self.repr_in(&mut Vec::new())
    }

    fn repr_in(&self, seen: &mut Vec<usize>) -> String {
        match self {
            Value::String(s) => {
                let quote = if s.contains('\'') && !s.contains('"') {
                    '"'
                } else {
                    '\''
                };
                let mut out = String::with_capacity(s.len() + 2);
                out.push(quote);
                for c in s.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c if c == quote => {
                            out.push('\\');
                            out.push(c);
                        }
                        c => out.push(c),
                    }
                }
                out.push(quote);
                out
            }
            _ => self.display_in(seen),
        }
    }

    /// Attribute access on non-group values: bound methods and a few
    /// read-only properties.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::Group(g) => g.borrow().get(name),
            Value::String(s) => methods::string_method(s.clone(), name),
            Value::List(l) => methods::list_method(l.clone(), name),
            Value::Dict(d) => methods::dict_method(d.clone(), name),
            Value::Array(a) => methods::array_attr(a.clone(), name),
            Value::Procedure(p) => match name {
                "__name__" => Some(Value::from(p.name.clone())),
                "__doc__" => Some(p.doc().map(Value::from).unwrap_or(Value::None)),
                _ => None,
            },
            Value::NativeFunction(f) => match name {
                "__name__" => Some(Value::from(f.name.clone())),
                "__doc__" => Some(f.doc.clone().map(Value::from).unwrap_or(Value::None)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Bool(a), Value::Int(b)) | (Value::Int(b), Value::Bool(a)) => {
                i64::from(*a) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b) || {
                    let a = a.borrow();
                    let b = b.borrow();
                    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Group(a), Value::Group(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            // Numbers that compare equal must hash equal.
            Value::Bool(b) => i64::from(*b).hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 9.0e18 {
                    (*x as i64).hash(state)
                } else {
                    x.to_bits().hash(state)
                }
            }
            Value::None => 0u8.hash(state),
            Value::String(s) => s.hash(state),
            Value::Tuple(t) => t.hash(state),
            Value::Group(g) => (Rc::as_ptr(g) as usize).hash(state),
            Value::Procedure(p) => (Rc::as_ptr(p) as usize).hash(state),
            Value::NativeFunction(f) => (Rc::as_ptr(f) as usize).hash(state),
            _ => std::mem::discriminant(self).hash(state),
        }
    }
}

/// Dictionary keys must be immutable values.
pub fn check_hashable(key: &Value) -> Result<()> {
    match key {
        Value::List(_) | Value::Dict(_) | Value::Array(_) => Err(LarchError::type_error(format!(
            "unhashable type: '{}'",
            key.type_name()
        ))),
        Value::Tuple(items) => items.iter().try_for_each(check_hashable),
        _ => Ok(()),
    }
}

/// Most elements one string, list or array operation may produce.
pub const MAX_SEQUENCE_LEN: usize = 1 << 28;

/// Length of a sequence built from `count` copies of `unit` elements,
/// refused with a `ValueError` past [`MAX_SEQUENCE_LEN`].
pub fn sequence_len(unit: usize, count: i64) -> Result<usize> {
    let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
    unit.checked_mul(count)
        .filter(|len| *len <= MAX_SEQUENCE_LEN)
        .ok_or_else(|| LarchError::value("resulting sequence is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sequence_len_limits() {
        assert_eq!(sequence_len(2, 3).unwrap(), 6);
        assert_eq!(sequence_len(5, -4).unwrap(), 0);
        assert_eq!(sequence_len(0, i64::MAX).unwrap(), 0);
        assert_eq!(sequence_len(2, 1 << 62).unwrap_err().kind(), "ValueError");
        assert!(sequence_len(1, MAX_SEQUENCE_LEN as i64 + 1).is_err());
    }

    #[test]
    fn test_display_and_repr() {
        assert_eq!(Value::Float(2.0).to_display_string(), "2.0");
        assert_eq!(Value::from("it's").repr(), "\"it's\"");
        assert_eq!(Value::from("a").repr(), "'a'");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::from("x")]).to_display_string(),
            "[1, 'x']"
        );
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_display_string(), "(1,)");
        assert_eq!(Value::array(vec![1.0, 2.5]).to_display_string(), "array([1.0, 2.5])");
    }

    #[test]
    fn test_self_containing_containers() {
        let a = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &a {
            items.borrow_mut().push(a.clone());
        }
        assert_eq!(a.to_display_string(), "[1, [...]]");

        let d = Value::dict(IndexMap::new());
        if let Value::Dict(map) = &d {
            map.borrow_mut().insert(Value::from("me"), d.clone());
            map.borrow_mut().insert(Value::from("t"), Value::tuple(vec![a.clone()]));
        }
        assert_eq!(d.repr(), "{'me': {...}, 't': ([1, [...]],)}");

        // break the cycles so the test does not leak
        if let Value::List(items) = &a {
            items.borrow_mut().clear();
        }
        if let Value::Dict(map) = &d {
            map.borrow_mut().clear();
        }
    }

    #[test]
    fn test_numeric_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        fn hash(v: &Value) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(hash(&Value::Int(1)), hash(&Value::Float(1.0)));
        assert_eq!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::list(vec![Value::None]).is_truthy());
        assert!(!Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_identity_vs_equality() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert_eq!(a, b);
        assert!(!a.is_same(&b));
        assert!(a.is_same(&a.clone()));
    }

    #[test]
    fn test_hashable_keys() {
        assert!(check_hashable(&Value::from("k")).is_ok());
        assert!(check_hashable(&Value::list(vec![])).is_err());
        assert!(check_hashable(&Value::tuple(vec![Value::list(vec![])])).is_err());
    }
}
