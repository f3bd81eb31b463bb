//! Parameter shapes and argument binding.
//!
//! Each route declares the parameters its handler takes as a list of
//! [`ParamShape`]s. [`bind`] checks the merged request parameters against
//! that list and coerces them into [`Args`]:
//!
//! | declared | accepts                                                   |
//! |----------|-----------------------------------------------------------|
//! | `Str`    | strings                                                   |
//! | `Int`    | integers, integral floats, strings holding an integer     |
//! | `Float`  | numbers, strings holding a finite float                   |
//! | `Bool`   | booleans, `0`/`1`, `true/false/yes/no/on/off` (any case)  |
//! | `List(T)`| arrays, element-wise                                      |
//! | `Map(T)` | objects, value-wise                                       |
//! | `Any`    | anything                                                  |
//!
//! An optional parameter that is absent or `null` binds as `null`.
//! Parameters nobody declared are dropped.

use crate::router::{HandlerError, ValidationError};
use serde_json::{Map, Number, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    List(Box<ParamType>),
    Map(Box<ParamType>),
    Any,
}

impl ParamType {
    pub fn list(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    pub fn map(inner: ParamType) -> Self {
        ParamType::Map(Box::new(inner))
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Str => f.write_str("str"),
            ParamType::Int => f.write_str("int"),
            ParamType::Float => f.write_str("float"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::List(inner) => write!(f, "list[{inner}]"),
            ParamType::Map(inner) => write!(f, "map[{inner}]"),
            ParamType::Any => f.write_str("any"),
        }
    }
}

/// One declared handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    name: String,
    ty: ParamType,
    optional: bool,
}

impl ParamShape {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Bound, type-checked handler arguments in declaration order.
///
/// Accessors fail with a [`HandlerError`] so handlers can use `?`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Map<String, Value>,
}

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn str(&self, name: &str) -> Result<&str, HandlerError> {
        self.require(name, "str", Value::as_str)
    }

    pub fn int(&self, name: &str) -> Result<i64, HandlerError> {
        self.require(name, "int", Value::as_i64)
    }

    pub fn float(&self, name: &str) -> Result<f64, HandlerError> {
        self.require(name, "float", Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Result<bool, HandlerError> {
        self.require(name, "bool", Value::as_bool)
    }

    pub fn list(&self, name: &str) -> Result<&Vec<Value>, HandlerError> {
        self.require(name, "list", Value::as_array)
    }

    pub fn map(&self, name: &str) -> Result<&Map<String, Value>, HandlerError> {
        self.require(name, "map", Value::as_object)
    }

    /// `None` when the optional parameter was absent or `null`.
    pub fn opt_int(&self, name: &str) -> Result<Option<i64>, HandlerError> {
        self.optional(name, "int", Value::as_i64)
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, HandlerError> {
        self.optional(name, "str", Value::as_str)
    }

    fn require<'a, T>(
        &'a self,
        name: &str,
        kind: &str,
        get: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, HandlerError> {
        match self.values.get(name) {
            Some(value) => get(value).ok_or_else(|| {
                HandlerError::new(format!("argument '{name}' is not of type {kind}"))
            }),
            None => Err(HandlerError::new(format!("no argument named '{name}'"))),
        }
    }

    fn optional<'a, T>(
        &'a self,
        name: &str,
        kind: &str,
        get: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<Option<T>, HandlerError> {
        match self.values.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.require(name, kind, get).map(Some),
        }
    }
}

/// Validate `params` against `shapes` and coerce the declared values.
///
/// Fails on the first parameter, in declaration order, that is missing or
/// cannot be coerced.
pub fn bind(shapes: &[ParamShape], params: &Map<String, Value>) -> Result<Args, ValidationError> {
    let mut values = Map::new();

    for shape in shapes {
        let value = match params.get(&shape.name) {
            None | Some(Value::Null) if shape.optional => Value::Null,
            None => {
                return Err(ValidationError::Missing {
                    param: shape.name.clone(),
                })
            }
            Some(value) => coerce(&shape.name, &shape.ty, value)?,
        };
        values.insert(shape.name.clone(), value);
    }

    Ok(Args { values })
}

fn coerce(path: &str, ty: &ParamType, value: &Value) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::Type {
        param: path.to_string(),
        expected: ty.to_string(),
        found: kind(value).to_string(),
    };

    match (ty, value) {
        (ParamType::Any, _) => Ok(value.clone()),

        (ParamType::Str, Value::String(_)) => Ok(value.clone()),

        (ParamType::Int, Value::Number(n)) => int_from_number(n).ok_or_else(mismatch),
        (ParamType::Int, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch()),

        (ParamType::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),
        (ParamType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),

        (ParamType::Bool, Value::Bool(_)) => Ok(value.clone()),
        (ParamType::Bool, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(mismatch()),
        },
        (ParamType::Bool, Value::String(s)) => bool_from_str(s)
            .map(Value::Bool)
            .ok_or_else(mismatch),

        (ParamType::List(inner), Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| coerce(&format!("{path}[{i}]"), inner, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),

        (ParamType::Map(inner), Value::Object(entries)) => entries
            .iter()
            .map(|(key, item)| {
                coerce(&format!("{path}.{key}"), inner, item).map(|v| (key.clone(), v))
            })
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),

        _ => Err(mismatch()),
    }
}

fn int_from_number(n: &Number) -> Option<Value> {
    if let Some(i) = n.as_i64() {
        return Some(Value::from(i));
    }
    // Integral floats only; u64 beyond i64 is rejected.
    let f = n.as_f64()?;
    if n.is_f64() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Some(Value::from(f as i64));
    }
    None
}

fn bool_from_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
