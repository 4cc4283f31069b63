//! # Configuration Values
//!
//! `Val` is the closed set of value shapes a Var, Secret, header or query
//! parameter can hold. Accessors match exhaustively so adding a shape is a
//! compile error everywhere it matters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically shaped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Val {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    ArrayNumber(Vec<f64>),
    ArrayString(Vec<String>),
    /// Multi-valued map, the shape of HTTP headers and query parameters.
    MapArrayString(BTreeMap<String, Vec<String>>),
}

impl Val {
    pub fn is_nil(&self) -> bool {
        matches!(self, Val::Nil)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Val::ArrayNumber(_) | Val::ArrayString(_))
    }

    /// Truthiness: numbers are true when non-zero, strings are parsed.
    pub fn as_bool(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            Val::Number(n) => *n != 0.0,
            Val::String(s) => parse_bool(s).unwrap_or(false),
            Val::Nil | Val::ArrayNumber(_) | Val::ArrayString(_) | Val::MapArrayString(_) => {
                false
            }
        }
    }

    pub fn as_bool_or(&self, default: bool) -> bool {
        match self {
            Val::Bool(b) => *b,
            _ => default,
        }
    }

    /// Numeric view: booleans are 1 or 0, strings are parsed, anything else
    /// is 0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Val::Bool(true) => 1.0,
            Val::Bool(false) => 0.0,
            Val::Number(n) => *n,
            Val::String(s) => s.trim().parse().unwrap_or(0.0),
            Val::Nil | Val::ArrayNumber(_) | Val::ArrayString(_) | Val::MapArrayString(_) => 0.0,
        }
    }

    pub fn as_f64_or(&self, default: f64) -> f64 {
        match self {
            Val::Number(n) => *n,
            _ => default,
        }
    }

    pub fn as_i64(&self) -> i64 {
        self.as_f64() as i64
    }

    pub fn as_i64_or(&self, default: i64) -> i64 {
        match self {
            Val::Number(n) => *n as i64,
            _ => default,
        }
    }

    pub fn as_str_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            Val::String(s) => s,
            _ => default,
        }
    }

    /// Every element of an array as strings; scalars become a one-element
    /// list and `Nil` an empty one.
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Val::Nil => Vec::new(),
            Val::ArrayString(items) => items.clone(),
            Val::ArrayNumber(items) => items.iter().map(|n| format_number(*n)).collect(),
            Val::MapArrayString(map) => map.values().flatten().cloned().collect(),
            Val::Bool(_) | Val::Number(_) | Val::String(_) => vec![self.to_string()],
        }
    }
}

impl fmt::Display for Val {
    /// Strings render bare, arrays and maps as JSON, `Nil` as empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Nil => Ok(()),
            Val::Bool(b) => write!(f, "{b}"),
            Val::Number(n) => f.write_str(&format_number(*n)),
            Val::String(s) => f.write_str(s),
            Val::ArrayNumber(_) | Val::ArrayString(_) | Val::MapArrayString(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Val {
    fn from(v: bool) -> Self {
        Val::Bool(v)
    }
}

impl From<i64> for Val {
    fn from(v: i64) -> Self {
        Val::Number(v as f64)
    }
}

impl From<f64> for Val {
    fn from(v: f64) -> Self {
        Val::Number(v)
    }
}

impl From<&str> for Val {
    fn from(v: &str) -> Self {
        Val::String(v.to_string())
    }
}

impl From<String> for Val {
    fn from(v: String) -> Self {
        Val::String(v)
    }
}

impl From<Vec<String>> for Val {
    fn from(v: Vec<String>) -> Self {
        Val::ArrayString(v)
    }
}

impl From<Vec<f64>> for Val {
    fn from(v: Vec<f64>) -> Self {
        Val::ArrayNumber(v)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_coercion() {
        assert!(Val::Number(2.0).as_bool());
        assert!(!Val::Number(0.0).as_bool());
        assert!(Val::from("true").as_bool());
        assert!(!Val::from("nope").as_bool());
        assert!(!Val::ArrayString(vec!["true".into()]).as_bool());
        assert!(Val::Nil.as_bool_or(true));
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(Val::Bool(true).as_f64(), 1.0);
        assert_eq!(Val::from(" 42.5 ").as_f64(), 42.5);
        assert_eq!(Val::from("x").as_i64(), 0);
        assert_eq!(Val::from("7").as_i64_or(3), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Val::Number(3.0).to_string(), "3");
        assert_eq!(Val::Number(3.5).to_string(), "3.5");
        assert_eq!(Val::Nil.to_string(), "");
        assert_eq!(
            Val::ArrayString(vec!["a".into(), "b".into()]).to_string(),
            r#"["a","b"]"#
        );
    }

    #[test]
    fn test_untagged_json_shapes() {
        let v: Val = serde_json::from_str(r#"["x","y"]"#).unwrap();
        assert_eq!(v, Val::ArrayString(vec!["x".into(), "y".into()]));

        let v: Val = serde_json::from_str("null").unwrap();
        assert!(v.is_nil());

        let v: Val = serde_json::from_str(r#"{"Accept":["a","b"]}"#).unwrap();
        assert!(matches!(v, Val::MapArrayString(_)));
    }
}
