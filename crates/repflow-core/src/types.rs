//! Scalar values and keyword parameters.
//!
//! Scalars are what aggregate-style operations return (`count`) and what
//! backend records hold. They are deliberately small; backends with richer
//! type systems keep their own representation internally.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Keyword parameters bound to a node, passed through to the implementation.
pub type Params = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl Scalar {
    /// Guess a scalar from text the way loosely-typed sources present it:
    /// empty is null, then integer, float, bool, and finally string.
    pub fn infer(text: &str) -> Self {
        let t = text.trim();
        if t.is_empty() {
            return Scalar::Null;
        }
        if let Ok(i) = t.parse::<i64>() {
            return Scalar::I64(i);
        }
        if let Ok(f) = t.parse::<f64>() {
            return Scalar::F64(f);
        }
        match t {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => Scalar::Str(text.to_string()),
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Scalar::Null,
            serde_json::Value::Bool(b) => Scalar::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::I64(i),
                None => Scalar::F64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Scalar::Str(s.clone()),
            other => Scalar::Str(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Ordering across compatible kinds. Integers and floats compare
    /// numerically; null and mismatched kinds are incomparable.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (I64(a), I64(b)) => Some(a.cmp(b)),
            (F64(a), F64(b)) => a.partial_cmp(b),
            (I64(a), F64(b)) => (*a as f64).partial_cmp(b),
            (F64(a), I64(b)) => a.partial_cmp(&(*b as f64)),
            (Str(a), Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::I64(i) => write!(f, "{i}"),
            Scalar::F64(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_prefers_numbers() {
        assert_eq!(Scalar::infer("42"), Scalar::I64(42));
        assert_eq!(Scalar::infer("2.5"), Scalar::F64(2.5));
        assert_eq!(Scalar::infer("true"), Scalar::Bool(true));
        assert_eq!(Scalar::infer(""), Scalar::Null);
        assert_eq!(Scalar::infer("Alice"), Scalar::Str("Alice".into()));
    }

    #[test]
    fn mixed_numeric_comparison() {
        assert_eq!(Scalar::I64(3).compare(&Scalar::F64(2.5)), Some(Ordering::Greater));
        assert_eq!(Scalar::Null.compare(&Scalar::I64(1)), None);
        assert_eq!(Scalar::Str("a".into()).compare(&Scalar::I64(1)), None);
    }
}
