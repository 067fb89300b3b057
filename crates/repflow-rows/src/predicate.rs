//! Simple row predicates: `field OP literal` with OP ∈ {==, !=, <, <=, >, >=}.

use std::cmp::Ordering;

use repflow_core::types::Scalar;
use repflow_dispatch::OpError;

use crate::object::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: CmpOp,
    pub literal: Scalar,
}

impl Predicate {
    /// Parse `"age >= 18"` or `"name == 'Alice'"`. Quoted literals are strings.
    pub fn parse(expr: &str) -> Result<Self, OpError> {
        // two-char operators first so "<=" is not read as "<"
        let ops = [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ];
        for (token, op) in ops {
            if let Some(pos) = expr.find(token) {
                let field = expr[..pos].trim();
                let raw = expr[pos + token.len()..].trim();
                if field.is_empty() || raw.is_empty() {
                    break;
                }
                return Ok(Self {
                    field: field.to_string(),
                    op,
                    literal: parse_literal(raw),
                });
            }
        }
        Err(OpError::Argument(format!("unparseable predicate: {expr}")))
    }

    /// Nulls, missing fields and incomparable kinds never match.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(value) = record.get(&self.field) else {
            return false;
        };
        let Some(ord) = value.compare(&self.literal) else {
            return false;
        };
        match self.op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

fn parse_literal(raw: &str) -> Scalar {
    let quoted = ['\'', '"']
        .iter()
        .any(|q| raw.len() >= 2 && raw.starts_with(*q) && raw.ends_with(*q));
    if quoted {
        Scalar::Str(raw[1..raw.len() - 1].to_string())
    } else {
        Scalar::infer(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::record;

    #[test]
    fn parses_two_char_operators_first() {
        let p = Predicate::parse("age <= 30").unwrap();
        assert_eq!(p.op, CmpOp::Le);
        assert_eq!(p.literal, Scalar::I64(30));
        assert!(Predicate::parse("age").is_err());
        assert!(Predicate::parse(">= 3").is_err());
    }

    #[test]
    fn quoted_literals_stay_strings() {
        let p = Predicate::parse("code == '42'").unwrap();
        assert_eq!(p.literal, Scalar::Str("42".into()));
    }

    #[test]
    fn null_and_missing_never_match() {
        let p = Predicate::parse("age > 1").unwrap();
        assert!(!p.matches(&record([("age", Scalar::Null)])));
        assert!(!p.matches(&record([("name", Scalar::Str("x".into()))])));
        assert!(p.matches(&record([("age", Scalar::F64(1.5))])));
    }
}
