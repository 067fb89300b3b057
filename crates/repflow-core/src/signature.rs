//! Operation signatures.
//!
//! A signature lists one requirement per object-typed operand: the tag the
//! operand must expose, and whether the operand is a list ("repeated") whose
//! members must all expose it. Signature identity ignores parameter names;
//! two signatures are the same when their (tag, repeated) sequences match.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tag::Tag;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub tag: Tag,
    #[serde(default)]
    pub repeated: bool,
}

impl Requirement {
    pub fn one(name: impl Into<String>, tag: &str) -> Self {
        Self {
            name: name.into(),
            tag: Tag::new(tag),
            repeated: false,
        }
    }

    pub fn many(name: impl Into<String>, tag: &str) -> Self {
        Self {
            name: name.into(),
            tag: Tag::new(tag),
            repeated: true,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.tag.is_any()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.repeated {
            write!(f, "{}[]", self.tag)
        } else {
            write!(f, "{}", self.tag)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signature {
    requirements: Vec<Requirement>,
}

impl Signature {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    /// Shorthand: `Signature::of(&["rows", "sql[]", "*"])`. Operands are named
    /// `arg0`, `arg1`, ... in order.
    pub fn of(specs: &[&str]) -> Self {
        let requirements = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let name = format!("arg{i}");
                match spec.strip_suffix("[]") {
                    Some(tag) => Requirement::many(name, tag),
                    None => Requirement::one(name, spec),
                }
            })
            .collect();
        Self { requirements }
    }

    /// Parse a comma-separated signature such as `"rows, sql[]"`.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim().trim_start_matches('(').trim_end_matches(')');
        if trimmed.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut specs = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            let tag = part.strip_suffix("[]").unwrap_or(part);
            if tag.is_empty() || tag.contains(char::is_whitespace) || tag.contains('[') {
                return Err(Error::Signature(format!("bad requirement '{part}' in '{text}'")));
            }
            specs.push(part);
        }
        Ok(Self::of(&specs))
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn arity(&self) -> usize {
        self.requirements.len()
    }

    /// Number of non-wildcard requirements. Higher is more specific.
    pub fn specificity(&self) -> usize {
        self.requirements.iter().filter(|r| !r.is_wildcard()).count()
    }

    pub fn is_generic(&self) -> bool {
        self.requirements.iter().any(Requirement::is_wildcard)
    }

    fn key(&self) -> impl Iterator<Item = (Tag, bool)> + '_ {
        self.requirements.iter().map(|r| (r.tag, r.repeated))
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.arity() == other.arity() && self.key().eq(other.key())
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (tag, repeated) in self.key() {
            tag.hash(state);
            repeated.hash(state);
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{r}")?;
        }
        f.write_str(")")
    }
}
