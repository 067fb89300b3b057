//! Representation tags.
//!
//! A tag names a capability a data object exposes ("rows", "sql", "document").
//! Tags are interned: each distinct name is leaked once into a process-wide
//! table, so a `Tag` is a `Copy` handle to a `&'static str`. Equality is exact
//! string equality; there is no hierarchy between tags.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static INTERNER: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(&'static str);

/// Tag set exposed by a data object. Ordered so diagnostics are stable.
pub type TagSet = BTreeSet<Tag>;

impl Tag {
    /// Wildcard used in signatures: matches an operand with any tags.
    pub const ANY: Tag = Tag("*");

    pub fn new(name: &str) -> Self {
        if name == Self::ANY.0 {
            return Self::ANY;
        }
        let mut table = INTERNER.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = table.get(name) {
            return Tag(existing);
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        table.insert(leaked);
        Tag(leaked)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::new(s)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Tag::new(&s))
    }
}

/// Build a tag set from names.
pub fn tag_set(names: &[&str]) -> TagSet {
    names.iter().map(|n| Tag::new(n)).collect()
}

/// Comma-joined tag names, used in error messages.
pub fn describe_tags(tags: &TagSet) -> String {
    tags.iter().map(Tag::as_str).collect::<Vec<_>>().join(", ")
}
