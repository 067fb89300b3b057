//! Data objects and the values passed between nodes.
//!
//! Backends implement `DataObject` for their handles (a SQL statement, an
//! in-memory row list, a row iterator). The engine only looks at the
//! capability surface: tags, whether re-reading is safe (`retained`), and
//! whether a single-pass object is still readable (`is_consumable`).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tag::{describe_tags, Tag, TagSet};
use crate::types::Scalar;

/// Shared handle to a data object.
pub type ObjectRef = Arc<dyn DataObject>;

pub trait DataObject: fmt::Debug + Send + Sync + 'static {
    /// Capabilities this object exposes. Never changes after construction.
    fn representation_tags(&self) -> &TagSet;

    /// True when reading the object does not exhaust it.
    fn retained(&self) -> bool {
        true
    }

    /// False once a single-pass object has been read.
    fn is_consumable(&self) -> bool {
        true
    }

    /// Produce a new object exposing `tag`.
    fn convert_to(&self, tag: Tag) -> Result<ObjectRef> {
        Err(Error::Conversion {
            from: describe_tags(self.representation_tags()),
            to: tag,
        })
    }

    /// Materialize a single-pass object into one that can be read many times.
    fn to_retained(&self) -> Result<ObjectRef> {
        Err(Error::Retain(format!(
            "object [{}] does not support retention",
            describe_tags(self.representation_tags())
        )))
    }

    fn as_any(&self) -> &dyn Any;

    fn has_tag(&self, tag: Tag) -> bool {
        tag.is_any() || self.representation_tags().contains(&tag)
    }
}

/// Identity of the allocation behind an object handle.
pub fn object_id(obj: &ObjectRef) -> usize {
    Arc::as_ptr(obj).cast::<()>() as usize
}

/// What a node produces and what operations receive.
#[derive(Debug, Clone)]
pub enum Value {
    Object(ObjectRef),
    Objects(Vec<ObjectRef>),
    Scalar(Scalar),
}

impl Value {
    pub fn object(obj: impl DataObject) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&[ObjectRef]> {
        match self {
            Value::Objects(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Every object handle reachable from this value.
    pub fn objects(&self) -> Vec<&ObjectRef> {
        match self {
            Value::Object(o) => vec![o],
            Value::Objects(list) => list.iter().collect(),
            Value::Scalar(_) => Vec::new(),
        }
    }

    /// Short description of the operand's shape and tags for diagnostics,
    /// e.g. `rows`, `[rows | sql]`, `scalar`.
    pub fn describe(&self) -> String {
        match self {
            Value::Object(o) => describe_object(o),
            Value::Objects(list) => {
                let parts: Vec<String> = list.iter().map(describe_object).collect();
                format!("[{}]", parts.join(" | "))
            }
            Value::Scalar(_) => "scalar".to_string(),
        }
    }
}

fn describe_object(obj: &ObjectRef) -> String {
    let tags = obj.representation_tags();
    if tags.len() == 1 {
        describe_tags(tags)
    } else {
        format!("{{{}}}", describe_tags(tags))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::tag_set;

    #[derive(Debug)]
    struct Plain(TagSet);

    impl DataObject for Plain {
        fn representation_tags(&self) -> &TagSet {
            &self.0
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn default_conversion_fails_with_tags() {
        let obj = Plain(tag_set(&["sql"]));
        let err = obj.convert_to(Tag::new("rows")).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert object with tags [sql] to 'rows'");
    }

    #[test]
    fn identity_follows_the_allocation() {
        let a: ObjectRef = Arc::new(Plain(tag_set(&["rows"])));
        let b = Arc::clone(&a);
        let c: ObjectRef = Arc::new(Plain(tag_set(&["rows"])));
        assert_eq!(object_id(&a), object_id(&b));
        assert_ne!(object_id(&a), object_id(&c));
    }

    #[test]
    fn describe_lists() {
        let a: ObjectRef = Arc::new(Plain(tag_set(&["rows"])));
        let b: ObjectRef = Arc::new(Plain(tag_set(&["rows", "sql"])));
        let v = Value::Objects(vec![a, b]);
        assert_eq!(v.describe(), "[rows | {rows, sql}]");
        assert!(Plain(tag_set(&["rows"])).has_tag(Tag::ANY));
    }
}
