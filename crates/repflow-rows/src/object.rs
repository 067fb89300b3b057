//! Row objects.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use repflow_core::error::{Error, Result};
use repflow_core::object::{DataObject, ObjectRef};
use repflow_core::tag::{tag_set, TagSet};
use repflow_core::types::Scalar;
use repflow_dispatch::OpError;

/// Representation tag exposed by every object in this crate.
pub const ROWS: &str = "rows";

pub type Record = BTreeMap<String, Scalar>;

type RowIter = Box<dyn Iterator<Item = Record> + Send>;

/// Records held in memory. Retained.
#[derive(Debug, Clone)]
pub struct RowListObject {
    rows: Vec<Record>,
    tags: TagSet,
}

impl RowListObject {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            tags: tag_set(&[ROWS]),
        }
    }

    pub fn shared(rows: Vec<Record>) -> ObjectRef {
        Arc::new(Self::new(rows))
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }
}

impl DataObject for RowListObject {
    fn representation_tags(&self) -> &TagSet {
        &self.tags
    }

    fn to_retained(&self) -> Result<ObjectRef> {
        Ok(Arc::new(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A single-pass row iterator. Not retained; unusable once taken.
pub struct RowStreamObject {
    rows: Mutex<Option<RowIter>>,
    tags: TagSet,
}

impl RowStreamObject {
    pub fn new(rows: impl Iterator<Item = Record> + Send + 'static) -> Self {
        Self {
            rows: Mutex::new(Some(Box::new(rows))),
            tags: tag_set(&[ROWS]),
        }
    }

    pub fn shared(rows: impl Iterator<Item = Record> + Send + 'static) -> ObjectRef {
        Arc::new(Self::new(rows))
    }

    /// Take the iterator. Fails on the second call.
    pub fn take(&self) -> Result<RowIter> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| Error::Retain("row stream was already consumed".into()))
    }
}

impl fmt::Debug for RowStreamObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStreamObject")
            .field("consumable", &self.is_consumable())
            .finish()
    }
}

impl DataObject for RowStreamObject {
    fn representation_tags(&self) -> &TagSet {
        &self.tags
    }

    fn retained(&self) -> bool {
        false
    }

    fn is_consumable(&self) -> bool {
        self.rows
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Drains the stream into a `RowListObject`.
    fn to_retained(&self) -> Result<ObjectRef> {
        let rows: Vec<Record> = self.take()?.collect();
        Ok(RowListObject::shared(rows))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Open a row object for reading. Lists are copied; streams are taken.
pub fn open(obj: &ObjectRef) -> std::result::Result<RowIter, OpError> {
    if let Some(list) = obj.as_any().downcast_ref::<RowListObject>() {
        return Ok(Box::new(list.rows.clone().into_iter()));
    }
    if let Some(stream) = obj.as_any().downcast_ref::<RowStreamObject>() {
        return Ok(stream.take()?);
    }
    Err(OpError::Argument(format!(
        "object {obj:?} exposes rows but is not a row object of this backend"
    )))
}

/// All records of a row object.
pub fn rows_of(obj: &ObjectRef) -> std::result::Result<Vec<Record>, OpError> {
    Ok(open(obj)?.collect())
}

/// Output in the same flavor as the input: a list for retained inputs, a
/// lazy stream otherwise.
pub fn emit_like(input: &ObjectRef, rows: impl Iterator<Item = Record> + Send + 'static) -> ObjectRef {
    if input.retained() {
        RowListObject::shared(rows.collect())
    } else {
        RowStreamObject::shared(rows)
    }
}

/// Build a record from `(field, value)` pairs.
pub fn record<I, K>(pairs: I) -> Record
where
    I: IntoIterator<Item = (K, Scalar)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
