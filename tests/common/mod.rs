//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use repflow_core::error::{Error, Result};
use repflow_core::object::{DataObject, ObjectRef, Value};
use repflow_core::tag::{tag_set, Tag, TagSet};
use repflow_core::types::{Params, Scalar};
use repflow_dispatch::OperationContext;
use repflow_rows::{rows_of, Record, RowListObject, RowStreamObject, ROWS};

pub const SQL: &str = "sql";

/// A deferred query. Converts to `rows` by "running" it, which here means
/// handing back the canned result.
#[derive(Debug)]
pub struct SqlObject {
    pub query: String,
    result: Option<Vec<Record>>,
    tags: TagSet,
}

impl SqlObject {
    pub fn shared(query: &str, result: Vec<Record>) -> ObjectRef {
        Arc::new(Self {
            query: query.to_string(),
            result: Some(result),
            tags: tag_set(&[SQL]),
        })
    }

    /// A query that cannot be converted to anything.
    pub fn opaque(query: &str) -> ObjectRef {
        Arc::new(Self {
            query: query.to_string(),
            result: None,
            tags: tag_set(&[SQL]),
        })
    }
}

impl DataObject for SqlObject {
    fn representation_tags(&self) -> &TagSet {
        &self.tags
    }

    fn convert_to(&self, tag: Tag) -> Result<ObjectRef> {
        match &self.result {
            Some(rows) if tag == Tag::new(ROWS) => Ok(RowListObject::shared(rows.clone())),
            _ => Err(Error::Conversion {
                from: SQL.to_string(),
                to: tag,
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn person(id: i64, name: &str, age: i64) -> Record {
    repflow_rows::object::record([
        ("id", Scalar::I64(id)),
        ("name", Scalar::Str(name.to_string())),
        ("age", Scalar::I64(age)),
    ])
}

pub fn people() -> Vec<Record> {
    vec![
        person(1, "Ada", 36),
        person(2, "Grace", 45),
        person(3, "Linus", 12),
    ]
}

pub fn people_list() -> ObjectRef {
    RowListObject::shared(people())
}

pub fn people_stream() -> ObjectRef {
    RowStreamObject::shared(people().into_iter())
}

/// Context with every row operation registered.
pub fn rows_context() -> OperationContext {
    let mut ctx = OperationContext::new();
    repflow_rows::register_all(&mut ctx).expect("row operations register");
    ctx
}

pub fn params(json: serde_json::Value) -> Params {
    serde_json::from_value(json).expect("params are a JSON object")
}

pub fn no_params() -> Params {
    Params::new()
}

/// Rows behind a value. Streams are drained.
pub fn row_count(value: &Value) -> usize {
    let obj = value.as_object().expect("value is an object");
    rows_of(obj).expect("value holds rows").len()
}

pub fn scalar(value: &Value) -> Scalar {
    value.as_scalar().cloned().expect("value is a scalar")
}
