//! Row operations.
//!
//! Every operation takes `rows` operands and returns output in the flavor of
//! its input: retained lists stay lists, streams stay lazy where the
//! operation allows it. Assertion operations are meant for pipeline probes
//! and fail with `OpError::ProbeAssertion`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use repflow_core::object::Value;
use repflow_core::signature::Signature;
use repflow_core::types::{Params, Scalar};
use repflow_dispatch::operation::{operand_object, operand_objects, param_str, param_str_list};
use repflow_dispatch::{DispatchError, OpError, Operation, OperationContext, Outcome};

use crate::object::{emit_like, open, rows_of, Record, RowListObject, RowStreamObject, ROWS};
use crate::predicate::Predicate;

const SOURCE: &str = "repflow_rows";

/// Register every row operation into `ctx`.
pub fn register_all(ctx: &mut OperationContext) -> Result<(), DispatchError> {
    let unary = || Signature::of(&[ROWS]);

    ctx.register(Operation::new("filter", unary(), filter).from_source(SOURCE))?;
    ctx.register(
        Operation::new("rename_fields", unary(), rename_fields)
            .experimental()
            .from_source(SOURCE),
    )?;
    ctx.register(Operation::new("keep_fields", unary(), keep_fields).from_source(SOURCE))?;
    ctx.register(Operation::new("drop_fields", unary(), drop_fields).from_source(SOURCE))?;
    ctx.register(Operation::new("distinct", unary(), distinct).from_source(SOURCE))?;
    ctx.register(Operation::new("count", unary(), count).from_source(SOURCE))?;
    ctx.register(
        Operation::new("append", Signature::of(&["rows[]"]), append).from_source(SOURCE),
    )?;
    ctx.register(
        Operation::new("debug_fields", Signature::of(&["*"]), debug_fields).from_source(SOURCE),
    )?;
    ctx.register(Operation::new("assert_contains", unary(), assert_contains).from_source(SOURCE))?;
    ctx.register(Operation::new("assert_missing", unary(), assert_missing).from_source(SOURCE))?;
    ctx.register(Operation::new("assert_unique", unary(), assert_unique).from_source(SOURCE))?;

    tracing::debug!(source = SOURCE, "registered row operations");
    Ok(())
}

fn filter(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let predicate = Predicate::parse(param_str(params, "expr")?)?;
    let rows = open(input)?.filter(move |r| predicate.matches(r));
    Ok(Outcome::object(emit_like(input, rows)))
}

fn rename_fields(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let renames: BTreeMap<String, String> = match params.get("renames") {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|s| (k.clone(), s.to_string()))
                    .ok_or_else(|| OpError::Argument(format!("rename target for '{k}' must be a string")))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(OpError::Argument("'renames' must map old names to new names".into())),
    };
    let rows = open(input)?.map(move |r| {
        r.into_iter()
            .map(|(k, v)| match renames.get(&k) {
                Some(new) => (new.clone(), v),
                None => (k, v),
            })
            .collect::<Record>()
    });
    Ok(Outcome::object(emit_like(input, rows)))
}

fn keep_fields(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let keep: HashSet<String> = param_str_list(params, "fields")?.into_iter().collect();
    let rows = open(input)?.map(move |mut r| {
        r.retain(|k, _| keep.contains(k));
        r
    });
    Ok(Outcome::object(emit_like(input, rows)))
}

fn drop_fields(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let drop: HashSet<String> = param_str_list(params, "fields")?.into_iter().collect();
    let rows = open(input)?.map(move |mut r| {
        r.retain(|k, _| !drop.contains(k));
        r
    });
    Ok(Outcome::object(emit_like(input, rows)))
}

/// Keeps the first record for each key. Without `fields` the whole record is the key.
fn distinct(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let fields = optional_fields(params)?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for r in open(input)? {
        if seen.insert(key_of(&r, fields.as_deref())) {
            out.push(r);
        }
    }
    Ok(Outcome::object(emit_like(input, out.into_iter())))
}

fn count(_: &OperationContext, operands: &[Value], _: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let n = open(input)?.count();
    Ok(Outcome::scalar(Scalar::I64(n as i64)))
}

fn append(_: &OperationContext, operands: &[Value], _: &Params) -> Result<Outcome, OpError> {
    let inputs = operand_objects(operands, 0)?;
    let all_retained = inputs.iter().all(|o| o.retained());
    let mut parts = Vec::with_capacity(inputs.len());
    for input in inputs {
        parts.push(open(input)?);
    }
    let rows = parts.into_iter().flatten();
    Ok(Outcome::object(if all_retained {
        RowListObject::shared(rows.collect())
    } else {
        RowStreamObject::shared(rows)
    }))
}

/// Logs the field names of retained row lists and passes its operand through.
fn debug_fields(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let operand = operands
        .first()
        .ok_or_else(|| OpError::Argument("debug_fields takes one operand".into()))?;
    let label = params.get("label").and_then(|v| v.as_str()).unwrap_or("debug");
    match operand {
        Value::Object(obj) => match obj.as_any().downcast_ref::<RowListObject>() {
            Some(list) => {
                let fields: Vec<&str> = list
                    .rows()
                    .first()
                    .map(|r| r.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                tracing::info!(label, rows = list.rows().len(), ?fields, "fields");
            }
            None => tracing::info!(label, object = ?obj, "fields not inspected"),
        },
        other => tracing::info!(label, operand = %other.describe(), "fields not inspected"),
    }
    Ok(Outcome::Done(operand.clone()))
}

fn assert_contains(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let (field, value, found) = probe_value(operands, params)?;
    if !found {
        return Err(OpError::ProbeAssertion {
            reason: format!("no record has {field} == {value}"),
        });
    }
    Ok(Outcome::scalar(Scalar::Bool(true)))
}

fn assert_missing(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let (field, value, found) = probe_value(operands, params)?;
    if found {
        return Err(OpError::ProbeAssertion {
            reason: format!("a record has {field} == {value}"),
        });
    }
    Ok(Outcome::scalar(Scalar::Bool(true)))
}

fn assert_unique(_: &OperationContext, operands: &[Value], params: &Params) -> Result<Outcome, OpError> {
    let input = operand_object(operands, 0)?;
    let fields = optional_fields(params)?;
    let mut seen = HashSet::new();
    for r in rows_of(input)? {
        let key = key_of(&r, fields.as_deref());
        if !seen.insert(key.clone()) {
            return Err(OpError::ProbeAssertion {
                reason: format!("duplicate key {key}"),
            });
        }
    }
    Ok(Outcome::scalar(Scalar::Bool(true)))
}

/// `(field, value, any record matches)` for the contains/missing assertions.
fn probe_value(operands: &[Value], params: &Params) -> Result<(String, Scalar, bool), OpError> {
    let input = operand_object(operands, 0)?;
    let field = param_str(params, "field")?.to_string();
    let value = params
        .get("value")
        .map(Scalar::from_json)
        .ok_or_else(|| OpError::Argument("missing parameter 'value'".into()))?;
    let found = open(input)?.any(|r| {
        r.get(&field)
            .and_then(|v| v.compare(&value))
            .map_or(false, |o| o == Ordering::Equal)
    });
    Ok((field, value, found))
}

fn optional_fields(params: &Params) -> Result<Option<Vec<String>>, OpError> {
    if params.contains_key("fields") {
        param_str_list(params, "fields").map(Some)
    } else {
        Ok(None)
    }
}

fn key_of(record: &Record, fields: Option<&[String]>) -> String {
    let projected: Vec<&Scalar> = match fields {
        Some(fields) => fields
            .iter()
            .map(|f| record.get(f).unwrap_or(&Scalar::Null))
            .collect(),
        None => record.values().collect(),
    };
    serde_json::to_string(&projected).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::record;

    fn people() -> Value {
        Value::Object(RowListObject::shared(vec![
            record([("id", Scalar::I64(1)), ("age", Scalar::I64(30))]),
            record([("id", Scalar::I64(2)), ("age", Scalar::I64(12))]),
            record([("id", Scalar::I64(2)), ("age", Scalar::I64(12))]),
        ]))
    }

    fn params(json: serde_json::Value) -> Params {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn distinct_and_unique_agree() {
        let ctx = OperationContext::new();
        let out = distinct(&ctx, &[people()], &Params::new()).unwrap();
        let Outcome::Done(Value::Object(obj)) = out else { panic!("expected object") };
        assert_eq!(rows_of(&obj).unwrap().len(), 2);

        let err = assert_unique(&ctx, &[people()], &params(serde_json::json!({"fields": ["id"]})))
            .unwrap_err();
        assert!(matches!(err, OpError::ProbeAssertion { .. }));
    }

    #[test]
    fn contains_and_missing() {
        let ctx = OperationContext::new();
        let p = params(serde_json::json!({"field": "age", "value": 30}));
        assert!(assert_contains(&ctx, &[people()], &p).is_ok());
        assert!(assert_missing(&ctx, &[people()], &p).is_err());
    }
}
