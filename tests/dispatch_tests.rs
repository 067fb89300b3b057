//! Dispatch: matching, scoring, retry with conversion, policy, observers.

mod common;

use std::sync::Arc;

use common::{no_params, people, people_list, scalar, SqlObject};
use repflow_core::object::Value;
use repflow_core::signature::Signature;
use repflow_core::types::Scalar;
use repflow_dispatch::{
    install_default_factory, with_default_context, CollectingObserver, DispatchError, Operation,
    OperationContext, Outcome, RetryPolicy,
};
use repflow_rows::rows_of;

fn named(label: &'static str) -> impl Fn(&OperationContext, &[Value], &repflow_core::types::Params) -> Result<Outcome, repflow_dispatch::OpError>
       + Send
       + Sync
       + 'static {
    move |_, _, _| Ok(Outcome::scalar(Scalar::Str(label.to_string())))
}

/// `summarize` over sql asks for rows; over rows it counts.
fn summarize_context() -> OperationContext {
    let mut ctx = OperationContext::new();
    ctx.add_operation("summarize", "sql", |_, _, _| {
        Ok(Outcome::retry(&["rows"], "sql backend cannot summarize"))
    })
    .unwrap();
    ctx.add_operation("summarize", "rows", |_, operands, _| {
        let obj = repflow_dispatch::operation::operand_object(operands, 0)?;
        let n = rows_of(obj)?.len();
        Ok(Outcome::scalar(Scalar::I64(n as i64)))
    })
    .unwrap();
    ctx
}

#[test]
fn test_dispatch_selects_by_representation() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("describe", "rows", named("rows")).unwrap();
    ctx.add_operation("describe", "sql", named("sql")).unwrap();

    let from_rows = ctx.call("describe", &[Value::Object(people_list())], &no_params()).unwrap();
    assert_eq!(scalar(&from_rows), Scalar::Str("rows".into()));

    let sql = SqlObject::shared("select * from people", people());
    let from_sql = ctx.call("describe", &[Value::Object(sql)], &no_params()).unwrap();
    assert_eq!(scalar(&from_sql), Scalar::Str("sql".into()));
}

#[test]
fn test_most_specific_signature_wins_then_registration_order() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("pair", "*, *", named("generic")).unwrap();
    ctx.add_operation("pair", "rows, *", named("left")).unwrap();
    ctx.add_operation("pair", "*, rows", named("right")).unwrap();
    ctx.add_operation("pair", "rows, rows", named("both")).unwrap();

    let rows = Value::Object(people_list());
    let both = ctx.call("pair", &[rows.clone(), rows.clone()], &no_params()).unwrap();
    assert_eq!(scalar(&both), Scalar::Str("both".into()));

    // rows/scalar only satisfies the generic and left candidates
    let left = ctx
        .call("pair", &[rows.clone(), Value::Scalar(Scalar::I64(1))], &no_params())
        .unwrap();
    assert_eq!(scalar(&left), Scalar::Str("left".into()));

    ctx.unregister("pair", &Signature::of(&["rows", "rows"])).unwrap();
    let tie = ctx.call("pair", &[rows.clone(), rows], &no_params()).unwrap();
    assert_eq!(scalar(&tie), Scalar::Str("left".into()), "ties go to the earliest registration");
}

#[test]
fn test_no_matching_operation_names_candidates() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("describe", "rows", named("rows")).unwrap();
    ctx.add_operation("describe", "sql", named("sql")).unwrap();

    let err = ctx
        .call("describe", &[Value::Scalar(Scalar::I64(3))], &no_params())
        .unwrap_err();
    match err {
        DispatchError::NoMatchingOperation { name, available, .. } => {
            assert_eq!(name, "describe");
            assert_eq!(available, vec!["(rows)".to_string(), "(sql)".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = ctx.call("describe", &[], &no_params()).unwrap_err();
    assert!(matches!(err, DispatchError::NoMatchingOperation { .. }));

    let err = ctx.call("nope", &[], &no_params()).unwrap_err();
    assert!(matches!(err, DispatchError::OperationNotFound(ref n) if n == "nope"));
}

#[test]
fn test_retry_converts_operands_and_reports_retries() {
    let mut ctx = summarize_context();
    let observer = Arc::new(CollectingObserver::new());
    ctx.set_observer(observer.clone());

    let sql = SqlObject::shared("select * from people", people());
    let out = ctx.call("summarize", &[Value::Object(sql)], &no_params()).unwrap();
    assert_eq!(scalar(&out), Scalar::I64(3));
    assert_eq!(
        observer.calls(),
        vec![("summarize".to_string(), "(rows)".to_string(), 1)]
    );
}

#[test]
fn test_retry_is_bounded_by_registered_signatures() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("spin", "rows", |_, _, _| Ok(Outcome::retry(&["rows"], "again")))
        .unwrap();
    ctx.add_operation("spin", "*", |_, _, _| Ok(Outcome::retry(&["rows"], "again")))
        .unwrap();

    let err = ctx
        .call("spin", &[Value::Object(people_list())], &no_params())
        .unwrap_err();
    match err {
        DispatchError::RetryExhausted { attempts, tried, .. } => {
            assert!(attempts <= ctx.registry().signature_count("spin"));
            assert_eq!(tried, vec!["(rows)".to_string(), "(*)".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_retry_without_remaining_candidate_is_exhausted() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("only_sql", "sql", |_, _, _| Ok(Outcome::retry(&["rows"], "need rows")))
        .unwrap();
    ctx.add_operation("only_sql", "json", named("json")).unwrap();

    let sql = SqlObject::shared("q", people());
    let err = ctx.call("only_sql", &[Value::Object(sql)], &no_params()).unwrap_err();
    assert!(matches!(err, DispatchError::RetryExhausted { attempts: 1, .. }));
}

#[test]
fn test_retry_policy_denies_by_name_and_tag() {
    let sql = || Value::Object(SqlObject::shared("q", people()));

    let mut ctx = summarize_context();
    ctx.set_policy(RetryPolicy::default().deny("summarize"));
    let err = ctx.call("summarize", &[sql()], &no_params()).unwrap_err();
    assert!(matches!(err, DispatchError::RetryExhausted { .. }));

    ctx.set_policy(RetryPolicy::default().deny_tag("rows"));
    let err = ctx.call("summarize", &[sql()], &no_params()).unwrap_err();
    assert!(err.to_string().contains("denied representation"));

    ctx.set_policy(RetryPolicy::default().allow("something_else"));
    assert!(ctx.call("summarize", &[sql()], &no_params()).is_err());

    ctx.set_policy(RetryPolicy::default().allow("summarize"));
    assert!(ctx.call("summarize", &[sql()], &no_params()).is_ok());
}

#[test]
fn test_failed_conversion_reports_position() {
    let ctx = summarize_context();
    let err = ctx
        .call("summarize", &[Value::Object(SqlObject::opaque("q"))], &no_params())
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::RepresentationConversion { position: 0, .. }
    ));
}

#[test]
fn test_registration_errors() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("load", "rows", named("a")).unwrap();

    let dup = ctx.add_operation("load", "rows", named("b")).unwrap_err();
    assert!(matches!(dup, DispatchError::DuplicateSignature { .. }));

    let arity = ctx.add_operation("load", "rows, rows", named("c")).unwrap_err();
    assert!(matches!(arity, DispatchError::ArityMismatch { expected: 1, found: 2, .. }));

    let bad = ctx.add_operation("load", "rows[", named("d")).unwrap_err();
    assert!(matches!(bad, DispatchError::InvalidSignature { .. }));

    let missing = ctx.unregister("load", &Signature::of(&["sql"])).unwrap_err();
    assert!(matches!(missing, DispatchError::NotFound { .. }));

    ctx.unregister("load", &Signature::of(&["rows"])).unwrap();
    assert!(!ctx.has_operation("load"));
    assert!(ctx.registry().lookup("load").is_empty());
}

#[test]
fn test_repeated_requirements_need_object_lists() {
    let mut ctx = OperationContext::new();
    ctx.add_operation("union", "rows[]", |_, operands, _| {
        let n = operands[0].as_objects().map_or(0, |l| l.len());
        Ok(Outcome::scalar(Scalar::I64(n as i64)))
    })
    .unwrap();

    let list = Value::Objects(vec![people_list(), people_list()]);
    assert_eq!(scalar(&ctx.call("union", &[list], &no_params()).unwrap()), Scalar::I64(2));

    let mixed = Value::Objects(vec![people_list(), SqlObject::shared("q", people())]);
    assert!(ctx.call("union", &[mixed], &no_params()).is_err());

    let single = Value::Object(people_list());
    assert!(ctx.call("union", &[single], &no_params()).is_err());
}

#[test]
fn test_experimental_warning_once_per_call() {
    let mut ctx = OperationContext::new();
    ctx.register(
        Operation::new("beta", Signature::of(&["sql"]), |_, _, _| {
            Ok(Outcome::retry(&["rows"], "prefer rows"))
        })
        .experimental(),
    )
    .unwrap();
    ctx.register(Operation::new("beta", Signature::of(&["rows"]), named("rows")).experimental())
        .unwrap();
    let observer = Arc::new(CollectingObserver::new());
    ctx.set_observer(observer.clone());

    let sql = Value::Object(SqlObject::shared("q", people()));
    ctx.call("beta", &[sql.clone()], &no_params()).unwrap();
    assert_eq!(observer.experimental_count("beta"), 1);

    ctx.call("beta", &[sql], &no_params()).unwrap();
    assert_eq!(observer.experimental_count("beta"), 2);
}

#[test]
fn test_catalogue_lists_sources_and_flags() {
    let ctx = common::rows_context();
    let catalogue = ctx.catalogue();
    let names: Vec<&str> = catalogue.iter().map(|e| e.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);

    let rename = catalogue.iter().find(|e| e.name == "rename_fields").unwrap();
    assert!(rename.implementations[0].experimental);
    assert_eq!(rename.implementations[0].source, "repflow_rows");

    let json: serde_json::Value = serde_json::from_str(&ctx.catalogue_json().unwrap()).unwrap();
    assert!(json.as_array().is_some_and(|a| a.len() == catalogue.len()));
}

fn factory() -> OperationContext {
    common::rows_context()
}

#[test]
fn test_default_context_is_lazy_and_per_thread() {
    install_default_factory(factory);

    let here = with_default_context(|ctx| ctx as *const OperationContext as usize);
    let again = with_default_context(|ctx| ctx as *const OperationContext as usize);
    assert_eq!(here, again);
    assert!(with_default_context(|ctx| ctx.has_operation("filter")));

    let other = std::thread::spawn(|| with_default_context(|ctx| ctx.has_operation("filter")))
        .join()
        .unwrap();
    assert!(other);
}
