//! Pipeline builder: fail-fast names, cached plans, probes, branching.

mod common;

use common::{no_params, params, people_list, people_stream, rows_context, scalar};
use repflow_core::object::Value;
use repflow_core::types::Scalar;
use repflow_dispatch::{DispatchError, Outcome};
use repflow_exec::{ExecError, Pipeline, RunOutcome};
use repflow_planner::{Graph, Operand};

fn probe_graph(op: &str, p: serde_json::Value) -> Graph {
    let mut g = Graph::new();
    let load = g.add_source(Value::Object(people_list()));
    g.add_node(op, vec![Operand::Node(load)], params(p)).unwrap();
    g
}

#[test]
fn test_unknown_operation_fails_when_added() {
    let ctx = rows_context();
    let mut pipeline = Pipeline::new(&ctx);
    pipeline.source_object(people_list()).unwrap();

    let err = pipeline.op("summarise", no_params()).err().unwrap();
    assert!(matches!(
        err,
        ExecError::Dispatch(DispatchError::OperationNotFound(ref name)) if name == "summarise"
    ));
    assert_eq!(pipeline.graph().len(), 1);

    // checked before the missing head
    let mut empty = Pipeline::new(&ctx);
    assert!(matches!(
        empty.op("summarise", no_params()).err().unwrap(),
        ExecError::Dispatch(DispatchError::OperationNotFound(_))
    ));
    assert!(matches!(
        empty.op("count", no_params()).err().unwrap(),
        ExecError::Invalid(_)
    ));
}

#[test]
fn test_execution_plan_does_not_execute() {
    let ctx = rows_context();
    let stream = people_stream();
    let mut pipeline = Pipeline::new(&ctx);
    pipeline
        .source_object(stream.clone())
        .unwrap()
        .op("filter", params(serde_json::json!({"expr": "age >= 18"})))
        .unwrap()
        .op("count", no_params())
        .unwrap();

    assert_eq!(pipeline.execution_plan().unwrap().len(), 3);
    assert!(stream.is_consumable());

    let outcome = pipeline.run().unwrap();
    let execution = outcome.execution().unwrap();
    assert_eq!(scalar(pipeline.head_result(execution).unwrap()), Scalar::I64(2));
    assert!(!stream.is_consumable());
}

#[test]
fn test_plan_is_recompiled_after_growth() {
    let ctx = rows_context();
    let mut pipeline = Pipeline::new(&ctx);
    pipeline.source_object(people_list()).unwrap();
    let generation = pipeline.execution_plan().unwrap().generation;

    pipeline.op("distinct", no_params()).unwrap();
    let plan = pipeline.execution_plan().unwrap();
    assert_eq!(plan.len(), 2);
    assert!(plan.generation > generation);
}

#[test]
fn test_satisfied_probe_leaves_main_graph_untouched() {
    let ctx = rows_context();
    let stream = people_stream();
    let mut pipeline = Pipeline::new(&ctx);
    pipeline.source_object(stream.clone()).unwrap().op("count", no_params()).unwrap();
    pipeline.set_satisfied_probe(probe_graph("assert_unique", serde_json::json!({"fields": ["id"]})));

    let generation = pipeline.graph().generation();
    assert!(pipeline.test_if_satisfied().unwrap());
    assert!(stream.is_consumable());
    assert_eq!(pipeline.graph().generation(), generation);

    let outcome = pipeline.run().unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));
}

#[test]
fn test_unsatisfied_requirements_fail_the_run() {
    let ctx = rows_context();
    let stream = people_stream();
    let mut pipeline = Pipeline::new(&ctx);
    pipeline.source_object(stream.clone()).unwrap().op("count", no_params()).unwrap();
    pipeline.set_satisfied_probe(probe_graph(
        "assert_missing",
        serde_json::json!({"field": "name", "value": "Ada"}),
    ));

    assert!(!pipeline.test_if_satisfied().unwrap());
    let failure = pipeline.run().unwrap_err();
    match failure.error {
        ExecError::RequirementsNotSatisfied { reason } => assert!(reason.contains("Ada")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(stream.is_consumable());
}

#[test]
fn test_pipeline_is_skipped_when_not_needed() {
    let ctx = rows_context();
    let stream = people_stream();
    let mut pipeline = Pipeline::new(&ctx);
    pipeline.source_object(stream.clone()).unwrap().op("count", no_params()).unwrap();
    pipeline.set_needed_probe(probe_graph(
        "assert_contains",
        serde_json::json!({"field": "name", "value": "Zed"}),
    ));

    assert!(!pipeline.test_if_needed().unwrap());
    let outcome = pipeline.run().unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped));
    assert!(outcome.execution().is_none());
    assert!(stream.is_consumable());
}

#[test]
fn test_branches_join_through_list_and_binary_operations() {
    let mut ctx = rows_context();
    ctx.add_operation("pair_count", "rows, rows", |_, operands, _| {
        let mut total = 0;
        for operand in operands {
            let obj = repflow_dispatch::operation::operand_object(std::slice::from_ref(operand), 0)?;
            total += repflow_rows::rows_of(obj)?.len();
        }
        Ok(Outcome::scalar(Scalar::I64(total as i64)))
    })
    .unwrap();

    let mut pipeline = Pipeline::new(&ctx);
    pipeline
        .source_object(people_list())
        .unwrap()
        .op("filter", params(serde_json::json!({"expr": "age >= 18"})))
        .unwrap();
    let adults = pipeline.detach().unwrap();

    assert!(pipeline.source_object(people_list()).is_ok());
    assert!(pipeline.source_object(people_list()).is_err(), "second source needs detach");
    let everyone = pipeline.head().unwrap();

    pipeline.op_list("append", &[adults], no_params()).unwrap().op("count", no_params()).unwrap();
    let appended_total = pipeline.head().unwrap();

    pipeline.set_head(everyone).unwrap();
    pipeline.op_with("pair_count", &[adults], no_params()).unwrap();
    let paired = pipeline.head().unwrap();

    let outcome = pipeline.run().unwrap();
    let execution = outcome.execution().unwrap();
    assert_eq!(scalar(execution.result(appended_total).unwrap()), Scalar::I64(5));
    assert_eq!(scalar(execution.result(paired).unwrap()), Scalar::I64(5));
}
