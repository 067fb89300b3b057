//! Execution engine: run a compiled plan and emit a `RunManifest`.
//!
//! Behavior:
//! - Walks `ExecutionPlan.order` sequentially; every operand is already
//!   computed when its consumer runs.
//! - Source nodes yield their value as-is; operation nodes go through the
//!   context's dispatcher.
//! - A non-retained object may be bound to one operand edge only. A node that
//!   hands back an object it received takes over as its producer.
//! - Under `ConsumptionPolicy::Retain`, fan-out outputs are materialized with
//!   `to_retained()` before anything reads them.
//! - The first failure stops the run; results produced so far are returned
//!   with the error.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use repflow_core::config::ConsumptionPolicy;
use repflow_core::id::NodeId;
use repflow_core::manifest::RunManifest;
use repflow_core::object::{object_id, Value};
use repflow_dispatch::OperationContext;
use repflow_planner::{compile, ExecutionPlan, Graph, Node, NodeKind, Operand};

use crate::error::{ExecError, ExecutionFailure};
use crate::metrics::RunStats;
use crate::replay::hash_plan;

#[derive(Debug, Clone)]
pub struct Execution {
    pub results: BTreeMap<NodeId, Value>,
    pub manifest: RunManifest,
    pub stats: RunStats,
}

impl Execution {
    pub fn result(&self, id: NodeId) -> Option<&Value> {
        self.results.get(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Passed,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Main,
    Probe,
}

pub struct ExecutionEngine<'ctx> {
    context: &'ctx OperationContext,
    consumption: ConsumptionPolicy,
}

impl<'ctx> ExecutionEngine<'ctx> {
    pub fn new(context: &'ctx OperationContext) -> Self {
        Self {
            context,
            consumption: context.config().consumption,
        }
    }

    pub fn with_consumption(mut self, policy: ConsumptionPolicy) -> Self {
        self.consumption = policy;
        self
    }

    pub fn context(&self) -> &'ctx OperationContext {
        self.context
    }

    pub fn compile(&self, graph: &Graph) -> Result<ExecutionPlan, ExecError> {
        Ok(compile(graph)?)
    }

    /// Compile and execute.
    pub fn run(&self, graph: &Graph) -> Result<Execution, ExecutionFailure> {
        let plan = self.compile(graph)?;
        self.execute(graph, &plan)
    }

    pub fn execute(&self, graph: &Graph, plan: &ExecutionPlan) -> Result<Execution, ExecutionFailure> {
        self.execute_mode(graph, plan, Mode::Main)
    }

    /// Run a condition graph. Assertion failures become `ProbeVerdict::Failed`;
    /// any other failure is returned as an error. Probe graphs may not read
    /// non-retained objects.
    pub fn probe(&self, graph: &Graph) -> Result<ProbeVerdict, ExecError> {
        let plan = self.compile(graph)?;
        match self.execute_mode(graph, &plan, Mode::Probe) {
            Ok(_) => Ok(ProbeVerdict::Passed),
            Err(failure) => match failure.error.probe_failure() {
                Some(reason) => Ok(ProbeVerdict::Failed {
                    reason: reason.to_string(),
                }),
                None => Err(failure.error),
            },
        }
    }

    /// True when the "needed" condition holds, i.e. the main graph should run.
    pub fn test_if_needed(&self, graph: &Graph) -> Result<bool, ExecError> {
        Ok(self.probe(graph)? == ProbeVerdict::Passed)
    }

    /// True when the pipeline's requirements hold.
    pub fn test_if_satisfied(&self, graph: &Graph) -> Result<bool, ExecError> {
        Ok(self.probe(graph)? == ProbeVerdict::Passed)
    }

    fn execute_mode(
        &self,
        graph: &Graph,
        plan: &ExecutionPlan,
        mode: Mode,
    ) -> Result<Execution, ExecutionFailure> {
        if !plan.is_current_for(graph) {
            return Err(ExecError::StalePlan {
                plan: plan.generation,
                graph: graph.generation(),
            }
            .into());
        }
        let started = now_millis();
        let plan_hash = hash_plan(graph, plan)?;

        let mut results: BTreeMap<NodeId, Value> = BTreeMap::new();
        let mut consumed: HashMap<usize, NodeId> = HashMap::new();
        let mut stats = RunStats::default();

        for (position, id) in plan.order.iter().enumerate() {
            let step = graph
                .node(*id)
                .ok_or(ExecError::Graph(repflow_planner::GraphError::UnknownNode(*id)))
                .and_then(|node| {
                    self.step(node, position, plan, mode, &results, &mut consumed, &mut stats)
                });
            match step {
                Ok(value) => {
                    tracing::trace!(node = %id, position, "executed node");
                    results.insert(*id, value);
                    stats.nodes_executed += 1;
                }
                Err(error) => {
                    tracing::error!(node = %id, position, %error, "execution stopped");
                    return Err(ExecutionFailure {
                        error,
                        partial: results,
                    });
                }
            }
        }

        stats.emit(match mode {
            Mode::Main => "execution",
            Mode::Probe => "probe",
        });
        let manifest = RunManifest::new(plan_hash, started).finish(now_millis(), stats.nodes_executed);
        Ok(Execution {
            results,
            manifest,
            stats,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        node: &Node,
        position: usize,
        plan: &ExecutionPlan,
        mode: Mode,
        results: &BTreeMap<NodeId, Value>,
        consumed: &mut HashMap<usize, NodeId>,
        stats: &mut RunStats,
    ) -> Result<Value, ExecError> {
        let value = match &node.kind {
            NodeKind::Source(v) => {
                stats.sources += 1;
                v.clone()
            }
            NodeKind::Operation(name) => {
                let operands = bind(node, position, mode, results, consumed)?;
                stats.dispatched += 1;
                let out = self
                    .context
                    .call(name, &operands, &node.params)
                    .map_err(|source| ExecError::NodeExecution {
                        node: node.id,
                        position,
                        operation: name.clone(),
                        source,
                    })?;
                // pass-through outputs: this node becomes the producer again
                for obj in out.objects() {
                    let key = object_id(obj);
                    if consumed.get(&key) == Some(&node.id) {
                        consumed.remove(&key);
                    }
                }
                out
            }
        };

        if self.consumption == ConsumptionPolicy::Retain && plan.consumer_count(node.id) > 1 {
            let (value, materialized) = retain_value(value).map_err(|source| ExecError::Retain {
                node: node.id,
                source,
            })?;
            if materialized {
                tracing::debug!(node = %node.id, consumers = plan.consumer_count(node.id), "retained fan-out output");
                stats.retained_for_fanout += 1;
            }
            return Ok(value);
        }
        Ok(value)
    }
}

/// Resolve a node's operands against produced results, claiming every
/// non-retained object for this node.
fn bind(
    node: &Node,
    position: usize,
    mode: Mode,
    results: &BTreeMap<NodeId, Value>,
    consumed: &mut HashMap<usize, NodeId>,
) -> Result<Vec<Value>, ExecError> {
    let mut operands = Vec::with_capacity(node.operands.len());
    for operand in &node.operands {
        let value = match operand {
            Operand::Node(dep) => fetch(results, node.id, *dep)?.clone(),
            Operand::Nodes(deps) => {
                let mut list = Vec::with_capacity(deps.len());
                for dep in deps {
                    match fetch(results, node.id, *dep)? {
                        Value::Object(o) => list.push(o.clone()),
                        Value::Objects(os) => list.extend(os.iter().cloned()),
                        Value::Scalar(_) => {
                            return Err(ExecError::Invalid(format!(
                                "{dep} produced a scalar; {} expects objects",
                                node.id
                            )))
                        }
                    }
                }
                Value::Objects(list)
            }
            Operand::Literal(v) => v.clone(),
        };

        for obj in value.objects() {
            if obj.retained() {
                continue;
            }
            if mode == Mode::Probe {
                return Err(ExecError::ProbeConsumes { node: node.id });
            }
            let key = object_id(obj);
            if let Some(first) = consumed.get(&key) {
                return Err(ExecError::ObjectAlreadyConsumed {
                    node: node.id,
                    position,
                    first_consumer: *first,
                });
            }
            if !obj.is_consumable() {
                return Err(ExecError::ObjectExhausted {
                    node: node.id,
                    position,
                });
            }
            consumed.insert(key, node.id);
        }
        operands.push(value);
    }
    Ok(operands)
}

fn fetch(results: &BTreeMap<NodeId, Value>, node: NodeId, dep: NodeId) -> Result<&Value, ExecError> {
    results
        .get(&dep)
        .ok_or_else(|| ExecError::Invalid(format!("{node} reads {dep} before it ran")))
}

/// Swap non-retained objects for retained copies. The flag reports whether
/// anything was materialized.
fn retain_value(value: Value) -> repflow_core::error::Result<(Value, bool)> {
    match value {
        Value::Object(o) if !o.retained() => Ok((Value::Object(o.to_retained()?), true)),
        Value::Objects(list) if list.iter().any(|o| !o.retained()) => {
            let list = list
                .into_iter()
                .map(|o| if o.retained() { Ok(o) } else { o.to_retained() })
                .collect::<repflow_core::error::Result<Vec<_>>>()?;
            Ok((Value::Objects(list), true))
        }
        other => Ok((other, false)),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
