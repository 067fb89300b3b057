//! Fluent pipeline builder.
//!
//! A pipeline grows a graph one operation at a time. Each `op` consumes the
//! current head and makes the new node the head. Unknown operation names fail
//! immediately instead of at run time. The compiled plan is cached and
//! recompiled when the graph generation moves.
//!
//! Optional probe graphs:
//! - *needed*: when its assertion fails, the run is skipped;
//! - *satisfied*: when its assertion fails, the run fails with
//!   `RequirementsNotSatisfied`.

use repflow_core::id::NodeId;
use repflow_core::object::{ObjectRef, Value};
use repflow_core::types::Params;
use repflow_dispatch::{DispatchError, OperationContext};
use repflow_planner::{ExecutionPlan, Graph, NodeKind, Operand};

use crate::engine::{Execution, ExecutionEngine, ProbeVerdict};
use crate::error::{ExecError, ExecutionFailure};

#[derive(Debug)]
pub enum RunOutcome {
    /// The needed-probe said there is nothing to do.
    Skipped,
    Completed(Execution),
}

impl RunOutcome {
    pub fn execution(&self) -> Option<&Execution> {
        match self {
            RunOutcome::Completed(e) => Some(e),
            RunOutcome::Skipped => None,
        }
    }
}

/// Fail with `OperationNotFound` for the first operation node, in insertion
/// order, whose name `context` does not know. Graphs built outside
/// `Pipeline` (directly or from YAML) skip the per-node check of `op`.
pub fn check_operations(context: &OperationContext, graph: &Graph) -> Result<(), ExecError> {
    for node in graph.nodes() {
        if let NodeKind::Operation(name) = &node.kind {
            if !context.has_operation(name) {
                return Err(DispatchError::OperationNotFound(name.clone()).into());
            }
        }
    }
    Ok(())
}

pub struct Pipeline<'ctx> {
    context: &'ctx OperationContext,
    graph: Graph,
    head: Option<NodeId>,
    plan: Option<ExecutionPlan>,
    needed: Option<Graph>,
    satisfied: Option<Graph>,
}

impl<'ctx> Pipeline<'ctx> {
    pub fn new(context: &'ctx OperationContext) -> Self {
        Self::from_graph(context, Graph::new())
    }

    /// Wrap an existing graph. The head is the last node, if any.
    pub fn from_graph(context: &'ctx OperationContext, graph: Graph) -> Self {
        let head = graph.nodes().last().map(|n| n.id);
        Self {
            context,
            graph,
            head,
            plan: None,
            needed: None,
            satisfied: None,
        }
    }

    pub fn context(&self) -> &'ctx OperationContext {
        self.context
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access; any change invalidates the cached plan.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    pub fn set_head(&mut self, id: NodeId) -> Result<&mut Self, ExecError> {
        if self.graph.node(id).is_none() {
            return Err(ExecError::Invalid(format!("{id} is not in this pipeline")));
        }
        self.head = Some(id);
        Ok(self)
    }

    /// Clear the head and return it, so a new branch can start from another
    /// source or node on the same graph.
    pub fn detach(&mut self) -> Option<NodeId> {
        self.head.take()
    }

    pub fn source_object(&mut self, obj: ObjectRef) -> Result<&mut Self, ExecError> {
        self.source_value(Value::Object(obj))
    }

    /// Start the pipeline from a value. Fails when the pipeline already has a head.
    pub fn source_value(&mut self, value: Value) -> Result<&mut Self, ExecError> {
        if let Some(head) = self.head {
            return Err(ExecError::Invalid(format!(
                "pipeline already has a source (head is {head}); detach first to branch"
            )));
        }
        self.head = Some(self.graph.add_source(value));
        Ok(self)
    }

    /// Append `name` applied to the head.
    pub fn op(&mut self, name: &str, params: Params) -> Result<&mut Self, ExecError> {
        self.ensure_operation(name)?;
        let head = self.require_head(name)?;
        self.op_operands(name, vec![Operand::Node(head)], params)
    }

    /// Append `name` applied to the head followed by `others` as extra operands.
    pub fn op_with(&mut self, name: &str, others: &[NodeId], params: Params) -> Result<&mut Self, ExecError> {
        self.ensure_operation(name)?;
        let head = self.require_head(name)?;
        let mut operands = vec![Operand::Node(head)];
        operands.extend(others.iter().map(|id| Operand::Node(*id)));
        self.op_operands(name, operands, params)
    }

    /// Append `name` with a single list operand: the head followed by `others`.
    pub fn op_list(&mut self, name: &str, others: &[NodeId], params: Params) -> Result<&mut Self, ExecError> {
        self.ensure_operation(name)?;
        let head = self.require_head(name)?;
        let mut ids = vec![head];
        ids.extend_from_slice(others);
        self.op_operands(name, vec![Operand::Nodes(ids)], params)
    }

    /// Append `name` with explicit operands; the new node becomes the head.
    pub fn op_operands(&mut self, name: &str, operands: Vec<Operand>, params: Params) -> Result<&mut Self, ExecError> {
        self.ensure_operation(name)?;
        let id = self.graph.add_node(name, operands, params)?;
        self.head = Some(id);
        Ok(self)
    }

    pub fn set_needed_probe(&mut self, graph: Graph) -> &mut Self {
        self.needed = Some(graph);
        self
    }

    pub fn set_satisfied_probe(&mut self, graph: Graph) -> &mut Self {
        self.satisfied = Some(graph);
        self
    }

    /// The plan for the current graph, recompiled if the graph changed.
    pub fn execution_plan(&mut self) -> Result<&ExecutionPlan, ExecError> {
        let stale = match &self.plan {
            Some(plan) => !plan.is_current_for(&self.graph),
            None => true,
        };
        if stale {
            let plan = ExecutionEngine::new(self.context).compile(&self.graph)?;
            tracing::debug!(nodes = plan.len(), generation = plan.generation, "compiled pipeline plan");
            self.plan = Some(plan);
        }
        self.plan
            .as_ref()
            .ok_or_else(|| ExecError::Invalid("plan missing after compilation".into()))
    }

    /// True when there is no needed-probe or its assertion passes.
    pub fn test_if_needed(&self) -> Result<bool, ExecError> {
        match &self.needed {
            Some(graph) => ExecutionEngine::new(self.context).test_if_needed(graph),
            None => Ok(true),
        }
    }

    /// True when there is no satisfied-probe or its assertion passes.
    pub fn test_if_satisfied(&self) -> Result<bool, ExecError> {
        match &self.satisfied {
            Some(graph) => ExecutionEngine::new(self.context).test_if_satisfied(graph),
            None => Ok(true),
        }
    }

    pub fn run(&mut self) -> Result<RunOutcome, ExecutionFailure> {
        let engine = ExecutionEngine::new(self.context);

        if let Some(needed) = &self.needed {
            if let ProbeVerdict::Failed { reason } = engine.probe(needed)? {
                tracing::info!(%reason, "pipeline skipped: not needed");
                return Ok(RunOutcome::Skipped);
            }
        }

        if let Some(satisfied) = &self.satisfied {
            if let ProbeVerdict::Failed { reason } = engine.probe(satisfied)? {
                tracing::error!(%reason, "pipeline requirements not satisfied");
                return Err(ExecError::RequirementsNotSatisfied { reason }.into());
            }
        }

        self.execution_plan()?;
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| ExecError::Invalid("plan missing after compilation".into()))?;
        let execution = engine.execute(&self.graph, plan)?;
        tracing::info!(
            nodes = execution.stats.nodes_executed,
            duration_ms = execution.manifest.duration_ms(),
            plan_hash = %execution.manifest.plan_hash,
            "pipeline finished"
        );
        Ok(RunOutcome::Completed(execution))
    }

    /// Output of the head node in a finished execution.
    pub fn head_result<'e>(&self, execution: &'e Execution) -> Option<&'e Value> {
        self.head.and_then(|h| execution.result(h))
    }

    fn ensure_operation(&self, name: &str) -> Result<(), ExecError> {
        if self.context.has_operation(name) {
            Ok(())
        } else {
            Err(DispatchError::OperationNotFound(name.to_string()).into())
        }
    }

    fn require_head(&self, name: &str) -> Result<NodeId, ExecError> {
        self.head.ok_or_else(|| {
            ExecError::Invalid(format!("'{name}' needs an input; add a source first"))
        })
    }
}
