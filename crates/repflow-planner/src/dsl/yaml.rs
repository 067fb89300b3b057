//! YAML → `Graph` for named-node pipelines.
//!
//! Example:
//! ```yaml
//! config:
//!   retry_deny: [count]
//!   consumption: strict
//! nodes:
//!   - name: people
//!     source: { type: csv, path: "data/people.csv" }
//!   - name: adults
//!     op: filter
//!     inputs: [people]
//!     params: { expr: "age >= 18" }
//!   - name: everyone
//!     op: append
//!     inputs: [[adults, people]]
//! probes:
//!   if_satisfied:
//!     - name: check
//!       op: assert_unique
//!       inputs: [people]
//!       params: { fields: [id] }
//! ```
//!
//! Each `inputs` entry is one operand: a node name, or a list of names for a
//! repeated operand. Inputs must name nodes defined earlier in the same list.
//! Probe nodes may also name *source* nodes of the main list; those sources are
//! resolved again into the probe graph and materialized so that probing never
//! consumes the main pipeline's data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use repflow_core::config::ConsumptionPolicy;
use repflow_core::id::NodeId;
use repflow_core::object::Value;
use repflow_core::types::Params;

use crate::error::{GraphError, Result};
use crate::graph::{Graph, Operand};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDoc {
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub probes: ProbeSpecs,
}

/// Per-pipeline overrides of `ContextConfig`. Unset fields keep the env/default value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry_allow: Option<Vec<String>>,
    pub retry_deny: Option<Vec<String>>,
    pub retry_deny_tags: Option<Vec<String>>,
    pub consumption: Option<ConsumptionPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default)]
    pub source: Option<SourceSpec>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    #[serde(default)]
    pub params: Params,
}

/// Backend-specific description of a source; `type` selects the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub options: Params,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSpecs {
    pub if_needed: Vec<NodeSpec>,
    pub if_satisfied: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    IfNeeded,
    IfSatisfied,
}

/// A graph built from a document, with the node names it was built from.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: Graph,
    pub names: BTreeMap<String, NodeId>,
}

impl BuiltGraph {
    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }
}

/// Parse YAML into a `PipelineDoc` and check its structure.
pub fn parse_yaml_pipeline(src: &str) -> Result<PipelineDoc> {
    let doc: PipelineDoc = serde_yaml::from_str(src)?;
    doc.validate()?;
    Ok(doc)
}

impl PipelineDoc {
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(GraphError::Dsl("pipeline has no nodes".into()));
        }
        check_nodes(&self.nodes, None)?;
        check_nodes(&self.probes.if_needed, Some(&self.nodes))?;
        check_nodes(&self.probes.if_satisfied, Some(&self.nodes))?;
        Ok(())
    }

    pub fn build_graph(
        &self,
        resolve: &mut dyn FnMut(&SourceSpec) -> Result<Value>,
    ) -> Result<BuiltGraph> {
        build(&self.nodes, None, resolve)
    }

    /// `None` when the document declares no probe of this kind.
    pub fn build_probe(
        &self,
        kind: ProbeKind,
        resolve: &mut dyn FnMut(&SourceSpec) -> Result<Value>,
    ) -> Result<Option<BuiltGraph>> {
        let specs = match kind {
            ProbeKind::IfNeeded => &self.probes.if_needed,
            ProbeKind::IfSatisfied => &self.probes.if_satisfied,
        };
        if specs.is_empty() {
            return Ok(None);
        }
        build(specs, Some(&self.nodes), resolve).map(Some)
    }
}

fn check_nodes(specs: &[NodeSpec], main: Option<&[NodeSpec]>) -> Result<()> {
    let mut defined: Vec<&str> = Vec::new();
    for spec in specs {
        match (&spec.source, &spec.op) {
            (Some(_), Some(_)) => {
                return Err(GraphError::Dsl(format!(
                    "node '{}' has both a source and an op",
                    spec.name
                )))
            }
            (None, None) => {
                return Err(GraphError::Dsl(format!(
                    "node '{}' needs either a source or an op",
                    spec.name
                )))
            }
            (Some(_), None) if !spec.inputs.is_empty() => {
                return Err(GraphError::Dsl(format!(
                    "source node '{}' cannot have inputs",
                    spec.name
                )))
            }
            _ => {}
        }
        if defined.contains(&spec.name.as_str()) {
            return Err(GraphError::Dsl(format!("duplicate node name '{}'", spec.name)));
        }
        for input in &spec.inputs {
            for name in input_names(input) {
                let known = defined.contains(&name) || main_source(main, name).is_some();
                if !known {
                    return Err(GraphError::Dsl(format!(
                        "input '{name}' of node '{}' is not defined before it",
                        spec.name
                    )));
                }
            }
        }
        defined.push(&spec.name);
    }
    Ok(())
}

fn input_names(input: &InputSpec) -> Vec<&str> {
    match input {
        InputSpec::One(n) => vec![n.as_str()],
        InputSpec::Many(ns) => ns.iter().map(String::as_str).collect(),
    }
}

fn main_source<'a>(main: Option<&'a [NodeSpec]>, name: &str) -> Option<&'a SourceSpec> {
    main?
        .iter()
        .find(|s| s.name == name)
        .and_then(|s| s.source.as_ref())
}

fn build(
    specs: &[NodeSpec],
    main: Option<&[NodeSpec]>,
    resolve: &mut dyn FnMut(&SourceSpec) -> Result<Value>,
) -> Result<BuiltGraph> {
    let probing = main.is_some();
    let mut graph = Graph::new();
    let mut names: BTreeMap<String, NodeId> = BTreeMap::new();

    let mut add_source = |graph: &mut Graph, name: &str, source: &SourceSpec| -> Result<NodeId> {
        let mut value = resolve(source)?;
        if probing {
            value = retain(value)?;
        }
        let id = graph.add_source(value);
        graph.set_label(id, name)?;
        Ok(id)
    };

    for spec in specs {
        let id = match (&spec.source, &spec.op) {
            (Some(source), _) => add_source(&mut graph, &spec.name, source)?,
            (None, Some(op)) => {
                let mut operands = Vec::with_capacity(spec.inputs.len());
                for input in &spec.inputs {
                    let mut ids = Vec::new();
                    for name in input_names(input) {
                        let id = match names.get(name) {
                            Some(id) => *id,
                            None => {
                                let source = main_source(main, name).ok_or_else(|| {
                                    GraphError::Dsl(format!("unknown input '{name}'"))
                                })?;
                                let id = add_source(&mut graph, name, source)?;
                                names.insert(name.to_string(), id);
                                id
                            }
                        };
                        ids.push(id);
                    }
                    operands.push(match input {
                        InputSpec::One(_) => Operand::Node(ids[0]),
                        InputSpec::Many(_) => Operand::Nodes(ids),
                    });
                }
                let id = graph.add_node(op.clone(), operands, spec.params.clone())?;
                graph.set_label(id, &spec.name)?;
                id
            }
            (None, None) => {
                return Err(GraphError::Dsl(format!(
                    "node '{}' needs either a source or an op",
                    spec.name
                )))
            }
        };
        names.insert(spec.name.clone(), id);
    }

    Ok(BuiltGraph { graph, names })
}

/// Replace single-pass objects by retained copies.
fn retain(value: Value) -> Result<Value> {
    Ok(match value {
        Value::Object(o) if !o.retained() => Value::Object(o.to_retained()?),
        Value::Objects(list) => Value::Objects(
            list.into_iter()
                .map(|o| if o.retained() { Ok(o) } else { o.to_retained() })
                .collect::<repflow_core::error::Result<_>>()?,
        ),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repflow_core::types::Scalar;

    const DOC: &str = r#"
config:
  retry_deny: [count]
nodes:
  - name: a
    source: { type: literal, value: 1 }
  - name: b
    op: f
    inputs: [a]
    params: { expr: "x > 1" }
  - name: c
    op: g
    inputs: [[a, b]]
probes:
  if_satisfied:
    - name: check
      op: assert_unique
      inputs: [a]
"#;

    fn literal(spec: &SourceSpec) -> Result<Value> {
        let v = spec.options.get("value").cloned().unwrap_or_default();
        Ok(Value::Scalar(Scalar::from_json(&v)))
    }

    #[test]
    fn parses_and_builds() {
        let doc = parse_yaml_pipeline(DOC).unwrap();
        assert_eq!(
            doc.config.as_ref().and_then(|c| c.retry_deny.clone()),
            Some(vec!["count".to_string()])
        );
        let built = doc.build_graph(&mut literal).unwrap();
        assert_eq!(built.graph.len(), 3);
        let c = built.id("c").unwrap();
        assert!(matches!(&built.graph.node(c).unwrap().operands[0], Operand::Nodes(ids) if ids.len() == 2));
        assert_eq!(built.name_of(c), Some("c"));
    }

    #[test]
    fn probe_graphs_copy_main_sources() {
        let doc = parse_yaml_pipeline(DOC).unwrap();
        let probe = doc
            .build_probe(ProbeKind::IfSatisfied, &mut literal)
            .unwrap()
            .unwrap();
        assert_eq!(probe.graph.len(), 2);
        assert!(doc.build_probe(ProbeKind::IfNeeded, &mut literal).unwrap().is_none());
    }

    #[test]
    fn forward_references_are_rejected() {
        let src = r#"
nodes:
  - name: b
    op: f
    inputs: [a]
  - name: a
    source: { type: literal }
"#;
        let err = parse_yaml_pipeline(src).unwrap_err();
        assert!(err.to_string().contains("not defined before"));
    }
}
