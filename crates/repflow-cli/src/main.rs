//! repflow CLI: run, check and inspect YAML pipelines.

use clap::{Parser, Subcommand};
use repflow_core::config::{split_list, ConsumptionPolicy, ContextConfig};
use repflow_core::object::Value;
use repflow_core::types::Scalar;
use repflow_dispatch::OperationContext;
use repflow_exec::{check_operations, Pipeline, RunOutcome};
use repflow_planner::dsl::yaml::{BuiltGraph, ProbeKind, SourceSpec};
use repflow_planner::{compile, parse_yaml_pipeline, GraphError, PipelineConfig, PipelineDoc};
use repflow_rows::{csv_list, csv_source, RowListObject};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "repflow")]
#[command(about = "Representation-aware operation pipelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline from a YAML file
    Run {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Comma-separated operations that may not retry (overrides config)
        #[arg(long)]
        retry_deny: Option<String>,

        /// strict or retain (overrides config)
        #[arg(long)]
        consumption: Option<ConsumptionPolicy>,
    },

    /// Validate a pipeline YAML file (parse, build and compile)
    Validate {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Show the execution plan for a pipeline
    Explain {
        /// Path to the pipeline YAML file
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Print the registered operations as JSON
    Catalogue,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            pipeline,
            retry_deny,
            consumption,
        } => {
            if let Err(e) = run_pipeline(&pipeline, retry_deny, consumption) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Validate { pipeline } => {
            if let Err(e) = validate_pipeline(&pipeline) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Pipeline is valid");
        }
        Commands::Explain { pipeline } => {
            if let Err(e) = explain_pipeline(&pipeline) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Catalogue => {
            if let Err(e) = print_catalogue() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_pipeline(
    pipeline_path: &Path,
    retry_deny: Option<String>,
    consumption: Option<ConsumptionPolicy>,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = load(pipeline_path)?;
    let config = resolve_config(
        ContextConfig::from_env(),
        doc.config.as_ref(),
        retry_deny.as_deref(),
        consumption,
    );

    let ctx = context(config)?;
    let base = base_dir(pipeline_path);
    let mut resolve = |spec: &SourceSpec| resolve_source(&base, spec);

    let built = doc.build_graph(&mut resolve)?;
    check_operations(&ctx, &built.graph)?;
    let mut pipeline = Pipeline::from_graph(&ctx, built.graph.clone());
    if let Some(probe) = doc.build_probe(ProbeKind::IfNeeded, &mut resolve)? {
        check_operations(&ctx, &probe.graph)?;
        pipeline.set_needed_probe(probe.graph);
    }
    if let Some(probe) = doc.build_probe(ProbeKind::IfSatisfied, &mut resolve)? {
        check_operations(&ctx, &probe.graph)?;
        pipeline.set_satisfied_probe(probe.graph);
    }

    let execution = match pipeline.run() {
        Ok(RunOutcome::Completed(execution)) => execution,
        Ok(RunOutcome::Skipped) => {
            println!("- Pipeline skipped: not needed");
            return Ok(());
        }
        Err(failure) => {
            if !failure.partial.is_empty() {
                eprintln!("Results produced before the failure:");
                for (id, value) in &failure.partial {
                    eprintln!("  {}: {}", label(&built, *id), summarize(value));
                }
            }
            return Err(failure.into());
        }
    };

    println!("✓ Pipeline executed successfully");
    for (id, value) in &execution.results {
        println!("  {}: {}", label(&built, *id), summarize(value));
    }
    println!("  Duration: {}ms", execution.manifest.duration_ms());
    println!("  Plan hash: {}", execution.manifest.plan_hash);
    println!("  Run id: {}", execution.manifest.id.0);

    Ok(())
}

fn validate_pipeline(pipeline_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = load(pipeline_path)?;
    let ctx = context(ContextConfig::from_env())?;
    let base = base_dir(pipeline_path);
    let mut resolve = |spec: &SourceSpec| resolve_source(&base, spec);
    let built = doc.build_graph(&mut resolve)?;
    check_operations(&ctx, &built.graph)?;
    compile(&built.graph)?;
    for kind in [ProbeKind::IfNeeded, ProbeKind::IfSatisfied] {
        if let Some(probe) = doc.build_probe(kind, &mut resolve)? {
            check_operations(&ctx, &probe.graph)?;
            compile(&probe.graph)?;
        }
    }
    Ok(())
}

fn explain_pipeline(pipeline_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = load(pipeline_path)?;
    let base = base_dir(pipeline_path);
    let mut resolve = |spec: &SourceSpec| resolve_source(&base, spec);
    let built = doc.build_graph(&mut resolve)?;
    let plan = compile(&built.graph)?;
    let descriptions = built.graph.describe();

    println!("Pipeline Execution Plan");
    println!("=======================");
    println!();
    println!("Nodes: {}", plan.len());
    println!();
    for (position, id) in plan.order.iter().enumerate() {
        let Some(desc) = descriptions.get(id.index()) else {
            continue;
        };
        println!(
            "  {}. {} [{}] op={} consumers={}",
            position + 1,
            label(&built, *id),
            id,
            desc.op,
            plan.consumer_count(*id)
        );
        if !desc.inputs.is_empty() {
            println!("     inputs: {}", desc.inputs.join(", "));
        }
        if !desc.params.is_empty() {
            println!("     params: {}", serde_json::to_string(&desc.params)?);
        }
    }
    for (kind, name) in [(ProbeKind::IfNeeded, "if_needed"), (ProbeKind::IfSatisfied, "if_satisfied")] {
        if let Some(probe) = doc.build_probe(kind, &mut resolve)? {
            println!();
            println!("Probe {name}: {} nodes", probe.graph.len());
        }
    }

    Ok(())
}

fn print_catalogue() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context(ContextConfig::from_env())?;
    println!("{}", ctx.catalogue_json()?);
    Ok(())
}

fn load(pipeline_path: &Path) -> Result<PipelineDoc, Box<dyn std::error::Error>> {
    tracing::debug!(path = %pipeline_path.display(), "loading pipeline");
    let yaml_content = fs::read_to_string(pipeline_path)?;
    Ok(parse_yaml_pipeline(&yaml_content)?)
}

fn context(config: ContextConfig) -> Result<OperationContext, Box<dyn std::error::Error>> {
    let mut ctx = OperationContext::with_config(config);
    repflow_rows::register_all(&mut ctx)?;
    Ok(ctx)
}

fn base_dir(pipeline_path: &Path) -> PathBuf {
    pipeline_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Source types understood by the CLI:
/// - `csv`: `path` (relative to the pipeline file), optional `mode: stream|list`
/// - `rows`: inline `records`, a list of flat maps
fn resolve_source(base: &Path, spec: &SourceSpec) -> Result<Value, GraphError> {
    match spec.kind.as_str() {
        "csv" => {
            let path = spec
                .options
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| GraphError::Dsl("csv source needs a 'path'".into()))?;
            let path = base.join(path);
            let mode = spec
                .options
                .get("mode")
                .and_then(|v| v.as_str())
                .unwrap_or("stream");
            let obj = match mode {
                "stream" => csv_source(&path)?,
                "list" => csv_list(&path)?,
                other => {
                    return Err(GraphError::Dsl(format!(
                        "csv mode must be stream or list, got '{other}'"
                    )))
                }
            };
            Ok(Value::Object(obj))
        }
        "rows" => {
            let records = spec
                .options
                .get("records")
                .and_then(|v| v.as_array())
                .ok_or_else(|| GraphError::Dsl("rows source needs a 'records' list".into()))?;
            let mut rows = Vec::with_capacity(records.len());
            for record in records {
                let fields = record
                    .as_object()
                    .ok_or_else(|| GraphError::Dsl("each record must be a map".into()))?;
                rows.push(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), Scalar::from_json(v)))
                        .collect(),
                );
            }
            Ok(Value::Object(RowListObject::shared(rows)))
        }
        other => Err(GraphError::Dsl(format!("unknown source type '{other}'"))),
    }
}

/// Layer the configuration: environment, then the pipeline file, then CLI flags.
fn resolve_config(
    env: ContextConfig,
    file: Option<&PipelineConfig>,
    cli_retry_deny: Option<&str>,
    cli_consumption: Option<ConsumptionPolicy>,
) -> ContextConfig {
    let mut config = env;
    if let Some(file) = file {
        apply_pipeline_config(&mut config, file);
    }
    if let Some(deny) = cli_retry_deny {
        config.retry_deny = split_list(deny);
    }
    if let Some(policy) = cli_consumption {
        config.consumption = policy;
    }
    config
}

fn apply_pipeline_config(cfg: &mut ContextConfig, doc: &PipelineConfig) {
    if let Some(allow) = &doc.retry_allow {
        cfg.retry_allow = allow.clone();
    }
    if let Some(deny) = &doc.retry_deny {
        cfg.retry_deny = deny.clone();
    }
    if let Some(tags) = &doc.retry_deny_tags {
        cfg.retry_deny_tags = tags.clone();
    }
    if let Some(policy) = doc.consumption {
        cfg.consumption = policy;
    }
}

fn label(built: &BuiltGraph, id: repflow_core::id::NodeId) -> String {
    built
        .name_of(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

fn summarize(value: &Value) -> String {
    match value {
        Value::Scalar(s) => s.to_string(),
        Value::Object(obj) => match obj.as_any().downcast_ref::<RowListObject>() {
            Some(list) => format!("{} rows", list.rows().len()),
            None => value.describe(),
        },
        Value::Objects(_) => value.describe(),
    }
}
