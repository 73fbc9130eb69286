use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use common::log_setup::setup_logging;
use common::FileFormat;
use graph_executor::prelude::*;

/// Runs an execution plan against a graph with echoing node logic.
#[derive(Parser, Debug)]
#[command(name = "run_plan", version, about)]
struct Cli {
    /// Execution plan, YAML or JSON
    #[arg(short, long)]
    plan: PathBuf,

    /// Graph descriptor, YAML or JSON
    #[arg(short, long)]
    graph: PathBuf,

    /// Executor options, YAML or JSON
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Base log level; RUST_LOG takes precedence
    #[arg(long, env = "RUN_PLAN_LOG", default_value = "info")]
    log_level: String,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct NodeReport {
    id: NodeId,
    state: NodeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<OutputValues>,
}

#[derive(Debug, Serialize)]
struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<RunStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<OutputValues>,
    nodes: Vec<NodeReport>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, &cli.log_dir)?;

    let plan = ExecutionPlan::from_file(&cli.plan)?;
    let graph = GraphDescriptor::from_file(&cli.graph)?;
    let options = match &cli.options {
        Some(path) => ExecutorOptions::from_file(path)?,
        None => ExecutorOptions::default(),
    };
    info!(plan = %cli.plan.display(), graph = %cli.graph.display(), ?options, "Loaded inputs");

    let logic: Arc<dyn NodeLogic> = Arc::new(EchoLogic);
    let mut executor = Executor::new(plan, graph, Some(logic)).with_options(options);

    let result = executor.run().await;
    let failed = result.is_err();
    let (stats, error) = match result {
        Ok(stats) => (Some(stats), None),
        Err(err) => {
            error!("{}", err);
            (None, Some(err.into_values()))
        }
    };

    let nodes = executor
        .status()
        .into_iter()
        .map(|NodeStatus { id, state }| NodeReport {
            outputs: executor.outputs(&id),
            id,
            state,
        })
        .collect();

    let report = Report {
        stats,
        error,
        nodes,
    };
    print!("{}", common::serialize(&report, FileFormat::Yaml)?);

    if failed {
        anyhow::bail!("Execution plan failed");
    }

    Ok(())
}
