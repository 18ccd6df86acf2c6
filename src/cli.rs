use crate::config::{AlgorithmKind, Config, RoutingMode, load_config};
use crate::ir::Diagram;
use crate::layout::collision::{CollisionOptions, detect_collisions, resolve_node_overlaps};
use crate::layout::drag::{clamp_constrained_positions, commit_drop};
use crate::layout::label_placement::resolve_label_collisions;
use crate::layout::routing::route_all_edges;
use crate::layout::tidy::{auto_tidy, auto_tidy_boundary, layout_algorithm};
use crate::layout_dump::write_layout_dump;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::{Value, json};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "topo", version, about = "Topology diagram geometry: tidy, collisions, labels and routes")]
pub struct Args {
    /// Input diagram (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config file (JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Operation to run
    #[arg(short = 'm', long = "command", value_enum, default_value = "tidy")]
    pub command: Command,

    /// Layout algorithm for tidy, overriding the config
    #[arg(short = 'a', long = "algorithm", value_enum)]
    pub algorithm: Option<AlgorithmArg>,

    /// Restrict tidy to one boundary and its contents
    #[arg(short = 'b', long = "boundary")]
    pub boundary: Option<String>,

    /// Node to commit for the drop command
    #[arg(short = 'n', long = "node")]
    pub node: Option<String>,

    /// Routing mode, overriding the config
    #[arg(long = "routing", value_enum)]
    pub routing: Option<RoutingArg>,

    /// Also write a full layout dump (JSON) of the result
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Tidy,
    Collisions,
    Overlaps,
    Labels,
    Routes,
    Drop,
    Sanitize,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum AlgorithmArg {
    Grid,
    Layered,
}

impl From<AlgorithmArg> for AlgorithmKind {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Grid => AlgorithmKind::Grid,
            AlgorithmArg::Layered => AlgorithmKind::Layered,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RoutingArg {
    Direct,
    Channel,
}

impl From<RoutingArg> for RoutingMode {
    fn from(arg: RoutingArg) -> Self {
        match arg {
            RoutingArg::Direct => RoutingMode::Direct,
            RoutingArg::Channel => RoutingMode::Channel,
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(algorithm) = args.algorithm {
        config.tidy.algorithm = algorithm.into();
    }
    if let Some(routing) = args.routing {
        config.routing.mode = routing.into();
    }

    let input = read_input(args.input.as_deref())?;
    let mut diagram: Diagram = serde_json::from_str(&input)?;
    let (diagram, report) = execute(&args, &config, &mut diagram)?;

    if let Some(path) = args.dump.as_deref() {
        write_layout_dump(path, &diagram, &config)?;
    }
    let body = serde_json::to_string_pretty(&report)?;
    write_output(&body, args.output.as_deref())
}

/// Run the selected command and return the resulting diagram with the
/// JSON report to print.
fn execute(args: &Args, config: &Config, diagram: &mut Diagram) -> Result<(Diagram, Value)> {
    match args.command {
        Command::Sanitize => {
            let report = diagram.sanitize();
            Ok((diagram.clone(), json!({ "diagram": diagram, "sanitized": report })))
        }
        Command::Tidy => {
            let sanitized = diagram.sanitize();
            let algorithm = layout_algorithm(config.tidy.algorithm);
            let result = match args.boundary.as_deref() {
                Some(boundary) => auto_tidy_boundary(&diagram.nodes, &diagram.edges, boundary, &algorithm, config)?,
                None => auto_tidy(&diagram.nodes, &diagram.edges, &algorithm, config)?,
            };
            let tidied = Diagram::new(result.nodes, diagram.edges.clone());
            let report = json!({ "diagram": tidied, "stats": result.stats, "sanitized": sanitized });
            Ok((tidied, report))
        }
        Command::Collisions => {
            let report = detect_collisions(
                &diagram.nodes,
                &CollisionOptions::from_config(&config.collision),
                &config.dimensions,
            );
            let quality = report.quality();
            Ok((diagram.clone(), json!({ "collisions": report, "quality": quality })))
        }
        Command::Overlaps => {
            let result = resolve_node_overlaps(&diagram.nodes, &config.collision, &config.dimensions);
            let resolved = Diagram::new(result.nodes.clone(), diagram.edges.clone());
            Ok((resolved, json!({ "resolution": result })))
        }
        Command::Labels => {
            let result = resolve_label_collisions(&diagram.nodes, &diagram.edges, config);
            Ok((diagram.clone(), json!({ "labels": result })))
        }
        Command::Routes => {
            let routes = route_all_edges(&diagram.nodes, &diagram.edges, config);
            Ok((diagram.clone(), json!({ "routes": routes })))
        }
        Command::Drop => {
            let node = args
                .node
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--node is required for the drop command"))?;
            let mut outcome = commit_drop(&diagram.nodes, node, &config.dimensions);
            let clamped = clamp_constrained_positions(&mut outcome.nodes, &config.dimensions);
            let dropped = Diagram::new(outcome.nodes.clone(), diagram.edges.clone());
            let report = json!({
                "diagram": dropped,
                "change": outcome.change,
                "sanitized": outcome.sanitized,
                "clamped": clamped,
            });
            Ok((dropped, report))
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path.filter(|path| *path != Path::new("-")) {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(body: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, body)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(body.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
