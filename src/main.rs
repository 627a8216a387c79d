use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lebedigital::{
    calibration::{estimate_youngs_modulus, CalibrationSettings},
    config::{
        load_input_file, parse_experiment_config, ExperimentConfig, ExperimentKind,
        ExperimentParameters,
    },
    experiment::build_experiment,
    knowledge_graph::{calibration_input, KnowledgeGraph},
    mesher::bottom_area,
    post_processor::{
        calibration_input_json, csv_output, report_json, write_report, CalibrationReport,
    },
    processed_data::read_processed_data,
    solver::UniaxialSolver,
};

#[derive(Parser)]
#[command(name = "lebedigital")]
#[command(about = "Concrete cylinder meshing, knowledge graph retrieval and calibration")]
struct Args {
    /// Logging filter, e.g. info or lebedigital=debug
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the specimen mesh of an experiment input file
    Mesh {
        /// Experiment input json
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "nodes.csv")]
        nodes: String,

        #[arg(long, default_value = "elements.csv")]
        elements: String,
    },
    /// Print the calibration input of an experiment stored in a knowledge graph
    Query {
        /// Turtle file of the knowledge graph
        #[arg(short, long)]
        graph: PathBuf,

        /// Specimen name, e.g. "Wolf 8.2 Probe 1"
        #[arg(short, long)]
        experiment: String,
    },
    /// Estimate the Young's modulus of an experiment
    Calibrate {
        #[arg(short, long)]
        graph: PathBuf,

        #[arg(short, long)]
        experiment: String,

        /// Experiment input json; geometry is taken from the knowledge graph
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Report file; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn load_config(input: Option<&Path>) -> Result<ExperimentConfig> {
    match input {
        Some(path) => {
            let input_json = load_input_file(&path.to_string_lossy())?;
            Ok(parse_experiment_config(&input_json)?)
        }
        None => Ok(ExperimentConfig {
            kind: ExperimentKind::Cylinder,
            parameters: ExperimentParameters::defaults(ExperimentKind::Cylinder),
        }),
    }
}

fn run_mesh(input: &Path, nodes: &str, elements: &str) -> Result<()> {
    let config = load_config(Some(input))?;
    let generator = config.parameters.mesher.generator();
    let mut experiment = build_experiment(config.kind, config.parameters);

    experiment
        .setup(generator.as_ref())
        .context("specimen setup failed")?;
    let constraints = experiment.create_displacement_constraints()?;

    let Some(mesh) = experiment.mesh() else {
        bail!("setup produced no mesh");
    };
    info!(
        "mesh has {} vertices, {} cells and {} displacement constraints",
        mesh.vertices.len(),
        mesh.cells.len(),
        constraints.len()
    );
    if let Some(radius) = experiment.mesh_radius() {
        info!("corrected mesh radius {radius:.6}");
    }

    csv_output(mesh, nodes, elements)?;
    Ok(())
}

fn run_query(graph: &Path, experiment: &str) -> Result<()> {
    let graph = KnowledgeGraph::from_turtle_file(graph)?;
    let input = calibration_input(&graph, experiment)?;
    println!("{}", calibration_input_json(&input).pretty(2));
    Ok(())
}

fn run_calibrate(
    graph_path: &Path,
    experiment_name: &str,
    input: Option<&Path>,
    output: Option<&str>,
) -> Result<()> {
    let graph = KnowledgeGraph::from_turtle_file(graph_path)?;
    let calibration = calibration_input(&graph, experiment_name)?;

    let (Some(diameter), Some(length)) = (calibration.diameter(), calibration.length()) else {
        bail!("knowledge graph has no diameter and length for {experiment_name}");
    };
    if calibration.processed_data_path.is_empty() {
        bail!("knowledge graph has no processed data for {experiment_name}");
    }

    let mut config = load_config(input)?;
    config.parameters.radius = diameter / 2.0;
    config.parameters.height = length;

    let generator = config.parameters.mesher.generator();
    let mut experiment = build_experiment(config.kind, config.parameters.clone());
    experiment
        .setup(generator.as_ref())
        .context("specimen setup failed")?;

    // relative paths in the graph are relative to the graph document
    let mut data_path = PathBuf::from(&calibration.processed_data_path);
    if data_path.is_relative() {
        if let Some(dir) = graph_path.parent() {
            data_path = dir.join(data_path);
        }
    }
    let data = read_processed_data(&data_path)?;

    let mut settings = CalibrationSettings::new(config.parameters.youngs_modulus_bounds);
    settings.show_progress = true;
    let outcome =
        estimate_youngs_modulus(experiment.as_ref(), &UniaxialSolver, &data, &settings)?;

    let Some(mesh) = experiment.mesh() else {
        bail!("setup produced no mesh");
    };
    let report = CalibrationReport {
        experiment_name,
        input: &calibration,
        nominal_radius: config.parameters.radius,
        mesh_radius: experiment.mesh_radius(),
        bottom_area: bottom_area(mesh),
        outcome: &outcome,
    };

    match output {
        Some(path) => write_report(&report, path)?,
        None => println!("{}", report_json(&report).pretty(2)),
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .init();

    match &args.command {
        Command::Mesh {
            input,
            nodes,
            elements,
        } => run_mesh(input, nodes, elements),
        Command::Query { graph, experiment } => run_query(graph, experiment),
        Command::Calibrate {
            graph,
            experiment,
            input,
            output,
        } => run_calibrate(graph, experiment, input.as_deref(), output.as_deref()),
    }
}
