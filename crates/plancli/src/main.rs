use anyhow::Result;
use clap::{Parser, Subcommand};
use plancore::{
    CartesianWaypoint, CompositeProgram, DataStorage, ExecutionEvent, JointWaypoint,
    ManipulatorInfo, MoveInstruction, ProgramGroup, Transform, Value, Waypoint,
};
use planruntime::{ComposerRuntime, RuntimeConfig, TaskRegistry};
use plantasks::collab::{InterpolationSolver, StaticEnvironment};
use plantasks::profiles::{default_profile_dictionary, ProfileSetConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "plan")]
#[command(about = "Raster planning pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pipeline from a program file and execute it
    Run {
        /// Path to program JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Optional profile set JSON file
        #[arg(short, long)]
        profiles: Option<PathBuf>,

        /// Storage key the program is placed under
        #[arg(long, default_value = "program")]
        input_key: String,

        /// Storage key the merged trajectory is written to
        #[arg(long, default_value = "trajectory")]
        output_key: String,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a persisted pipeline file
    Validate {
        /// Path to pipeline JSON file
        file: PathBuf,
    },

    /// Build a pipeline from a program file and persist it
    Build {
        /// Path to program JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Output pipeline file path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },

    /// List available task types
    Tasks,

    /// Create a new example program
    Init {
        /// Output file path
        #[arg(short, long, default_value = "program.json")]
        output: PathBuf,
    },
}

fn build_registry() -> TaskRegistry {
    // Stand-in collaborators: a table-driven environment and a solver that
    // accepts the seed. Real deployments register factories backed by their
    // own kinematics and optimizer.
    let env = Arc::new(StaticEnvironment::new(["tool0"]));
    let solver = Arc::new(InterpolationSolver::default());
    let mut registry = TaskRegistry::new();
    plantasks::register_all(&mut registry, env, solver);
    registry
}

fn load_profiles(path: Option<&PathBuf>) -> Result<plancore::ProfileDictionary> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let config: ProfileSetConfig = serde_json::from_str(&json)?;
            Ok(config.build_dictionary())
        }
        None => Ok(default_profile_dictionary()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            profiles,
            input_key,
            output_key,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            run_program(file, profiles, input_key, output_key).await?;
        }

        Commands::Validate { file } => {
            validate_pipeline(file)?;
        }

        Commands::Build { file, output } => {
            build_and_save(file, output)?;
        }

        Commands::Tasks => {
            list_tasks();
        }

        Commands::Init { output } => {
            create_example_program(output)?;
        }
    }

    Ok(())
}

async fn run_program(
    file: PathBuf,
    profiles: Option<PathBuf>,
    input_key: String,
    output_key: String,
) -> Result<()> {
    println!("🚀 Loading program from: {}", file.display());

    let program_json = std::fs::read_to_string(&file)?;
    let program: CompositeProgram = serde_json::from_str(&program_json)?;

    println!("📋 Program: {}", program.name);
    println!("   Segments: {}", program.segment_count());
    println!("   Transitions: {}", program.transition_count());
    println!();

    let dictionary = load_profiles(profiles.as_ref())?;
    let graph = plantasks::build_pipeline(&program, &dictionary, &input_key, &output_key)?;

    let registry = build_registry();
    let runtime = ComposerRuntime::with_config(
        Arc::new(registry),
        Arc::new(dictionary),
        RuntimeConfig::default(),
    );

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::GraphStarted { graph_name, .. } => {
                    println!("▶️  Pipeline started: {}", graph_name);
                }
                ExecutionEvent::NodeStarted { node_name, .. } => {
                    println!("  ⚡ Starting node: {}", node_name);
                }
                ExecutionEvent::NodeCompleted {
                    node_name,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_name, duration_ms);
                }
                ExecutionEvent::NodeFailed {
                    node_name, error, ..
                } => {
                    println!("  ❌ Node {} failed: {}", node_name, error);
                }
                ExecutionEvent::NodeSkipped { node_name, .. } => {
                    println!("  ⏭️  Node {} skipped", node_name);
                }
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    plancore::NodeEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", node_id, message);
                    }
                    plancore::NodeEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", node_id, message);
                    }
                    plancore::NodeEvent::Progress { percent, message } => {
                        if let Some(msg) = message {
                            println!("     📊 [{}] {}% - {}", node_id, percent, msg);
                        } else {
                            println!("     📊 [{}] {}%", node_id, percent);
                        }
                    }
                },
                ExecutionEvent::GraphCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Pipeline completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Pipeline failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let storage = DataStorage::new();
    storage.put(input_key.clone(), Value::Program(program)).await;

    let result = runtime.run(&graph, storage.clone()).await?;

    // Let the event listener drain before printing the summary
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!("   Status: {:?}", result.status);
    println!("   Executed: {} nodes ({} skipped)", result.executed, result.skipped);

    if !result.failed.is_empty() {
        println!();
        println!("❗ Failed nodes:");
        for failure in &result.failed {
            println!("   {} [{}]: {}", failure.name, failure.kind, failure.error);
        }
    }

    if let Some(Value::Trajectory(trajectory)) = storage.get(&output_key).await {
        println!();
        println!(
            "📤 Output '{}': {} points over {:.1}s",
            output_key,
            trajectory.len(),
            trajectory
                .points
                .last()
                .map(|p| p.time_from_start)
                .unwrap_or(0.0)
        );
    }

    Ok(())
}

fn validate_pipeline(file: PathBuf) -> Result<()> {
    let registry = build_registry();
    let graph = planruntime::load_pipeline(&file, &registry)?;
    println!("✅ Pipeline is valid: {}", graph.name);
    println!("   Nodes: {}", graph.nodes.len());
    println!("   Edges: {}", graph.edges.len());
    Ok(())
}

fn build_and_save(file: PathBuf, output: PathBuf) -> Result<()> {
    let program_json = std::fs::read_to_string(&file)?;
    let program: CompositeProgram = serde_json::from_str(&program_json)?;
    let dictionary = default_profile_dictionary();
    let graph = plantasks::build_pipeline(&program, &dictionary, "program", "trajectory")?;
    planruntime::save_pipeline(&output, &graph)?;
    println!("✅ Pipeline written to: {}", output.display());
    Ok(())
}

fn list_tasks() {
    let registry = build_registry();
    println!("Available task types:");
    for task_type in registry.list_task_types() {
        if let Some(metadata) = registry.get_metadata(&task_type) {
            println!("  {} - {}", task_type, metadata.description);
        } else {
            println!("  {}", task_type);
        }
    }
}

fn create_example_program(output: PathBuf) -> Result<()> {
    let manipulator = ManipulatorInfo::new("manipulator", "tool0", "part");
    let mut program = CompositeProgram::new("example-raster", manipulator);

    let segment = |x: f64| {
        ProgramGroup::new(vec![
            MoveInstruction::new(Waypoint::Joint(JointWaypoint::new(vec![
                x, 0.2, 0.0, 0.0, 0.0, 0.0,
            ]))),
            MoveInstruction::new(Waypoint::Cartesian(CartesianWaypoint::new(
                Transform::from_translation(x, 0.5, 0.2),
            ))),
        ])
    };
    let transition = |x: f64| {
        ProgramGroup::new(vec![MoveInstruction::new(Waypoint::Joint(
            JointWaypoint::new(vec![x, -0.2, 0.0, 0.0, 0.0, 0.0]),
        ))])
    };

    program.add_group(segment(0.0));
    program.add_group(transition(0.25));
    program.add_group(segment(0.5));

    let json = serde_json::to_string_pretty(&program)?;
    std::fs::write(&output, json)?;
    println!("✅ Example program written to: {}", output.display());
    Ok(())
}
