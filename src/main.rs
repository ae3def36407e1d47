use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use physlayout::Scene;

mod cli;

use cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path) -> anyhow::Result<Scene> {
    Scene::from_path(path).with_context(|| format!("failed to load scene {}", path.display()))
}

fn simulate(
    path: &Path,
    duration: f64,
    friction: Option<f64>,
    time_step: Option<f64>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let duration = Duration::try_from_secs_f64(duration)
        .with_context(|| format!("invalid duration {duration}"))?;

    let mut scene = load(path)?;
    if let Some(friction) = friction {
        scene.simulation = scene.simulation.with_friction(friction);
    }
    if let Some(time_step) = time_step {
        scene.simulation = scene.simulation.with_time_step(time_step);
    }
    let setup = scene
        .build()
        .with_context(|| format!("invalid scene {}", path.display()))?;

    let report = setup.run(duration)?;
    info!(steps = report.steps, time = report.time, "simulation finished");
    let json = report.to_json()?;

    match output {
        Some(output) => {
            fs::write(&output, json + "\n")
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Simulated {:.2}s ({} steps), positions written to {}",
                report.time,
                report.steps,
                output.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let scene = load(path)?;
    if scene.nodes.is_empty() {
        bail!("scene {} declares no nodes", path.display());
    }
    let setup = scene
        .build()
        .with_context(|| format!("invalid scene {}", path.display()))?;
    println!("{}: {}", path.display(), setup.graph.stats());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Simulate {
            scene,
            duration,
            friction,
            time_step,
            output,
        } => simulate(&scene, duration, friction, time_step, output),
        Commands::Check { scene } => check(&scene),
    }
}
