use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Run mass-spring layouts from scene files.
#[derive(Parser, Debug)]
#[command(name = "physlayout")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate a scene and report the final node positions as JSON
    Simulate {
        /// Scene file (.yaml, .yml or .json)
        #[arg(short, long)]
        scene: PathBuf,

        /// Simulated seconds to run
        #[arg(short, long, default_value = "10")]
        duration: f64,

        /// Override the scene's friction
        #[arg(long)]
        friction: Option<f64>,

        /// Override the scene's time step in seconds
        #[arg(long)]
        time_step: Option<f64>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a scene and print a summary of its graph
    Check {
        /// Scene file (.yaml, .yml or .json)
        #[arg(short, long)]
        scene: PathBuf,
    },
}
