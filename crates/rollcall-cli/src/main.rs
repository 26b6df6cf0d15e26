use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod report;

use config::Config;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face verification pipeline CLI")]
struct Cli {
    /// Directory containing the ONNX model files
    /// (default: $ROLLCALL_MODEL_DIR, else the user data directory).
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a descriptor from a photograph and write it to a file
    Encode {
        /// Photograph to encode
        #[arg(long)]
        image: PathBuf,
        /// Output descriptor file (default: the image path with .json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Verify a live image against a stored descriptor
    Verify {
        /// Live capture to verify
        #[arg(long)]
        image: PathBuf,
        /// Stored descriptor file (JSON array of 128 floats)
        #[arg(long)]
        descriptor: PathBuf,
        /// Match tolerance (default: $ROLLCALL_TOLERANCE, else 0.6)
        #[arg(long)]
        tolerance: Option<f32>,
    },
    /// Compare two descriptor files
    Compare {
        /// Known descriptor file
        #[arg(long)]
        known: PathBuf,
        /// Candidate descriptor file
        #[arg(long)]
        candidate: PathBuf,
        /// Match tolerance (default: $ROLLCALL_TOLERANCE, else 0.6)
        #[arg(long)]
        tolerance: Option<f32>,
    },
    /// Identify a probe image against a gallery of descriptor files
    Identify {
        /// Probe image
        #[arg(long)]
        image: PathBuf,
        /// Directory of <label>.json descriptor files
        #[arg(long)]
        gallery: PathBuf,
        /// Match tolerance (default: $ROLLCALL_TOLERANCE, else 0.6)
        #[arg(long)]
        tolerance: Option<f32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { image, output } => {
            let config = Config::from_env().with_overrides(cli.model_dir, None);
            commands::encode(&config, &image, output)
        }
        Commands::Verify { image, descriptor, tolerance } => {
            let config = Config::from_env().with_overrides(cli.model_dir, tolerance);
            commands::verify_command(&config, &image, &descriptor)
        }
        Commands::Compare { known, candidate, tolerance } => {
            let config = Config::from_env().with_overrides(cli.model_dir, tolerance);
            commands::compare(&config, &known, &candidate)
        }
        Commands::Identify { image, gallery, tolerance } => {
            let config = Config::from_env().with_overrides(cli.model_dir, tolerance);
            commands::identify_command(&config, &image, &gallery)
        }
    }
}
