mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessera", about = "Deep-zoom tile renderer for very large images")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show image dimensions and the tile pyramid for a viewport
    Info(commands::info::InfoArgs),
    /// Render one viewport of an image file to PNG
    Render(commands::render::RenderArgs),
    /// Render one viewport of a procedural test image to PNG
    Simulate(commands::simulate::SimulateArgs),
    /// Print the default renderer configuration as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Render(args) => commands::render::run(args),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
