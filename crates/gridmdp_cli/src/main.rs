//! Terminal client for a grid-world MDP solver.
//!
//! Examples:
//!   gridmdp
//!   gridmdp --addr 10.0.0.5:5000 --sim-interval-ms 200
//!   gridmdp --config ./settings --save-config
//!
//! Commands are read from stdin, one per line; `help` lists them.

mod repl;
mod text_render;

use clap::Parser;
use gridmdp::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "gridmdp")]
#[command(version, about = "Inspect grid-world MDP solver runs", long_about = None)]
struct Cli {
    /// Solver address (host:port)
    #[arg(long)]
    addr: Option<String>,

    /// Directory holding config.json (defaults to the OS config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Milliseconds between simulated agent moves
    #[arg(long)]
    sim_interval_ms: Option<u64>,

    /// Milliseconds between animated iterations
    #[arg(long)]
    anim_interval_ms: Option<u64>,

    /// Solver algorithm used by `init`
    #[arg(long)]
    algorithm: Option<Algorithm>,

    /// Write the effective settings to config.json and exit
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(addr) = &self.addr {
            config.solver_addr = addr.clone();
        }
        if let Some(ms) = self.sim_interval_ms {
            config.simulation_interval_ms = ms.max(1);
        }
        if let Some(ms) = self.anim_interval_ms {
            config.animation_interval_ms = ms.max(1);
        }
        if let Some(a) = self.algorithm {
            config.algorithm = a;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout belongs to the grid; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = match &cli.config {
        Some(dir) => AppPaths::with_dir(dir),
        None => AppPaths::new()?,
    };
    let mut config = ClientConfig::load(&paths)?;
    config.apply_env();
    cli.apply(&mut config);

    if cli.save_config {
        config.save(&paths)?;
        info!("Settings written to {}", paths.config_file().display());
        return Ok(());
    }

    info!("Using solver at {}", config.solver_addr);
    let solver = TcpSolverClient::new(&config);
    let client = GridClient::new(solver, Arc::new(text_render::TextRenderer), &config);
    repl::Repl::new(client, config.algorithm).run().await?;
    Ok(())
}
