//! unotebook CLI - on-device notebook service.

mod colors;
mod run;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "unotebook")]
#[command(about = "Tiny notebook server for small devices")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the notebook server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "12345")]
        port: u16,

        /// Directory holding .unb notebooks
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Directory holding unotebook.js (defaults to --dir)
        #[arg(long)]
        assets: Option<PathBuf>,

        /// Abort scripts after this many operations (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_operations: u64,
    },

    /// Run every code cell of a notebook headlessly
    Run {
        /// Path to the notebook (.unb file)
        notebook: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            dir,
            assets,
            max_operations,
        } => {
            let assets = assets.unwrap_or_else(|| dir.clone());
            serve::execute(host, port, dir, assets, max_operations).await?;
        }

        Commands::Run { notebook } => run::execute(&notebook)?,
    }

    Ok(())
}
