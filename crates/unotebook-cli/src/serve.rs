//! Serve command implementation for the unotebook CLI.

use std::path::PathBuf;

use unotebook_server::ServerConfig;

use crate::colors;

/// Start the notebook server.
pub async fn execute(
    host: String,
    port: u16,
    notebook_dir: PathBuf,
    assets_dir: PathBuf,
    max_operations: u64,
) -> anyhow::Result<()> {
    if !notebook_dir.is_dir() {
        anyhow::bail!("Notebook directory not found: {}", notebook_dir.display());
    }

    let config = ServerConfig {
        host,
        port,
        notebook_dir,
        assets_dir,
        max_operations,
    };

    println!("\n{}µNotebook{} {}", colors::BOLD, colors::RESET, unotebook_core::VERSION);
    println!("{}", "─".repeat(50));
    println!(
        "{}  ◆ Notebooks:{} {}",
        colors::CYAN,
        colors::RESET,
        config.notebook_dir.display()
    );
    println!(
        "{}  ◆ Server:{} http://{}:{}",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    if config.max_operations > 0 {
        println!(
            "{}  ◆ Operation limit:{} {}",
            colors::CYAN,
            colors::RESET,
            config.max_operations
        );
    }
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    unotebook_server::serve(config).await?;

    Ok(())
}
