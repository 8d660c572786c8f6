//! Run command implementation for the unotebook CLI.
//!
//! Executes every code cell of a saved notebook against one fresh
//! environment, printing what each cell prints and its result.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use unotebook_core::{
    BufferChannel, CellEngine, NotebookDocument, NotebookId, OutputStream, RhaiEvaluator,
};

use crate::colors;

/// Execute a notebook.
pub fn execute(notebook_path: &Path) -> anyhow::Result<()> {
    let start = Instant::now();

    let name = notebook_path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Not a notebook file: {}", notebook_path.display()))?;
    let id = NotebookId::new(name)?;

    let data = std::fs::read(notebook_path)
        .with_context(|| format!("Notebook not found: {}", notebook_path.display()))?;
    let document: NotebookDocument = serde_json::from_slice(&data)
        .with_context(|| format!("Malformed notebook: {}", notebook_path.display()))?;

    let output = OutputStream::stdout();
    let engine = CellEngine::new(RhaiEvaluator::new(output.clone()), output);

    println!("\n{}Running{} {}", colors::BOLD, colors::RESET, id);
    println!("{}", "─".repeat(50));

    let mut executed = 0;
    for (index, cell) in document.code_cells().enumerate() {
        println!("{}[{}]{}", colors::DIM, index + 1, colors::RESET);

        let mut channel = BufferChannel::new();
        let result = engine.run(&id, &cell.text(), &mut channel);
        print_response(&channel.text());

        if let Err(e) = result {
            println!("{}Cell {} failed:{} {}", colors::RED, index + 1, colors::RESET, e);
            anyhow::bail!("Cell {} failed", index + 1);
        }
        executed += 1;
    }

    println!("{}", "─".repeat(50));
    println!(
        "{}Completed{} {} cells in {:.2}s",
        colors::GREEN,
        colors::RESET,
        executed,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Print output messages as plain text, then the result as sent.
fn print_response(response: &str) {
    let mut messages: Vec<&str> = response.split('\n').collect();
    let result = messages.pop().filter(|last| !last.is_empty());

    for message in messages {
        match serde_json::from_str::<String>(message) {
            Ok(text) => print!("{}", text),
            Err(_) => println!("{}", message),
        }
    }
    if let Some(result) = result {
        println!("{}", result);
    }
}
