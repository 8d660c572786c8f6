//! Integration tests for running notebook cells through the engine.
//!
//! Covers the full path from cell source to the bytes a client receives.

use std::sync::Arc;
use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use unotebook_core::{
    BufferChannel, CellEngine, Error, NotebookDocument, NotebookId, OutputStream, RhaiEvaluator,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn engine() -> CellEngine<RhaiEvaluator> {
    let output = OutputStream::stdout();
    CellEngine::new(RhaiEvaluator::new(output.clone()), output)
}

fn id(name: &str) -> NotebookId {
    NotebookId::new(name).expect("valid notebook id")
}

/// Run `lines` as one cell and return the bytes sent to the client.
fn run_lines(
    engine: &CellEngine<RhaiEvaluator>,
    name: &str,
    lines: &[&str],
) -> Result<String, Error> {
    let mut channel = BufferChannel::new();
    engine.run(&id(name), &lines.join("\n"), &mut channel)?;
    Ok(channel.text())
}

/// Split a response into its newline-terminated output messages and the
/// trailing rendered result, if any.
fn messages(response: &str) -> (Vec<String>, Option<String>) {
    let mut parts: Vec<&str> = response.split('\n').collect();
    let last = parts.pop().filter(|s| !s.is_empty()).map(str::to_string);
    let outputs = parts
        .into_iter()
        .map(|line| serde_json::from_str::<String>(line).expect("output message is a JSON string"))
        .collect();
    (outputs, last)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_tail_expression_is_the_only_message() {
    let engine = engine();
    let response = run_lines(&engine, "a.unb", &["let x = 1;", "x + 1"]).unwrap();

    let (outputs, result) = messages(&response);
    assert!(outputs.is_empty());
    assert_eq!(result.as_deref(), Some("\"2\""));
}

#[test]
fn test_state_persists_between_runs() {
    let engine = engine();
    run_lines(&engine, "a.unb", &["let x = 5;"]).unwrap();
    let response = run_lines(&engine, "a.unb", &["x"]).unwrap();
    assert_eq!(response, "\"5\"");
}

#[test]
fn test_failure_emits_no_result() {
    let engine = engine();
    let mut channel = BufferChannel::new();
    let err = engine.run(&id("a.unb"), "1/0", &mut channel).unwrap_err();

    assert!(matches!(err, Error::Execution(_)));
    assert!(channel.contents().is_empty());
}

#[test]
fn test_output_before_failure_is_kept() {
    let engine = engine();
    let mut channel = BufferChannel::new();
    let result = engine.run(&id("a.unb"), "print(\"before\");\nlet y = 1 / 0;", &mut channel);

    assert!(result.is_err());
    assert_eq!(channel.text(), "\"before\\n\"\n");
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_statement_only_cell_sends_only_output_messages() {
    let engine = engine();
    let response = run_lines(
        &engine,
        "a.unb",
        &["for i in 0..3 {", "    print(i);", "}"],
    )
    .unwrap();

    let (outputs, result) = messages(&response);
    assert_eq!(outputs, vec!["0\n", "1\n", "2\n"]);
    assert_eq!(result, None);
}

#[test]
fn test_indented_last_line_is_part_of_body() {
    let engine = engine();
    let response = run_lines(&engine, "a.unb", &["let x = 1 +", "    2"]).unwrap();
    assert_eq!(response, "");
    assert_eq!(run_lines(&engine, "a.unb", &["x"]).unwrap(), "\"3\"");
}

#[test]
fn test_rerunning_a_cell_does_not_grow_the_environment() {
    let engine = engine();
    for _ in 0..200 {
        let response = run_lines(&engine, "a.unb", &["let x = 1;", "x"]).unwrap();
        assert_eq!(response, "\"1\"");
    }

    let env = engine.registry().get_or_create(&id("a.unb"));
    assert_eq!(env.lock().unwrap().len(), 1);
}

#[test]
fn test_stop_then_rerun_starts_fresh() {
    let engine = engine();
    run_lines(&engine, "a.unb", &["let x = 5;"]).unwrap();
    assert!(engine.stop("a.unb"));

    assert!(run_lines(&engine, "a.unb", &["x"]).is_err());
    assert!(engine.is_running("a.unb"));
}

#[test]
fn test_notebooks_do_not_share_state() {
    let engine = engine();
    run_lines(&engine, "a.unb", &["let x = 1;"]).unwrap();
    assert!(run_lines(&engine, "b.unb", &["x"]).is_err());
    assert_eq!(engine.registry().len(), 2);
}

#[test]
fn test_concurrent_runs_keep_output_apart() {
    let engine = Arc::new(engine());
    let handles: Vec<_> = ["a.unb", "b.unb", "c.unb", "d.unb"]
        .into_iter()
        .map(|name| {
            let engine = engine.clone();
            thread::spawn(move || {
                let source = format!("for i in 0..50 {{ print(\"{}\"); }}", name);
                let mut channel = BufferChannel::new();
                engine.run(&id(name), &source, &mut channel).unwrap();
                (name, channel.text())
            })
        })
        .collect();

    for handle in handles {
        let (name, response) = handle.join().unwrap();
        let (outputs, _) = messages(&response);
        assert_eq!(outputs.len(), 50);
        assert!(outputs.iter().all(|line| line == &format!("{}\n", name)));
    }
}

#[test]
fn test_png_result_streams_as_base64() {
    let engine = engine();
    let source = [
        "let b = blob();",
        "for byte in [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a] { b.push(byte); }",
        "for i in 0..100 { b.push(i); }",
        "b",
    ];
    let response = run_lines(&engine, "a.unb", &source).unwrap();

    let bundle: serde_json::Value = serde_json::from_str(&response).unwrap();
    let encoded = bundle["image/png"].as_str().unwrap();
    let bytes = STANDARD.decode(encoded).unwrap();
    assert_eq!(bytes.len(), 108);
    assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[test]
fn test_html_result_is_a_mime_bundle() {
    let engine = engine();
    let response = run_lines(&engine, "a.unb", &["html(\"<b>hi</b>\")"]).unwrap();
    let bundle: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(bundle["text/html"], "<b>hi</b>");
}

#[test]
fn test_document_cells_run_in_order() {
    let document: NotebookDocument = serde_json::from_str(
        r##"{"cells": [
            {"cell_type": "markdown", "source": ["# Title"]},
            {"cell_type": "code", "source": ["let total = 0;\n", "total += 2;"]},
            {"cell_type": "code", "source": ["total * 10"]}
        ]}"##,
    )
    .unwrap();

    let engine = engine();
    let mut last = String::new();
    for cell in document.code_cells() {
        let mut channel = BufferChannel::new();
        engine.run(&id("doc.unb"), &cell.text(), &mut channel).unwrap();
        last = channel.text();
    }
    assert_eq!(last, "\"20\"");
}
