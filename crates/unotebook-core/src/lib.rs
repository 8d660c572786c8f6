//! Core of the unotebook on-device notebook service.
//!
//! This crate provides:
//! - Notebook documents, ids and storage name sanitizing
//! - A registry of live per-notebook execution environments
//! - Cell splitting and the cell execution engine
//! - Rich representation encoding of cell results
//! - Streaming output channels and the ambient output stream
//!
//! Transports (HTTP, BLE) live in their own crates and drive
//! [`CellEngine`] with an [`OutputChannel`] of their own.

pub mod cell;
pub mod engine;
pub mod error;
pub mod eval;
pub mod notebook;
pub mod output;
pub mod registry;
pub mod render;
pub mod stream;

pub use cell::{CellParts, split_cell};
pub use engine::CellEngine;
pub use error::{Error, Result};
pub use eval::{Evaluated, RhaiEnv, RhaiEvaluator, RhaiValue, ScriptEvaluator};
pub use notebook::{
    NEW_NOTEBOOK_NAME, NOTEBOOK_SUFFIX, NotebookCell, NotebookDocument, NotebookId,
    sanitize_filename,
};
pub use output::{FnSink, OutputSink, OutputStream, Redirect, StdoutSink};
pub use registry::{Registry, SharedEnv};
pub use render::{MimeBundle, Payload, Represent, Rendered, encode};
pub use stream::{BASE64_CHUNK, BufferChannel, OutputChannel, WriterChannel};

/// Version reported to clients.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
