//! Cell execution engine.
//!
//! Runs one cell against its notebook's environment: the body as
//! statements, then the last line as an expression whose value is encoded
//! onto the channel. Everything the cell prints while running is sent as a
//! JSON string message terminated by a newline.

use std::io;
use std::sync::PoisonError;

use crate::cell::split_cell;
use crate::error::{Error, Result};
use crate::eval::{Evaluated, ScriptEvaluator};
use crate::notebook::NotebookId;
use crate::output::{OutputSink, OutputStream};
use crate::registry::Registry;
use crate::render::encode;
use crate::stream::OutputChannel;

/// Executes cells for every notebook that has a live environment.
pub struct CellEngine<E: ScriptEvaluator> {
    /// Language backend
    evaluator: E,
    /// Live environments by notebook id
    registry: Registry<E::Env>,
    /// Stream the evaluator prints into
    output: OutputStream,
}

impl<E: ScriptEvaluator> CellEngine<E> {
    /// Create an engine. `output` must be the stream `evaluator` prints to.
    pub fn new(evaluator: E, output: OutputStream) -> Self {
        Self {
            evaluator,
            registry: Registry::new(),
            output,
        }
    }

    /// The environment registry.
    pub fn registry(&self) -> &Registry<E::Env> {
        &self.registry
    }

    /// Whether notebook `id` has a live environment.
    pub fn is_running(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    /// Discard the environment of notebook `id`. Returns whether one existed.
    pub fn stop(&self, id: &str) -> bool {
        self.registry.remove(id)
    }

    /// Run `source` as a cell of notebook `id`, streaming onto `channel`.
    ///
    /// Printed output goes out as JSON string messages while the cell runs;
    /// the value of a trailing expression follows as the last message. A
    /// failure stops the cell where it happened and is returned, leaving
    /// the environment as the cell left it.
    pub fn run<C>(&self, id: &NotebookId, source: &str, channel: &mut C) -> Result<()>
    where
        C: OutputChannel + Clone + Send + 'static,
    {
        let shared = self.registry.get_or_create(id);
        let parts = split_cell(source);
        if parts.is_empty() {
            return Ok(());
        }

        // Same-notebook runs queue here.
        let mut env = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let _redirect = self
            .output
            .redirect(Box::new(CaptureSink::new(channel.clone())));

        tracing::debug!("Running cell of {}", id);

        if let Some(body) = &parts.body {
            self.evaluator.run_statements(&mut env, body)?;
        }

        if let Some(tail) = &parts.tail {
            match self.evaluator.evaluate_expression(&mut env, tail)? {
                Evaluated::Value(value) => {
                    encode(&value).write_to(channel).map_err(Error::Channel)?;
                }
                Evaluated::NotAnExpression => {
                    self.evaluator.run_statements(&mut env, tail)?;
                }
            }
        }

        Ok(())
    }
}

/// Frames printed text as JSON string messages on a channel.
struct CaptureSink<C> {
    channel: C,
    broken: bool,
}

impl<C> CaptureSink<C> {
    fn new(channel: C) -> Self {
        Self {
            channel,
            broken: false,
        }
    }
}

impl<C: OutputChannel + Send> OutputSink for CaptureSink<C> {
    fn write(&mut self, text: &str) {
        if self.broken {
            return;
        }
        let sent = serde_json::to_string(text)
            .map_err(io::Error::from)
            .and_then(|message| self.channel.send_text(&format!("{}\n", message)));
        if let Err(e) = sent {
            // Client went away; the cell still runs to completion.
            tracing::debug!("Dropping cell output: {}", e);
            self.broken = true;
        }
    }
}
