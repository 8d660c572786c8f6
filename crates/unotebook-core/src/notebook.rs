//! Notebook identifiers and persisted document shapes.
//!
//! A notebook id names both a persisted document on the device filesystem
//! and, while it is running, a live execution environment. Ids must carry
//! the reserved [`NOTEBOOK_SUFFIX`].

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reserved suffix every notebook document name carries.
pub const NOTEBOOK_SUFFIX: &str = ".unb";

/// Reserved name that yields a blank document instead of touching storage.
pub const NEW_NOTEBOOK_NAME: &str = "__new__.unb";

/// Identifier of a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotebookId(String);

impl NotebookId {
    /// Create an id, rejecting names without the reserved suffix.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !name.ends_with(NOTEBOOK_SUFFIX) {
            return Err(Error::InvalidName(name));
        }
        Ok(Self(name))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved "new notebook" name.
    pub fn is_new(&self) -> bool {
        self.0 == NEW_NOTEBOOK_NAME
    }
}

impl TryFrom<String> for NotebookId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NotebookId> for String {
    fn from(id: NotebookId) -> Self {
        id.0
    }
}

impl Borrow<str> for NotebookId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotebookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Make a client-supplied name safe to use as a flat filesystem entry.
///
/// `%20` and `+` decode to spaces; anything other than alphanumerics,
/// `_`, `+`, `.`, `-` and space is replaced with `_`. Never fails, so the
/// result may differ from what the client meant.
pub fn sanitize_filename(raw: &str) -> String {
    raw.replace("%20", " ")
        .replace('+', " ")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '+' | '.' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A persisted notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookDocument {
    /// Cells in display order.
    pub cells: Vec<NotebookCell>,
}

impl NotebookDocument {
    /// The template for a brand-new notebook: one empty code cell.
    pub fn blank() -> Self {
        Self {
            cells: vec![NotebookCell::code(Vec::new())],
        }
    }

    /// Iterate over the code cells, skipping markdown and other kinds.
    pub fn code_cells(&self) -> impl Iterator<Item = &NotebookCell> {
        self.cells.iter().filter(|cell| cell.is_code())
    }
}

/// One cell of a persisted notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookCell {
    /// Cell kind (`code`, `markdown`, ...).
    pub cell_type: String,
    /// Source lines, without trailing newlines.
    #[serde(default)]
    pub source: Vec<String>,
}

impl NotebookCell {
    /// Create a code cell.
    pub fn code(source: Vec<String>) -> Self {
        Self {
            cell_type: "code".to_string(),
            source,
        }
    }

    /// Whether this cell holds code to run.
    pub fn is_code(&self) -> bool {
        self.cell_type == "code"
    }

    /// Source joined into one text.
    pub fn text(&self) -> String {
        self.source.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_requires_suffix() {
        assert!(NotebookId::new("a.unb").is_ok());
        assert!(matches!(
            NotebookId::new("a.txt"),
            Err(Error::InvalidName(name)) if name == "a.txt"
        ));
    }

    #[test]
    fn test_id_deserialize_validates() {
        let id: NotebookId = serde_json::from_str("\"b.unb\"").unwrap();
        assert_eq!(id.as_str(), "b.unb");
        assert!(serde_json::from_str::<NotebookId>("\"b.json\"").is_err());
    }

    #[test]
    fn test_new_name() {
        assert!(NotebookId::new(NEW_NOTEBOOK_NAME).unwrap().is_new());
        assert!(!NotebookId::new("x.unb").unwrap().is_new());
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        let clean = sanitize_filename("../etc/pass wd\\x.unb");
        assert!(!clean.contains('/'));
        assert!(!clean.contains('\\'));
        assert_eq!(clean, ".._etc_pass wd_x.unb");
    }

    #[test]
    fn test_sanitize_decodes_spaces() {
        assert_eq!(sanitize_filename("my%20note+book.unb"), "my note book.unb");
        assert_eq!(sanitize_filename("plain-name_1.unb"), "plain-name_1.unb");
    }

    #[test]
    fn test_blank_document_shape() {
        let json = serde_json::to_value(NotebookDocument::blank()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cells": [{"cell_type": "code", "source": []}]})
        );
    }

    #[test]
    fn test_code_cells_filter() {
        let doc: NotebookDocument = serde_json::from_str(
            r##"{"cells": [
                {"cell_type": "markdown", "source": ["# hi"]},
                {"cell_type": "code", "source": ["let x = 1;", "x"]}
            ]}"##,
        )
        .unwrap();
        let code: Vec<_> = doc.code_cells().collect();
        assert_eq!(code.len(), 1);
        assert_eq!(code[0].text(), "let x = 1;\nx");
    }
}
