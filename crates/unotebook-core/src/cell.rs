//! Cell source classification.
//!
//! A cell is split into a statement *body* and an optional trailing
//! *tail* line that the engine tries to evaluate as an expression. The
//! split is a pure function of the source so it can be checked on its own.

/// A cell split into its statement body and optional tail line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellParts {
    /// Statements to run before the tail, if any.
    pub body: Option<String>,
    /// Last line, kept apart to be evaluated for a rendered result.
    pub tail: Option<String>,
}

impl CellParts {
    /// Whether the cell has nothing to run.
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.tail.is_none()
    }
}

/// Split cell source into body and tail.
///
/// Trailing whitespace is dropped and CRLF is normalized. The last line
/// becomes the tail unless it starts with whitespace (it continues a
/// block) or the lines before it leave a bracket or string open.
pub fn split_cell(source: &str) -> CellParts {
    let normalized = source.replace("\r\n", "\n");
    let trimmed = normalized.trim_end();
    if trimmed.is_empty() {
        return CellParts::default();
    }

    let lines: Vec<&str> = trimmed.split('\n').collect();
    let Some((last, head)) = lines.split_last() else {
        return CellParts::default();
    };
    let body = head.join("\n");

    if last.starts_with(char::is_whitespace) || !is_balanced(&body) {
        return CellParts {
            body: Some(trimmed.to_string()),
            tail: None,
        };
    }

    CellParts {
        body: (!body.trim().is_empty()).then_some(body),
        tail: Some((*last).to_string()),
    }
}

/// Whether `source` closes every bracket, string and block comment it opens.
fn is_balanced(source: &str) -> bool {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut block_comment = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                block_comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '/' if chars.peek() == Some(&'/') => {
                // Line comment: skip to end of line.
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                block_comment = true;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth == 0 && quote.is_none() && !block_comment
}
