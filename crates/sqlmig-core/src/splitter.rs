//! Line-oriented splitter turning a migration file into executable statements.
//!
//! Outside a procedural block a statement ends at a line ending in `;`, lines
//! are joined with a single space and `--` comment lines are dropped. A line
//! starting with `DO $$` opens a block that is copied verbatim (comments and
//! embedded semicolons included) until a line ending in `$$;`.

use std::fmt;
use std::iter::Enumerate;
use std::str::SplitInclusive;

use serde::Serialize;

const COMMENT: &str = "--";
const BLOCK_OPEN: &str = "DO $$";
const BLOCK_CLOSE: &str = "$$;";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Terminated by a line ending in `;`.
    Simple,
    /// A `DO $$ ... $$;` block executed as one statement.
    Block,
}

/// One trimmed, non-empty unit of SQL to execute in a single call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    /// 1-based line of the file where the statement starts.
    pub line: usize,
}

impl Statement {
    pub fn as_str(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Split migration text into statements, lazily and in file order.
///
/// Each call returns an independent iterator.
pub fn split(text: &str) -> Statements<'_> {
    Statements {
        lines: text.split_inclusive('\n').enumerate(),
        buf: String::new(),
        start_line: None,
        in_block: false,
        remainder: None,
        finished: false,
    }
}

/// Iterator returned by [`split`].
pub struct Statements<'a> {
    lines: Enumerate<SplitInclusive<'a, char>>,
    buf: String,
    start_line: Option<usize>,
    in_block: bool,
    remainder: Option<String>,
    finished: bool,
}

impl Statements<'_> {
    /// Trailing text that never saw a terminating `;` or `$$;`.
    ///
    /// Only known once the iterator is exhausted; such text is not yielded.
    pub fn remainder(&self) -> Option<&str> {
        self.remainder.as_deref()
    }

    /// True while an opened block has not been closed yet.
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    fn emit(&mut self, kind: StatementKind) -> Option<Statement> {
        let sql = self.buf.trim().to_string();
        let line = self.start_line.take().unwrap_or(1);
        self.buf.clear();
        // A bare terminator has nothing to run.
        if sql.chars().all(|c| c == ';' || c.is_whitespace()) {
            None
        } else {
            Some(Statement { kind, sql, line })
        }
    }

    fn mark_start(&mut self, line_no: usize) {
        if self.start_line.is_none() {
            self.start_line = Some(line_no);
        }
    }
}

impl Iterator for Statements<'_> {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        while let Some((idx, raw)) = self.lines.next() {
            let line_no = idx + 1;
            let trimmed = raw.trim();

            if self.in_block {
                self.buf.push_str(raw);
                if trimmed.ends_with(BLOCK_CLOSE) {
                    self.in_block = false;
                    if let Some(stmt) = self.emit(StatementKind::Block) {
                        return Some(stmt);
                    }
                }
                continue;
            }

            if trimmed.starts_with(COMMENT) {
                continue;
            }

            if is_block_open(trimmed) {
                self.in_block = true;
                self.mark_start(line_no);
                self.buf.push_str(raw);
                // Single-line block
                if trimmed.ends_with(BLOCK_CLOSE) {
                    self.in_block = false;
                    if let Some(stmt) = self.emit(StatementKind::Block) {
                        return Some(stmt);
                    }
                }
                continue;
            }

            if !trimmed.is_empty() {
                self.mark_start(line_no);
            }
            self.buf.push_str(strip_line_ending(raw));
            self.buf.push(' ');

            if trimmed.ends_with(';') {
                if let Some(stmt) = self.emit(StatementKind::Simple) {
                    return Some(stmt);
                }
            }
        }

        if !self.finished {
            self.finished = true;
            let pending = self.buf.trim();
            if !pending.is_empty() {
                self.remainder = Some(pending.to_string());
            }
            self.buf.clear();
            self.start_line = None;
        }
        None
    }
}

fn is_block_open(trimmed: &str) -> bool {
    trimmed
        .get(..BLOCK_OPEN.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BLOCK_OPEN))
}

fn strip_line_ending(raw: &str) -> &str {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    line.strip_suffix('\r').unwrap_or(line)
}
