//! Engine diagnostics and their translation into lint reports.
//!
//! Engines emit [`Diagnostic`]s positioned by byte offset and length. The
//! linter turns each into a [`Report`] with a line/column [`Location::Range`]
//! when the position data is complete, or a [`Location::Node`] anchored to
//! the visited file when it is not.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

/// Diagnostic category, passed through from the engine verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Suggestion => "suggestion",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding from an engine. `start` and `length` are UTF-8 byte offsets
/// into `file`'s snapshot text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: Category,
    pub code: u32,
    pub message: String,
    pub file: Option<PathBuf>,
    pub start: Option<u32>,
    pub length: Option<u32>,
}

impl Diagnostic {
    /// A global diagnostic with no position.
    pub fn global(category: Category, code: u32, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            file: None,
            start: None,
            length: None,
        }
    }

    /// A diagnostic covering `start..start + length` in `file`.
    pub fn at(
        category: Category,
        code: u32,
        message: impl Into<String>,
        file: &Path,
        start: u32,
        length: u32,
    ) -> Self {
        Self {
            file: Some(file.to_path_buf()),
            start: Some(start),
            length: Some(length),
            ..Self::global(category, code, message)
        }
    }
}

/// 1-based line, 0-based column in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Byte offset to line/column table for one file's text.
#[derive(Debug)]
pub struct LineIndex {
    text: Arc<str>,
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: Arc<str>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Position of byte `offset`. Offsets past the end clamp to the end of
    /// the text; offsets inside a multi-byte character snap to its start.
    pub fn position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let column = self.text[self.line_starts[line]..offset].chars().count();
        Position {
            line: u32::try_from(line + 1).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
        }
    }
}

/// Whole-file anchor used when a diagnostic carries no usable position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Location {
    Range {
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    },
    Node(NodeRef),
}

/// A translated finding, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub file: PathBuf,
    pub category: Category,
    pub code: u32,
    pub message: String,
    pub location: Location,
}

impl Report {
    pub fn is_error(&self) -> bool {
        self.category == Category::Error
    }

    /// Anchor a message to the whole of `node`'s file.
    pub fn on_node(node: &NodeRef, category: Category, code: u32, message: String) -> Self {
        Self {
            file: node.file.clone(),
            category,
            code,
            message,
            location: Location::Node(node.clone()),
        }
    }
}

/// Translate one engine diagnostic. `line_index` supplies the position table
/// of the diagnostic's file, or `None` if that file cannot be read.
///
/// A range is produced only when the diagnostic has a file, a start offset,
/// a nonzero length, and a readable position table; anything less falls back
/// to `node`.
pub fn translate(
    diagnostic: &Diagnostic,
    node: &NodeRef,
    line_index: impl FnOnce(&Path) -> Option<Arc<LineIndex>>,
) -> Report {
    let ranged = match (&diagnostic.file, diagnostic.start, diagnostic.length) {
        (Some(file), Some(start), Some(length)) if length > 0 => {
            line_index(file).map(|index| (file, index, start as usize, length as usize))
        }
        _ => None,
    };
    let Some((file, index, start, length)) = ranged else {
        return Report::on_node(
            node,
            diagnostic.category,
            diagnostic.code,
            diagnostic.message.clone(),
        );
    };
    let from = index.position(start);
    let to = index.position(start.saturating_add(length));
    Report {
        file: file.clone(),
        category: diagnostic.category,
        code: diagnostic.code,
        message: diagnostic.message.clone(),
        location: Location::Range {
            start_line: from.line,
            start_col: from.column,
            end_line: to.line,
            end_col: to.column,
        },
    }
}
