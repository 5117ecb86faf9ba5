//! Diagnostic and text-change wire types.

use serde::{Deserialize, Serialize};

/// Severity level for diagnostics.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed.
    #[default]
    Error,
    /// Warning - should be reviewed.
    Warning,
}

/// A zero-based line/character position in a document.
///
/// `character` counts Unicode scalar values from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    /// Creates a new position.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open `[start, end)` range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Creates a new range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Creates an empty range at `position` (an insertion point).
    pub fn empty(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }
}

/// A diagnostic produced by one engine lint pass.
///
/// Each lint regenerates the set from scratch; a diagnostic never survives
/// the text it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code identifying the kind of problem.
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// Severity level.
    #[serde(default)]
    pub severity: Severity,

    /// Source range the diagnostic applies to.
    pub range: Range,
}

impl Diagnostic {
    /// Creates a new error-severity diagnostic.
    pub fn new(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: Severity::Error,
            range,
        }
    }

    /// Sets the severity level.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// One incremental edit, as applied by the editor.
///
/// Replaces the text in `range` with `text`. An insertion has an empty
/// range; a deletion has empty `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    /// The replaced range, in the text as it was before this change.
    pub range: Range,

    /// The replacement text.
    pub text: String,
}

impl TextChange {
    /// Creates a change replacing `range` with `text`.
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    /// Creates a change inserting `text` at `position`.
    pub fn insert(position: Position, text: impl Into<String>) -> Self {
        Self {
            range: Range::empty(position),
            text: text.into(),
        }
    }
}
