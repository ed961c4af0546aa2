//! Parsed documents: source text, syntax tree and diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cst::{Position, Range, Tree};

/// Diagnostic severity, serialized with its numeric LSP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl From<DiagnosticSeverity> for u8 {
    fn from(severity: DiagnosticSeverity) -> u8 {
        severity as u8
    }
}

impl TryFrom<u8> for DiagnosticSeverity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(DiagnosticSeverity::Error),
            2 => Ok(DiagnosticSeverity::Warning),
            3 => Ok(DiagnosticSeverity::Information),
            4 => Ok(DiagnosticSeverity::Hint),
            other => Err(format!("unknown diagnostic severity: {}", other)),
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Information => write!(f, "info"),
            DiagnosticSeverity::Hint => write!(f, "hint"),
        }
    }
}

/// A problem reported for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub range: Range,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, range: Range) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            range,
        }
    }

    pub fn warning(message: impl Into<String>, range: Range) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            range,
        }
    }
}

/// Maps between byte offsets and line/character positions.
///
/// Characters are counted in Unicode scalar values.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Position of a byte offset. Offsets past the end clamp to the end.
    pub fn position_at(&self, text: &str, offset: usize) -> Position {
        let offset = clamp_to_boundary(text, offset);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let character = text[self.line_starts[line]..offset].chars().count();
        Position::new(line as u32, character as u32)
    }

    /// Byte offset of a position. Characters past the end of a line clamp to
    /// the line end; lines past the end of the text clamp to the text end.
    pub fn offset_at(&self, text: &str, position: Position) -> usize {
        let line = position.line as usize;
        let Some(&start) = self.line_starts.get(line) else {
            return text.len();
        };
        let line_end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(text.len());
        let line_text = &text[start..line_end];
        line_text
            .char_indices()
            .nth(position.character as usize)
            .map(|(i, _)| start + i)
            .unwrap_or(line_end)
    }
}

fn clamp_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// A parsed document.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    tree: Option<Tree>,
    diagnostics: Vec<Diagnostic>,
    lexer_errors: usize,
    parser_errors: usize,
    line_index: LineIndex,
}

impl Document {
    pub fn new(
        text: impl Into<String>,
        tree: Option<Tree>,
        diagnostics: Vec<Diagnostic>,
        lexer_errors: usize,
        parser_errors: usize,
    ) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        Self {
            text,
            tree,
            diagnostics,
            lexer_errors,
            parser_errors,
            line_index,
        }
    }

    /// A document for which nothing could be built.
    pub fn empty(text: impl Into<String>) -> Self {
        Self::new(text, None, Vec::new(), 0, 0)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn lexer_errors(&self) -> usize {
        self.lexer_errors
    }

    pub fn parser_errors(&self) -> usize {
        self.parser_errors
    }

    /// Whether lexing or parsing reported any error.
    pub fn has_parse_errors(&self) -> bool {
        self.lexer_errors > 0 || self.parser_errors > 0
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Number of diagnostics with the given severity.
    pub fn count(&self, severity: DiagnosticSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Source text covered by a range, addressed by line and character.
    pub fn text_in_range(&self, range: &Range) -> &str {
        let start = self.line_index.offset_at(&self.text, range.start);
        let end = self.line_index.offset_at(&self.text, range.end);
        if start >= end {
            return "";
        }
        &self.text[start..end]
    }
}
