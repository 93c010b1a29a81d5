//! Error and diagnostic types for the Oak compiler.
//!
//! ## Error Hierarchy
//!
//! ```text
//! OakError (top-level classification)
//! ├── System    - I/O, manifests, git, malformed bytecode; message only
//! ├── User      - Diagnostic with a location (parse, resolution, type, pattern)
//! └── Internal  - compiler bugs; message only
//! ```
//!
//! Passes accumulate user errors into [`Diagnostics`] instead of stopping at
//! the first one. [`ParseError`] is the parser's fatal per-module error and
//! converts into a [`Diagnostic`].

use std::fmt;

use thiserror::Error;

use crate::Location;

// ============================================================================
// Parse Errors
// ============================================================================

/// The kind of parse error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    // Lexical errors
    /// A character that cannot start any token.
    UnexpectedCharacter,
    /// A string literal without its closing quote.
    UnterminatedString,
    /// A character literal without its closing quote, or with more than one scalar.
    InvalidCharLiteral,
    /// A block comment without its closing `*/`.
    UnterminatedComment,
    /// An unknown `\` escape.
    InvalidEscape,
    /// A numeric literal that does not fit or has no digits.
    InvalidNumber,

    // Grammar errors
    /// Expected a specific token but found something else.
    ExpectedToken,
    /// Unexpected token in this context.
    UnexpectedToken,
    /// Unexpected end of file.
    UnexpectedEof,
    /// Expected an identifier.
    ExpectedIdentifier,
    /// Expected an expression.
    ExpectedExpression,
    /// Expected a pattern.
    ExpectedPattern,
    /// Expected a type.
    ExpectedType,
    /// Expected a top-level declaration.
    ExpectedDeclaration,
    /// A declaration that is malformed as a whole.
    InvalidDeclaration,
}

impl ParseErrorKind {
    /// A short human-readable description.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::UnexpectedCharacter => "unexpected character",
            ParseErrorKind::UnterminatedString => "unterminated string",
            ParseErrorKind::InvalidCharLiteral => "invalid character literal",
            ParseErrorKind::UnterminatedComment => "unterminated comment",
            ParseErrorKind::InvalidEscape => "invalid escape sequence",
            ParseErrorKind::InvalidNumber => "invalid number",
            ParseErrorKind::ExpectedToken => "expected token",
            ParseErrorKind::UnexpectedToken => "unexpected token",
            ParseErrorKind::UnexpectedEof => "unexpected end of file",
            ParseErrorKind::ExpectedIdentifier => "expected identifier",
            ParseErrorKind::ExpectedExpression => "expected expression",
            ParseErrorKind::ExpectedPattern => "expected pattern",
            ParseErrorKind::ExpectedType => "expected type",
            ParseErrorKind::ExpectedDeclaration => "expected declaration",
            ParseErrorKind::InvalidDeclaration => "invalid declaration",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parse error with location and diagnostic information.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ParseError {
    /// The type of error that occurred.
    pub kind: ParseErrorKind,
    /// Where in source the error occurred.
    pub location: Location,
    /// Additional context.
    pub message: String,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }

    /// Convert to a user diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = if self.message.is_empty() {
            self.kind.as_str().to_string()
        } else {
            format!("{}: {}", self.kind, self.message)
        };
        Diagnostic::error(self.location.clone(), message)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Severity of a user diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A user error or warning with a primary location.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Primary location.
    pub location: Location,
    pub message: String,
    /// Secondary locations: clashing candidates, redundant clauses, the path
    /// of a nested type mismatch.
    pub extra: Vec<Location>,
}

impl Diagnostic {
    /// An error diagnostic.
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location,
            message: message.into(),
            extra: Vec::new(),
        }
    }

    /// A warning diagnostic.
    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location,
            message: message.into(),
            extra: Vec::new(),
        }
    }

    /// Attach secondary locations.
    pub fn with_extra(mut self, extra: impl IntoIterator<Item = Location>) -> Self {
        self.extra.extend(extra);
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Format with the offending source line and a caret underline.
    pub fn display_with_source(&self) -> String {
        let mut output = format!("{self}\n");
        let (line, column) = self.location.line_col();
        if let Some(text) = self.location.file().line_text(line) {
            output.push_str("     |\n");
            output.push_str(&format!("{line:>4} | {text}\n"));
            let (end_line, end_column) = self.location.end_line_col();
            let width = if end_line == line && end_column > column {
                (end_column - column) as usize
            } else {
                1
            };
            let indent = " ".repeat(column.saturating_sub(1) as usize);
            output.push_str(&format!("     | {indent}{}\n", "^".repeat(width)));
        }
        for extra in &self.extra {
            output.push_str(&format!("     = see {extra}\n"));
        }
        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

impl From<ParseError> for Diagnostic {
    fn from(error: ParseError) -> Self {
        error.to_diagnostic()
    }
}

/// An ordered collection of diagnostics accumulated by a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Record an error at `location`.
    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        self.items.push(Diagnostic::error(location, message));
    }

    /// Append every diagnostic from `other`.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(other);
    }

    /// Whether any error-severity diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Diagnostics whose primary location is in `path`.
    pub fn for_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.items.iter().filter(move |d| d.location.path() == path)
    }

    /// Sort by file path, then by position; stable for equal positions.
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            a.location
                .path()
                .cmp(b.location.path())
                .then(a.location.start().cmp(&b.location.start()))
        });
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ============================================================================
// Top-level error
// ============================================================================

/// Top-level error classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OakError {
    /// I/O, manifest, git or bytecode failures. Aborts the current operation.
    #[error("{0}")]
    System(String),

    /// A located user error.
    #[error("{0}")]
    User(Diagnostic),

    /// A compiler bug.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl OakError {
    pub fn system(message: impl Into<String>) -> Self {
        OakError::System(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        OakError::Internal(message.into())
    }
}

impl From<ParseError> for OakError {
    fn from(error: ParseError) -> Self {
        OakError::User(error.to_diagnostic())
    }
}

impl From<Diagnostic> for OakError {
    fn from(diagnostic: Diagnostic) -> Self {
        OakError::User(diagnostic)
    }
}

impl From<std::io::Error> for OakError {
    fn from(error: std::io::Error) -> Self {
        OakError::System(error.to_string())
    }
}

/// Result type for operations that can fail with an [`OakError`].
pub type Result<T> = std::result::Result<T, OakError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceFile;

    fn location(text: &str, start: u32, end: u32) -> Location {
        Location::new(SourceFile::new("src/M.oak", text.to_string()), start, end)
    }

    #[test]
    fn diagnostic_display() {
        let diagnostic = Diagnostic::error(location("module M\ndef x = y", 17, 18), "y not found");
        assert_eq!(diagnostic.to_string(), "src/M.oak:2:9: error: y not found");
    }

    #[test]
    fn diagnostic_with_source_underlines_span() {
        let diagnostic =
            Diagnostic::error(location("module M\ndef x = foo", 17, 20), "foo not found");
        let rendered = diagnostic.display_with_source();
        assert!(rendered.contains("   2 | def x = foo"));
        assert!(rendered.contains("|         ^^^"));
    }

    #[test]
    fn parse_error_converts_to_user_error() {
        let error = ParseError::new(
            ParseErrorKind::ExpectedToken,
            location("module", 6, 6),
            "expected module name",
        );
        let oak: OakError = error.into();
        match oak {
            OakError::User(d) => {
                assert_eq!(d.message, "expected token: expected module name");
                assert!(d.is_error());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn diagnostics_track_errors() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_errors());
        diagnostics.push(Diagnostic::warning(location("x", 0, 1), "unused"));
        assert!(!diagnostics.has_errors());
        diagnostics.error(location("x", 0, 1), "bad");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.for_path("src/M.oak").count(), 2);
        assert_eq!(diagnostics.for_path("other.oak").count(), 0);
    }

    #[test]
    fn internal_error_message() {
        assert_eq!(
            OakError::internal("bad state").to_string(),
            "internal compiler error: bad state"
        );
    }
}
