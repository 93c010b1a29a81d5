//! Source location tracking for error reporting.
//!
//! A [`Location`] is a byte range into an immutable [`SourceFile`]. Line and
//! column numbers are computed on demand, so locations stay cheap to clone and
//! carry through every intermediate representation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An immutable module source file.
///
/// The content handle is shared by every [`Location`] pointing into it.
#[derive(Debug, PartialEq, Eq)]
pub struct SourceFile {
    /// File path as given by the loader.
    path: String,
    /// The full text of the file.
    content: Arc<str>,
}

impl SourceFile {
    /// Create a shared source file.
    pub fn new(path: impl Into<String>, content: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            content: content.into(),
        })
    }

    /// The file path.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The file content.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The shared content handle.
    #[inline]
    pub fn content_handle(&self) -> &Arc<str> {
        &self.content
    }

    /// Content length in bytes.
    #[inline]
    pub fn len(&self) -> u32 {
        self.content.len() as u32
    }

    /// Whether the file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Line and column (both 1-indexed, column counted in characters) of a
    /// byte offset. Offsets past the end clamp to the end of the file.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let mut offset = (offset as usize).min(self.content.len());
        while !self.content.is_char_boundary(offset) {
            offset -= 1;
        }

        let mut line = 1;
        let mut line_start = 0;
        for (i, byte) in self.content.as_bytes()[..offset].iter().enumerate() {
            if *byte == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }

        let column = self.content[line_start..offset].chars().count() as u32 + 1;
        (line, column)
    }

    /// Text of a 1-indexed line, without its line terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        self.content.lines().nth(line.checked_sub(1)? as usize)
    }
}

/// A byte range in a source file.
#[derive(Clone)]
pub struct Location {
    file: Arc<SourceFile>,
    start: u32,
    end: u32,
}

impl Location {
    /// Create a location covering `start..end` in `file`.
    pub fn new(file: Arc<SourceFile>, start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "location start {start} is after end {end}");
        Self { file, start, end }
    }

    /// A zero-length location at the start of `file`.
    pub fn file_start(file: Arc<SourceFile>) -> Self {
        Self::new(file, 0, 0)
    }

    /// The source file.
    #[inline]
    pub fn file(&self) -> &Arc<SourceFile> {
        &self.file
    }

    /// Path of the source file.
    #[inline]
    pub fn path(&self) -> &str {
        self.file.path()
    }

    /// Start byte offset.
    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    /// End byte offset (exclusive).
    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Whether the location covers no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The source text covered by this location.
    pub fn text(&self) -> &str {
        let content = self.file.content();
        content
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }

    /// Line and column of the start offset.
    pub fn line_col(&self) -> (u32, u32) {
        self.file.line_col(self.start)
    }

    /// Line and column of the end offset.
    pub fn end_line_col(&self) -> (u32, u32) {
        self.file.line_col(self.end)
    }

    /// A location spanning both `self` and `other`.
    ///
    /// Both locations must point into the same file.
    pub fn merge(&self, other: &Location) -> Location {
        Location {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A zero-length location at the end of `self`.
    pub fn end_point(&self) -> Location {
        Location {
            file: self.file.clone(),
            start: self.end,
            end: self.end,
        }
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.end == other.end
            && (Arc::ptr_eq(&self.file, &other.file) || self.file.path == other.file.path)
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file.path.hash(state);
        self.start.hash(state);
        self.end.hash(state);
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, col) = self.line_col();
        write!(f, "{}:{}:{}", self.file.path, line, col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, col) = self.line_col();
        write!(f, "{}:{}:{}", self.file.path, line, col)
    }
}
