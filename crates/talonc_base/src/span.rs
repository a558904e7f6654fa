//! Byte-offset spans and the (file, line, column) locations derived from them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A half-open byte range into a single source file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// A 1-based line/column position together with the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Arc<PathBuf>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: Arc<PathBuf>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Owns one file's text and the byte offsets of every line start, so that a
/// [`Span`] can be translated to a [`SourceLocation`] and the offending
/// source line can be recovered for diagnostic rendering.
#[derive(Debug)]
pub struct SourceMap {
    file: Arc<PathBuf>,
    text: String,
    line_starts: Vec<u32>,
}

impl SourceMap {
    pub fn new(file: impl Into<PathBuf>, text: String) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            file: Arc::new(file.into()),
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 0-based line index containing byte offset `pos`.
    fn line_index_of(&self, pos: u32) -> usize {
        match self.line_starts.binary_search(&pos) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        }
    }

    pub fn location(&self, pos: u32) -> SourceLocation {
        let line_idx = self.line_index_of(pos);
        let column = pos - self.line_starts[line_idx] + 1;
        SourceLocation::new(self.file.clone(), line_idx as u32 + 1, column)
    }

    pub fn span_location(&self, span: Span) -> SourceLocation {
        self.location(span.start)
    }

    /// The full text of the line containing byte offset `pos`, without its
    /// trailing newline.
    pub fn line_text(&self, pos: u32) -> &str {
        let line_idx = self.line_index_of(pos);
        let start = self.line_starts[line_idx] as usize;
        let end = self
            .line_starts
            .get(line_idx + 1)
            .map(|&s| s as usize - 1)
            .unwrap_or(self.text.len());
        self.text[start..end.max(start)]
            .trim_end_matches('\r')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_the_widest_bounds() {
        let a = Span::new(5, 10);
        let b = Span::new(2, 7);
        assert_eq!(a.merge(b), Span::new(2, 10));
    }

    #[test]
    fn len_and_is_empty() {
        assert_eq!(Span::new(3, 3).len(), 0);
        assert!(Span::new(3, 3).is_empty());
        assert_eq!(Span::new(3, 8).len(), 5);
    }

    #[test]
    fn location_on_first_line() {
        let map = SourceMap::new("a.tln", "let x = 1\nlet y = 2\n".to_owned());
        let loc = map.location(4);
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 5);
    }

    #[test]
    fn location_on_second_line() {
        let map = SourceMap::new("a.tln", "let x = 1\nlet y = 2\n".to_owned());
        let loc = map.location(10);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 1);
    }

    #[test]
    fn line_text_strips_trailing_newline_and_cr() {
        let map = SourceMap::new("a.tln", "one\r\ntwo\r\n".to_owned());
        assert_eq!(map.line_text(0), "one");
        assert_eq!(map.line_text(5), "two");
    }

    #[test]
    fn display_formats_as_file_line_column() {
        let map = SourceMap::new("a.tln", "x\n".to_owned());
        let loc = map.location(0);
        assert_eq!(loc.to_string(), "a.tln:1:1");
    }
}
