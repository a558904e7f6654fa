//! Diagnostics: located, severity-tagged messages accumulated during
//! compilation and rendered at report time.

use crate::span::{SourceMap, Span};
use crate::style::Style;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders this diagnostic as `<file>:<line>:<column>: error: <message>`
    /// plus the offending source line and a caret, colorized only when
    /// `colorize` is true.
    pub fn render(&self, map: &SourceMap, colorize: bool) -> String {
        let loc = map.span_location(self.span);
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let header = format!("{}: {}: {}", loc, kind, self.message);
        let header = if colorize {
            match self.severity {
                Severity::Error => header.replacen("error:", &Style::bold_red("error:"), 1),
                Severity::Warning => header.replacen("warning:", &Style::bold_yellow("warning:"), 1),
            }
        } else {
            header
        };

        let line = map.line_text(self.span.start);
        let column = loc.column as usize;
        let caret_line = format!("{}^", " ".repeat(column.saturating_sub(1)));
        let caret_line = if colorize {
            Style::cyan(&caret_line)
        } else {
            caret_line
        };
        format!("{}\n{}\n{}", header, line, caret_line)
    }
}

/// Accumulates diagnostics across a whole compilation, independent of any
/// single file or declaration, so that a type error in one declaration
/// does not prevent later declarations from being checked.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::error(message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::warning(message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

/// Whether diagnostics should be colorized for the given output stream,
/// per the "color when attached to a terminal" requirement.
pub fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> SourceMap {
        SourceMap::new("a.tln", "let x: int = true\n".to_owned())
    }

    #[test]
    fn bag_tracks_errors_separately_from_warnings() {
        let mut bag = DiagnosticBag::new();
        bag.warning("mismatched terminators", Span::new(0, 1));
        assert!(!bag.has_errors());
        bag.error("type mismatch", Span::new(0, 1));
        assert!(bag.has_errors());
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn render_includes_location_and_message() {
        let map = sample_map();
        let diag = Diagnostic::error("cannot convert 'bool' to 'int'", Span::new(13, 17));
        let rendered = diag.render(&map, false);
        assert!(rendered.starts_with("a.tln:1:14: error: cannot convert"));
        assert!(rendered.contains("let x: int = true"));
    }

    #[test]
    fn render_colorizes_only_when_requested() {
        let map = sample_map();
        let diag = Diagnostic::warning("inconsistent statement terminator", Span::new(0, 1));
        let plain = diag.render(&map, false);
        let colored = diag.render(&map, true);
        assert!(!plain.contains("\x1b["));
        assert!(colored.contains("\x1b["));
    }

    #[test]
    fn empty_bag_reports_no_errors() {
        let bag = DiagnosticBag::new();
        assert!(bag.is_empty());
        assert!(!bag.has_errors());
    }
}
