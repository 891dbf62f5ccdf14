use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span.
///
/// Lines and columns are 1-based. A default span (all zeros) marks nodes
/// that were synthesized rather than parsed, e.g. inserted charge calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// A zero-width span at a single position.
    pub fn point(line: u32, column: u32) -> Self {
        Self::new(line, column, line, column)
    }

    /// `true` for spans that do not point into any source text.
    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }

    /// Extend this span up to the end of `other`.
    ///
    /// Assumes `other` does not start before `self`, which holds for every
    /// use in the parser (open paren → close paren).
    pub fn to(self, other: Span) -> Span {
        if self.is_synthetic() {
            return other;
        }
        if other.is_synthetic() {
            return self;
        }
        Span::new(self.line, self.column, other.end_line, other.end_column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source text plus a line index for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// The text of a 1-based line, without its line terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_covers_both() {
        let open = Span::new(2, 3, 2, 3);
        let close = Span::new(4, 1, 4, 1);
        assert_eq!(open.to(close), Span::new(2, 3, 4, 1));
    }

    #[test]
    fn test_span_to_ignores_synthetic() {
        let real = Span::new(1, 1, 1, 8);
        assert_eq!(Span::default().to(real), real);
        assert_eq!(real.to(Span::default()), real);
    }

    #[test]
    fn test_span_display() {
        assert_eq!(Span::point(7, 12).to_string(), "7:12");
    }

    #[test]
    fn test_source_file_lines() {
        let src = SourceFile::new("a.wast", "(module\r\n  (func))\n");
        assert_eq!(src.line(1), Some("(module"));
        assert_eq!(src.line(2), Some("  (func))"));
        assert_eq!(src.line(3), Some(""));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(src.line_count(), 3);
    }

    #[test]
    fn test_span_json_field_names() {
        let json = serde_json::to_string(&Span::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"line":1,"column":2,"end_line":3,"end_column":4}"#);
    }
}
