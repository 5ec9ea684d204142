//! Source locations attached to tokens, AST nodes and instructions.

use std::fmt;

/// A byte range in the source together with the line/column where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Span covering both `self` and `other`, positioned at `self`.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_start_position() {
        let a = Span::new(4, 8, 2, 3);
        let b = Span::new(10, 15, 2, 9);
        let merged = a.merge(&b);
        assert_eq!(merged, Span::new(4, 15, 2, 3));
    }

    #[test]
    fn test_display() {
        assert_eq!(Span::new(0, 1, 7, 12).to_string(), "line 7, column 12");
    }
}
