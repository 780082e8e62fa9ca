//! Byte-range edits applied to an unchanged source text.
//!
//! Rewrites never re-serialize a document. Callers collect the exact spans
//! to remove or the offsets to insert at, and [`EditSet::apply`] splices them
//! into the original text so every untouched byte is carried over verbatim.

use crate::lexer::Span;
use thiserror::Error;

/// Errors raised when an edit set cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("edit at {first} overlaps edit at {second}")]
    Overlap { first: Span, second: Span },

    #[error("edit at {span} lies outside the document (length {len})")]
    OutOfBounds { span: Span, len: usize },

    #[error("edit at {0} does not fall on a character boundary")]
    NotCharBoundary(Span),
}

/// A single replacement of `span` by `replacement`.
///
/// An empty span is an insertion, an empty replacement is a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub replacement: String,
}

/// An unordered collection of non-overlapping edits.
#[derive(Debug, Clone, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the bytes covered by `span`.
    pub fn remove(&mut self, span: Span) -> &mut Self {
        self.replace(span, String::new())
    }

    /// Insert `text` before the byte at `offset`.
    pub fn insert(&mut self, offset: u32, text: impl Into<String>) -> &mut Self {
        self.replace(Span::at(offset), text)
    }

    /// Replace the bytes covered by `span` with `text`.
    pub fn replace(&mut self, span: Span, text: impl Into<String>) -> &mut Self {
        self.edits.push(Edit {
            span,
            replacement: text.into(),
        });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply every edit to `source` and return the new text.
    ///
    /// Identical edits collapse into one. Insertions at the same offset keep
    /// the order they were added in.
    ///
    /// # Errors
    ///
    /// Returns an error if two edits overlap, or an edit falls outside
    /// `source` or splits a UTF-8 character.
    pub fn apply(&self, source: &str) -> Result<String, EditError> {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        // Stable sort keeps insertion order for edits at the same offset
        edits.sort_by_key(|e| (e.span.start, e.span.end));
        edits.dedup_by(|b, a| a == b && !a.span.is_empty());

        for edit in &edits {
            let range = edit.span.as_range();
            if range.end > source.len() {
                return Err(EditError::OutOfBounds {
                    span: edit.span,
                    len: source.len(),
                });
            }
            if !source.is_char_boundary(range.start) || !source.is_char_boundary(range.end) {
                return Err(EditError::NotCharBoundary(edit.span));
            }
        }

        for pair in edits.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.span.end > second.span.start {
                return Err(EditError::Overlap {
                    first: first.span,
                    second: second.span,
                });
            }
        }

        let mut out = String::with_capacity(source.len());
        let mut cursor = 0;
        for edit in edits {
            let range = edit.span.as_range();
            out.push_str(&source[cursor..range.start]);
            out.push_str(&edit.replacement);
            cursor = range.end;
        }
        out.push_str(&source[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_identity() {
        let source = "<a x=\"1\" />";
        assert_eq!(EditSet::new().apply(source).unwrap(), source);
    }

    #[test]
    fn removals_and_insertions() {
        let source = "0123456789";
        let mut edits = EditSet::new();
        edits.remove(Span::new(2, 4)).insert(8, "xy").insert(8, "z");
        assert_eq!(edits.len(), 3);
        assert_eq!(edits.apply(source).unwrap(), "014567xyz89");
    }

    #[test]
    fn duplicate_removals_collapse() {
        let mut edits = EditSet::new();
        edits.remove(Span::new(1, 3)).remove(Span::new(1, 3));
        assert_eq!(edits.apply("abcdef").unwrap(), "adef");
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let mut edits = EditSet::new();
        edits.remove(Span::new(1, 5)).remove(Span::new(4, 6));
        assert!(matches!(
            edits.apply("abcdefgh"),
            Err(EditError::Overlap { .. })
        ));

        let mut edits = EditSet::new();
        edits.remove(Span::new(1, 5)).insert(3, "x");
        assert!(matches!(
            edits.apply("abcdefgh"),
            Err(EditError::Overlap { .. })
        ));
    }

    #[test]
    fn adjacent_edits_are_allowed() {
        let mut edits = EditSet::new();
        edits.remove(Span::new(1, 3)).remove(Span::new(3, 5)).insert(5, "-");
        assert_eq!(edits.apply("abcdefg").unwrap(), "a-fg");
    }

    #[test]
    fn out_of_bounds_and_char_boundary() {
        let mut edits = EditSet::new();
        edits.remove(Span::new(2, 20));
        assert!(matches!(
            edits.apply("short"),
            Err(EditError::OutOfBounds { .. })
        ));

        let mut edits = EditSet::new();
        edits.remove(Span::new(0, 1));
        assert!(matches!(
            edits.apply("é"),
            Err(EditError::NotCharBoundary(_))
        ));
    }
}
