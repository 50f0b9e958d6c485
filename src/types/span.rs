//! Defines a [`Span`] which is used to represent a region in the document
//! source.

use std::cmp::{max, min};
use std::ops::{Index, Range};

/// A byte range `start..end` in a document source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Span {
    pub(crate) m: usize,
    pub(crate) n: usize,
}

impl Span {
    /// The byte offset of the first byte in the span.
    #[inline]
    pub fn start(&self) -> usize {
        self.m
    }

    /// The byte offset one past the last byte in the span.
    #[inline]
    pub fn end(&self) -> usize {
        self.n
    }

    /// Returns true if the span covers no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.m >= self.n
    }

    pub(crate) fn combine(self, other: Self) -> Self {
        let m = min(self.m, other.m);
        let n = max(self.n, other.n);
        Self { m, n }
    }

    pub(crate) fn range(self) -> Range<usize> {
        self.m..self.n
    }
}

impl Index<Span> for str {
    type Output = str;

    fn index(&self, span: Span) -> &Self::Output {
        let Span { m, n } = span;
        &self[m..n]
    }
}

impl From<Range<usize>> for Span {
    fn from(r: Range<usize>) -> Self {
        Self {
            m: r.start,
            n: r.end,
        }
    }
}
