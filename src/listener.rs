//! Collects diagnostics raised during a single parse pass.
//!
//! A [`Listener`] is handed to the lexer and the parser (and used internally
//! by the control block parser). Every syntax problem is appended to it as a
//! [`Diagnostic`] and nothing is raised until the caller drains the listener
//! with [`Listener::raise_if_errors_present`]. A listener belongs to exactly
//! one pass, so concurrent passes must each own their own listener.

use std::cmp::max;
use std::fmt;

use crate::types::span::Span;
use crate::{Error, ErrorKind, Result};

/// Identifies the document a diagnostic came from.
///
/// This is opaque to the engine and only used when rendering diagnostics,
/// e.g. the forum section and post number a template was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DocumentId {
    section: String,
    post: Option<usize>,
}

/// How the lexer and parser react to invalid input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Fail on the first lexical or syntax error.
    #[default]
    BailOut,
    /// Record every error and keep going, so that one pass reports all of
    /// them.
    Accumulate,
}

/// One recorded, location tagged error.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    kind: ErrorKind,
    document: DocumentId,
    offset: Option<usize>,
    line: usize,
    column: usize,
    message: String,
    excerpt: Option<String>,
}

/// A sink for the diagnostics of one parse pass.
#[derive(Debug, Clone)]
pub struct Listener {
    document: DocumentId,
    diagnostics: Vec<Diagnostic>,
}

impl DocumentId {
    /// Identifies a document by section name alone.
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            post: None,
        }
    }

    /// Sets the post (or row) number within the section.
    pub fn with_post(mut self, post: usize) -> Self {
        self.post = Some(post);
        self
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn post(&self) -> Option<usize> {
        self.post
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.post {
            Some(post) => write!(f, "{} post {}", self.section, post),
            None => f.write_str(&self.section),
        }
    }
}

impl Diagnostic {
    /// Builds a diagnostic pointing at `span` in `source`.
    ///
    /// The excerpt is the offending line followed by a caret underline that
    /// starts at the error column and is as wide as the spanned text, at
    /// least one caret.
    pub(crate) fn new(
        kind: ErrorKind,
        document: &DocumentId,
        source: &str,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        let offset = floor_char_boundary(source, span.m);
        let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[offset..]
            .find('\n')
            .map_or(source.len(), |i| offset + i);
        let line = source[..offset].matches('\n').count() + 1;
        let column = width(&source[line_start..offset]);
        let code = source[line_start..line_end].trim_end_matches('\r');

        // If the span can't be sliced out of the source then we can only
        // point at the start.
        let underline = match source.get(span.range()) {
            Some(text) => max(1, width(text.split('\n').next().unwrap_or(""))),
            None => 1,
        };

        let excerpt = format!(
            "{}\n{:width$}{}",
            code,
            "",
            "^".repeat(underline),
            width = column
        );
        Self {
            kind,
            document: document.clone(),
            offset: Some(span.m),
            line,
            column,
            message: message.into(),
            excerpt: Some(excerpt),
        }
    }

    /// Builds a diagnostic for a line without any source excerpt.
    pub(crate) fn at_line(
        kind: ErrorKind,
        document: &DocumentId,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            document: document.clone(),
            offset: None,
            line,
            column: 0,
            message: message.into(),
            excerpt: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// The byte offset in the source document, if the diagnostic came from
    /// one.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// The 1-based line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 0-based display column.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending line and its caret underline, if the diagnostic came
    /// from a source document.
    pub fn excerpt(&self) -> Option<&str> {
        self.excerpt.as_deref()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} line {}:{} {}",
            self.document, self.line, self.column, self.message
        )?;
        if let Some(excerpt) = &self.excerpt {
            write!(f, "\n{excerpt}")?;
        }
        Ok(())
    }
}

impl Listener {
    /// Construct a new listener for one pass over the given document.
    pub fn new(document: DocumentId) -> Self {
        Self {
            document,
            diagnostics: Vec::new(),
        }
    }

    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Records a lexical error at `span`.
    pub fn lexical_error(&mut self, source: &str, span: Span, msg: impl Into<String>) {
        self.syntax_error(ErrorKind::Lexical, source, span, msg)
    }

    /// Records a syntax event of the given kind at `span`.
    pub fn syntax_error(
        &mut self,
        kind: ErrorKind,
        source: &str,
        span: Span,
        msg: impl Into<String>,
    ) {
        let diagnostic = Diagnostic::new(kind, &self.document, source, span, msg);
        tracing::trace!(document = %self.document, "{}", diagnostic.message);
        self.diagnostics.push(diagnostic);
    }

    /// Records an already built diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Notes that the input could be read in more than one way.
    ///
    /// This never produces a diagnostic.
    pub fn report_ambiguity(&self, source: &str, span: Span, msg: &str) {
        tracing::debug!(
            document = %self.document,
            text = &source[span],
            start = span.m,
            "ambiguity: {msg}"
        );
    }

    /// Notes that the meaning of the input depends on its surroundings.
    ///
    /// This never produces a diagnostic.
    pub fn report_context_sensitivity(&self, source: &str, span: Span, msg: &str) {
        tracing::debug!(
            document = %self.document,
            text = &source[span],
            start = span.m,
            "context sensitivity: {msg}"
        );
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Returns the diagnostics recorded so far, in the order received.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Removes and returns every recorded diagnostic.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Drains the listener into a single error, if anything was recorded.
    ///
    /// The error kind is the kind of the first diagnostic received.
    pub fn take_error(&mut self) -> Option<Error> {
        let kind = self.diagnostics.first()?.kind;
        Some(Error::from_diagnostics(kind, self.drain()))
    }

    /// Raises one aggregate error containing every recorded diagnostic.
    ///
    /// This is a no-op if nothing was recorded. Must be called explicitly
    /// after a pass in [`Mode::Accumulate`].
    pub fn raise_if_errors_present(&mut self) -> Result<()> {
        match self.take_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(feature = "unicode")]
pub(crate) fn width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
pub(crate) fn width(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentId {
        DocumentId::new("Drivers").with_post(4)
    }

    #[test]
    fn diagnostic_excerpt_underlines_span() {
        let source = "Hello\nto ${ x@ } you";
        let d = Diagnostic::new(ErrorKind::Lexical, &doc(), source, Span::from(13..14), "bad");
        assert_eq!(d.line(), 2);
        assert_eq!(d.column(), 7);
        assert_eq!(
            d.to_string(),
            "Drivers post 4 line 2:7 bad\nto ${ x@ } you\n       ^"
        );
    }

    #[test]
    fn diagnostic_excerpt_wide_token() {
        let source = "&{ IF NOT }";
        let d = Diagnostic::new(ErrorKind::Syntax, &doc(), source, Span::from(6..9), "oops");
        assert_eq!(d.excerpt(), Some("&{ IF NOT }\n      ^^^"));
    }

    #[test]
    fn diagnostic_excerpt_at_eof() {
        let source = "abc ${";
        let d = Diagnostic::new(ErrorKind::Lexical, &doc(), source, Span::from(6..6), "eof");
        assert_eq!(d.column(), 6);
        assert_eq!(d.excerpt(), Some("abc ${\n      ^"));
    }

    #[test]
    fn diagnostic_excerpt_span_out_of_range_degrades() {
        let source = "abc";
        let d = Diagnostic::new(ErrorKind::Syntax, &doc(), source, Span::from(1..40), "x");
        assert_eq!(d.excerpt(), Some("abc\n ^"));
    }

    #[test]
    fn diagnostic_excerpt_clips_to_line() {
        let source = "ab\ncd";
        let d = Diagnostic::new(ErrorKind::Syntax, &doc(), source, Span::from(0..5), "x");
        assert_eq!(d.excerpt(), Some("ab\n^^"));
    }

    #[test]
    fn listener_raise_is_noop_when_empty() {
        let mut listener = Listener::new(doc());
        listener.report_ambiguity("if", Span::from(0..2), "lower case keyword");
        assert!(listener.raise_if_errors_present().is_ok());
    }

    #[test]
    fn listener_raise_joins_in_order() {
        let mut listener = Listener::new(DocumentId::new("S"));
        listener.lexical_error("a\nb", Span::from(0..1), "first");
        listener.syntax_error(ErrorKind::Syntax, "a\nb", Span::from(2..3), "second");
        let err = listener.raise_if_errors_present().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lexical);
        assert_eq!(
            err.to_string(),
            "S line 1:0 first\na\n^\nS line 2:0 second\nb\n^"
        );
        assert!(!listener.has_errors());
        assert!(listener.raise_if_errors_present().is_ok());
    }
}
