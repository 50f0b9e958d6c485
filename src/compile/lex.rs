use crate::compile::parse::Keyword;
use crate::compile::search::Hits;
use crate::listener::{width, Listener, Mode};
use crate::types::span::Span;
use crate::types::syntax::Kind;
use crate::{Engine, Result};

/// A lexer that tokenizes the document source into distinct chunks so that
/// the parser doesn't have to operate on raw text.
///
/// The lexer is implemented as a fallible iterator. The parser should
/// repeatedly call the [`.next()?`][Lexer::next] method to return the next
/// non-whitespace token until [`None`] is returned. Lexing the same source
/// with the same engine always yields the same tokens.
///
/// In [`Mode::BailOut`] the first lexical error is returned as an error and
/// the input is exhausted, so no tokens follow it. In [`Mode::Accumulate`]
/// the error is recorded in the [`Listener`] and an [`Invalid`] token is
/// emitted over the offending text instead.
///
/// [`Invalid`]: TokenKind::Invalid
#[derive(Debug)]
pub struct Lexer<'engine, 'source> {
    /// A reference to the engine containing the syntax searcher.
    engine: &'engine Engine,

    /// The original document source.
    source: &'source str,

    /// A cursor over the document source.
    cursor: usize,

    /// The current state of the lexer.
    state: State,

    /// A buffer to store the next token.
    next: Option<(TokenKind, Span)>,

    /// Where each begin delimiter next occurs in the source.
    hits: Hits,

    /// The line of the most recently emitted token.
    pos: Position,
}

/// The state of the lexer.
///
/// Tokenization is different between tags, e.g. `${ name }` or `&{ IF x }`,
/// than within literal text.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Within literal text.
    Template,

    /// Between begin and end tags.
    Tag {
        /// The span of the begin tag.
        begin: Span,
        /// The end delimiter we are expecting.
        end: Kind,
    },
}

#[derive(Debug, Clone, Copy)]
struct Position {
    offset: usize,
    line: usize,
    line_start: usize,
}

/// A classified lexical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    span: Span,
    line: usize,
    column: usize,
}

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal text
    Raw,
    /// Begin variable tag, e.g. `${`
    BeginVar,
    /// End variable tag, e.g. `}`
    EndVar,
    /// Begin directive tag, e.g. `&{`
    BeginDirective,
    /// End directive tag, e.g. `}`
    EndDirective,
    /// Sequence of tab (0x09) and/or spaces (0x20)
    Whitespace,
    /// A keyword like `IF` or `ENDIF`
    Keyword,
    /// A variable name
    Ident,
    /// Text that could not be tokenized, only produced in accumulate mode
    Invalid,
}

impl<'engine, 'source> Lexer<'engine, 'source> {
    /// Construct a new lexer.
    pub fn new(engine: &'engine Engine, source: &'source str) -> Self {
        Self {
            engine,
            source,
            cursor: 0,
            state: State::Template,
            next: None,
            hits: engine.searcher.hits(),
            pos: Position {
                offset: 0,
                line: 1,
                line_start: 0,
            },
        }
    }

    /// The document source.
    pub fn source(&self) -> &'source str {
        self.source
    }

    pub(crate) fn mode(&self) -> Mode {
        self.engine.mode
    }

    /// Returns the next non-whitespace token.
    pub fn next(&mut self, listener: &mut Listener) -> Result<Option<Token>> {
        loop {
            match self.next_token(listener)? {
                Some(tk) if !tk.kind.is_whitespace() => return Ok(Some(tk)),
                None => return Ok(None),
                _ => continue,
            }
        }
    }

    /// Returns the next token, including whitespace.
    pub fn next_token(&mut self, listener: &mut Listener) -> Result<Option<Token>> {
        let (kind, span) = match self.lex(listener)? {
            Some(next) => next,
            None => return Ok(None),
        };
        let (line, column) = self.locate(span.m);
        let token = Token {
            kind,
            span,
            line,
            column,
        };
        tracing::trace!(kind = ?kind, start = span.m, end = span.n, "token");
        Ok(Some(token))
    }

    fn lex(&mut self, listener: &mut Listener) -> Result<Option<(TokenKind, Span)>> {
        if let Some(next) = self.next.take() {
            return Ok(Some(next));
        }

        let i = self.cursor;

        if self.source[i..].is_empty() {
            return match self.state {
                State::Template => Ok(None),
                State::Tag { begin, end } => {
                    self.state = State::Template;
                    self.fail(listener, begin, err_unclosed(end))?;
                    Ok(Some((TokenKind::Invalid, Span::from(i..i))))
                }
            };
        }

        match self.state {
            State::Template => Ok(Some(self.lex_template(i))),
            State::Tag { begin, end } => self.lex_tag(listener, begin, end, i),
        }
    }

    fn lex_template(&mut self, i: usize) -> (TokenKind, Span) {
        // We are within literal text, that means all we have to do is find
        // the next begin tag from `i`. The following diagram helps describe
        // the variable naming.
        //
        // xxxxxxx${xxxxxxxxx
        //    ^   ^ ^
        //    i   j k

        match self
            .engine
            .searcher
            .find_begin_at(self.source, i, &mut self.hits)
        {
            Some((kind, j, k)) => {
                let begin = Span::from(j..k);
                let tk = TokenKind::from_kind(kind);
                self.cursor = k;
                self.state = State::Tag {
                    begin,
                    end: kind.pair(),
                };
                if i == j {
                    // The current cursor is exactly at the tag.
                    (tk, begin)
                } else {
                    // We must first emit the raw token, so we store the
                    // begin tag token in the `next` buffer.
                    self.next = Some((tk, begin));
                    (TokenKind::Raw, Span::from(i..j))
                }
            }
            None => {
                let j = self.source.len();
                self.cursor = j;
                (TokenKind::Raw, Span::from(i..j))
            }
        }
    }

    fn lex_tag(
        &mut self,
        listener: &mut Listener,
        begin: Span,
        end: Kind,
        i: usize,
    ) -> Result<Option<(TokenKind, Span)>> {
        // We are between two tags ${ ... } or &{ ... } that means we must
        // lex names and keywords and also lookout for the end tag `end`.

        let engine = self.engine;

        if let Some(j) = engine.searcher.starts_with(self.source, i, end) {
            self.state = State::Template;
            self.cursor = j;
            return Ok(Some((TokenKind::from_kind(end), Span::from(i..j))));
        }

        // A new tag starts before this one was closed. Leave the cursor at
        // the new tag so that lexing resumes there.
        if engine.searcher.begin_starts_with(self.source, i).is_some() {
            self.state = State::Template;
            self.fail(listener, begin, err_unclosed(end))?;
            return Ok(Some((TokenKind::Invalid, Span::from(i..i))));
        }

        // We iterate over chars because that is nicer than operating on raw
        // bytes. The map call here fixes the index to be relative to the
        // actual document source.
        let mut iter = self.source[i..].char_indices().map(|(d, c)| (i + d, c));
        let c = match iter.next() {
            Some((_, c)) => c,
            None => return Ok(None),
        };

        let (tk, j) = match c {
            // Tags never span lines, the text after the newline is literal.
            '\r' | '\n' => {
                self.state = State::Template;
                self.fail(listener, begin, err_unclosed(end))?;
                return Ok(Some((TokenKind::Invalid, Span::from(i..i))));
            }
            c if is_whitespace(c) => (TokenKind::Whitespace, self.lex_while(iter, is_whitespace)),
            c if is_ident_start(c) => self.lex_ident_or_keyword(listener, iter, i),
            _ => {
                let j = self.lex_invalid(iter, end);
                self.cursor = j;
                let msg = format!("unexpected `{}`", &self.source[i..j]);
                self.fail(listener, Span::from(i..j), msg)?;
                return Ok(Some((TokenKind::Invalid, Span::from(i..j))));
            }
        };

        self.cursor = j;
        Ok(Some((tk, Span::from(i..j))))
    }

    fn lex_ident_or_keyword<I>(
        &mut self,
        listener: &mut Listener,
        iter: I,
        i: usize,
    ) -> (TokenKind, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let j = self.lex_while(iter, is_ident);
        let text = &self.source[i..j];
        if Keyword::all().iter().any(|kw| *kw == text) {
            return (TokenKind::Keyword, j);
        }
        let upper = text.to_ascii_uppercase();
        if Keyword::all().iter().any(|kw| *kw == upper) {
            listener.report_ambiguity(
                self.source,
                Span::from(i..j),
                "keywords are upper case, reading this as a variable name",
            );
        }
        (TokenKind::Ident, j)
    }

    /// Consumes a run of characters that can't start any token.
    fn lex_invalid<I>(&self, mut iter: I, end: Kind) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let searcher = &self.engine.searcher;
        loop {
            match iter.clone().next() {
                Some((j, c))
                    if is_whitespace(c)
                        || is_ident(c)
                        || matches!(c, '\r' | '\n')
                        || searcher.starts_with(self.source, j, end).is_some()
                        || searcher.begin_starts_with(self.source, j).is_some() =>
                {
                    return j;
                }
                Some(_) => {
                    iter.next();
                }
                None => return self.source.len(),
            }
        }
    }

    fn lex_while<I, P>(&mut self, mut iter: I, pred: P) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
        P: Fn(char) -> bool,
    {
        loop {
            match iter.clone().next() {
                Some((_, c)) if pred(c) => {
                    iter.next();
                }
                Some((j, _)) => return j,
                None => return self.source.len(),
            }
        }
    }

    /// Records a lexical error. In bail-out mode the input is exhausted and
    /// the error is returned immediately.
    fn fail(&mut self, listener: &mut Listener, span: Span, msg: String) -> Result<()> {
        listener.lexical_error(self.source, span, msg);
        if self.mode() == Mode::BailOut {
            self.cursor = self.source.len();
            self.state = State::Template;
            self.next = None;
            if let Some(err) = listener.take_error() {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Returns the 1-based line and 0-based column of `offset`.
    fn locate(&mut self, offset: usize) -> (usize, usize) {
        if offset < self.pos.offset {
            self.pos = Position {
                offset: 0,
                line: 1,
                line_start: 0,
            };
        }
        let from = self.pos.offset;
        for (d, c) in self.source[from..offset].char_indices() {
            if c == '\n' {
                self.pos.line += 1;
                self.pos.line_start = from + d + 1;
            }
        }
        self.pos.offset = offset;
        (
            self.pos.line,
            width(&self.source[self.pos.line_start..offset]),
        )
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The 1-based line the token starts on.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 0-based display column the token starts at.
    pub fn column(&self) -> usize {
        self.column
    }
}

impl TokenKind {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Raw => "raw text",
            Self::BeginVar => "begin variable",
            Self::EndVar => "end variable",
            Self::BeginDirective => "begin directive",
            Self::EndDirective => "end directive",
            Self::Whitespace => "whitespace",
            Self::Keyword => "keyword",
            Self::Ident => "identifier",
            Self::Invalid => "invalid input",
        }
    }

    pub(crate) fn is_end_tag(&self) -> bool {
        matches!(self, Self::EndVar | Self::EndDirective)
    }

    /// Whether this token can only appear outside of a tag.
    pub(crate) fn is_outside_tag(&self) -> bool {
        matches!(self, Self::Raw | Self::BeginVar | Self::BeginDirective)
    }

    fn is_whitespace(&self) -> bool {
        matches!(self, Self::Whitespace)
    }

    fn from_kind(kind: Kind) -> Self {
        match kind {
            Kind::BeginVar => Self::BeginVar,
            Kind::EndVar => Self::EndVar,
            Kind::BeginDirective => Self::BeginDirective,
            Kind::EndDirective => Self::EndDirective,
        }
    }
}

fn err_unclosed(end: Kind) -> String {
    match end {
        Kind::EndDirective | Kind::BeginDirective => "unclosed directive".into(),
        Kind::EndVar | Kind::BeginVar => "unclosed variable".into(),
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | ' ')
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::DocumentId;
    use crate::ErrorKind;

    #[test]
    fn lex_empty() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens, []);
    }

    #[test]
    fn lex_raw() {
        let tokens = lex("lorem ipsum } dolor").unwrap();
        assert_eq!(tokens, [(TokenKind::Raw, "lorem ipsum } dolor")]);
    }

    #[test]
    fn lex_var() {
        let tokens = lex("Call ${ OpsManagerPhone } now").unwrap();
        assert_eq!(
            tokens,
            [
                (TokenKind::Raw, "Call "),
                (TokenKind::BeginVar, "${"),
                (TokenKind::Whitespace, " "),
                (TokenKind::Ident, "OpsManagerPhone"),
                (TokenKind::Whitespace, " "),
                (TokenKind::EndVar, "}"),
                (TokenKind::Raw, " now"),
            ]
        );
    }

    #[test]
    fn lex_directive() {
        let tokens = lex("&{IF NOT IsSplit}x&{ENDIF}").unwrap();
        assert_eq!(
            tokens,
            [
                (TokenKind::BeginDirective, "&{"),
                (TokenKind::Keyword, "IF"),
                (TokenKind::Whitespace, " "),
                (TokenKind::Keyword, "NOT"),
                (TokenKind::Whitespace, " "),
                (TokenKind::Ident, "IsSplit"),
                (TokenKind::EndDirective, "}"),
                (TokenKind::Raw, "x"),
                (TokenKind::BeginDirective, "&{"),
                (TokenKind::Keyword, "ENDIF"),
                (TokenKind::EndDirective, "}"),
            ]
        );
    }

    #[test]
    fn lex_lower_case_keyword_is_ident() {
        let tokens = lex("${if}").unwrap();
        assert_eq!(
            tokens,
            [
                (TokenKind::BeginVar, "${"),
                (TokenKind::Ident, "if"),
                (TokenKind::EndVar, "}"),
            ]
        );
    }

    #[test]
    fn lex_positions() {
        let engine = Engine::new();
        let mut listener = Listener::new(DocumentId::new("test"));
        let mut lexer = Lexer::new(&engine, "ab\ncd ${x}");
        let mut tokens = Vec::new();
        while let Some(tk) = lexer.next_token(&mut listener).unwrap() {
            tokens.push((tk.line(), tk.column()));
        }
        assert_eq!(tokens, [(1, 0), (2, 3), (2, 5), (2, 6)]);
    }

    #[test]
    fn lex_err_bail_out_exhausts_input() {
        let engine = Engine::new();
        let mut listener = Listener::new(DocumentId::new("test"));
        let mut lexer = Lexer::new(&engine, "a ${ x@ } b ${ y }");
        let mut seen = Vec::new();
        let err = loop {
            match lexer.next_token(&mut listener) {
                Ok(Some(tk)) => seen.push(tk.kind()),
                Ok(None) => panic!("expected an error"),
                Err(err) => break err,
            }
        };
        assert_eq!(err.kind(), ErrorKind::Lexical);
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.diagnostics()[0].offset(), Some(6));
        assert_eq!(
            seen,
            [
                TokenKind::Raw,
                TokenKind::BeginVar,
                TokenKind::Whitespace,
                TokenKind::Ident
            ]
        );
        for _ in 0..3 {
            assert!(lexer.next_token(&mut listener).unwrap().is_none());
        }
    }

    #[test]
    fn lex_err_accumulate_emits_invalid() {
        let engine = Engine::with_mode(Mode::Accumulate);
        let mut listener = Listener::new(DocumentId::new("test"));
        let mut lexer = Lexer::new(&engine, "${ x@! }");
        let mut tokens = Vec::new();
        while let Some(tk) = lexer.next_token(&mut listener).unwrap() {
            tokens.push((tk.kind(), &lexer.source()[tk.span()]));
        }
        assert_eq!(
            tokens,
            [
                (TokenKind::BeginVar, "${"),
                (TokenKind::Whitespace, " "),
                (TokenKind::Ident, "x"),
                (TokenKind::Invalid, "@!"),
                (TokenKind::Whitespace, " "),
                (TokenKind::EndVar, "}"),
            ]
        );
        assert_eq!(listener.diagnostics().len(), 1);
        assert_eq!(listener.diagnostics()[0].message(), "unexpected `@!`");
    }

    #[test]
    fn lex_err_unclosed_at_eof() {
        let err = lex("lorem ${ ipsum").unwrap_err();
        assert_eq!(
            err.to_string(),
            "test line 1:6 unclosed variable\nlorem ${ ipsum\n      ^^"
        );
    }

    #[test]
    fn lex_err_unclosed_before_next_tag() {
        let engine = Engine::with_mode(Mode::Accumulate);
        let mut listener = Listener::new(DocumentId::new("test"));
        let mut lexer = Lexer::new(&engine, "&{IF x ${y}");
        let mut kinds = Vec::new();
        while let Some(tk) = lexer.next(&mut listener).unwrap() {
            kinds.push(tk.kind());
        }
        assert_eq!(
            kinds,
            [
                TokenKind::BeginDirective,
                TokenKind::Keyword,
                TokenKind::Ident,
                TokenKind::Invalid,
                TokenKind::BeginVar,
                TokenKind::Ident,
                TokenKind::EndVar,
            ]
        );
        assert_eq!(listener.diagnostics()[0].message(), "unclosed directive");
    }

    #[test]
    fn lex_err_newline_in_tag() {
        let err = lex("${ a\n}").unwrap_err();
        assert_eq!(err.diagnostics()[0].message(), "unclosed variable");
    }

    #[track_caller]
    fn lex(source: &str) -> Result<Vec<(TokenKind, &str)>> {
        let engine = Engine::default();
        let mut listener = Listener::new(DocumentId::new("test"));
        let mut lexer = Lexer::new(&engine, source);
        let mut tokens = Vec::new();
        while let Some(tk) = lexer.next_token(&mut listener)? {
            tokens.push((tk.kind(), &source[tk.span()]));
        }
        for _ in 0..3 {
            assert!(lexer.next_token(&mut listener).unwrap().is_none());
        }
        Ok(tokens)
    }
}
