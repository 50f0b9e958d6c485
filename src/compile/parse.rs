use std::collections::HashMap;

use crate::compile::lex::{Lexer, Token, TokenKind};
use crate::listener::{Listener, Mode};
use crate::types::span::Span;
use crate::types::tree::{ConditionalBuilder, Element, Literal, Polarity, Var};
use crate::{Engine, ErrorKind, Result};

/// A parser that constructs an element tree from a token stream.
///
/// The parser is implemented as a simple hand written parser with no
/// recursion. Open conditionals are kept on a stack of builders and every
/// parsed element is added to the innermost one. It sometimes needs to peek
/// at the next token to know how to proceed and uses the `peeked` buffer to
/// do this.
///
/// In [`Mode::Accumulate`] a syntax error is recorded and the parser skips
/// to the end of the offending tag before carrying on.
pub struct Parser<'engine, 'source, 'listener> {
    /// A lexer that tokenizes the document source.
    tokens: Lexer<'engine, 'source>,

    /// Receives every lexical and syntax error.
    listener: &'listener mut Listener,

    /// Remember a peeked value, even if it was `None`.
    peeked: Option<Option<Token>>,
}

/// A parsed directive tag.
enum Directive<'source> {
    If(Polarity, Var<'source>),
    /// An `IF` tag that could not be parsed, only produced in accumulate
    /// mode after the error has been recorded.
    BrokenIf,
    EndIf,
}

/// A conditional that has not seen its `ENDIF` yet.
enum Scope<'source> {
    Open(ConditionalBuilder<'source>),
    Broken,
}

/// The variables tested by the open conditionals, counted per polarity.
#[derive(Default)]
struct Tested<'source> {
    open: HashMap<&'source str, [usize; 2]>,
}

/// A keyword in the directive syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    If,
    Not,
    Else,
    EndIf,
}

impl<'engine, 'source, 'listener> Parser<'engine, 'source, 'listener> {
    /// Construct a new parser.
    pub fn new(
        engine: &'engine Engine,
        source: &'source str,
        listener: &'listener mut Listener,
    ) -> Self {
        Self {
            tokens: Lexer::new(engine, source),
            listener,
            peeked: None,
        }
    }

    /// Parses a document into its top-level elements.
    ///
    /// In accumulate mode this returns whatever could be parsed, the caller
    /// must check the listener for errors.
    pub fn parse_template(mut self) -> Result<Vec<Element<'source>>> {
        let mut open: Vec<Scope<'source>> = Vec::new();
        let mut tested = Tested::default();
        let mut root = Vec::new();

        while let Some(next) = self.next()? {
            let element = match next.kind() {
                // Simply literal text, emit a single element for it.
                TokenKind::Raw => {
                    let span = next.span();
                    Element::Literal(Literal {
                        text: &self.source()[span],
                        span,
                    })
                }

                // The start of a variable, e.g. `${ OpsManagerPhone }`
                TokenKind::BeginVar => match self.parse_var(next.span())? {
                    Some(var) => Element::Var(var),
                    None => continue,
                },

                // The start of a directive, e.g. `&{ IF IsSplit }`
                TokenKind::BeginDirective => {
                    let begin = next.span();
                    let (directive, span) = match self.parse_directive(begin)? {
                        Some(parsed) => parsed,
                        None => continue,
                    };

                    match directive {
                        // The start of a conditional. For example:
                        //
                        //   &{ IF NOT IsSplit }
                        //
                        // The test variable is the first element added to
                        // the builder, everything up to the matching `ENDIF`
                        // becomes its body.
                        Directive::If(polarity, test) => {
                            if let Some(msg) = tested.push(test.name, polarity) {
                                self.listener
                                    .report_context_sensitivity(self.source(), test.span, msg);
                            }
                            let mut cond = ConditionalBuilder::new(polarity, span);
                            cond.add_element(Element::Var(test));
                            open.push(Scope::Open(cond));
                            continue;
                        }

                        // An `IF` whose header was already reported. Its body
                        // is parsed and discarded so that the `ENDIF` still
                        // has something to close.
                        Directive::BrokenIf => {
                            open.push(Scope::Broken);
                            continue;
                        }

                        // The end of a conditional. For example:
                        //
                        //   &{ ENDIF }
                        //
                        // We pop the innermost builder and add the finished
                        // conditional to its parent.
                        Directive::EndIf => match open.pop() {
                            Some(Scope::Open(cond)) => {
                                if let Element::Var(var) = cond.test()? {
                                    tested.pop(var.name, cond.polarity());
                                }
                                let mut cond = cond.build()?;
                                cond.close(span);
                                Element::Conditional(cond)
                            }
                            Some(Scope::Broken) => continue,
                            None => {
                                self.error(span, "unexpected `ENDIF`, there is no open `IF`")?;
                                continue;
                            }
                        },
                    }
                }

                // Errors inside a tag are handled when parsing the tag, an
                // invalid token here follows an unclosed tag.
                TokenKind::Invalid => continue,

                tk => {
                    self.error(next.span(), format!("unexpected {}", tk.human()))?;
                    continue;
                }
            };

            match open.last_mut() {
                Some(Scope::Open(cond)) => cond.add_element(element),
                Some(Scope::Broken) => {}
                None => root.push(element),
            }
        }

        for scope in &open {
            if let Scope::Open(cond) = scope {
                let span = cond.test()?.span();
                let msg = format!("unclosed `IF` block testing `{}`", cond.test()?);
                self.error(span, msg)?;
            }
        }

        Ok(root)
    }

    /// Parses the inside of a variable tag.
    ///
    ///   OpsManagerPhone }
    ///
    fn parse_var(&mut self, begin: Span) -> Result<Option<Var<'source>>> {
        let name = match self.next()? {
            Some(tk) if tk.kind() == TokenKind::Ident => tk.span(),
            found => return self.unexpected("a variable name", begin, found),
        };
        match self.next()? {
            Some(tk) if tk.kind() == TokenKind::EndVar => Ok(Some(Var {
                name: &self.source()[name],
                span: begin.combine(tk.span()),
            })),
            found => self.unexpected("end of variable", name, found),
        }
    }

    /// Parses the inside of a directive tag. All of the following are valid.
    ///
    ///   IF HasBackupDrivers }
    ///
    ///   IF NOT HasBackupDrivers }
    ///
    ///   ENDIF }
    ///
    fn parse_directive(&mut self, begin: Span) -> Result<Option<(Directive<'source>, Span)>> {
        let first = self.next()?;
        let kw = match first {
            Some(tk) if tk.kind() == TokenKind::Keyword => {
                Keyword::from_str(&self.source()[tk.span()])
            }
            _ => None,
        };
        let (kw, kw_span) = match (kw, first) {
            (Some(kw), Some(tk)) => (kw, tk.span()),
            (_, found) => return self.unexpected("`IF` or `ENDIF`", begin, found),
        };

        let (directive, last) = match kw {
            Keyword::If => {
                let (polarity, name) = match self.next()? {
                    Some(tk) if tk.kind() == TokenKind::Ident => (Polarity::EvalTrue, tk.span()),
                    Some(tk) if self.is_keyword(&tk, Keyword::Not) => match self.next()? {
                        Some(tk) if tk.kind() == TokenKind::Ident => {
                            (Polarity::EvalFalse, tk.span())
                        }
                        found => {
                            self.unexpected::<()>("a variable name", tk.span(), found)?;
                            return Ok(Some((Directive::BrokenIf, begin.combine(tk.span()))));
                        }
                    },
                    found => {
                        self.unexpected::<()>("a variable name", kw_span, found)?;
                        return Ok(Some((Directive::BrokenIf, begin.combine(kw_span))));
                    }
                };
                let test = Var {
                    name: &self.source()[name],
                    span: name,
                };
                (Directive::If(polarity, test), name)
            }
            Keyword::EndIf => (Directive::EndIf, kw_span),
            Keyword::Else => {
                self.error(
                    kw_span,
                    "`ELSE` is not supported, use a separate `IF NOT` block",
                )?;
                self.skip_tag()?;
                return Ok(None);
            }
            Keyword::Not => return self.unexpected("`IF` or `ENDIF`", begin, first),
        };

        match self.next()? {
            Some(tk) if tk.kind() == TokenKind::EndDirective => {
                Ok(Some((directive, begin.combine(tk.span()))))
            }
            found => {
                // Keep the scope structure intact so that one bad tag does
                // not also unbalance the `ENDIF`s that follow it.
                self.unexpected::<()>("end of directive", last, found)?;
                let directive = match directive {
                    Directive::If(..) => Directive::BrokenIf,
                    other => other,
                };
                Ok(Some((directive, begin.combine(last))))
            }
        }
    }

    /// Reports an unexpected token and resynchronizes after the tag.
    ///
    /// `after` is the span of the last good token, used to point at the end
    /// of input.
    fn unexpected<T>(
        &mut self,
        expected: &str,
        after: Span,
        found: Option<Token>,
    ) -> Result<Option<T>> {
        match found {
            // The lexer already recorded this one.
            Some(tk) if tk.kind() == TokenKind::Invalid => {
                self.skip_tag()?;
            }
            Some(tk) => {
                let msg = format!("expected {expected}, found {}", tk.kind().human());
                self.error(tk.span(), msg)?;
                if tk.kind().is_outside_tag() {
                    self.peeked = Some(Some(tk));
                } else if !tk.kind().is_end_tag() {
                    self.skip_tag()?;
                }
            }
            None => {
                let n = self.source().len();
                let span = Span::from(after.n.min(n)..n);
                self.error(span, format!("expected {expected}, found end of input"))?;
                self.peeked = Some(None);
            }
        }
        Ok(None)
    }

    /// Discards tokens up to and including the end of the current tag.
    fn skip_tag(&mut self) -> Result<()> {
        loop {
            match self.next()? {
                Some(tk) if tk.kind().is_end_tag() => return Ok(()),
                Some(tk) if tk.kind().is_outside_tag() => {
                    self.peeked = Some(Some(tk));
                    return Ok(());
                }
                None => {
                    self.peeked = Some(None);
                    return Ok(());
                }
                Some(_) => continue,
            }
        }
    }

    /// Records a syntax error, failing immediately in bail-out mode.
    fn error(&mut self, span: Span, msg: impl Into<String>) -> Result<()> {
        let source = self.source();
        self.listener
            .syntax_error(ErrorKind::Syntax, source, span, msg);
        if self.tokens.mode() == Mode::BailOut {
            if let Some(err) = self.listener.take_error() {
                return Err(err);
            }
        }
        Ok(())
    }

    fn is_keyword(&self, tk: &Token, kw: Keyword) -> bool {
        tk.kind() == TokenKind::Keyword && &self.source()[tk.span()] == kw.human()
    }

    fn next(&mut self) -> Result<Option<Token>> {
        match self.peeked.take() {
            Some(next) => Ok(next),
            None => self.tokens.next(self.listener),
        }
    }

    fn source(&self) -> &'source str {
        self.tokens.source()
    }
}

impl<'source> Tested<'source> {
    /// Records a newly opened test, returning a note if an enclosing
    /// conditional already tests the same variable.
    fn push(&mut self, name: &'source str, polarity: Polarity) -> Option<&'static str> {
        let counts = self.open.entry(name).or_default();
        let (same, other) = match polarity {
            Polarity::EvalTrue => (counts[0], counts[1]),
            Polarity::EvalFalse => (counts[1], counts[0]),
        };
        counts[polarity as usize] += 1;
        if same > 0 {
            Some("nested conditional repeats an enclosing test")
        } else if other > 0 {
            Some("nested conditional contradicts an enclosing test")
        } else {
            None
        }
    }

    fn pop(&mut self, name: &str, polarity: Polarity) {
        if let Some(counts) = self.open.get_mut(name) {
            counts[polarity as usize] = counts[polarity as usize].saturating_sub(1);
            if *counts == [0, 0] {
                self.open.remove(name);
            }
        }
    }
}

impl Keyword {
    pub(crate) fn all() -> &'static [&'static str] {
        &["IF", "NOT", "ELSE", "ENDIF"]
    }

    fn from_str(s: &str) -> Option<Self> {
        let kw = match s {
            "IF" => Self::If,
            "NOT" => Self::Not,
            "ELSE" => Self::Else,
            "ENDIF" => Self::EndIf,
            _ => return None,
        };
        Some(kw)
    }

    fn human(&self) -> &'static str {
        match self {
            Self::If => "IF",
            Self::Not => "NOT",
            Self::Else => "ELSE",
            Self::EndIf => "ENDIF",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::DocumentId;

    #[test]
    fn parse_nested() {
        let elements = parse("A &{IF X}B &{IF Y}C&{ENDIF} D&{ENDIF} E").unwrap();
        assert_eq!(elements.len(), 3);
        let cond = match &elements[1] {
            Element::Conditional(cond) => cond,
            _ => panic!("expected conditional"),
        };
        assert_eq!(cond.to_string(), "IF X");
        assert_eq!(cond.body().len(), 3);
        assert!(matches!(&cond.body()[1], Element::Conditional(c) if c.to_string() == "IF Y"));
    }

    #[test]
    fn parse_if_not() {
        let elements = parse("&{ IF NOT HasBackupDrivers }none&{ ENDIF }").unwrap();
        match &elements[0] {
            Element::Conditional(cond) => {
                assert_eq!(cond.polarity(), Polarity::EvalFalse);
                assert_eq!(cond.body().len(), 1);
            }
            _ => panic!("expected conditional"),
        }
    }

    #[test]
    fn parse_conditional_span_covers_endif() {
        let source = "&{IF X}y&{ENDIF}";
        let elements = parse(source).unwrap();
        assert_eq!(elements[0].span(), Span::from(0..source.len()));
    }

    #[test]
    fn parse_err_else() {
        let err = parse("&{IF X}a&{ELSE}b&{ENDIF}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "test line 1:10 `ELSE` is not supported, use a separate `IF NOT` block\n\
             &{IF X}a&{ELSE}b&{ENDIF}\n          ^^^^"
        );
    }

    #[test]
    fn parse_err_unclosed_if() {
        let err = parse("&{IF X}a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(
            err.diagnostics()[0].message(),
            "unclosed `IF` block testing `X`"
        );
    }

    #[test]
    fn parse_err_unexpected_endif() {
        let err = parse("a&{ENDIF}").unwrap_err();
        assert_eq!(
            err.diagnostics()[0].message(),
            "unexpected `ENDIF`, there is no open `IF`"
        );
    }

    #[test]
    fn parse_err_empty_var() {
        let err = parse("a ${ } b").unwrap_err();
        assert_eq!(
            err.diagnostics()[0].message(),
            "expected a variable name, found end variable"
        );
    }

    #[test]
    fn parse_accumulate_recovers() {
        let engine = Engine::with_mode(Mode::Accumulate);
        let mut listener = Listener::new(DocumentId::new("test"));
        let elements = Parser::new(&engine, "${a b} ok &{IF}x&{ENDIF} ${c}", &mut listener)
            .parse_template()
            .unwrap();
        let messages: Vec<_> = listener.diagnostics().iter().map(|d| d.message()).collect();
        assert_eq!(
            messages,
            [
                "expected end of variable, found identifier",
                "expected a variable name, found end directive",
            ]
        );
        assert_eq!(elements.len(), 3);
        assert!(matches!(&elements[2], Element::Var(v) if v.name() == "c"));
    }

    #[test]
    fn parse_accumulate_broken_if_still_matches_endif() {
        let engine = Engine::with_mode(Mode::Accumulate);
        for source in ["&{IF}x&{ENDIF}", "&{IF X@}x&{ENDIF}", "&{IF NOT}x&{ENDIF}", "&{IF X Y}x&{ENDIF}"] {
            let mut listener = Listener::new(DocumentId::new("test"));
            let elements = Parser::new(&engine, source, &mut listener)
                .parse_template()
                .unwrap();
            assert!(elements.is_empty(), "{source}");
            assert_eq!(listener.diagnostics().len(), 1, "{source}");
        }
    }

    #[test]
    fn parse_accumulate_broken_if_nested() {
        let engine = Engine::with_mode(Mode::Accumulate);
        let mut listener = Listener::new(DocumentId::new("test"));
        let elements = Parser::new(
            &engine,
            "&{IF A}a&{IF}b&{ENDIF}c&{ENDIF}d",
            &mut listener,
        )
        .parse_template()
        .unwrap();
        assert_eq!(listener.diagnostics().len(), 1);
        assert_eq!(elements.len(), 2);
        match &elements[0] {
            Element::Conditional(cond) => assert_eq!(cond.body().len(), 2),
            _ => panic!("expected conditional"),
        }
    }

    #[test]
    fn tested_tracks_enclosing_tests() {
        let mut tested = Tested::default();
        assert_eq!(tested.push("X", Polarity::EvalTrue), None);
        assert_eq!(
            tested.push("X", Polarity::EvalTrue),
            Some("nested conditional repeats an enclosing test")
        );
        assert_eq!(
            tested.push("X", Polarity::EvalFalse),
            Some("nested conditional contradicts an enclosing test")
        );
        tested.pop("X", Polarity::EvalFalse);
        tested.pop("X", Polarity::EvalTrue);
        tested.pop("X", Polarity::EvalTrue);
        assert!(tested.open.is_empty());
        assert_eq!(tested.push("X", Polarity::EvalFalse), None);
    }

    #[test]
    fn parse_deep_nesting() {
        let depth = 2000;
        let mut source = String::new();
        for i in 0..depth {
            source.push_str(&format!("&{{IF V{i}}}"));
        }
        source.push('x');
        for _ in 0..depth {
            source.push_str("&{ENDIF}");
        }
        let elements = parse(&source).unwrap();
        assert_eq!(elements.len(), 1);
    }

    #[track_caller]
    fn parse(source: &str) -> Result<Vec<Element<'_>>> {
        let engine = Engine::new();
        let mut listener = Listener::new(DocumentId::new("test"));
        Parser::new(&engine, source, &mut listener).parse_template()
    }
}
