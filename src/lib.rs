//! A directive engine for volunteer meal delivery workflows.
//!
//! Documents such as forum posts and workflow headers mix literal text with
//! variable references and conditional blocks. A companion control block of
//! `key=value` lines configures the values those conditionals test.
//!
//! # Features
//!
//! ### Syntax
//!
//! - Variables: `${OpsManagerPhone}`
//! - Conditionals: `&{IF HasBackupDrivers} ... &{ENDIF}`
//! - Negated conditionals: `&{IF NOT HasBackupDrivers} ... &{ENDIF}`
//! - Configurable delimiters through [`Syntax::builder`]
//!
//! There is deliberately no `ELSE`, use a separate `IF NOT` block.
//!
//! ### Engine
//!
//! - Fail on the first error or collect every error in one pass, see
//!   [`Mode`]
//! - Diagnostics with the offending line and a caret underline
//! - Render to a [`String`] or any [`std::io::Write`] implementor
//! - Build contexts from any [`serde`] serializable value or with the
//!   [`context!`] macro
//! - Versioned control blocks with auditing against known users and
//!   restaurants, see [`ControlBlock`]
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. It holds the delimiter syntax
//! and the failure mode.
//!
//! ```
//! use mealdrive::{context, DocumentId, Engine};
//!
//! let engine = Engine::new();
//! let template = engine.parse(
//!     "Call ${OpsManagerPhone}&{IF IsSplit} after cleanup&{ENDIF}.",
//!     DocumentId::new("Drivers").with_post(3),
//! )?;
//!
//! let result = template.render(&context! {
//!     OpsManagerPhone: "555-0100",
//!     IsSplit: false,
//! })?;
//! assert_eq!(result, "Call 555-0100.");
//! # Ok::<(), mealdrive::Error>(())
//! ```
//!
//! ### Control blocks
//!
//! A control block is parsed once and exposes its values as bindings.
//!
//! ```
//! use mealdrive::{ControlBlock, DocumentId, Engine};
//!
//! let block = ControlBlock::parse(
//!     "ops-manager=jsmith|555-0100\nbackup-driver=alice, bob",
//!     DocumentId::new("Drivers"),
//! )?;
//!
//! let result = Engine::new()
//!     .parse(
//!         "&{IF HasBackupDrivers}Backups: ${BackupDrivers}&{ENDIF}",
//!         DocumentId::new("Drivers").with_post(4),
//!     )?
//!     .render(&block.bindings())?;
//! assert_eq!(result, "Backups: alice, bob");
//! # Ok::<(), mealdrive::Error>(())
//! ```
//!
//! ### Collecting every error
//!
//! In [`Mode::Accumulate`] the parser keeps going after an error. The caller
//! drains the [`Listener`] when the pass is done.
//!
//! ```
//! use mealdrive::{DocumentId, Engine, Listener, Mode};
//!
//! let engine = Engine::with_mode(Mode::Accumulate);
//! let mut listener = Listener::new(DocumentId::new("Drivers"));
//! let _ = engine.parse_with("${ a@ } and ${ b! }", &mut listener)?;
//!
//! let err = listener.raise_if_errors_present().unwrap_err();
//! assert_eq!(err.diagnostics().len(), 2);
//! # Ok::<(), mealdrive::Error>(())
//! ```

mod compile;
pub mod control;
mod error;
pub mod eval;
mod listener;
mod macros;
mod render;
mod types;
mod value;

use std::io;

use indexmap::IndexSet;

pub use crate::compile::lex::{Lexer, Token, TokenKind};
pub use crate::control::{Catalog, ControlBlock, Restaurant, User, Version};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::listener::{Diagnostic, DocumentId, Listener, Mode};
pub use crate::types::span::Span;
pub use crate::types::syntax::{Syntax, SyntaxBuilder};
pub use crate::types::tree::{
    Conditional, ConditionalBuilder, Element, Literal, Polarity, Var,
};
#[cfg(feature = "serde")]
pub use crate::value::to_value;
pub use crate::value::{Context, Value};

use crate::compile::Searcher;
use crate::eval::Resolved;

/// The parsing engine.
#[derive(Debug, Clone)]
pub struct Engine {
    searcher: Searcher,
    mode: Mode,
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'source> {
    pub(crate) document: DocumentId,
    pub(crate) source: &'source str,
    pub(crate) elements: Vec<Element<'source>>,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine with the default syntax, failing on the first
    /// error.
    #[inline]
    pub fn new() -> Self {
        Self::with_syntax(Syntax::default())
    }

    /// Construct a new engine with custom syntax.
    ///
    /// # Examples
    ///
    /// ```
    /// use mealdrive::{Engine, Syntax};
    ///
    /// let syntax = Syntax::builder().var("<<", ">>").directive("<%", "%>").build();
    /// let engine = Engine::with_syntax(syntax);
    /// ```
    #[inline]
    pub fn with_syntax(syntax: Syntax) -> Self {
        Self {
            searcher: Searcher::new(syntax),
            mode: Mode::default(),
        }
    }

    /// Construct a new engine with the default syntax and the given mode.
    #[inline]
    pub fn with_mode(mode: Mode) -> Self {
        let mut engine = Self::new();
        engine.mode = mode;
        engine
    }

    /// Set how lexical and syntax errors are handled.
    #[inline]
    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns a lexer over `source`.
    #[inline]
    pub fn lexer<'source>(&self, source: &'source str) -> Lexer<'_, 'source> {
        Lexer::new(self, source)
    }

    /// Lexes the whole of `source`.
    ///
    /// In [`Mode::Accumulate`] lexical errors are recorded in `listener` and
    /// appear as [`TokenKind::Invalid`] tokens.
    pub fn tokenize(&self, source: &str, listener: &mut Listener) -> Result<Vec<Token>> {
        let mut lexer = self.lexer(source);
        let mut tokens = Vec::new();
        while let Some(tk) = lexer.next_token(listener)? {
            tokens.push(tk);
        }
        Ok(tokens)
    }

    /// Parses a document, raising every recorded diagnostic as one error.
    #[inline]
    pub fn parse<'source>(
        &self,
        source: &'source str,
        document: DocumentId,
    ) -> Result<Template<'source>> {
        let mut listener = Listener::new(document);
        let template = self.parse_with(source, &mut listener)?;
        listener.raise_if_errors_present()?;
        Ok(template)
    }

    /// Parses a document, reporting problems to `listener`.
    ///
    /// In [`Mode::Accumulate`] this returns whatever could be parsed and the
    /// caller must drain the listener with
    /// [`.raise_if_errors_present()`][Listener::raise_if_errors_present].
    pub fn parse_with<'source>(
        &self,
        source: &'source str,
        listener: &mut Listener,
    ) -> Result<Template<'source>> {
        let elements = compile::template(self, source, listener)?;
        Ok(Template {
            document: listener.document().clone(),
            source,
            elements,
        })
    }
}

impl<'source> Template<'source> {
    /// Decides every conditional against `ctx`.
    #[inline]
    pub fn resolve(&self, ctx: &Context) -> Result<Resolved<'_, 'source>> {
        eval::resolve(self, ctx)
    }

    /// Render the template to a string using the provided context.
    #[inline]
    pub fn render(&self, ctx: &Context) -> Result<String> {
        self.resolve(ctx)?.render(ctx)
    }

    /// Render the template to a writer using the provided context.
    #[inline]
    pub fn render_to_writer<W>(&self, writer: W, ctx: &Context) -> Result<()>
    where
        W: io::Write,
    {
        self.resolve(ctx)?.render_to_writer(writer, ctx)
    }

    /// Returns every distinct variable name the template uses, tests
    /// included, in first seen order.
    pub fn variables(&self) -> Vec<&'source str> {
        let mut names = IndexSet::new();
        let mut stack = vec![self.elements.iter()];
        while let Some(iter) = stack.last_mut() {
            match iter.next() {
                None => {
                    stack.pop();
                }
                Some(Element::Literal(_)) => {}
                Some(Element::Var(var)) => {
                    names.insert(var.name);
                }
                Some(Element::Conditional(cond)) => {
                    if let Element::Var(var) = cond.test() {
                        names.insert(var.name);
                    }
                    stack.push(cond.body().iter());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Returns the original document source.
    #[inline]
    pub fn source(&self) -> &'source str {
        self.source
    }

    #[inline]
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Returns the top-level elements.
    #[inline]
    pub fn elements(&self) -> &[Element<'source>] {
        &self.elements
    }
}
