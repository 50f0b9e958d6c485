//! The element tree produced by parsing a document.

use std::fmt;

use crate::types::span::Span;
use crate::{Error, ErrorKind, Result};

/// One node of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element<'source> {
    /// Text emitted verbatim.
    Literal(Literal<'source>),
    /// A name resolved against the binding context at render time.
    Var(Var<'source>),
    /// A scope that is only rendered when its test passes.
    Conditional(Conditional<'source>),
}

/// A run of literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal<'source> {
    pub(crate) text: &'source str,
    pub(crate) span: Span,
}

/// A variable reference, e.g. `${OpsManagerPhone}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Var<'source> {
    pub(crate) name: &'source str,
    pub(crate) span: Span,
}

/// Whether a conditional renders its body when the test is truthy or falsy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// `IF Name`
    EvalTrue,
    /// `IF NOT Name`
    EvalFalse,
}

/// A finished conditional scope.
///
/// Constructed with a [`ConditionalBuilder`], so the test element is always
/// present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional<'source> {
    polarity: Polarity,
    test: Box<Element<'source>>,
    body: Vec<Element<'source>>,
    span: Span,
}

/// Incrementally builds a [`Conditional`].
///
/// The first element added becomes the test element, every later element is
/// appended to the body in arrival order.
#[derive(Debug, Clone)]
pub struct ConditionalBuilder<'source> {
    polarity: Polarity,
    test: Option<Element<'source>>,
    body: Vec<Element<'source>>,
    span: Span,
}

impl<'source> Element<'source> {
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(lit) => lit.span,
            Self::Var(var) => var.span,
            Self::Conditional(cond) => cond.span,
        }
    }
}

impl<'source> Literal<'source> {
    pub fn text(&self) -> &'source str {
        self.text
    }
}

impl<'source> Var<'source> {
    pub fn name(&self) -> &'source str {
        self.name
    }

    /// The span of the whole variable tag.
    pub fn span(&self) -> Span {
        self.span
    }
}

impl Polarity {
    /// Returns true if a test with the given truthiness selects the body.
    pub fn selects(&self, truthy: bool) -> bool {
        match self {
            Self::EvalTrue => truthy,
            Self::EvalFalse => !truthy,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::EvalTrue => "",
            Self::EvalFalse => " NOT",
        }
    }
}

impl<'source> Conditional<'source> {
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn test(&self) -> &Element<'source> {
        &self.test
    }

    pub fn body(&self) -> &[Element<'source>] {
        &self.body
    }

    /// The span from the opening `IF` directive to the closing `ENDIF`.
    pub fn span(&self) -> Span {
        self.span
    }

    pub(crate) fn close(&mut self, end: Span) {
        self.span = self.span.combine(end);
    }
}

impl<'source> ConditionalBuilder<'source> {
    /// Starts a conditional opened by the directive at `span`.
    pub fn new(polarity: Polarity, span: Span) -> Self {
        Self {
            polarity,
            test: None,
            body: Vec::new(),
            span,
        }
    }

    /// Adds an element.
    ///
    /// The first call sets the test element, later calls append to the body.
    pub fn add_element(&mut self, element: Element<'source>) {
        match self.test {
            None => self.test = Some(element),
            Some(_) => self.body.push(element),
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Returns the test element, or an error if it was never set.
    pub fn test(&self) -> Result<&Element<'source>> {
        self.test.as_ref().ok_or_else(|| self.err_unset_test())
    }

    /// Finishes the conditional.
    pub fn build(self) -> Result<Conditional<'source>> {
        let test = match self.test {
            Some(test) => test,
            None => return Err(self.err_unset_test()),
        };
        Ok(Conditional {
            polarity: self.polarity,
            test: Box::new(test),
            body: self.body,
            span: self.span,
        })
    }

    fn err_unset_test(&self) -> Error {
        Error::new(
            ErrorKind::UnsetTest,
            format!(
                "`IF{}` conditional at byte {} has no test element",
                self.polarity.suffix(),
                self.span.m
            ),
        )
    }
}

impl fmt::Display for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => f.write_str(lit.text),
            Self::Var(var) => f.write_str(var.name),
            Self::Conditional(cond) => fmt::Display::fmt(cond, f),
        }
    }
}

impl fmt::Display for Conditional<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IF{} {}", self.polarity.suffix(), self.test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Element<'_> {
        Element::Var(Var {
            name,
            span: Span::from(0..name.len()),
        })
    }

    fn lit(text: &str) -> Element<'_> {
        Element::Literal(Literal {
            text,
            span: Span::from(0..text.len()),
        })
    }

    #[test]
    fn builder_first_element_is_test() {
        let mut b = ConditionalBuilder::new(Polarity::EvalTrue, Span::from(0..1));
        b.add_element(var("HasBackupDrivers"));
        b.add_element(lit("a"));
        b.add_element(lit("b"));
        let cond = b.build().unwrap();
        assert_eq!(cond.test(), &var("HasBackupDrivers"));
        assert_eq!(cond.body(), &[lit("a"), lit("b")]);
    }

    #[test]
    fn builder_test_is_stable_across_appends() {
        let mut b = ConditionalBuilder::new(Polarity::EvalFalse, Span::from(0..1));
        b.add_element(var("X"));
        let before = b.test().unwrap().clone();
        b.add_element(var("Y"));
        assert_eq!(b.test().unwrap(), &before);
    }

    #[test]
    fn builder_unset_test_errors() {
        let b = ConditionalBuilder::new(Polarity::EvalFalse, Span::from(3..4));
        assert_eq!(b.test().unwrap_err().kind(), ErrorKind::UnsetTest);
        let err = b.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsetTest);
        assert_eq!(
            err.to_string(),
            "`IF NOT` conditional at byte 3 has no test element"
        );
    }

    #[test]
    fn conditional_display() {
        let mut b = ConditionalBuilder::new(Polarity::EvalFalse, Span::from(0..1));
        b.add_element(var("IsSplit"));
        assert_eq!(b.build().unwrap().to_string(), "IF NOT IsSplit");

        let mut b = ConditionalBuilder::new(Polarity::EvalTrue, Span::from(0..1));
        b.add_element(var("IsSplit"));
        assert_eq!(b.build().unwrap().to_string(), "IF IsSplit");
    }

    #[test]
    fn polarity_selects() {
        assert!(Polarity::EvalTrue.selects(true));
        assert!(!Polarity::EvalTrue.selects(false));
        assert!(Polarity::EvalFalse.selects(false));
        assert!(!Polarity::EvalFalse.selects(true));
    }
}
