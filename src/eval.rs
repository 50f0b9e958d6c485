//! The conditional evaluator.
//!
//! Walks the element tree depth first in document order and selects which
//! literal and variable elements make it into the output. The result is a
//! flat [`Resolved`] sequence that borrows from the template.

use std::slice;

use crate::listener::Diagnostic;
use crate::types::tree::{Element, Var};
use crate::{Context, Error, ErrorKind, Result, Template, Value};

/// A template with every conditional decided.
#[derive(Debug, Clone)]
pub struct Resolved<'template, 'source> {
    pub(crate) template: &'template Template<'source>,
    pub(crate) pieces: Vec<Piece<'template, 'source>>,
}

/// One item of resolved output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'template, 'source> {
    Literal(&'source str),
    Var(&'template Var<'source>),
}

impl<'template, 'source> Resolved<'template, 'source> {
    pub fn pieces(&self) -> &[Piece<'template, 'source>] {
        &self.pieces
    }
}

/// Resolves every conditional in `template` against `ctx`.
///
/// A conditional whose test variable is missing from the context is an
/// unresolved binding error. Variables outside of tests are not looked up
/// here, that happens at render time.
pub fn resolve<'template, 'source>(
    template: &'template Template<'source>,
    ctx: &Context,
) -> Result<Resolved<'template, 'source>> {
    let mut pieces = Vec::new();
    let mut stack: Vec<slice::Iter<'template, Element<'source>>> =
        vec![template.elements.iter()];

    while let Some(iter) = stack.last_mut() {
        let elem = match iter.next() {
            Some(elem) => elem,
            None => {
                stack.pop();
                continue;
            }
        };
        match elem {
            Element::Literal(lit) => pieces.push(Piece::Literal(lit.text)),
            Element::Var(var) => pieces.push(Piece::Var(var)),
            Element::Conditional(cond) => {
                let truthy = test_truthiness(template, cond.test(), ctx)?;
                if cond.polarity().selects(truthy) {
                    stack.push(cond.body().iter());
                }
            }
        }
    }

    tracing::debug!(
        document = %template.document,
        pieces = pieces.len(),
        "resolved conditionals"
    );
    Ok(Resolved { template, pieces })
}

fn test_truthiness(template: &Template<'_>, test: &Element<'_>, ctx: &Context) -> Result<bool> {
    match test {
        Element::Var(var) => lookup(template, var, ctx).map(Value::is_truthy),
        Element::Literal(lit) => Ok(!lit.text.is_empty()),
        Element::Conditional(cond) => Err(Error::new(
            ErrorKind::Render,
            format!("`{cond}` cannot be used as the test of another conditional"),
        )),
    }
}

/// Looks up a variable, failing with a diagnostic pointing at its tag.
pub(crate) fn lookup<'ctx>(
    template: &Template<'_>,
    var: &Var<'_>,
    ctx: &'ctx Context,
) -> Result<&'ctx Value> {
    ctx.get(var.name).ok_or_else(|| {
        err_at(
            template,
            var,
            ErrorKind::UnresolvedBinding,
            format!("unresolved binding `{}`", var.name),
        )
    })
}

pub(crate) fn err_at(template: &Template<'_>, var: &Var<'_>, kind: ErrorKind, msg: String) -> Error {
    let diagnostic = Diagnostic::new(kind, &template.document, template.source, var.span, msg);
    Error::from_diagnostics(kind, vec![diagnostic])
}
