//! Compile a document into an element tree.
//!
//! This process has two stages:
//! - The lexer chunks the document source into tokens.
//! - The parser builds the element tree from the token stream, reporting
//!   problems to a [`Listener`].

pub(crate) mod lex;
mod parse;
mod search;

pub use crate::compile::search::Searcher;

use crate::listener::Listener;
use crate::types::tree::Element;
use crate::{Engine, Result};

/// Parse a document into its top-level elements.
pub fn template<'source>(
    engine: &Engine,
    source: &'source str,
    listener: &mut Listener,
) -> Result<Vec<Element<'source>>> {
    let elements = parse::Parser::new(engine, source, listener).parse_template()?;
    tracing::debug!(
        document = %listener.document(),
        elements = elements.len(),
        errors = listener.diagnostics().len(),
        "parsed document"
    );
    Ok(elements)
}
