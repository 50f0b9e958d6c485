//! Types shared by the compiler, the evaluator and the renderer.

pub mod span;
pub mod syntax;
pub mod tree;
