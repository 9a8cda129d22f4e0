//! Expression pipeline: path extraction, lexing, parsing and
//! interpretation of schema-authored computed expressions.

use chumsky::prelude::*;

pub mod ast;
pub mod catalog;
pub mod compile;
pub mod eval;
pub mod extract;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Body, Expr, Stmt, UnaryOp};
pub use catalog::PathCatalog;
pub use compile::{CompiledExpr, compile};
pub use extract::{Extraction, extract};
pub use lexer::{Token, lexer};
pub use parser::body_parser;

pub type Span = SimpleSpan;
pub type ParseError<'src, T> = Rich<'src, T, Span>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}
