//! wast-meter parser: converts a token stream into a [`Script`] AST.
//!
//! Accepts the folded S-expression form of the text format. A source may
//! hold several `(module ...)` forms, or bare module fields that are
//! gathered into one implicit module.
//!
//! [`Script`]: wast_meter_types::ast::Script

mod parse_expr;
mod parse_module;
mod parser;

pub use parser::{parse_source, ParseResult, Parser};
