//! wast-meter lexer: converts WebAssembly text-format source into tokens.

pub mod lexer;
pub mod token;

pub use lexer::{LexResult, Lexer};
pub use token::{Token, TokenKind};
