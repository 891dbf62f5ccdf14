//! wast-meter back end.
//!
//! Two ways out of the AST:
//!
//! - [`generate`] prints a [`Script`](wast_meter_types::ast::Script) back to
//!   the folded text format. The output parses back to an equal tree.
//! - [`encode`] assembles one [`Module`](wast_meter_types::ast::Module) into
//!   a `.wasm` binary and validates it with `wasmparser`.
//!
//! ## Index spaces
//!
//! `call_import i` targets import `i`; `call f`, `export` and `start` name
//! defined functions, which follow the imports in the binary function index
//! space. Metering appends its import after the existing ones, so no
//! existing index moves.

mod compiler;
pub mod error;
mod expr;
pub mod text;
mod types;

pub use compiler::encode;
pub use error::{CodegenError, CodegenResult};
pub use text::generate;
