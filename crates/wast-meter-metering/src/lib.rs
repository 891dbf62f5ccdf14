//! Static gas metering for the WebAssembly text-format AST.
//!
//! Every function body is split into maximal branch-free runs. Each run
//! receives one `(call_import <gas> (i32.const <cost>))` charge at its start
//! carrying the summed cost of every instruction in the run, and each
//! module gains the host import that the charges call.
//!
//! The pass is all-or-nothing: costs are validated for the whole script
//! before the tree is touched.
//!
//! ```
//! use wast_meter_metering::{inject, MeterConfig};
//! use wast_meter_types::ast::*;
//!
//! let mut script = Script {
//!     modules: vec![Module {
//!         fields: vec![ModuleField::Func(Func {
//!             id: None,
//!             export: None,
//!             signature: FuncSig::default(),
//!             locals: vec![],
//!             body: vec![Expr::Drop { value: Box::new(Expr::i32_const(1)) }],
//!             span: Default::default(),
//!         })],
//!         ..Module::default()
//!     }],
//! };
//! let report = inject(&mut script, &MeterConfig::default()).unwrap();
//! assert_eq!(report.modules[0].charges, 1);
//! ```

pub mod analyze;
pub mod config;
pub mod cost;
pub mod driver;
pub mod error;
pub mod inject;
pub mod normalize;

pub use config::MeterConfig;
pub use cost::{cost_key, CostTable};
pub use driver::{inject, validate, MeteringReport, ModuleReport};
pub use error::{MeterError, MeterResult};
