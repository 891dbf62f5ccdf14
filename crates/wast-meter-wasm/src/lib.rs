//! wast-meter as a WASM module for JavaScript hosts.
//!
//! This crate exposes the metering pipeline via `wasm-bindgen`, suitable
//! for running in a browser Web Worker or under Node.
//!
//! # Usage (JavaScript)
//!
//! ```js
//! import init, { inject_wast, gas_table } from 'wast-meter-wasm';
//!
//! await init();
//!
//! const result = JSON.parse(inject_wast("(module (func (nop)))", "nop.wast", 2));
//! console.log(result.wast);
//! // (module
//! //   (import "ethereum" "useGas" (param i32))
//! //   ...
//! ```

use wasm_bindgen::prelude::*;
use wast_meter_metering::CostTable;
use wast_meter_types::{CompileErrors, Span, WastError};

/// Meter a text-format source file.
///
/// Returns a JSON string containing an `InjectResult`:
/// ```json
/// {
///   "success": true,
///   "wast": "(module ...)",
///   "wasm": [0, 97, 115, 109, ...],
///   "wasm_sha256": "…",
///   "report": { "modules": [{ "gas_import": 0, "charges": 1, "static_gas": 3 }] },
///   "errors": { "errors": [], "warnings": [], "total_errors": 0, "total_warnings": 0 }
/// }
/// ```
///
/// `wasm` is only present for sources holding a single module. On failure
/// `success` is `false` and `errors` carries structured diagnostics.
#[wasm_bindgen]
pub fn inject_wast(source: &str, filename: &str, spacing: u32) -> String {
    let result = wast_meter_compiler::inject_to_result(source, filename, spacing as usize);
    serde_json::to_string(&result).unwrap_or_else(|e| {
        format!(
            r#"{{"success":false,"wast":null,"wasm":null,"wasm_sha256":null,"report":null,"errors":{{"errors":[{{"message":"Serialization error: {}"}}],"warnings":[],"total_errors":1,"total_warnings":0}}}}"#,
            e
        )
    })
}

/// Meter a JSON-serialized AST.
///
/// Returns the metered AST as JSON, or a JSON error list
/// (`{ "errors": [...], ... }`) when the input is malformed or cannot be
/// metered.
#[wasm_bindgen]
pub fn inject_json(json: &str) -> String {
    match wast_meter_compiler::inject_json(json) {
        Ok(metered) => metered,
        Err(e) => {
            let error = WastError::new("<json>", e.code(), e.to_string(), Span::default(), "");
            serde_json::to_string(&CompileErrors::single(error)).unwrap_or_else(|e| {
                format!(
                    r#"{{"errors":[{{"message":"Serialization error: {}"}}],"warnings":[],"total_errors":1,"total_warnings":0}}"#,
                    e
                )
            })
        }
    }
}

/// Return the library version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Return the default cost table as a JSON object of `key → cost`.
#[wasm_bindgen]
pub fn gas_table() -> String {
    CostTable::default_table()
        .to_json()
        .unwrap_or_else(|_| "{}".to_string())
}

/// Return the default cost table as a JavaScript object.
#[wasm_bindgen]
pub fn gas_table_object() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(CostTable::default_table()).map_err(JsValue::from)
}
