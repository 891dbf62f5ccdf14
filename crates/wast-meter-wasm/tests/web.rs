//! Browser tests for the JavaScript surface.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;
use wast_meter_wasm::{gas_table_object, inject_json, inject_wast};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn inject_wast_in_browser() {
    let json = inject_wast("(module (func (nop)))", "nop.wast", 2);
    assert!(json.contains("\"success\":true"));
    assert!(json.contains("useGas"));
}

#[wasm_bindgen_test]
fn inject_json_in_browser() {
    let metered = inject_json(r#"{"modules":[{"fields":[{"kind":"func","body":[]}]}]}"#);
    assert!(metered.contains("\"useGas\""));
}

#[wasm_bindgen_test]
fn gas_table_is_an_object() {
    let table = gas_table_object().expect("gas table");
    assert!(table.is_object());
}
