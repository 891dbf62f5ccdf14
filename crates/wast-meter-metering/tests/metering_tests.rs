//! Metering tests over parsed text-format sources.

use wast_meter_metering::inject::{charge, charge_amount};
use wast_meter_metering::{inject, MeterConfig, MeterError, MeteringReport};
use wast_meter_parser::parse_source;
use wast_meter_types::ast::*;
use wast_meter_types::SourceFile;

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse_ok(source: &str) -> Script {
    let _ = env_logger::try_init();
    let sf = SourceFile::new("test.wast", source);
    let result = parse_source(&sf);
    if result.errors.has_errors() {
        for e in &result.errors.errors {
            eprintln!("  ERROR: {} ({})", e.message, e.code);
        }
        panic!("unexpected parse errors (see above)");
    }
    result.script.expect("no script returned")
}

fn meter(source: &str) -> (Script, MeteringReport) {
    let mut script = parse_ok(source);
    let report = inject(&mut script, &MeterConfig::default()).expect("metering failed");
    (script, report)
}

/// Body of the `n`th function of the first module.
fn body(script: &Script, n: usize) -> &[Expr] {
    &script.modules[0].funcs().nth(n).expect("no such func").body
}

/// Cost of `key` in the default table.
fn cost(key: &str) -> u32 {
    MeterConfig::default()
        .cost_table()
        .get(key)
        .unwrap_or_else(|| panic!("no cost for {key}"))
}

/// Every node's cost, summed without going through the metering pass.
fn independent_cost(expr: &Expr) -> u64 {
    let own = match expr {
        Expr::Then { .. } | Expr::Else { .. } => 0,
        other => u64::from(
            MeterConfig::default()
                .cost_table()
                .cost(other)
                .expect("cost"),
        ),
    };
    own + expr.children().into_iter().map(independent_cost).sum::<u64>()
}

/// Every charge amount anywhere in `exprs`.
fn charges(exprs: &[Expr], gas_import: u32) -> Vec<u32> {
    let mut found = Vec::new();
    for expr in exprs {
        collect_charges(expr, gas_import, &mut found);
    }
    found
}

fn collect_charges(expr: &Expr, gas_import: u32, found: &mut Vec<u32>) {
    if let Some(amount) = charge_amount(expr, gas_import) {
        found.push(amount);
        return;
    }
    for child in expr.children() {
        collect_charges(child, gas_import, found);
    }
}

// ─────────────────────────────────────────────────────────────────────
// Conservation and splitting
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_end_to_end_single_block() {
    let (script, report) = meter("(module (func (i32.add (i32.const 1) (i32.const 2))))");
    let expected = cost("i32.const") * 2 + cost("i32.add");
    assert_eq!(
        body(&script, 0),
        &[
            charge(0, expected),
            Expr::binop(ValueType::I32, BinaryOp::Add, Expr::i32_const(1), Expr::i32_const(2)),
        ]
    );
    assert_eq!(report.modules[0].gas_import, 0);
    assert_eq!(report.modules[0].charges, 1);
}

#[test]
fn test_import_index_follows_existing_imports() {
    let (script, report) = meter(
        r#"(module
             (import "env" "a" (param i32))
             (import "env" "b")
             (func (call_import 1)))"#,
    );
    let module = &script.modules[0];
    assert_eq!(report.modules[0].gas_import, 2);
    assert_eq!(module.import_count(), 3);
    let added = module.imports().nth(2).expect("gas import");
    assert_eq!((added.module.as_str(), added.field.as_str()), ("ethereum", "useGas"));
    assert_eq!(body(&script, 0)[0], charge(2, cost("call_import")));
}

#[test]
fn test_conservation_without_control_flow() {
    let source = r#"(module (func (param i32) (result i32) (local i64)
        (set_local 1 (i64.extend_u/i32 (get_local 0)))
        (i64.store16 offset=4 (get_local 0) (get_local 1))
        (drop (i32.load8_u (get_local 0)))
        (i32.mul (i32.rotl (get_local 0) (i32.const 3)) (i32.eqz (get_local 0)))))"#;
    let original = parse_ok(source);
    let expected: u64 = body(&original, 0).iter().map(independent_cost).sum();

    let (script, report) = meter(source);
    let amounts = charges(body(&script, 0), 0);
    assert_eq!(amounts.len(), 1);
    assert_eq!(u64::from(amounts[0]), expected);
    assert_eq!(report.modules[0].static_gas, expected);
}

#[test]
fn test_split_at_branch() {
    let (script, _) = meter(
        "(module (func
           (block (nop) (nop) (br 0) (nop) (nop))))",
    );
    let Expr::Block { body: inner, .. } = &body(&script, 0)[1] else {
        panic!("expected block");
    };
    // the first run is paid before the block, the rest inside it
    assert_eq!(body(&script, 0)[0], charge(0, cost("block") + cost("br")));
    assert_eq!(inner.len(), 5);
    assert_eq!(charges(inner, 0), Vec::<u32>::new());
}

#[test]
fn test_split_correctness_in_function_body() {
    let (script, report) = meter(
        "(module (func (param i32)
           (drop (get_local 0)) (drop (get_local 0)) (br_if 0 (get_local 0))
           (drop (get_local 0)) (drop (get_local 0))))",
    );
    let body = body(&script, 0);
    let drop = cost("drop") + cost("get_local");
    assert_eq!(report.modules[0].charges, 2);
    assert_eq!(body[0], charge(0, 2 * drop + cost("br_if") + cost("get_local")));
    assert!(matches!(body[3], Expr::BrIf { .. }));
    assert_eq!(body[4], charge(0, 2 * drop));
    assert_eq!(body.len(), 7);
}

#[test]
fn test_every_path_pays_exactly_once() {
    // the static sum equals the independently computed total even with
    // loops, conditionals and nested blocks
    let source = r#"(module (func (param i32) (result i32)
        (block $exit
          (loop $top
            (br_if $exit (i32.eqz (get_local 0)))
            (set_local 0 (i32.sub (get_local 0) (i32.const 1)))
            (br $top)))
        (if (result i32) (get_local 0)
          (i32.const 1)
          (block (result i32) (drop (i32.const 5)) (return (i32.const 2))))))"#;
    let original = parse_ok(source);
    let expected: u64 = body(&original, 0).iter().map(independent_cost).sum();
    let (script, report) = meter(source);
    assert_eq!(report.modules[0].static_gas, expected);
    let paid: u64 = charges(body(&script, 0), 0).into_iter().map(u64::from).sum();
    assert_eq!(paid, expected);
}

// ─────────────────────────────────────────────────────────────────────
// Scopes
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_loop_isolation() {
    let (script, _) = meter(
        "(module (func (param i32)
           (nop)
           (loop (br_if 0 (get_local 0)) (drop (get_local 0)))
           (drop (get_local 0))))",
    );
    let body = body(&script, 0);
    // nop and the loop instruction are paid in the enclosing run
    assert_eq!(body[0], charge(0, cost("nop") + cost("loop")));
    let Expr::Loop { body: inner, .. } = &body[2] else {
        panic!("expected loop");
    };
    assert_eq!(inner[0], charge(0, cost("br_if") + cost("get_local")));
    assert_eq!(inner[2], charge(0, cost("drop") + cost("get_local")));
    // the loop's branch point splits the enclosing sequence after it
    assert_eq!(body[3], charge(0, cost("drop") + cost("get_local")));
}

#[test]
fn test_conditional_arm_independence() {
    let (script, _) = meter(
        "(module (func (param i32)
           (if (get_local 0) (drop (i32.const 1)) (drop (i32.const 2)))))",
    );
    let body = body(&script, 0);
    assert_eq!(body[0], charge(0, cost("get_local") + cost("if")));
    let Expr::If {
        then_arm, else_arm, ..
    } = &body[1]
    else {
        panic!("expected if");
    };
    let arm_cost = cost("drop") + cost("i32.const");
    let Expr::Then { body: then_body } = then_arm.as_ref() else {
        panic!("then arm not wrapped");
    };
    assert_eq!(then_body.len(), 2);
    assert_eq!(then_body[0], charge(0, arm_cost));
    let Some(Expr::Else { body: else_body }) = else_arm.as_deref() else {
        panic!("else arm not wrapped");
    };
    assert_eq!(else_body.len(), 2);
    assert_eq!(else_body[0], charge(0, arm_cost));
}

#[test]
fn test_branch_depth_inside_wrapped_arm_unchanged() {
    let (script, _) = meter(
        "(module (func (param i32)
           (block (if (get_local 0) (br 1)))))",
    );
    let Expr::Block { body: block, .. } = &body(&script, 0)[1] else {
        panic!("expected block");
    };
    let Expr::If { then_arm, .. } = &block[0] else {
        panic!("expected if");
    };
    assert_eq!(
        then_arm.as_ref(),
        &Expr::Then {
            body: vec![charge(0, cost("br")), Expr::br(1)]
        }
    );
}

// ─────────────────────────────────────────────────────────────────────
// Rejection
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_float_binop_rejected_without_changes() {
    let source = "(module
        (func (drop (i32.const 1)))
        (func (result f64) (f64.add (f64.const 1.5) (f64.const 2.5))))";
    let original = parse_ok(source);
    let mut script = original.clone();
    let err = inject(&mut script, &MeterConfig::default()).unwrap_err();
    assert_eq!(
        err,
        MeterError::DisallowedType {
            ty: ValueType::F64,
            instruction: "f64.add".into(),
        }
    );
    assert_eq!(script, original);
}

#[test]
fn test_float_load_rejected() {
    let mut script = parse_ok("(module (memory 1) (func (drop (f32.load (i32.const 0)))))");
    assert!(matches!(
        inject(&mut script, &MeterConfig::default()),
        Err(MeterError::DisallowedType { ty: ValueType::F32, .. })
    ));
}

#[test]
fn test_unsupported_instruction() {
    let mut table = wast_meter_metering::CostTable::default();
    table.set("nop", 1);
    let mut config = MeterConfig::new();
    config.set_cost_table(table);
    let mut script = parse_ok("(module (func (nop) (unreachable)))");
    assert_eq!(
        inject(&mut script, &config),
        Err(MeterError::UnsupportedInstruction("unreachable".into()))
    );
}

#[test]
fn test_narrow_store_priced_by_unsigned_key() {
    let table = wast_meter_metering::CostTable::from_json(
        r#"{ "i32.const": 1, "i32.store16_u": 7, "i64.const": 1, "i64.store32_u": 9 }"#,
    )
    .expect("table");
    let mut config = MeterConfig::new();
    config.set_cost_table(table);
    let mut script = parse_ok(
        "(module (func
            (i32.store16 (i32.const 0) (i32.const 1))
            (i64.store32 (i32.const 8) (i64.const 2))))",
    );
    inject(&mut script, &config).expect("inject");
    assert_eq!(charges(body(&script, 0), 0), vec![7 + 2 + 9 + 2]);
}

// ─────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_metering_is_deterministic() {
    let source = "(module (func (param i32)
        (loop (br_if 0 (get_local 0)))
        (if (get_local 0) (nop) (unreachable))))";
    let (first, first_report) = meter(source);
    for i in 0..50 {
        let (again, report) = meter(source);
        assert_eq!(first, again, "determinism failure at iteration {i}");
        assert_eq!(first_report, report);
    }
}

#[test]
fn test_custom_import_names() {
    let mut config = MeterConfig::new();
    config.set_import_module("env").set_import_field("gas");
    let mut script = parse_ok("(module (func (nop)))");
    inject(&mut script, &config).expect("inject");
    let import = script.modules[0].imports().next().expect("import");
    assert_eq!(import.module, "env");
    assert_eq!(import.field, "gas");
}
