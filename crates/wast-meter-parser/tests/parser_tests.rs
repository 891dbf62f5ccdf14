//! Parser tests: module fields, folded expressions, literals and error
//! recovery.

use wast_meter_parser::{parse_source, ParseResult};
use wast_meter_types::ast::*;
use wast_meter_types::{ErrorCode, SourceFile};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

fn parse(source: &str) -> ParseResult {
    let sf = SourceFile::new("test.wast", source);
    parse_source(&sf)
}

/// Parse source and return the script, panicking if there are errors.
fn parse_ok(source: &str) -> Script {
    let result = parse(source);
    if result.errors.has_errors() {
        for e in &result.errors.errors {
            eprintln!("  ERROR: {} ({})", e.message, e.code);
        }
        panic!("unexpected parse errors (see above)");
    }
    result.script.expect("no script returned")
}

fn error_codes(source: &str) -> Vec<ErrorCode> {
    parse(source).errors.errors.iter().map(|e| e.code).collect()
}

/// Parse one function body and return its statements.
fn body(exprs: &str) -> Vec<Expr> {
    let script = parse_ok(&format!("(module (func {exprs}))"));
    let func = script.modules[0].funcs().next().expect("no func");
    func.body.clone()
}

fn expr(text: &str) -> Expr {
    let mut exprs = body(text);
    assert_eq!(exprs.len(), 1, "expected a single expression");
    exprs.remove(0)
}

// ─────────────────────────────────────────────────────────────────────
// Module fields
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_empty_module() {
    let script = parse_ok("(module)");
    assert_eq!(script.modules.len(), 1);
    assert!(script.modules[0].fields.is_empty());
    assert_eq!(script.modules[0].id, None);
}

#[test]
fn test_several_modules() {
    let script = parse_ok("(module $a) (module $b (func))");
    assert_eq!(script.modules.len(), 2);
    assert_eq!(script.modules[0].id.as_deref(), Some("a"));
    assert_eq!(script.modules[1].fields.len(), 1);
}

#[test]
fn test_bare_fields_form_implicit_module() {
    let script = parse_ok("(func $f) (export \"f\" $f)");
    assert_eq!(script.modules.len(), 1);
    assert_eq!(script.modules[0].fields.len(), 2);
}

#[test]
fn test_import_with_inline_signature() {
    let script = parse_ok(r#"(module (import $print "env" "print" (param i32 i64) (result i32)))"#);
    let import = script.modules[0].imports().next().expect("no import");
    assert_eq!(import.id.as_deref(), Some("print"));
    assert_eq!(import.module, "env");
    assert_eq!(import.field, "print");
    assert_eq!(
        import.signature.params,
        vec![Local::new(ValueType::I32), Local::new(ValueType::I64)]
    );
    assert_eq!(import.signature.result, Some(ValueType::I32));
}

#[test]
fn test_import_with_func_descriptor() {
    let script = parse_ok(r#"(module (import "ethereum" "useGas" (func $gas (param i32))))"#);
    let import = script.modules[0].imports().next().expect("no import");
    assert_eq!(import.id.as_deref(), Some("gas"));
    assert_eq!(import.signature.params, vec![Local::new(ValueType::I32)]);
    assert_eq!(import.signature.result, None);
}

#[test]
fn test_func_header() {
    let script = parse_ok(
        r#"(module (func $add (export "add") (param $a i32) (param $b i32) (result i32)
             (local i64 i64) (local $t i32)
             (i32.add (get_local $a) (get_local $b))))"#,
    );
    let func = script.modules[0].funcs().next().expect("no func");
    assert_eq!(func.id.as_deref(), Some("add"));
    assert_eq!(func.export.as_deref(), Some("add"));
    assert_eq!(
        func.signature.params,
        vec![Local::named("a", ValueType::I32), Local::named("b", ValueType::I32)]
    );
    assert_eq!(func.signature.result, Some(ValueType::I32));
    assert_eq!(func.locals.len(), 3);
    assert_eq!(func.locals[2], Local::named("t", ValueType::I32));
    assert_eq!(func.body.len(), 1);
}

#[test]
fn test_export_memory_and_start() {
    let script = parse_ok(
        r#"(module (func $main) (export "main" (func $main)) (export "m" 0) (memory 1 2) (start $main))"#,
    );
    let fields = &script.modules[0].fields;
    assert!(matches!(&fields[1], ModuleField::Export(e) if e.func == Var::Name("main".into())));
    assert!(matches!(&fields[2], ModuleField::Export(e) if e.func == Var::Index(0)));
    assert!(matches!(&fields[3], ModuleField::Memory(m) if m.initial == 1 && m.maximum == Some(2)));
    assert!(matches!(&fields[4], ModuleField::Start(s) if s.func == Var::Name("main".into())));
}

#[test]
fn test_field_spans_cover_the_form() {
    let script = parse_ok("(module\n  (func $f\n    (nop)))");
    let func = script.modules[0].funcs().next().expect("no func");
    assert_eq!(func.span.line, 2);
    assert_eq!(func.span.column, 3);
    assert_eq!(func.span.end_line, 3);
}

// ─────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_nullary_instructions() {
    assert_eq!(
        body("(nop) (unreachable) (current_memory)"),
        vec![Expr::Nop, Expr::Unreachable, Expr::CurrentMemory]
    );
}

#[test]
fn test_block_and_loop() {
    assert_eq!(
        expr("(block $exit (result i32) (i32.const 1))"),
        Expr::Block {
            label: Some("exit".into()),
            result: Some(ValueType::I32),
            body: vec![Expr::i32_const(1)],
        }
    );
    assert_eq!(expr("(loop (br 0))"), Expr::loop_(vec![Expr::br(0)]));
}

#[test]
fn test_if_with_then_and_else_forms() {
    let parsed = expr("(if (get_local 0) (then (nop) (nop)) (else (unreachable)))");
    assert_eq!(
        parsed,
        Expr::If {
            result: None,
            test: Box::new(Expr::local(0)),
            then_arm: Box::new(Expr::Then {
                body: vec![Expr::Nop, Expr::Nop]
            }),
            else_arm: Some(Box::new(Expr::Else {
                body: vec![Expr::Unreachable]
            })),
        }
    );
}

#[test]
fn test_if_with_bare_arms() {
    let parsed = expr("(if (result i32) (get_local 0) (i32.const 1) (i32.const 2))");
    let Expr::If {
        result,
        then_arm,
        else_arm,
        ..
    } = parsed
    else {
        panic!("expected if");
    };
    assert_eq!(result, Some(ValueType::I32));
    assert_eq!(*then_arm, Expr::i32_const(1));
    assert_eq!(else_arm.as_deref(), Some(&Expr::i32_const(2)));
}

#[test]
fn test_if_without_else() {
    let parsed = expr("(if (get_local 0) (br 0))");
    assert!(matches!(parsed, Expr::If { else_arm: None, .. }));
}

#[test]
fn test_br_if_with_and_without_value() {
    assert_eq!(expr("(br_if 1 (get_local 0))"), Expr::br_if(1, Expr::local(0)));
    assert_eq!(
        expr("(br_if $l (i32.const 7) (get_local 0))"),
        Expr::BrIf {
            label: Var::Name("l".into()),
            value: Some(Box::new(Expr::i32_const(7))),
            test: Box::new(Expr::local(0)),
        }
    );
}

#[test]
fn test_calls() {
    assert_eq!(
        expr("(call $f (i32.const 1) (i32.const 2))"),
        Expr::Call {
            func: Var::Name("f".into()),
            args: vec![Expr::i32_const(1), Expr::i32_const(2)],
        }
    );
    assert_eq!(
        expr("(call_import 0 (i32.const 5))"),
        Expr::CallImport {
            import: Var::Index(0),
            args: vec![Expr::i32_const(5)],
        }
    );
}

#[test]
fn test_locals_select_drop_and_memory() {
    assert!(matches!(expr("(set_local $x (i32.const 1))"), Expr::SetLocal { .. }));
    assert!(matches!(expr("(tee_local 0 (i32.const 1))"), Expr::TeeLocal { .. }));
    assert!(matches!(
        expr("(select (i32.const 1) (i32.const 2) (get_local 0))"),
        Expr::Select { .. }
    ));
    assert!(matches!(expr("(drop (i32.const 1))"), Expr::Drop { .. }));
    assert!(matches!(expr("(grow_memory (i32.const 1))"), Expr::GrowMemory { .. }));
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(
        expr("(i64.mul (get_local 0) (i64.const 3))"),
        Expr::binop(ValueType::I64, BinaryOp::Mul, Expr::local(0), Expr::i64_const(3))
    );
    assert!(matches!(
        expr("(i32.eqz (get_local 0))"),
        Expr::Unop { op: UnaryOp::Eqz, .. }
    ));
    assert!(matches!(
        expr("(i32.lt_u (get_local 0) (get_local 1))"),
        Expr::Relop { op: RelOp::LtU, .. }
    ));
}

#[test]
fn test_conversion() {
    assert_eq!(
        expr("(i64.extend_u/i32 (get_local 0))"),
        Expr::Cvtop {
            ty: ValueType::I64,
            op: ConvertOp::ExtendU,
            from: ValueType::I32,
            operand: Box::new(Expr::local(0)),
        }
    );
}

#[test]
fn test_loads_and_stores() {
    assert_eq!(
        expr("(i64.load16_s offset=8 align=2 (get_local 0))"),
        Expr::Load {
            ty: ValueType::I64,
            size: Some(16),
            signed: true,
            offset: 8,
            align: Some(2),
            addr: Box::new(Expr::local(0)),
        }
    );
    assert_eq!(
        expr("(i32.store8 (get_local 0) (i32.const 255))"),
        Expr::Store {
            ty: ValueType::I32,
            size: Some(8),
            signed: false,
            offset: 0,
            align: None,
            addr: Box::new(Expr::local(0)),
            value: Box::new(Expr::i32_const(255)),
        }
    );
}

#[test]
fn test_const_literals() {
    assert_eq!(expr("(i32.const 0xffffffff)"), Expr::i32_const(-1));
    assert_eq!(expr("(i64.const -9223372036854775808)"), Expr::i64_const(i64::MIN));
    assert_eq!(
        expr("(f64.const 1.5)"),
        Expr::Const {
            ty: ValueType::F64,
            value: Literal::Float(1.5),
        }
    );
    assert_eq!(
        expr("(f32.const 2)"),
        Expr::Const {
            ty: ValueType::F32,
            value: Literal::Float(2.0),
        }
    );
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_instruction() {
    assert_eq!(
        error_codes("(module (func (i32.frobnicate (nop))))"),
        vec![ErrorCode::UNKNOWN_INSTRUCTION]
    );
    assert_eq!(error_codes("(module (func (jump 0)))"), vec![ErrorCode::UNKNOWN_INSTRUCTION]);
}

#[test]
fn test_unknown_type() {
    assert_eq!(
        error_codes("(module (func (param v128)))"),
        vec![ErrorCode::UNKNOWN_TYPE]
    );
    assert_eq!(
        error_codes("(module (func (u8.const 1)))"),
        vec![ErrorCode::UNKNOWN_TYPE]
    );
}

#[test]
fn test_out_of_range_literal() {
    assert_eq!(
        error_codes("(module (func (i32.const 4294967296)))"),
        vec![ErrorCode::INVALID_LITERAL]
    );
    assert_eq!(
        error_codes("(module (func (i32.const 1.5)))"),
        vec![ErrorCode::INVALID_LITERAL]
    );
}

#[test]
fn test_unknown_field() {
    assert_eq!(
        error_codes("(module (table 0 anyfunc))"),
        vec![ErrorCode::UNKNOWN_FIELD]
    );
}

#[test]
fn test_memory_maximum_below_initial() {
    assert_eq!(
        error_codes("(module (memory 4 2))"),
        vec![ErrorCode::MALFORMED_MODULE]
    );
}

#[test]
fn test_errors_yield_no_script() {
    let result = parse("(module (func (bogus)))");
    assert!(result.script.is_none());
    assert_eq!(result.errors.total_errors, 1);
}

#[test]
fn test_recovery_reports_sibling_errors() {
    let codes = error_codes(
        "(module
           (func (bogus_one) (nop))
           (func (i32.const 1.5))
           (table))",
    );
    assert_eq!(
        codes,
        vec![
            ErrorCode::UNKNOWN_INSTRUCTION,
            ErrorCode::INVALID_LITERAL,
            ErrorCode::UNKNOWN_FIELD,
        ]
    );
}

#[test]
fn test_unclosed_module() {
    assert_eq!(error_codes("(module (func)"), vec![ErrorCode::UNEXPECTED_TOKEN]);
}

#[test]
fn test_lexer_errors_are_merged() {
    let result = parse("(module \"open");
    assert!(result.script.is_none());
    assert_eq!(result.errors.errors[0].code, ErrorCode::UNTERMINATED);
}
