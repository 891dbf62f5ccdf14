//! Folded text-format printer.
//!
//! Every composite expression opens on its own line and closes after its
//! last child, so nesting reads like the source the parser accepts:
//!
//! ```text
//! (module
//!   (import "ethereum" "useGas" (param i32))
//!   (func $f (param i32) (result i32)
//!     (i32.add
//!       (get_local 0)
//!       (i32.const 1))))
//! ```

use wast_meter_types::ast::*;

/// Print `script` in the folded text format, indenting each nesting level
/// by `spacing` spaces.
pub fn generate(script: &Script, spacing: usize) -> String {
    let mut printer = Printer {
        out: String::with_capacity(1024),
        spacing,
    };
    for module in &script.modules {
        printer.module(module);
    }
    printer.out
}

struct Printer {
    out: String,
    spacing: usize,
}

impl Printer {
    fn line(&mut self, depth: usize, text: &str) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.extend(std::iter::repeat(' ').take(depth * self.spacing));
        self.out.push_str(text);
    }

    fn module(&mut self, module: &Module) {
        let mut head = String::from("(module");
        if let Some(id) = &module.id {
            head.push_str(&format!(" ${id}"));
        }
        self.line(0, &head);
        for field in &module.fields {
            self.field(field);
        }
        self.out.push(')');
    }

    fn field(&mut self, field: &ModuleField) {
        match field {
            ModuleField::Import(import) => {
                let mut head = String::from("(import");
                if let Some(id) = &import.id {
                    head.push_str(&format!(" ${id}"));
                }
                head.push_str(&format!(
                    " {} {}",
                    quote(&import.module),
                    quote(&import.field)
                ));
                push_signature(&mut head, &import.signature);
                head.push(')');
                self.line(1, &head);
            }
            ModuleField::Func(func) => {
                let mut head = String::from("(func");
                if let Some(id) = &func.id {
                    head.push_str(&format!(" ${id}"));
                }
                if let Some(name) = &func.export {
                    head.push_str(&format!(" (export {})", quote(name)));
                }
                push_signature(&mut head, &func.signature);
                for local in &func.locals {
                    push_value(&mut head, "local", local);
                }
                self.line(1, &head);
                for expr in &func.body {
                    self.expr(expr, 2);
                }
                self.out.push(')');
            }
            ModuleField::Export(export) => {
                self.line(1, &format!("(export {} {})", quote(&export.name), export.func));
            }
            ModuleField::Memory(memory) => {
                let text = match memory.maximum {
                    Some(maximum) => format!("(memory {} {maximum})", memory.initial),
                    None => format!("(memory {})", memory.initial),
                };
                self.line(1, &text);
            }
            ModuleField::Start(start) => {
                self.line(1, &format!("(start {})", start.func));
            }
        }
    }

    fn expr(&mut self, expr: &Expr, depth: usize) {
        self.line(depth, &format!("({}", head(expr)));
        for child in expr.children() {
            self.expr(child, depth + 1);
        }
        self.out.push(')');
    }
}

fn push_signature(out: &mut String, signature: &FuncSig) {
    for param in &signature.params {
        push_value(out, "param", param);
    }
    if let Some(result) = signature.result {
        out.push_str(&format!(" (result {result})"));
    }
}

fn push_value(out: &mut String, keyword: &str, local: &Local) {
    match &local.id {
        Some(id) => out.push_str(&format!(" ({keyword} ${id} {})", local.ty)),
        None => out.push_str(&format!(" ({keyword} {})", local.ty)),
    }
}

/// Instruction text up to, not including, the operands.
fn head(expr: &Expr) -> String {
    match expr {
        Expr::Block { label, result, .. } | Expr::Loop { label, result, .. } => {
            let mut head = expr.kind_name().to_string();
            if let Some(label) = label {
                head.push_str(&format!(" ${label}"));
            }
            if let Some(result) = result {
                head.push_str(&format!(" (result {result})"));
            }
            head
        }
        Expr::If {
            result: Some(result),
            ..
        } => format!("if (result {result})"),
        Expr::Br { label, .. } | Expr::BrIf { label, .. } => {
            format!("{} {label}", expr.kind_name())
        }
        Expr::Call { func: var, .. }
        | Expr::CallImport { import: var, .. }
        | Expr::GetLocal { local: var }
        | Expr::SetLocal { local: var, .. }
        | Expr::TeeLocal { local: var, .. } => format!("{} {var}", expr.kind_name()),
        Expr::Const { ty, value } => format!("{ty}.const {value}"),
        Expr::Unop { ty, op, .. } => format!("{ty}.{op}"),
        Expr::Binop { ty, op, .. } => format!("{ty}.{op}"),
        Expr::Relop { ty, op, .. } => format!("{ty}.{op}"),
        Expr::Cvtop { ty, op, from, .. } => format!("{ty}.{op}/{from}"),
        Expr::Load {
            ty,
            size,
            signed,
            offset,
            align,
            ..
        } => {
            let mut head = format!("{ty}.load");
            if let Some(size) = size {
                let sign = if *signed { "s" } else { "u" };
                head.push_str(&format!("{size}_{sign}"));
            }
            push_memarg(&mut head, *offset, *align);
            head
        }
        Expr::Store {
            ty,
            size,
            offset,
            align,
            ..
        } => {
            let mut head = format!("{ty}.store");
            if let Some(size) = size {
                head.push_str(&size.to_string());
            }
            push_memarg(&mut head, *offset, *align);
            head
        }
        other => other.kind_name().to_string(),
    }
}

fn push_memarg(head: &mut String, offset: u32, align: Option<u32>) {
    if offset != 0 {
        head.push_str(&format!(" offset={offset}"));
    }
    if let Some(align) = align {
        head.push_str(&format!(" align={align}"));
    }
}

/// A string literal the lexer reads back unchanged.
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c if c.is_ascii_control() => quoted.push_str(&format!("\\{:02x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(fields: Vec<ModuleField>) -> Script {
        Script {
            modules: vec![Module {
                fields,
                ..Module::default()
            }],
        }
    }

    fn func(body: Vec<Expr>) -> ModuleField {
        ModuleField::Func(Func {
            id: Some("f".into()),
            export: Some("main".into()),
            signature: FuncSig {
                params: vec![Local::named("a", ValueType::I32), Local::new(ValueType::I64)],
                result: Some(ValueType::I32),
            },
            locals: vec![Local::new(ValueType::I32)],
            body,
            span: Default::default(),
        })
    }

    #[test]
    fn test_nested_layout() {
        let body = vec![Expr::binop(
            ValueType::I32,
            BinaryOp::Add,
            Expr::local(0),
            Expr::i32_const(-1),
        )];
        assert_eq!(
            generate(&script(vec![func(body)]), 2),
            "(module\n  (func $f (export \"main\") (param $a i32) (param i64) (result i32) (local i32)\n    (i32.add\n      (get_local 0)\n      (i32.const -1))))"
        );
    }

    #[test]
    fn test_spacing() {
        let text = generate(&script(vec![func(vec![Expr::Nop])]), 4);
        assert!(text.contains("\n        (nop)"), "{text}");
    }

    #[test]
    fn test_memory_access_heads() {
        let load = Expr::Load {
            ty: ValueType::I64,
            size: Some(8),
            signed: true,
            offset: 16,
            align: Some(1),
            addr: Box::new(Expr::i32_const(0)),
        };
        assert_eq!(head(&load), "i64.load8_s offset=16 align=1");
        let store = Expr::Store {
            ty: ValueType::I32,
            size: None,
            signed: false,
            offset: 0,
            align: None,
            addr: Box::new(Expr::i32_const(0)),
            value: Box::new(Expr::i32_const(1)),
        };
        assert_eq!(head(&store), "i32.store");
    }

    #[test]
    fn test_control_heads() {
        let block = Expr::Block {
            label: Some("exit".into()),
            result: Some(ValueType::I64),
            body: vec![],
        };
        assert_eq!(head(&block), "block $exit (result i64)");
        assert_eq!(head(&Expr::br(1)), "br 1");
        let call = Expr::CallImport {
            import: Var::Name("gas".into()),
            args: vec![],
        };
        assert_eq!(head(&call), "call_import $gas");
        let cvt = Expr::Cvtop {
            ty: ValueType::I64,
            op: ConvertOp::ExtendU,
            from: ValueType::I32,
            operand: Box::new(Expr::local(0)),
        };
        assert_eq!(head(&cvt), "i64.extend_u/i32");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("useGas"), "\"useGas\"");
        assert_eq!(quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\01\"");
    }

    #[test]
    fn test_module_fields() {
        let text = generate(
            &script(vec![
                ModuleField::Import(Import {
                    id: Some("log".into()),
                    module: "env".into(),
                    field: "log".into(),
                    signature: FuncSig {
                        params: vec![Local::new(ValueType::I32)],
                        result: None,
                    },
                    span: Default::default(),
                }),
                ModuleField::Memory(Memory {
                    initial: 1,
                    maximum: Some(2),
                    span: Default::default(),
                }),
                ModuleField::Export(Export {
                    name: "run".into(),
                    func: Var::Index(0),
                    span: Default::default(),
                }),
                ModuleField::Start(Start {
                    func: Var::Name("main".into()),
                    span: Default::default(),
                }),
            ]),
            2,
        );
        assert_eq!(
            text,
            "(module\n  (import $log \"env\" \"log\" (param i32))\n  (memory 1 2)\n  (export \"run\" 0)\n  (start $main))"
        );
    }
}
