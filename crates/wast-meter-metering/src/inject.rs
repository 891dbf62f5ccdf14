//! Structural insertions: charge calls and the host gas import.

use log::trace;
use wast_meter_types::ast::{
    Expr, FuncSig, Import, Literal, Local, Module, ModuleField, ValueType, Var,
};

use crate::config::MeterConfig;

/// `(call_import <gas_import> (i32.const <amount>))`
///
/// The amount is unsigned; it is carried as the `i32` with the same bits.
pub fn charge(gas_import: u32, amount: u32) -> Expr {
    Expr::CallImport {
        import: Var::Index(gas_import),
        args: vec![Expr::i32_const(amount as i32)],
    }
}

/// The charge amount carried by `expr`, if it is a charge for `gas_import`.
pub fn charge_amount(expr: &Expr, gas_import: u32) -> Option<u32> {
    match expr {
        Expr::CallImport {
            import: Var::Index(index),
            args,
        } if *index == gas_import => match args.as_slice() {
            [Expr::Const {
                ty: ValueType::I32,
                value: Literal::Int(value),
            }] => Some(*value as i32 as u32),
            _ => None,
        },
        _ => None,
    }
}

/// Insert a charge of `amount` at `index` in `body`.
pub fn insert_charge(body: &mut Vec<Expr>, index: usize, gas_import: u32, amount: u32) {
    trace!("charge {amount} at index {index}");
    body.insert(index, charge(gas_import, amount));
}

/// The host gas function: `(import "<module>" "<field>" (param i32))`.
pub fn gas_import(config: &MeterConfig) -> Import {
    Import {
        id: None,
        module: config.import_module().to_string(),
        field: config.import_field().to_string(),
        signature: FuncSig {
            params: vec![Local::new(ValueType::I32)],
            result: None,
        },
        span: Default::default(),
    }
}

/// Add the gas import to `module` and return its import index.
///
/// The import is placed after the module's existing imports, so its index
/// is the import count before insertion and no other index moves.
pub fn insert_import(module: &mut Module, config: &MeterConfig) -> u32 {
    let slot = module.import_count();
    let position = module
        .fields
        .iter()
        .rposition(|field| matches!(field, ModuleField::Import(_)))
        .map_or(0, |last| last + 1);
    module
        .fields
        .insert(position, ModuleField::Import(gas_import(config)));
    slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use wast_meter_types::ast::Func;

    fn func() -> ModuleField {
        ModuleField::Func(Func {
            id: None,
            export: None,
            signature: FuncSig::default(),
            locals: vec![],
            body: vec![],
            span: Default::default(),
        })
    }

    fn import(field: &str) -> ModuleField {
        ModuleField::Import(Import {
            id: None,
            module: "env".into(),
            field: field.into(),
            signature: FuncSig::default(),
            span: Default::default(),
        })
    }

    #[test]
    fn test_charge_shape() {
        assert_eq!(
            charge(2, 17),
            Expr::CallImport {
                import: Var::Index(2),
                args: vec![Expr::i32_const(17)],
            }
        );
    }

    #[test]
    fn test_large_amount_keeps_its_bits() {
        let expr = charge(0, u32::MAX);
        assert_eq!(expr, Expr::CallImport {
            import: Var::Index(0),
            args: vec![Expr::i32_const(-1)],
        });
        assert_eq!(charge_amount(&expr, 0), Some(u32::MAX));
        assert_eq!(charge_amount(&expr, 1), None);
    }

    #[test]
    fn test_insert_charge_at_index() {
        let mut body = vec![Expr::Nop, Expr::Unreachable];
        insert_charge(&mut body, 1, 0, 5);
        assert_eq!(body, vec![Expr::Nop, charge(0, 5), Expr::Unreachable]);
    }

    #[test]
    fn test_import_into_empty_module() {
        let mut module = Module::default();
        let slot = insert_import(&mut module, &MeterConfig::default());
        assert_eq!(slot, 0);
        let ModuleField::Import(import) = &module.fields[0] else {
            panic!("expected import");
        };
        assert_eq!(import.module, "ethereum");
        assert_eq!(import.field, "useGas");
        assert_eq!(import.signature.params, vec![Local::new(ValueType::I32)]);
        assert_eq!(import.signature.result, None);
    }

    #[test]
    fn test_import_goes_after_existing_imports() {
        let mut module = Module {
            fields: vec![import("a"), import("b"), func()],
            ..Module::default()
        };
        let slot = insert_import(&mut module, &MeterConfig::default());
        assert_eq!(slot, 2);
        assert_eq!(module.import_count(), 3);
        assert!(matches!(&module.fields[2], ModuleField::Import(i) if i.field == "useGas"));
        assert!(matches!(module.fields[3], ModuleField::Func(_)));
    }

    #[test]
    fn test_import_uses_configured_names() {
        let mut config = MeterConfig::new();
        config.set_import_module("env").set_import_field("charge");
        let import = gas_import(&config);
        assert_eq!(import.module, "env");
        assert_eq!(import.field, "charge");
    }
}
