//! Value types and the function type registry.

use wasm_encoder::{TypeSection, ValType};
use wast_meter_types::ast::{FuncSig, ValueType};

pub fn val_type(ty: ValueType) -> ValType {
    match ty {
        ValueType::I32 => ValType::I32,
        ValueType::I64 => ValType::I64,
        ValueType::F32 => ValType::F32,
        ValueType::F64 => ValType::F64,
    }
}

/// Deduplicated function types, in first-use order.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<(Vec<ValType>, Vec<ValType>)>,
}

impl TypeRegistry {
    /// Type index of `sig`, registering it on first use.
    pub fn index_of(&mut self, sig: &FuncSig) -> u32 {
        let params: Vec<ValType> = sig.params.iter().map(|p| val_type(p.ty)).collect();
        let results: Vec<ValType> = sig.result.map(val_type).into_iter().collect();
        let key = (params, results);
        match self.types.iter().position(|existing| *existing == key) {
            Some(index) => index as u32,
            None => {
                self.types.push(key);
                (self.types.len() - 1) as u32
            }
        }
    }

    pub fn emit(&self) -> TypeSection {
        let mut section = TypeSection::new();
        for (params, results) in &self.types {
            section
                .ty()
                .function(params.iter().copied(), results.iter().copied());
        }
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wast_meter_types::ast::Local;

    #[test]
    fn test_types_are_deduplicated() {
        let mut registry = TypeRegistry::default();
        let gas = FuncSig {
            params: vec![Local::new(ValueType::I32)],
            result: None,
        };
        let unit = FuncSig::default();
        assert_eq!(registry.index_of(&gas), 0);
        assert_eq!(registry.index_of(&unit), 1);
        assert_eq!(registry.index_of(&gas), 0);
        let named = FuncSig {
            params: vec![Local::named("amount", ValueType::I32)],
            result: None,
        };
        assert_eq!(registry.index_of(&named), 0);
    }
}
