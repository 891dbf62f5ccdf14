//! Binary module assembler.
//!
//! Lowers one text-format [`Module`] to a `.wasm` binary:
//! 1. Collect import and function names
//! 2. Register function types
//! 3. Emit bodies, resolving names to indices
//! 4. Assemble sections in binary order
//! 5. Validate with `wasmparser`

use std::collections::HashMap;

use log::debug;
use wasm_encoder::{
    CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection,
    ImportSection, MemorySection, MemoryType, Module as WasmModule, StartSection, ValType,
};
use wast_meter_types::ast::*;

use crate::error::{CodegenError, CodegenResult};
use crate::expr::{emit_body, resolve, FuncContext};
use crate::types::{val_type, TypeRegistry};

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Encode `module` as a validated `.wasm` binary.
pub fn encode(module: &Module) -> CodegenResult<Vec<u8>> {
    Assembler::new(module).assemble()
}

// ══════════════════════════════════════════════════════════════════════════════
// Assembler
// ══════════════════════════════════════════════════════════════════════════════

struct Assembler<'a> {
    module: &'a Module,
    types: TypeRegistry,
    /// Import name → import index.
    import_names: HashMap<String, u32>,
    /// Function name → position among defined functions.
    func_names: HashMap<String, u32>,
    import_count: u32,
    func_count: u32,
}

impl<'a> Assembler<'a> {
    fn new(module: &'a Module) -> Self {
        let mut import_names = HashMap::new();
        for (index, import) in module.imports().enumerate() {
            if let Some(id) = &import.id {
                import_names.entry(id.clone()).or_insert(index as u32);
            }
        }
        let mut func_names = HashMap::new();
        for (position, func) in module.funcs().enumerate() {
            if let Some(id) = &func.id {
                func_names.entry(id.clone()).or_insert(position as u32);
            }
        }
        Self {
            module,
            types: TypeRegistry::default(),
            import_count: module.import_count(),
            func_count: module.funcs().count() as u32,
            import_names,
            func_names,
        }
    }

    fn assemble(&mut self) -> CodegenResult<Vec<u8>> {
        let imports = self.emit_imports();
        let (functions, code) = self.emit_functions()?;
        let memory = self.emit_memory()?;
        let exports = self.emit_exports()?;
        let start = self.emit_start()?;

        let mut wasm = WasmModule::new();
        wasm.section(&self.types.emit());
        wasm.section(&imports);
        wasm.section(&functions);
        if let Some(memory) = &memory {
            wasm.section(memory);
        }
        wasm.section(&exports);
        if let Some(start) = &start {
            wasm.section(start);
        }
        wasm.section(&code);

        let wasm_bytes = wasm.finish();
        debug!(
            "encoded {} imports and {} functions into {} bytes",
            self.import_count,
            self.func_count,
            wasm_bytes.len()
        );

        wasmparser::validate(&wasm_bytes)
            .map_err(|e| CodegenError::ValidationFailed(format!("{e}")))?;

        Ok(wasm_bytes)
    }

    // ── Import section ───────────────────────────────────────────────────

    fn emit_imports(&mut self) -> ImportSection {
        let module = self.module;
        let mut section = ImportSection::new();
        for import in module.imports() {
            let ty = self.types.index_of(&import.signature);
            section.import(&import.module, &import.field, EntityType::Function(ty));
        }
        section
    }

    // ── Function + code sections ─────────────────────────────────────────

    fn emit_functions(&mut self) -> CodegenResult<(FunctionSection, CodeSection)> {
        let mut functions = FunctionSection::new();
        let mut code = CodeSection::new();
        let module = self.module;
        for func in module.funcs() {
            functions.function(self.types.index_of(&func.signature));

            let mut ctx = FuncContext::new(
                &self.import_names,
                &self.func_names,
                self.import_count,
                self.func_count,
            );
            for local in func.signature.params.iter().chain(&func.locals) {
                ctx.declare_local(local);
            }

            let mut body = Function::new(local_groups(&func.locals));
            emit_body(&mut ctx, &mut body, &func.body)?;
            code.function(&body);
        }
        Ok((functions, code))
    }

    // ── Memory section ───────────────────────────────────────────────────

    fn emit_memory(&self) -> CodegenResult<Option<MemorySection>> {
        let mut memories = self.module.fields.iter().filter_map(|field| match field {
            ModuleField::Memory(memory) => Some(memory),
            _ => None,
        });
        let Some(memory) = memories.next() else {
            return Ok(None);
        };
        if memories.next().is_some() {
            return Err(CodegenError::Unsupported("more than one memory".into()));
        }
        let mut section = MemorySection::new();
        section.memory(MemoryType {
            minimum: u64::from(memory.initial),
            maximum: memory.maximum.map(u64::from),
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        Ok(Some(section))
    }

    // ── Export section ───────────────────────────────────────────────────

    fn emit_exports(&self) -> CodegenResult<ExportSection> {
        let mut section = ExportSection::new();
        for (position, func) in self.module.funcs().enumerate() {
            if let Some(name) = &func.export {
                section.export(name, ExportKind::Func, self.import_count + position as u32);
            }
        }
        for field in &self.module.fields {
            if let ModuleField::Export(export) = field {
                section.export(&export.name, ExportKind::Func, self.func_index(&export.func)?);
            }
        }
        Ok(section)
    }

    // ── Start section ────────────────────────────────────────────────────

    fn emit_start(&self) -> CodegenResult<Option<StartSection>> {
        let mut starts = self.module.fields.iter().filter_map(|field| match field {
            ModuleField::Start(start) => Some(start),
            _ => None,
        });
        let Some(start) = starts.next() else {
            return Ok(None);
        };
        if starts.next().is_some() {
            return Err(CodegenError::Unsupported("more than one start function".into()));
        }
        Ok(Some(StartSection {
            function_index: self.func_index(&start.func)?,
        }))
    }

    /// Binary function index of a defined function reference.
    fn func_index(&self, var: &Var) -> CodegenResult<u32> {
        let position = resolve(var, &self.func_names, self.func_count, "function")?;
        Ok(self.import_count + position)
    }
}

/// Run-length groups of declared locals, as the code section stores them.
fn local_groups(locals: &[Local]) -> Vec<(u32, ValType)> {
    let mut groups: Vec<(u32, ValType)> = Vec::new();
    for local in locals {
        let ty = val_type(local.ty);
        match groups.last_mut() {
            Some((count, last)) if *last == ty => *count += 1,
            _ => groups.push((1, ty)),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_groups() {
        let locals = vec![
            Local::new(ValueType::I32),
            Local::named("a", ValueType::I32),
            Local::new(ValueType::I64),
            Local::new(ValueType::I32),
        ];
        assert_eq!(
            local_groups(&locals),
            vec![(2, ValType::I32), (1, ValType::I64), (1, ValType::I32)]
        );
    }

    #[test]
    fn test_empty_module_encodes() {
        let bytes = encode(&Module::default()).expect("encode");
        assert_eq!(&bytes[..4], b"\0asm");
    }
}
