//! Expression code generation.
//!
//! Folded expressions are emitted in post-order: operands first, then the
//! instruction. Structured control (`block`, `loop`, `if`) brackets its
//! body and pushes a label frame for branch-depth resolution.

use std::collections::HashMap;

use wasm_encoder::{BlockType, Function, Instruction, MemArg};
use wast_meter_types::ast::*;

use crate::error::{CodegenError, CodegenResult};
use crate::types::val_type;

/// Names and indices visible to one function body.
pub struct FuncContext<'m> {
    /// Import name → import index.
    pub imports: &'m HashMap<String, u32>,
    /// Function name → position among defined functions.
    pub funcs: &'m HashMap<String, u32>,
    pub import_count: u32,
    pub func_count: u32,
    /// Local name → local index (params first).
    pub locals: HashMap<String, u32>,
    pub local_count: u32,
    /// Enclosing labels, innermost last.
    labels: Vec<Option<String>>,
}

impl<'m> FuncContext<'m> {
    pub fn new(
        imports: &'m HashMap<String, u32>,
        funcs: &'m HashMap<String, u32>,
        import_count: u32,
        func_count: u32,
    ) -> Self {
        Self {
            imports,
            funcs,
            import_count,
            func_count,
            locals: HashMap::new(),
            local_count: 0,
            labels: Vec::new(),
        }
    }

    /// Declare the next local, optionally named.
    pub fn declare_local(&mut self, local: &Local) {
        if let Some(id) = &local.id {
            self.locals.insert(id.clone(), self.local_count);
        }
        self.local_count += 1;
    }

    fn local(&self, var: &Var) -> CodegenResult<u32> {
        resolve(var, &self.locals, self.local_count, "local")
    }

    /// Binary function index of a defined function.
    fn func(&self, var: &Var) -> CodegenResult<u32> {
        Ok(self.import_count + resolve(var, self.funcs, self.func_count, "function")?)
    }

    fn import(&self, var: &Var) -> CodegenResult<u32> {
        resolve(var, self.imports, self.import_count, "import")
    }

    /// Relative branch depth of `label`.
    fn depth(&self, label: &Var) -> CodegenResult<u32> {
        match label {
            Var::Index(depth) if (*depth as usize) < self.labels.len() => Ok(*depth),
            Var::Name(name) => self
                .labels
                .iter()
                .rev()
                .position(|l| l.as_deref() == Some(name.as_str()))
                .map(|depth| depth as u32)
                .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("label ${name}"))),
            Var::Index(depth) => Err(CodegenError::UnresolvedSymbol(format!(
                "branch depth {depth} exceeds nesting {}",
                self.labels.len()
            ))),
        }
    }
}

/// Resolve a name or index in one index space of `count` entries.
pub fn resolve(
    var: &Var,
    names: &HashMap<String, u32>,
    count: u32,
    space: &str,
) -> CodegenResult<u32> {
    match var {
        Var::Index(index) if *index < count => Ok(*index),
        Var::Index(index) => Err(CodegenError::UnresolvedSymbol(format!(
            "{space} index {index} out of range ({count} defined)"
        ))),
        Var::Name(name) => names
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol(format!("{space} ${name}"))),
    }
}

fn block_type(result: Option<ValueType>) -> BlockType {
    match result {
        Some(ty) => BlockType::Result(val_type(ty)),
        None => BlockType::Empty,
    }
}

/// Emit a function body's statements followed by the final `end`.
pub fn emit_body(ctx: &mut FuncContext<'_>, f: &mut Function, body: &[Expr]) -> CodegenResult<()> {
    // the function body is itself a branch target
    ctx.labels.push(None);
    emit_seq(ctx, f, body)?;
    ctx.labels.pop();
    f.instruction(&Instruction::End);
    Ok(())
}

fn emit_seq(ctx: &mut FuncContext<'_>, f: &mut Function, body: &[Expr]) -> CodegenResult<()> {
    for expr in body {
        emit_expr(ctx, f, expr)?;
    }
    Ok(())
}

fn emit_labeled(
    ctx: &mut FuncContext<'_>,
    f: &mut Function,
    label: Option<&String>,
    body: &[Expr],
) -> CodegenResult<()> {
    ctx.labels.push(label.cloned());
    let result = emit_seq(ctx, f, body);
    ctx.labels.pop();
    result?;
    f.instruction(&Instruction::End);
    Ok(())
}

/// An `if` arm: the statements of a `then`/`else` wrapper, or one bare
/// expression.
fn emit_arm(ctx: &mut FuncContext<'_>, f: &mut Function, arm: &Expr) -> CodegenResult<()> {
    match arm {
        Expr::Then { body } | Expr::Else { body } => emit_seq(ctx, f, body),
        other => emit_expr(ctx, f, other),
    }
}

fn emit_operands(ctx: &mut FuncContext<'_>, f: &mut Function, operands: &[&Expr]) -> CodegenResult<()> {
    for operand in operands {
        emit_expr(ctx, f, operand)?;
    }
    Ok(())
}

pub fn emit_expr(ctx: &mut FuncContext<'_>, f: &mut Function, expr: &Expr) -> CodegenResult<()> {
    match expr {
        Expr::Nop => {
            f.instruction(&Instruction::Nop);
        }
        Expr::Unreachable => {
            f.instruction(&Instruction::Unreachable);
        }
        Expr::Block {
            label,
            result,
            body,
        } => {
            f.instruction(&Instruction::Block(block_type(*result)));
            emit_labeled(ctx, f, label.as_ref(), body)?;
        }
        Expr::Loop {
            label,
            result,
            body,
        } => {
            f.instruction(&Instruction::Loop(block_type(*result)));
            emit_labeled(ctx, f, label.as_ref(), body)?;
        }
        Expr::If {
            result,
            test,
            then_arm,
            else_arm,
        } => {
            emit_expr(ctx, f, test)?;
            f.instruction(&Instruction::If(block_type(*result)));
            ctx.labels.push(None);
            let arms = emit_arm(ctx, f, then_arm).and_then(|()| match else_arm {
                Some(else_arm) => {
                    f.instruction(&Instruction::Else);
                    emit_arm(ctx, f, else_arm)
                }
                None => Ok(()),
            });
            ctx.labels.pop();
            arms?;
            f.instruction(&Instruction::End);
        }
        Expr::Then { .. } | Expr::Else { .. } => {
            return Err(CodegenError::Unsupported(format!(
                "'{}' outside of an if",
                expr.kind_name()
            )));
        }
        Expr::Br { label, value } => {
            if let Some(value) = value {
                emit_expr(ctx, f, value)?;
            }
            f.instruction(&Instruction::Br(ctx.depth(label)?));
        }
        Expr::BrIf { label, value, test } => {
            if let Some(value) = value {
                emit_expr(ctx, f, value)?;
            }
            emit_expr(ctx, f, test)?;
            f.instruction(&Instruction::BrIf(ctx.depth(label)?));
        }
        Expr::Return { value } => {
            if let Some(value) = value {
                emit_expr(ctx, f, value)?;
            }
            f.instruction(&Instruction::Return);
        }
        Expr::Call { func, args } => {
            emit_seq(ctx, f, args)?;
            f.instruction(&Instruction::Call(ctx.func(func)?));
        }
        Expr::CallImport { import, args } => {
            emit_seq(ctx, f, args)?;
            f.instruction(&Instruction::Call(ctx.import(import)?));
        }
        Expr::GetLocal { local } => {
            f.instruction(&Instruction::LocalGet(ctx.local(local)?));
        }
        Expr::SetLocal { local, value } => {
            emit_expr(ctx, f, value)?;
            f.instruction(&Instruction::LocalSet(ctx.local(local)?));
        }
        Expr::TeeLocal { local, value } => {
            emit_expr(ctx, f, value)?;
            f.instruction(&Instruction::LocalTee(ctx.local(local)?));
        }
        Expr::Select { .. } => {
            emit_operands(ctx, f, &expr.children())?;
            f.instruction(&Instruction::Select);
        }
        Expr::Drop { value } => {
            emit_expr(ctx, f, value)?;
            f.instruction(&Instruction::Drop);
        }
        Expr::CurrentMemory => {
            f.instruction(&Instruction::MemorySize(0));
        }
        Expr::GrowMemory { delta } => {
            emit_expr(ctx, f, delta)?;
            f.instruction(&Instruction::MemoryGrow(0));
        }
        Expr::Const { ty, value } => {
            let instruction = match (ty, value) {
                (ValueType::I32, Literal::Int(v)) => Instruction::I32Const(*v as i32),
                (ValueType::I64, Literal::Int(v)) => Instruction::I64Const(*v),
                _ => return Err(unsupported_float(expr, *ty)),
            };
            f.instruction(&instruction);
        }
        Expr::Unop { ty, op, operand } => {
            emit_expr(ctx, f, operand)?;
            f.instruction(&unop(*ty, *op).ok_or_else(|| unsupported_float(expr, *ty))?);
        }
        Expr::Binop { ty, op, lhs, rhs } => {
            emit_expr(ctx, f, lhs)?;
            emit_expr(ctx, f, rhs)?;
            f.instruction(&binop(*ty, *op).ok_or_else(|| unsupported_float(expr, *ty))?);
        }
        Expr::Relop { ty, op, lhs, rhs } => {
            emit_expr(ctx, f, lhs)?;
            emit_expr(ctx, f, rhs)?;
            f.instruction(&relop(*ty, *op).ok_or_else(|| unsupported_float(expr, *ty))?);
        }
        Expr::Cvtop {
            ty,
            op,
            from,
            operand,
        } => {
            emit_expr(ctx, f, operand)?;
            let instruction = match (ty, op, from) {
                (ValueType::I32, ConvertOp::Wrap, ValueType::I64) => Instruction::I32WrapI64,
                (ValueType::I64, ConvertOp::ExtendS, ValueType::I32) => Instruction::I64ExtendI32S,
                (ValueType::I64, ConvertOp::ExtendU, ValueType::I32) => Instruction::I64ExtendI32U,
                _ => {
                    return Err(CodegenError::Unsupported(format!(
                        "conversion {ty}.{op}/{from}"
                    )))
                }
            };
            f.instruction(&instruction);
        }
        Expr::Load {
            ty,
            size,
            signed,
            offset,
            align,
            addr,
        } => {
            emit_expr(ctx, f, addr)?;
            let width = size.unwrap_or_else(|| ty.bit_width());
            let memarg = memarg(*offset, *align, width)?;
            let instruction = match (*ty, width, *signed) {
                (ValueType::I32, 32, _) => Instruction::I32Load(memarg),
                (ValueType::I32, 8, true) => Instruction::I32Load8S(memarg),
                (ValueType::I32, 8, false) => Instruction::I32Load8U(memarg),
                (ValueType::I32, 16, true) => Instruction::I32Load16S(memarg),
                (ValueType::I32, 16, false) => Instruction::I32Load16U(memarg),
                (ValueType::I64, 64, _) => Instruction::I64Load(memarg),
                (ValueType::I64, 8, true) => Instruction::I64Load8S(memarg),
                (ValueType::I64, 8, false) => Instruction::I64Load8U(memarg),
                (ValueType::I64, 16, true) => Instruction::I64Load16S(memarg),
                (ValueType::I64, 16, false) => Instruction::I64Load16U(memarg),
                (ValueType::I64, 32, true) => Instruction::I64Load32S(memarg),
                (ValueType::I64, 32, false) => Instruction::I64Load32U(memarg),
                _ => return Err(unsupported_access("load", *ty, width)),
            };
            f.instruction(&instruction);
        }
        Expr::Store {
            ty,
            size,
            offset,
            align,
            addr,
            value,
            ..
        } => {
            emit_expr(ctx, f, addr)?;
            emit_expr(ctx, f, value)?;
            let width = size.unwrap_or_else(|| ty.bit_width());
            let memarg = memarg(*offset, *align, width)?;
            let instruction = match (*ty, width) {
                (ValueType::I32, 32) => Instruction::I32Store(memarg),
                (ValueType::I32, 8) => Instruction::I32Store8(memarg),
                (ValueType::I32, 16) => Instruction::I32Store16(memarg),
                (ValueType::I64, 64) => Instruction::I64Store(memarg),
                (ValueType::I64, 8) => Instruction::I64Store8(memarg),
                (ValueType::I64, 16) => Instruction::I64Store16(memarg),
                (ValueType::I64, 32) => Instruction::I64Store32(memarg),
                _ => return Err(unsupported_access("store", *ty, width)),
            };
            f.instruction(&instruction);
        }
    }
    Ok(())
}

fn unsupported_float(expr: &Expr, ty: ValueType) -> CodegenError {
    CodegenError::Unsupported(format!("{ty} {} instruction", expr.kind_name()))
}

fn unsupported_access(kind: &str, ty: ValueType, width: u32) -> CodegenError {
    CodegenError::Unsupported(format!("{width}-bit {ty} {kind}"))
}

/// Text alignment is in bytes; the binary stores its log2. Defaults to the
/// natural alignment of the access width.
fn memarg(offset: u32, align: Option<u32>, width: u32) -> CodegenResult<MemArg> {
    let bytes = align.unwrap_or(width / 8);
    if !bytes.is_power_of_two() {
        return Err(CodegenError::Unsupported(format!(
            "alignment {bytes} is not a power of two"
        )));
    }
    Ok(MemArg {
        offset: u64::from(offset),
        align: bytes.trailing_zeros(),
        memory_index: 0,
    })
}

fn unop(ty: ValueType, op: UnaryOp) -> Option<Instruction<'static>> {
    use Instruction as I;
    let instruction = match (ty, op) {
        (ValueType::I32, UnaryOp::Clz) => I::I32Clz,
        (ValueType::I32, UnaryOp::Ctz) => I::I32Ctz,
        (ValueType::I32, UnaryOp::Popcnt) => I::I32Popcnt,
        (ValueType::I32, UnaryOp::Eqz) => I::I32Eqz,
        (ValueType::I64, UnaryOp::Clz) => I::I64Clz,
        (ValueType::I64, UnaryOp::Ctz) => I::I64Ctz,
        (ValueType::I64, UnaryOp::Popcnt) => I::I64Popcnt,
        (ValueType::I64, UnaryOp::Eqz) => I::I64Eqz,
        _ => return None,
    };
    Some(instruction)
}

fn binop(ty: ValueType, op: BinaryOp) -> Option<Instruction<'static>> {
    use BinaryOp as B;
    use Instruction as I;
    let instruction = match ty {
        ValueType::I32 => match op {
            B::Add => I::I32Add,
            B::Sub => I::I32Sub,
            B::Mul => I::I32Mul,
            B::DivS => I::I32DivS,
            B::DivU => I::I32DivU,
            B::RemS => I::I32RemS,
            B::RemU => I::I32RemU,
            B::And => I::I32And,
            B::Or => I::I32Or,
            B::Xor => I::I32Xor,
            B::Shl => I::I32Shl,
            B::ShrS => I::I32ShrS,
            B::ShrU => I::I32ShrU,
            B::Rotl => I::I32Rotl,
            B::Rotr => I::I32Rotr,
            _ => return None,
        },
        ValueType::I64 => match op {
            B::Add => I::I64Add,
            B::Sub => I::I64Sub,
            B::Mul => I::I64Mul,
            B::DivS => I::I64DivS,
            B::DivU => I::I64DivU,
            B::RemS => I::I64RemS,
            B::RemU => I::I64RemU,
            B::And => I::I64And,
            B::Or => I::I64Or,
            B::Xor => I::I64Xor,
            B::Shl => I::I64Shl,
            B::ShrS => I::I64ShrS,
            B::ShrU => I::I64ShrU,
            B::Rotl => I::I64Rotl,
            B::Rotr => I::I64Rotr,
            _ => return None,
        },
        ValueType::F32 | ValueType::F64 => return None,
    };
    Some(instruction)
}

fn relop(ty: ValueType, op: RelOp) -> Option<Instruction<'static>> {
    use Instruction as I;
    use RelOp as R;
    let instruction = match ty {
        ValueType::I32 => match op {
            R::Eq => I::I32Eq,
            R::Ne => I::I32Ne,
            R::LtS => I::I32LtS,
            R::LtU => I::I32LtU,
            R::GtS => I::I32GtS,
            R::GtU => I::I32GtU,
            R::LeS => I::I32LeS,
            R::LeU => I::I32LeU,
            R::GeS => I::I32GeS,
            R::GeU => I::I32GeU,
            _ => return None,
        },
        ValueType::I64 => match op {
            R::Eq => I::I64Eq,
            R::Ne => I::I64Ne,
            R::LtS => I::I64LtS,
            R::LtU => I::I64LtU,
            R::GtS => I::I64GtS,
            R::GtU => I::I64GtU,
            R::LeS => I::I64LeS,
            R::LeU => I::I64LeU,
            R::GeS => I::I64GeS,
            R::GeU => I::I64GeU,
            _ => return None,
        },
        ValueType::F32 | ValueType::F64 => return None,
    };
    Some(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memarg_alignment() {
        assert_eq!(memarg(0, None, 32).map(|m| m.align), Ok(2));
        assert_eq!(memarg(0, None, 8).map(|m| m.align), Ok(0));
        assert_eq!(memarg(4, Some(8), 64).map(|m| (m.offset, m.align)), Ok((4, 3)));
        assert!(memarg(0, Some(3), 32).is_err());
    }

    #[test]
    fn test_resolve() {
        let names = HashMap::from([("f".to_string(), 1)]);
        assert_eq!(resolve(&Var::Name("f".into()), &names, 2, "function"), Ok(1));
        assert_eq!(resolve(&Var::Index(0), &names, 2, "function"), Ok(0));
        assert!(matches!(
            resolve(&Var::Index(2), &names, 2, "function"),
            Err(CodegenError::UnresolvedSymbol(_))
        ));
        assert!(matches!(
            resolve(&Var::Name("g".into()), &names, 2, "function"),
            Err(CodegenError::UnresolvedSymbol(_))
        ));
    }

    #[test]
    fn test_float_ops_have_no_encoding() {
        assert!(binop(ValueType::F64, BinaryOp::Add).is_none());
        assert!(binop(ValueType::I32, BinaryOp::Copysign).is_none());
        assert!(unop(ValueType::F32, UnaryOp::Sqrt).is_none());
        assert!(relop(ValueType::I64, RelOp::Lt).is_none());
    }

    #[test]
    fn test_label_depths() {
        let imports = HashMap::new();
        let funcs = HashMap::new();
        let mut ctx = FuncContext::new(&imports, &funcs, 0, 0);
        ctx.labels.push(None);
        ctx.labels.push(Some("outer".into()));
        ctx.labels.push(None);
        assert_eq!(ctx.depth(&Var::Name("outer".into())), Ok(1));
        assert_eq!(ctx.depth(&Var::Index(2)), Ok(2));
        assert!(ctx.depth(&Var::Index(3)).is_err());
        assert!(ctx.depth(&Var::Name("missing".into())).is_err());
    }
}
