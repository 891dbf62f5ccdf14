//! AST for the folded WebAssembly text format.
//!
//! The tree mirrors the S-expression structure of the source: every folded
//! instruction owns its operands, and sequence nodes (`block`, `loop`,
//! `then`, `else`, function bodies) own ordered statement lists that the
//! metering pass inserts into.
//!
//! Every type serializes to JSON with a `kind` tag so trees can be exchanged
//! with hosts that already have a parser.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Value types & references
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "i32" => Some(Self::I32),
            "i64" => Some(Self::I64),
            "f32" => Some(Self::F32),
            "f64" => Some(Self::F64),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Natural width of the type in bits.
    pub fn bit_width(self) -> u32 {
        match self {
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 => 64,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to a function, import, local or label: either a numeric
/// index or a `$name` (stored without the `$`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Var {
    Index(u32),
    Name(String),
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Index(idx) => write!(f, "{idx}"),
            Var::Name(name) => write!(f, "${name}"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Script & modules
// ══════════════════════════════════════════════════════════════════════════════

/// Root of a parsed source: one or more modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub modules: Vec<Module>,
}

/// `(module $id? field*)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: Vec<ModuleField>,
    #[serde(default)]
    pub span: Span,
}

impl Module {
    /// Imports in declaration order; their position is their import index.
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.fields.iter().filter_map(|field| match field {
            ModuleField::Import(import) => Some(import),
            _ => None,
        })
    }

    /// Size of the import table, which is also the next free import index.
    pub fn import_count(&self) -> u32 {
        self.imports().count() as u32
    }

    /// Defined functions in declaration order.
    pub fn funcs(&self) -> impl Iterator<Item = &Func> {
        self.fields.iter().filter_map(|field| match field {
            ModuleField::Func(func) => Some(func),
            _ => None,
        })
    }

    pub fn funcs_mut(&mut self) -> impl Iterator<Item = &mut Func> {
        self.fields.iter_mut().filter_map(|field| match field {
            ModuleField::Func(func) => Some(func),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleField {
    Import(Import),
    Func(Func),
    Export(Export),
    Memory(Memory),
    Start(Start),
}

/// A parameter or local declaration: `(param $x i32)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub ty: ValueType,
}

impl Local {
    pub fn new(ty: ValueType) -> Self {
        Self { id: None, ty }
    }

    pub fn named(id: impl Into<String>, ty: ValueType) -> Self {
        Self {
            id: Some(id.into()),
            ty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncSig {
    #[serde(default)]
    pub params: Vec<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ValueType>,
}

/// `(import $id? "module" "field" (param ..) (result ..))`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub module: String,
    pub field: String,
    #[serde(default)]
    pub signature: FuncSig,
    #[serde(default)]
    pub span: Span,
}

/// `(func $id? (export "name")? (param ..)* (result ..)? (local ..)* expr*)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Func {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
    #[serde(default)]
    pub signature: FuncSig,
    #[serde(default)]
    pub locals: Vec<Local>,
    pub body: Vec<Expr>,
    #[serde(default)]
    pub span: Span,
}

impl Func {
    /// Name used in logs and diagnostics: `$id`, or `#<position>` when the
    /// function is anonymous.
    pub fn display_name(&self, position: usize) -> String {
        match &self.id {
            Some(id) => format!("${id}"),
            None => format!("#{position}"),
        }
    }
}

/// `(export "name" $func)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub func: Var,
    #[serde(default)]
    pub span: Span,
}

/// `(memory initial maximum?)` in 64 KiB pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub initial: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u32>,
    #[serde(default)]
    pub span: Span,
}

/// `(start $func)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Start {
    pub func: Var,
    #[serde(default)]
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// Defines an operator enum whose serde names and mnemonics agree.
macro_rules! operators {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)*
        }

        impl $name {
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// The mnemonic suffix after `<type>.`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

operators! {
    UnaryOp {
        Clz => "clz",
        Ctz => "ctz",
        Popcnt => "popcnt",
        Eqz => "eqz",
        Neg => "neg",
        Abs => "abs",
        Ceil => "ceil",
        Floor => "floor",
        Trunc => "trunc",
        Nearest => "nearest",
        Sqrt => "sqrt",
    }
}

operators! {
    BinaryOp {
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        DivS => "div_s",
        DivU => "div_u",
        RemS => "rem_s",
        RemU => "rem_u",
        And => "and",
        Or => "or",
        Xor => "xor",
        Shl => "shl",
        ShrS => "shr_s",
        ShrU => "shr_u",
        Rotl => "rotl",
        Rotr => "rotr",
        Div => "div",
        Min => "min",
        Max => "max",
        Copysign => "copysign",
    }
}

operators! {
    /// Comparison operators (`relop`).
    RelOp {
        Eq => "eq",
        Ne => "ne",
        LtS => "lt_s",
        LtU => "lt_u",
        GtS => "gt_s",
        GtU => "gt_u",
        LeS => "le_s",
        LeU => "le_u",
        GeS => "ge_s",
        GeU => "ge_u",
        Lt => "lt",
        Gt => "gt",
        Le => "le",
        Ge => "ge",
    }
}

operators! {
    /// Conversion operators (`cvtop`), written `<to>.<op>/<from>`.
    ConvertOp {
        Wrap => "wrap",
        ExtendS => "extend_s",
        ExtendU => "extend_u",
        TruncS => "trunc_s",
        TruncU => "trunc_u",
        ConvertS => "convert_s",
        ConvertU => "convert_u",
        Promote => "promote",
        Demote => "demote",
        Reinterpret => "reinterpret",
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// A constant operand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(value) if value.is_nan() => f.write_str("nan"),
            Literal::Float(value) if value.is_infinite() => {
                f.write_str(if *value > 0.0 { "inf" } else { "-inf" })
            }
            Literal::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// One folded instruction and its operands.
///
/// `Block`, `Loop`, `Then` and `Else` own statement sequences. `Then` and
/// `Else` are the arms of an `If`; unlike `Block` they do not introduce a
/// branch label of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Nop,
    Unreachable,
    Block {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ValueType>,
        body: Vec<Expr>,
    },
    Loop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ValueType>,
        body: Vec<Expr>,
    },
    If {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ValueType>,
        test: Box<Expr>,
        #[serde(rename = "then")]
        then_arm: Box<Expr>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        else_arm: Option<Box<Expr>>,
    },
    Then {
        body: Vec<Expr>,
    },
    Else {
        body: Vec<Expr>,
    },
    Br {
        label: Var,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Box<Expr>>,
    },
    BrIf {
        label: Var,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Box<Expr>>,
        test: Box<Expr>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Box<Expr>>,
    },
    Call {
        func: Var,
        #[serde(default)]
        args: Vec<Expr>,
    },
    CallImport {
        import: Var,
        #[serde(default)]
        args: Vec<Expr>,
    },
    GetLocal {
        local: Var,
    },
    SetLocal {
        local: Var,
        value: Box<Expr>,
    },
    TeeLocal {
        local: Var,
        value: Box<Expr>,
    },
    Select {
        first: Box<Expr>,
        second: Box<Expr>,
        test: Box<Expr>,
    },
    Drop {
        value: Box<Expr>,
    },
    CurrentMemory,
    GrowMemory {
        delta: Box<Expr>,
    },
    Const {
        #[serde(rename = "type")]
        ty: ValueType,
        value: Literal,
    },
    Unop {
        #[serde(rename = "type")]
        ty: ValueType,
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binop {
        #[serde(rename = "type")]
        ty: ValueType,
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Relop {
        #[serde(rename = "type")]
        ty: ValueType,
        op: RelOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cvtop {
        #[serde(rename = "type")]
        ty: ValueType,
        op: ConvertOp,
        from: ValueType,
        operand: Box<Expr>,
    },
    Load {
        #[serde(rename = "type")]
        ty: ValueType,
        /// Access width in bits when narrower than `ty` (`i32.load8_s` → 8).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u32>,
        #[serde(default)]
        signed: bool,
        #[serde(default)]
        offset: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<u32>,
        addr: Box<Expr>,
    },
    Store {
        #[serde(rename = "type")]
        ty: ValueType,
        /// Access width in bits when narrower than `ty` (`i64.store32` → 32).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u32>,
        /// Sign of a narrow store's cost key. The text format has no
        /// signed store mnemonic, so parsed stores are unsigned.
        #[serde(default)]
        signed: bool,
        #[serde(default)]
        offset: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        align: Option<u32>,
        addr: Box<Expr>,
        value: Box<Expr>,
    },
}

impl Expr {
    /// The bare instruction kind, as written in JSON and used as the cost
    /// key for instructions whose cost does not depend on operand types.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Nop => "nop",
            Expr::Unreachable => "unreachable",
            Expr::Block { .. } => "block",
            Expr::Loop { .. } => "loop",
            Expr::If { .. } => "if",
            Expr::Then { .. } => "then",
            Expr::Else { .. } => "else",
            Expr::Br { .. } => "br",
            Expr::BrIf { .. } => "br_if",
            Expr::Return { .. } => "return",
            Expr::Call { .. } => "call",
            Expr::CallImport { .. } => "call_import",
            Expr::GetLocal { .. } => "get_local",
            Expr::SetLocal { .. } => "set_local",
            Expr::TeeLocal { .. } => "tee_local",
            Expr::Select { .. } => "select",
            Expr::Drop { .. } => "drop",
            Expr::CurrentMemory => "current_memory",
            Expr::GrowMemory { .. } => "grow_memory",
            Expr::Const { .. } => "const",
            Expr::Unop { .. } => "unop",
            Expr::Binop { .. } => "binop",
            Expr::Relop { .. } => "relop",
            Expr::Cvtop { .. } => "cvtop",
            Expr::Load { .. } => "load",
            Expr::Store { .. } => "store",
        }
    }

    /// `true` for instructions that transfer control by themselves.
    pub fn is_branch(&self) -> bool {
        matches!(self, Expr::Br { .. } | Expr::BrIf { .. } | Expr::Return { .. })
    }

    /// The statement list of a sequence node.
    pub fn body(&self) -> Option<&Vec<Expr>> {
        match self {
            Expr::Block { body, .. }
            | Expr::Loop { body, .. }
            | Expr::Then { body }
            | Expr::Else { body } => Some(body),
            _ => None,
        }
    }

    pub fn body_mut(&mut self) -> Option<&mut Vec<Expr>> {
        match self {
            Expr::Block { body, .. }
            | Expr::Loop { body, .. }
            | Expr::Then { body }
            | Expr::Else { body } => Some(body),
            _ => None,
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Nop
            | Expr::Unreachable
            | Expr::CurrentMemory
            | Expr::GetLocal { .. }
            | Expr::Const { .. } => Vec::new(),
            Expr::Block { body, .. }
            | Expr::Loop { body, .. }
            | Expr::Then { body }
            | Expr::Else { body } => body.iter().collect(),
            Expr::If {
                test,
                then_arm,
                else_arm,
                ..
            } => {
                let mut children = vec![test.as_ref(), then_arm.as_ref()];
                children.extend(else_arm.as_deref());
                children
            }
            Expr::Br { value, .. } | Expr::Return { value } => value.as_deref().into_iter().collect(),
            Expr::BrIf { value, test, .. } => {
                let mut children: Vec<&Expr> = value.as_deref().into_iter().collect();
                children.push(test);
                children
            }
            Expr::Call { args, .. } | Expr::CallImport { args, .. } => args.iter().collect(),
            Expr::SetLocal { value, .. }
            | Expr::TeeLocal { value, .. }
            | Expr::Drop { value } => vec![value.as_ref()],
            Expr::GrowMemory { delta } => vec![delta.as_ref()],
            Expr::Select {
                first,
                second,
                test,
            } => vec![first.as_ref(), second.as_ref(), test.as_ref()],
            Expr::Unop { operand, .. } | Expr::Cvtop { operand, .. } => vec![operand.as_ref()],
            Expr::Binop { lhs, rhs, .. } | Expr::Relop { lhs, rhs, .. } => {
                vec![lhs.as_ref(), rhs.as_ref()]
            }
            Expr::Load { addr, .. } => vec![addr.as_ref()],
            Expr::Store { addr, value, .. } => vec![addr.as_ref(), value.as_ref()],
        }
    }

    /// Mutable direct children in evaluation order.
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Nop
            | Expr::Unreachable
            | Expr::CurrentMemory
            | Expr::GetLocal { .. }
            | Expr::Const { .. } => Vec::new(),
            Expr::Block { body, .. }
            | Expr::Loop { body, .. }
            | Expr::Then { body }
            | Expr::Else { body } => body.iter_mut().collect(),
            Expr::If {
                test,
                then_arm,
                else_arm,
                ..
            } => {
                let mut children = vec![test.as_mut(), then_arm.as_mut()];
                children.extend(else_arm.as_deref_mut());
                children
            }
            Expr::Br { value, .. } | Expr::Return { value } => {
                value.as_deref_mut().into_iter().collect()
            }
            Expr::BrIf { value, test, .. } => {
                let mut children: Vec<&mut Expr> = value.as_deref_mut().into_iter().collect();
                children.push(test);
                children
            }
            Expr::Call { args, .. } | Expr::CallImport { args, .. } => args.iter_mut().collect(),
            Expr::SetLocal { value, .. }
            | Expr::TeeLocal { value, .. }
            | Expr::Drop { value } => vec![value.as_mut()],
            Expr::GrowMemory { delta } => vec![delta.as_mut()],
            Expr::Select {
                first,
                second,
                test,
            } => vec![first.as_mut(), second.as_mut(), test.as_mut()],
            Expr::Unop { operand, .. } | Expr::Cvtop { operand, .. } => vec![operand.as_mut()],
            Expr::Binop { lhs, rhs, .. } | Expr::Relop { lhs, rhs, .. } => {
                vec![lhs.as_mut(), rhs.as_mut()]
            }
            Expr::Load { addr, .. } => vec![addr.as_mut()],
            Expr::Store { addr, value, .. } => vec![addr.as_mut(), value.as_mut()],
        }
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children().into_iter().map(Expr::node_count).sum::<usize>()
    }

    // ── Constructors ────────────────────────────────────────────────────────

    pub fn i32_const(value: i32) -> Self {
        Expr::Const {
            ty: ValueType::I32,
            value: Literal::Int(value as i64),
        }
    }

    pub fn i64_const(value: i64) -> Self {
        Expr::Const {
            ty: ValueType::I64,
            value: Literal::Int(value),
        }
    }

    pub fn local(index: u32) -> Self {
        Expr::GetLocal {
            local: Var::Index(index),
        }
    }

    pub fn binop(ty: ValueType, op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binop {
            ty,
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn block(body: Vec<Expr>) -> Self {
        Expr::Block {
            label: None,
            result: None,
            body,
        }
    }

    pub fn loop_(body: Vec<Expr>) -> Self {
        Expr::Loop {
            label: None,
            result: None,
            body,
        }
    }

    pub fn br(depth: u32) -> Self {
        Expr::Br {
            label: Var::Index(depth),
            value: None,
        }
    }

    pub fn br_if(depth: u32, test: Expr) -> Self {
        Expr::BrIf {
            label: Var::Index(depth),
            value: None,
            test: Box::new(test),
        }
    }
}
