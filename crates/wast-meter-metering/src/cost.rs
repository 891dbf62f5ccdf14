//! The cost model: instruction keys and the table that prices them.
//!
//! Typed instructions are keyed `<type>.<op>` (`i32.add`, `i64.const`),
//! conversions `<type>.<op>/<from>` (`i64.extend_u/i32`) and memory
//! accesses `<type>.load`/`<type>.store`, plus the width for narrow
//! accesses (`i32.load8`, `i64.load16_s`, `i64.store32_u`). Everything else
//! uses its bare kind (`br_if`, `call`). Float types never get a key.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use wast_meter_types::ast::{Expr, ValueType};

use crate::error::{MeterError, MeterResult};

/// Costs of the built-in table.
const DEFAULT_COSTS: &[(&str, u32)] = &[
    // control
    ("nop", 0),
    ("unreachable", 0),
    ("block", 1),
    ("loop", 1),
    ("if", 2),
    ("br", 2),
    ("br_if", 3),
    ("return", 2),
    ("call", 5),
    ("call_import", 5),
    // locals and parametric
    ("get_local", 3),
    ("set_local", 3),
    ("tee_local", 3),
    ("select", 3),
    ("drop", 3),
    // memory
    ("current_memory", 3),
    ("grow_memory", 100),
    ("i32.load", 3),
    ("i32.load8", 3),
    ("i32.load16_s", 3),
    ("i32.load16_u", 3),
    ("i64.load", 3),
    ("i64.load8", 3),
    ("i64.load16_s", 3),
    ("i64.load16_u", 3),
    ("i64.load32_s", 3),
    ("i64.load32_u", 3),
    ("i32.store", 3),
    ("i32.store8", 3),
    ("i32.store16_s", 3),
    ("i32.store16_u", 3),
    ("i64.store", 3),
    ("i64.store8", 3),
    ("i64.store16_s", 3),
    ("i64.store16_u", 3),
    ("i64.store32_s", 3),
    ("i64.store32_u", 3),
    // constants
    ("i32.const", 1),
    ("i64.const", 1),
    // i32 arithmetic
    ("i32.clz", 105),
    ("i32.ctz", 105),
    ("i32.popcnt", 29),
    ("i32.eqz", 1),
    ("i32.add", 1),
    ("i32.sub", 1),
    ("i32.mul", 3),
    ("i32.div_s", 80),
    ("i32.div_u", 80),
    ("i32.rem_s", 80),
    ("i32.rem_u", 80),
    ("i32.and", 1),
    ("i32.or", 1),
    ("i32.xor", 1),
    ("i32.shl", 1),
    ("i32.shr_s", 1),
    ("i32.shr_u", 1),
    ("i32.rotl", 2),
    ("i32.rotr", 2),
    // i32 comparison
    ("i32.eq", 1),
    ("i32.ne", 1),
    ("i32.lt_s", 1),
    ("i32.lt_u", 1),
    ("i32.gt_s", 1),
    ("i32.gt_u", 1),
    ("i32.le_s", 1),
    ("i32.le_u", 1),
    ("i32.ge_s", 1),
    ("i32.ge_u", 1),
    // i64 arithmetic
    ("i64.clz", 105),
    ("i64.ctz", 105),
    ("i64.popcnt", 29),
    ("i64.eqz", 1),
    ("i64.add", 1),
    ("i64.sub", 1),
    ("i64.mul", 3),
    ("i64.div_s", 80),
    ("i64.div_u", 80),
    ("i64.rem_s", 80),
    ("i64.rem_u", 80),
    ("i64.and", 1),
    ("i64.or", 1),
    ("i64.xor", 1),
    ("i64.shl", 1),
    ("i64.shr_s", 1),
    ("i64.shr_u", 1),
    ("i64.rotl", 2),
    ("i64.rotr", 2),
    // i64 comparison
    ("i64.eq", 1),
    ("i64.ne", 1),
    ("i64.lt_s", 1),
    ("i64.lt_u", 1),
    ("i64.gt_s", 1),
    ("i64.gt_u", 1),
    ("i64.le_s", 1),
    ("i64.le_u", 1),
    ("i64.ge_s", 1),
    ("i64.ge_u", 1),
    // conversions
    ("i32.wrap/i64", 3),
    ("i64.extend_s/i32", 3),
    ("i64.extend_u/i32", 3),
];

/// Instruction key → gas cost.
///
/// Read-only once built; a metering pass only ever looks costs up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    costs: BTreeMap<String, u32>,
}

impl CostTable {
    /// The built-in table, built on first use and shared afterwards.
    pub fn default_table() -> &'static CostTable {
        static TABLE: OnceLock<CostTable> = OnceLock::new();
        TABLE.get_or_init(|| DEFAULT_COSTS.iter().copied().collect())
    }

    /// Parse a `{ "<key>": <cost>, ... }` JSON object.
    pub fn from_json(json: &str) -> MeterResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MeterError::Config(format!("invalid cost table: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> MeterResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MeterError::Config(format!("cannot read cost table '{}': {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// The table as a JSON object, keys sorted.
    pub fn to_json(&self) -> MeterResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MeterError::Config(format!("cannot serialize cost table: {e}")))
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.costs.get(key).copied()
    }

    /// Add or replace one entry.
    pub fn set(&mut self, key: impl Into<String>, cost: u32) {
        self.costs.insert(key.into(), cost);
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// The cost of `expr` alone, excluding its children.
    pub fn cost(&self, expr: &Expr) -> MeterResult<u32> {
        let key = cost_key(expr)?;
        self.get(&key)
            .ok_or(MeterError::UnsupportedInstruction(key))
    }
}

impl<'a> FromIterator<(&'a str, u32)> for CostTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, u32)>>(iter: I) -> Self {
        CostTable {
            costs: iter
                .into_iter()
                .map(|(key, cost)| (key.to_string(), cost))
                .collect(),
        }
    }
}

/// Build the cost key of `expr`.
///
/// Fails with [`MeterError::DisallowedType`] when a type-keyed instruction
/// touches a float type.
pub fn cost_key(expr: &Expr) -> MeterResult<String> {
    let key = match expr {
        Expr::Const { ty, .. } => {
            let key = format!("{ty}.const");
            reject_float(*ty, &key)?;
            key
        }
        Expr::Unop { ty, op, .. } => typed_key(*ty, op.name())?,
        Expr::Binop { ty, op, .. } => typed_key(*ty, op.name())?,
        Expr::Relop { ty, op, .. } => typed_key(*ty, op.name())?,
        Expr::Cvtop { ty, op, from, .. } => {
            let key = format!("{ty}.{op}/{from}");
            reject_float(*ty, &key)?;
            reject_float(*from, &key)?;
            key
        }
        Expr::Load {
            ty, size, signed, ..
        } => memory_key(*ty, "load", *size, *signed)?,
        Expr::Store {
            ty, size, signed, ..
        } => memory_key(*ty, "store", *size, *signed)?,
        other => other.kind_name().to_string(),
    };
    Ok(key)
}

fn typed_key(ty: ValueType, op: &str) -> MeterResult<String> {
    let key = format!("{ty}.{op}");
    reject_float(ty, &key)?;
    Ok(key)
}

/// `<type>.<tag>`, plus the width and sign for narrow accesses. The 8-bit
/// width has its own entry and takes no sign.
fn memory_key(ty: ValueType, tag: &str, size: Option<u32>, signed: bool) -> MeterResult<String> {
    let mut key = format!("{ty}.{tag}");
    reject_float(ty, &key)?;
    match narrow_width(ty, size) {
        Some(8) => key.push('8'),
        Some(bits) => {
            key.push_str(&bits.to_string());
            key.push_str(if signed { "_s" } else { "_u" });
        }
        None => {}
    }
    Ok(key)
}

fn reject_float(ty: ValueType, key: &str) -> MeterResult<()> {
    if ty.is_float() {
        return Err(MeterError::DisallowedType {
            ty,
            instruction: key.to_string(),
        });
    }
    Ok(())
}

/// The access width when it is narrower than the type's natural width.
fn narrow_width(ty: ValueType, size: Option<u32>) -> Option<u32> {
    size.filter(|&bits| bits < ty.bit_width())
}
