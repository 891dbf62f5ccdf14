//! Branch-free block analysis and charge placement.
//!
//! A statement sequence is split into segments: a new segment starts right
//! after every statement that is a branch point. Each segment is charged
//! once, at its first statement, for the cost of everything in it.
//!
//! Sequences are metered in one of two ways:
//!
//! - *fresh* (function bodies, loop bodies, `if` arms): every non-empty
//!   segment gets a charge inside the sequence.
//! - *inline* (a `block` statement): the first segment always runs together
//!   with the statements before the block, so its cost is returned to the
//!   enclosing segment; the later segments are charged inside the block.
//!
//! Charges for one sequence are inserted highest index first, after the
//! whole sequence has been analyzed, so segment starts stay valid.

use log::debug;
use wast_meter_types::ast::{Expr, Func};

use crate::cost::CostTable;
use crate::error::{MeterError, MeterResult};
use crate::inject::insert_charge;
use crate::normalize::{is_explicit_else, is_explicit_then, normalize_arms};

/// Cost of a subtree and whether control can leave its normal continuation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeteringResult {
    pub gas: u64,
    pub branch_point: bool,
}

/// One branch-free run of a sequence, starting at statement `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub gas: u64,
}

/// What metering one function produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionReport {
    pub charges: usize,
    pub static_gas: u64,
}

/// Meters function bodies of one module against a cost table.
pub struct Analyzer<'a> {
    table: &'a CostTable,
    gas_import: u32,
    func_name: String,
    report: FunctionReport,
}

impl<'a> Analyzer<'a> {
    pub fn new(table: &'a CostTable, gas_import: u32) -> Self {
        Self {
            table,
            gas_import,
            func_name: String::new(),
            report: FunctionReport::default(),
        }
    }

    /// Meter `func`'s body as a fresh block.
    pub fn meter_function(&mut self, func: &mut Func, position: usize) -> MeterResult<FunctionReport> {
        self.report = FunctionReport::default();
        self.func_name = func.display_name(position);
        self.meter_fresh(&mut func.body)?;
        debug!(
            "metered function {}: {} charge(s), {} gas",
            self.func_name,
            self.report.charges,
            self.report.static_gas
        );
        Ok(self.report)
    }

    /// Meter a sequence as its own scope. Returns whether it contains a
    /// branch point.
    pub fn meter_fresh(&mut self, body: &mut Vec<Expr>) -> MeterResult<bool> {
        let (segments, branch_point) = self.split(body)?;
        self.charge_segments(body, &segments)?;
        Ok(branch_point)
    }

    /// Meter a sequence that continues its enclosing segment.
    fn meter_inline(&mut self, body: &mut Vec<Expr>) -> MeterResult<MeteringResult> {
        let (segments, branch_point) = self.split(body)?;
        let gas = segments.first().map_or(0, |first| first.gas);
        self.charge_segments(body, segments.get(1..).unwrap_or_default())?;
        Ok(MeteringResult { gas, branch_point })
    }

    /// Analyze every statement of `body` and group them into segments.
    /// Always returns at least one segment.
    pub fn split(&mut self, body: &mut [Expr]) -> MeterResult<(Vec<Segment>, bool)> {
        let mut segments = vec![Segment { start: 0, gas: 0 }];
        let mut branch_point = false;
        for (index, statement) in body.iter_mut().enumerate() {
            let result = self.analyze(statement)?;
            if let Some(current) = segments.last_mut() {
                current.gas += result.gas;
            }
            if result.branch_point {
                branch_point = true;
                segments.push(Segment {
                    start: index + 1,
                    gas: 0,
                });
            }
        }
        Ok((segments, branch_point))
    }

    fn charge_segments(&mut self, body: &mut Vec<Expr>, segments: &[Segment]) -> MeterResult<()> {
        for segment in segments.iter().rev().filter(|segment| segment.gas > 0) {
            let amount = u32::try_from(segment.gas).map_err(|_| MeterError::GasOverflow {
                func: self.func_name.clone(),
            })?;
            insert_charge(body, segment.start, self.gas_import, amount);
            self.report.charges += 1;
            self.report.static_gas += segment.gas;
        }
        Ok(())
    }

    /// Cost and branch flag of one statement or operand, metering any
    /// nested scopes on the way.
    pub fn analyze(&mut self, expr: &mut Expr) -> MeterResult<MeteringResult> {
        let own = u64::from(self.table.cost(expr)?);
        normalize_arms(expr);
        match expr {
            Expr::Loop { body, .. } => {
                let branch_point = self.meter_fresh(body)?;
                Ok(MeteringResult {
                    gas: own,
                    branch_point,
                })
            }
            Expr::If {
                test,
                then_arm,
                else_arm,
                ..
            } => {
                for arm in std::iter::once(then_arm).chain(else_arm.as_mut()) {
                    if let Some(body) = arm.body_mut() {
                        self.meter_fresh(body)?;
                    }
                }
                let test = self.analyze(test)?;
                Ok(MeteringResult {
                    gas: own + test.gas,
                    branch_point: true,
                })
            }
            Expr::Block { body, .. } | Expr::Then { body } | Expr::Else { body } => {
                let inner = self.meter_inline(body)?;
                Ok(MeteringResult {
                    gas: own + inner.gas,
                    branch_point: inner.branch_point,
                })
            }
            other => {
                let mut result = MeteringResult {
                    gas: own,
                    branch_point: other.is_branch(),
                };
                for child in other.children_mut() {
                    let child = self.analyze(child)?;
                    result.gas += child.gas;
                    result.branch_point |= child.branch_point;
                }
                Ok(result)
            }
        }
    }
}

/// Total cost of a function body without touching it.
///
/// Looks up exactly the keys a metering pass would, so a body that passes
/// here meters without error. `if` arm wrappers carry no cost.
pub fn function_cost(table: &CostTable, body: &[Expr]) -> MeterResult<u64> {
    body.iter()
        .try_fold(0u64, |total, expr| Ok(total.saturating_add(subtree_cost(table, expr)?)))
}

fn subtree_cost(table: &CostTable, expr: &Expr) -> MeterResult<u64> {
    let own = u64::from(table.cost(expr)?);
    if let Expr::If {
        test,
        then_arm,
        else_arm,
        ..
    } = expr
    {
        let mut gas = own.saturating_add(subtree_cost(table, test)?);
        gas = gas.saturating_add(arm_cost(table, then_arm, is_explicit_then(then_arm))?);
        if let Some(else_arm) = else_arm {
            gas = gas.saturating_add(arm_cost(table, else_arm, is_explicit_else(else_arm))?);
        }
        return Ok(gas);
    }
    expr.children()
        .into_iter()
        .try_fold(own, |total, child| Ok(total.saturating_add(subtree_cost(table, child)?)))
}

fn arm_cost(table: &CostTable, arm: &Expr, explicit: bool) -> MeterResult<u64> {
    match arm.body() {
        Some(body) if explicit => function_cost(table, body),
        _ => subtree_cost(table, arm),
    }
}
