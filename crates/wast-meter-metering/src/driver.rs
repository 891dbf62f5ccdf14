//! The metering pass over a whole script.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use wast_meter_types::ast::Script;

use crate::analyze::{function_cost, Analyzer};
use crate::config::MeterConfig;
use crate::error::{MeterError, MeterResult};
use crate::inject::insert_import;

/// Metering outcome for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleReport {
    /// Import index of the host gas function.
    pub gas_import: u32,
    /// Number of charge calls inserted.
    pub charges: usize,
    /// Sum of all inserted charge amounts.
    pub static_gas: u64,
}

/// Metering outcome for a script, one entry per module in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteringReport {
    pub modules: Vec<ModuleReport>,
}

impl MeteringReport {
    pub fn total_charges(&self) -> usize {
        self.modules.iter().map(|m| m.charges).sum()
    }

    pub fn total_static_gas(&self) -> u64 {
        self.modules.iter().map(|m| m.static_gas).sum()
    }
}

/// Meter every function of every module in `script`.
///
/// Each module gains the host gas import, placed after its existing imports,
/// and every function body gains its charges. Costs are validated for the
/// whole script first: on error `script` is left untouched.
pub fn inject(script: &mut Script, config: &MeterConfig) -> MeterResult<MeteringReport> {
    let table = config.cost_table();
    validate(script, config)?;

    let mut report = MeteringReport::default();
    for (module_index, module) in script.modules.iter_mut().enumerate() {
        let gas_import = insert_import(module, config);
        info!(
            "module {module_index}: gas import \"{}\" \"{}\" at index {gas_import}",
            config.import_module(),
            config.import_field()
        );

        let mut analyzer = Analyzer::new(table, gas_import);
        let mut module_report = ModuleReport {
            gas_import,
            ..ModuleReport::default()
        };
        for (position, func) in module.funcs_mut().enumerate() {
            let func_report = analyzer.meter_function(func, position)?;
            module_report.charges += func_report.charges;
            module_report.static_gas += func_report.static_gas;
        }
        report.modules.push(module_report);
    }
    Ok(report)
}

/// Check every cost lookup and per-function total without mutating anything.
pub fn validate(script: &Script, config: &MeterConfig) -> MeterResult<()> {
    let table = config.cost_table();
    for module in &script.modules {
        for (position, func) in module.funcs().enumerate() {
            let total = function_cost(table, &func.body)?;
            debug!("function {} costs {total}", func.display_name(position));
            if total > u64::from(u32::MAX) {
                return Err(MeterError::GasOverflow {
                    func: func.display_name(position),
                });
            }
        }
    }
    Ok(())
}
