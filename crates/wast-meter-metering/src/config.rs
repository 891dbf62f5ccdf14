use std::ffi::OsString;

use crate::cost::CostTable;
use crate::error::{MeterError, MeterResult};

pub const DEFAULT_IMPORT_MODULE: &str = "ethereum";
pub const DEFAULT_IMPORT_FIELD: &str = "useGas";

#[derive(Clone, Debug)]
pub struct MeterConfig {
    pub(crate) import_module: String,
    pub(crate) import_field: String,
    pub(crate) cost_table: Option<CostTable>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        MeterConfig {
            import_module: DEFAULT_IMPORT_MODULE.to_string(),
            import_field: DEFAULT_IMPORT_FIELD.to_string(),
            cost_table: None,
        }
    }

    /// Creates a new default configuration and seeds it from the environment variables.
    pub fn from_env() -> MeterResult<Self> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> MeterResult<Self> {
        let mut config = Self::new();
        if let Some(value) = env_string(&lookup, "WAST_METER_IMPORT_MODULE")? {
            config.import_module = value;
        }

        if let Some(value) = env_string(&lookup, "WAST_METER_IMPORT_FIELD")? {
            config.import_field = value;
        }

        if let Some(path) = lookup("WAST_METER_GAS_TABLE") {
            config.cost_table = Some(CostTable::from_file(path)?);
        }

        Ok(config)
    }

    /// Sets the module name of the host gas import.
    ///
    /// Default: `"ethereum"`
    ///
    /// Corresponding environment variable: `WAST_METER_IMPORT_MODULE`
    pub fn set_import_module(&mut self, name: impl Into<String>) -> &mut Self {
        self.import_module = name.into();
        self
    }

    pub fn import_module(&self) -> &str {
        &self.import_module
    }

    /// Sets the field name of the host gas import.
    ///
    /// Default: `"useGas"`
    ///
    /// Corresponding environment variable: `WAST_METER_IMPORT_FIELD`
    pub fn set_import_field(&mut self, name: impl Into<String>) -> &mut Self {
        self.import_field = name.into();
        self
    }

    pub fn import_field(&self) -> &str {
        &self.import_field
    }

    /// Replaces the cost table.
    ///
    /// Default: the built-in table ([`CostTable::default_table`])
    ///
    /// Corresponding environment variable: `WAST_METER_GAS_TABLE` (path to a JSON object)
    pub fn set_cost_table(&mut self, table: CostTable) -> &mut Self {
        self.cost_table = Some(table);
        self
    }

    /// The cost table in effect.
    pub fn cost_table(&self) -> &CostTable {
        self.cost_table
            .as_ref()
            .unwrap_or(CostTable::default_table())
    }
}

fn env_string(
    lookup: &impl Fn(&str) -> Option<OsString>,
    name: &str,
) -> MeterResult<Option<String>> {
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.into_string() {
        Ok(value) if !value.is_empty() => Ok(Some(value)),
        _ => Err(MeterError::Config(format!(
            "invalid value of {name}; must be a non-empty UTF-8 string"
        ))),
    }
}
