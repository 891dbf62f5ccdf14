//! wast-meter pipeline: parses text-format source, meters it, and prints
//! or encodes the result.
//!
//! ```text
//! .wast source → Lexer → Parser → Metering → Text printer   → metered .wast
//!                                          → Binary encoder → metered .wasm
//! ```
//!
//! The free functions use [`MeterConfig::default`]; build a [`Pipeline`]
//! for a custom host import or cost table.

pub mod error;

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use wast_meter_codegen::{encode, generate};
use wast_meter_metering::{inject, MeterConfig, MeteringReport};
use wast_meter_parser::parse_source;
use wast_meter_types::ast::Script;
use wast_meter_types::{CompileErrors, ErrorCode, SourceFile, Span};

pub use error::InjectJsonError;

/// Indentation used by callers that do not pick one.
pub const DEFAULT_SPACING: usize = 2;

/// Serializable outcome of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectResult {
    /// `true` when the source was metered and every requested output built.
    pub success: bool,
    /// Metered text format.
    pub wast: Option<String>,
    /// Metered binary, present when the source holds exactly one module.
    pub wasm: Option<Vec<u8>>,
    /// Lowercase hex SHA-256 of `wasm`.
    pub wasm_sha256: Option<String>,
    pub report: Option<MeteringReport>,
    pub errors: CompileErrors,
}

impl InjectResult {
    fn failed(errors: CompileErrors) -> Self {
        Self {
            success: false,
            wast: None,
            wasm: None,
            wasm_sha256: None,
            report: None,
            errors,
        }
    }
}

/// The pipeline with a fixed metering configuration.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: MeterConfig,
}

impl Pipeline {
    pub fn new(config: MeterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Parse and meter `source`.
    pub fn meter(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<(Script, MeteringReport), CompileErrors> {
        let source_file = SourceFile::new(filename, source);
        let mut script = parse(&source_file)?;
        match inject(&mut script, &self.config) {
            Ok(report) => {
                debug!(
                    "{filename}: {} charges in {} modules, {} static gas",
                    report.total_charges(),
                    report.modules.len(),
                    report.total_static_gas()
                );
                Ok((script, report))
            }
            Err(e) => Err(CompileErrors::single(error::meter_diagnostic(
                &e,
                &script,
                self.config.cost_table(),
                &source_file,
            ))),
        }
    }

    /// Meter `source` and print it back in the text format.
    pub fn inject_wast(
        &self,
        source: &str,
        filename: &str,
        spacing: usize,
    ) -> Result<String, CompileErrors> {
        let (script, _) = self.meter(source, filename)?;
        Ok(generate(&script, spacing))
    }

    /// Meter `source` and encode it as a binary module.
    pub fn inject_to_wasm(&self, source: &str, filename: &str) -> Result<Vec<u8>, CompileErrors> {
        let (script, _) = self.meter(source, filename)?;
        let source_file = SourceFile::new(filename, source);
        let [module] = script.modules.as_slice() else {
            return Err(CompileErrors::single(error::at(
                &source_file,
                ErrorCode::MALFORMED_MODULE,
                format!(
                    "binary output needs exactly one module, found {}",
                    script.modules.len()
                ),
                Span::default(),
            )));
        };
        encode(module)
            .map_err(|e| CompileErrors::single(error::codegen_diagnostic(&e, &source_file)))
    }

    /// Meter a JSON-serialized [`Script`] and return the metered tree as JSON.
    pub fn inject_json(&self, json: &str) -> Result<String, InjectJsonError> {
        let mut script: Script = serde_json::from_str(json)?;
        inject(&mut script, &self.config)?;
        Ok(serde_json::to_string(&script)?)
    }

    /// Run the whole pipeline, collecting every output and diagnostic.
    pub fn inject_to_result(&self, source: &str, filename: &str, spacing: usize) -> InjectResult {
        let (script, report) = match self.meter(source, filename) {
            Ok(metered) => metered,
            Err(errors) => return InjectResult::failed(errors),
        };
        let mut result = InjectResult {
            success: true,
            wast: Some(generate(&script, spacing)),
            wasm: None,
            wasm_sha256: None,
            report: Some(report),
            errors: CompileErrors::empty(),
        };
        if let [module] = script.modules.as_slice() {
            match encode(module) {
                Ok(wasm) => {
                    result.wasm_sha256 = Some(format!("{:x}", Sha256::digest(&wasm)));
                    result.wasm = Some(wasm);
                }
                Err(e) => {
                    let source_file = SourceFile::new(filename, source);
                    result
                        .errors
                        .push_error(error::codegen_diagnostic(&e, &source_file));
                    result.success = false;
                }
            }
        }
        result
    }
}

/// Parse a source file, returning every diagnostic on failure.
pub fn parse(source_file: &SourceFile) -> Result<Script, CompileErrors> {
    let result = parse_source(source_file);
    if result.errors.has_errors() {
        return Err(result.errors);
    }
    result.script.ok_or(result.errors)
}

/// Meter `source` with the default configuration and print the result.
pub fn inject_wast(source: &str, filename: &str, spacing: usize) -> Result<String, CompileErrors> {
    Pipeline::default().inject_wast(source, filename, spacing)
}

/// Meter a JSON AST with the default configuration.
pub fn inject_json(json: &str) -> Result<String, InjectJsonError> {
    Pipeline::default().inject_json(json)
}

/// Meter `source` with the default configuration and encode it.
pub fn inject_to_wasm(source: &str, filename: &str) -> Result<Vec<u8>, CompileErrors> {
    Pipeline::default().inject_to_wasm(source, filename)
}

/// Full pipeline run with the default configuration.
pub fn inject_to_result(source: &str, filename: &str, spacing: usize) -> InjectResult {
    Pipeline::default().inject_to_result(source, filename, spacing)
}
