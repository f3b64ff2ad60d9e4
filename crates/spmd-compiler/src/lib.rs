// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Per-program driver for SPMD lowering.
//!
//! Signatures are classified once for the whole program, then every
//! function is lowered on its own. A function that fails is reported and
//! skipped; the rest of the program still lowers.

use std::path::Path;

use spmd_ast::{FnDecl, Program};
use spmd_diagnostics::formatter::DiagnosticFormatter;
use spmd_diagnostics::json::{to_json_report, DiagnosticReport};
use spmd_diagnostics::{Diagnostic, ToDiagnostic};
use spmd_mir::{lower_function, LoweringContext, LoweringError, MirFunction};
use spmd_types::{ConfigError, SignatureTable, TargetConfig, VisibilityError};

/// Failures that stop a run before any function is lowered.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("malformed program: {0}")]
    Program(#[from] serde_json::Error),
}

impl ToDiagnostic for DriverError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DriverError::Config(e) => e.to_diagnostic(),
            DriverError::Program(_) => Diagnostic::error(self.to_string()),
        }
    }
}

/// A function whose lowering was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionFailure {
    pub function: String,
    pub error: LoweringError,
}

/// Result of lowering one program.
#[derive(Debug)]
pub struct Compilation {
    pub signatures: SignatureTable,
    /// Lowered functions in declaration order.
    pub functions: Vec<MirFunction>,
    pub failures: Vec<FunctionFailure>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<&MirFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn failure(&self, name: &str) -> Option<&LoweringError> {
        self.failures.iter().find(|f| f.function == name).map(|f| &f.error)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.failures.iter().map(|f| f.error.to_diagnostic()).collect()
    }

    /// Terminal rendering of every failure against the program's source.
    pub fn render(&self, source: &str, file: &str) -> String {
        DiagnosticFormatter::new(source).with_file_name(file).format_all(&self.diagnostics())
    }

    pub fn report(&self, source: &str, file: &str) -> DiagnosticReport {
        to_json_report(&self.diagnostics(), source, file, "lower")
    }
}

pub struct Compiler {
    config: TargetConfig,
}

impl Compiler {
    pub fn new(config: TargetConfig) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Compiler { config })
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        Ok(Compiler { config: TargetConfig::load(path)? })
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn compile(&self, program: &Program) -> Compilation {
        let (signatures, visibility) = SignatureTable::collect(program, &self.config);
        log::debug!("classified {} signature(s)", signatures.len());

        let mut failures: Vec<FunctionFailure> = visibility
            .into_iter()
            .map(|e| FunctionFailure {
                function: match &e {
                    VisibilityError::PublicSpmdFunction { name, .. } => name.clone(),
                },
                error: e.into(),
            })
            .collect();

        let ctx = LoweringContext { signatures: &signatures, config: &self.config };
        let mut functions = Vec::new();
        for decl in program.functions() {
            if failures.iter().any(|f| f.function == decl.name) {
                continue;
            }
            match lower_one(decl, &ctx) {
                Ok(f) => functions.push(f),
                Err(error) => failures.push(FunctionFailure { function: decl.name.clone(), error }),
            }
        }
        for failure in &failures {
            log::warn!("abandoned `{}`: {}", failure.function, failure.error);
        }

        Compilation { signatures, functions, failures }
    }

    /// Compile a program serialized as JSON.
    pub fn compile_json(&self, text: &str) -> Result<Compilation, DriverError> {
        let program: Program = serde_json::from_str(text)?;
        Ok(self.compile(&program))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler { config: TargetConfig::default() }
    }
}

fn lower_one(decl: &FnDecl, ctx: &LoweringContext) -> Result<MirFunction, LoweringError> {
    let function = lower_function(decl, ctx)?;
    log::debug!(
        "lowered `{}`: {} block(s), {} loop(s)",
        function.name,
        function.blocks.len(),
        function.loops.len()
    );
    Ok(function)
}

/// Compile with the default target.
pub fn compile(program: &Program) -> Compilation {
    Compiler::default().compile(program)
}
