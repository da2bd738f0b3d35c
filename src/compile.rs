//! Compile entry points tying the pipeline together.
//!
//! `compile_source` is the front door for tooling holding raw JSON text;
//! `compile_program` is the typed path for callers that already parsed.
//! Both return a `CompileResult` rather than a `Result` so that partial
//! tooling (editors, the CLI) gets the error list and can keep going.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::analyze::analyze_program;
use crate::ast::Program;
use crate::error::{self, ConstelaError};
use crate::ir::CompiledProgram;
use crate::transform::transform_program;

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Build-time resolved data sources, keyed by import name.
    pub import_data: Option<IndexMap<String, Json>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<CompiledProgram>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ConstelaError>,
}

impl CompileResult {
    pub fn is_ok(&self) -> bool {
        self.program.is_some()
    }

    fn failure(errors: Vec<ConstelaError>) -> CompileResult {
        CompileResult {
            program: None,
            errors,
        }
    }
}

pub fn compile_program(program: &Program, options: CompileOptions) -> CompileResult {
    match analyze_program(program) {
        Ok(_ctx) => CompileResult {
            program: Some(transform_program(program, options.import_data)),
            errors: Vec::new(),
        },
        Err(errors) => CompileResult::failure(errors),
    }
}

pub fn compile_source(source: &str, options: CompileOptions) -> CompileResult {
    let program: Program = match serde_json::from_str(source) {
        Ok(program) => program,
        Err(err) => {
            return CompileResult::failure(vec![ConstelaError::new(
                error::PARSE_ERROR,
                format!("Failed to parse program: {}", err),
                "/",
            )]);
        }
    };
    compile_program(&program, options)
}
