//! # Constela Compiler
//!
//! Compiles a declarative UI program (JSON AST: state, actions, view tree)
//! into a normalized IR consumed by the client runtime and the server-side
//! renderer in this crate.
//!
//! ## Pipeline Invariants
//!
//! 1. **Analysis before lowering**: `transform_program` assumes a program
//!    that passed `analyze_program`. It performs no semantic checks of its
//!    own; calling it on an unanalyzed program is a contract violation.
//!
//! 2. **Accumulate, never short-circuit**: every validator walks its whole
//!    subtree and appends to one error list. A single compile surfaces
//!    every problem at once.
//!
//! 3. **JSON-Pointer error paths**: each `ConstelaError.path` addresses the
//!    offending node (`/actions/0/steps/2/value/left`). External tooling
//!    parses these; the format is a contract.
//!
//! 4. **Stable wire format**: the `expr`/`kind`/`do` discriminants and
//!    camelCase field names of both the AST and the IR are shared with the
//!    client runtime. Renaming any of them breaks consumers.
//!
//! 5. **The evaluator never throws for data**: missing keys, wrong types,
//!    and off-whitelist methods evaluate to `undefined`; `ref` is `null`
//!    server-side; a surviving `param` is a lowering bug that still must
//!    not panic.
//!
//! 6. **Inlining terminates**: component cycle detection runs during
//!    analysis, so the transform stage can recurse through component
//!    bodies without a depth guard.

pub mod analyze;
pub mod ast;
pub mod cache;
pub mod compile;
pub mod context;
pub mod discovery;
pub mod error;
pub mod eval;
pub mod expr_check;
pub mod graph;
pub mod ir;
pub mod ssr;
pub mod step_check;
pub mod transform;
pub mod value;
pub mod view_check;

#[cfg(test)]
mod eval_tests;
#[cfg(test)]
mod transform_tests;

pub use analyze::analyze_program;
pub use ast::Program;
pub use compile::{compile_program, compile_source, CompileOptions, CompileResult};
pub use context::{collect_context, AnalysisContext};
pub use error::ConstelaError;
pub use eval::{evaluate, SsrContext};
pub use ir::CompiledProgram;
pub use ssr::{render_node, render_program};
pub use transform::transform_program;
pub use value::Value;
