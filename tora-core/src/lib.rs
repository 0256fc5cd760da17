//! Core utilities for the Tora language toolchain.
//!
//! This crate provides the compiler pipeline that turns Tora source into
//! Python 3. The pipeline is roughly:
//!
//!   source .tora
//!     -> lexer     (tokens)
//!     -> parser    (syntax tree)
//!     -> analyzer  (scopes, declaration checks)
//!     -> codegen   (Python text, after the stdlib prologue)
//!
//! Higher-level tools (CLI, REPL, etc.) should depend on this crate rather
//! than reimplementing the pipeline. Running the generated Python is left
//! to them.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layer: scopes and declaration checks
// ---------------------------------------------------------------------

pub mod analyzer;

// ---------------------------------------------------------------------
// Builtins and stdlib integration
// ---------------------------------------------------------------------

pub mod builtins;
pub mod stdlib;

// ---------------------------------------------------------------------
// Back-end: code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod codegen;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use analyzer::Analyzer;
pub use codegen::CodeGenerator;
pub use compiler::{CompilationArtifact, Session, compile, compile_artifact, compile_file};
pub use error::{CoreError, Diagnostic, DiagnosticKind};
pub use lexer::lex;
pub use parser::parse;
pub use stdlib::prologue;
