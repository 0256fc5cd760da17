use std::path::Path;

use tracing::{debug, info};

use crate::analyzer::Analyzer;
use crate::ast::Program;
use crate::codegen::CodeGenerator;
use crate::error::{CoreError, Diagnostic};
use crate::parser::parse;

/// Result of compiling a whole source file.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationArtifact {
    /// The analyzed program.
    pub program: Program,
    /// Complete Python module, prologue included.
    pub python: String,
}

/// Run the whole pipeline on `source` and return the analyzed tree along
/// with the generated module.
pub fn compile_artifact(source: &str) -> Result<CompilationArtifact, Diagnostic> {
    let program = parse(source)?;
    Analyzer::new().analyze(&program)?;
    let python = CodeGenerator::new().generate_program(&program);
    debug!(statements = program.statements.len(), "compiled program");
    Ok(CompilationArtifact { program, python })
}

/// Translate Tora source into a standalone Python module.
pub fn compile(source: &str) -> Result<String, Diagnostic> {
    compile_artifact(source).map(|artifact| artifact.python)
}

/// Read `path` and compile its contents.
pub fn compile_file(path: impl AsRef<Path>) -> Result<String, CoreError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "compiling");
    Ok(compile(&source)?)
}

/// Incremental compilation for interactive hosts.
///
/// Declarations accepted by one call stay visible to the next. A fragment
/// that fails leaves the session exactly as it was. The output of
/// [`Session::compile_fragment`] omits the prologue; run
/// [`crate::stdlib::prologue`] once before the first fragment.
#[derive(Debug, Default)]
pub struct Session {
    analyzer: Analyzer,
    generator: CodeGenerator,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_fragment(&mut self, source: &str) -> Result<String, Diagnostic> {
        let program = parse(source)?;
        self.analyzer.analyze(&program)?;
        Ok(self.generator.generate_statements(&program))
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Drop every declaration made so far.
    pub fn reset(&mut self) {
        self.analyzer.reset();
        self.generator.reset();
    }
}
