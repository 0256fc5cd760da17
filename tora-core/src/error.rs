use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The pipeline stage that rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Lexical => "lexical",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

/// A user-facing error raised by one of the pipeline stages.
///
/// Every stage stops at the first diagnostic; there is no recovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}{}", location_suffix(.line, .column))]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Diagnostic {
    pub fn lexical(message: impl Into<String>, line: usize, column: usize) -> Self {
        Diagnostic {
            kind: DiagnosticKind::Lexical,
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        Diagnostic {
            kind: DiagnosticKind::Syntax,
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Diagnostic {
            kind: DiagnosticKind::Semantic,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Attach a source position to a diagnostic that was raised without one.
    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Diagnostic(#[from] Diagnostic),
}

impl CoreError {
    /// The diagnostic carried by this error, if the failure came from the pipeline.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            CoreError::Diagnostic(diagnostic) => Some(diagnostic),
            CoreError::SourceIo { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_position_when_known() {
        let diag = Diagnostic::lexical("Unexpected character '$'", 2, 5);
        assert_eq!(
            diag.to_string(),
            "lexical error: Unexpected character '$' at line 2, column 5"
        );
    }

    #[test]
    fn displays_without_position() {
        let diag = Diagnostic::semantic("Variable 'x' not declared");
        assert_eq!(diag.to_string(), "semantic error: Variable 'x' not declared");
    }

    #[test]
    fn attaches_position_after_the_fact() {
        let diag = Diagnostic::semantic("'x' is not a function").at(3, 1);
        assert_eq!(diag.line, Some(3));
        assert_eq!(diag.column, Some(1));
        assert_eq!(diag.kind, DiagnosticKind::Semantic);
    }
}
