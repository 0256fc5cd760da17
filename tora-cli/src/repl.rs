//! Interactive shell.
//!
//! Each complete input goes through the whole pipeline with a shared
//! [`Session`], and the generated statements run in a persistent
//! [`PythonSession`]. Diagnostics and runtime errors are printed and the
//! loop continues.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tora_core::{Session, prologue};
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};
use crate::executor::{Execution, PythonSession};

const PROMPT: &str = ">>> ";
const CONTINUATION_PROMPT: &str = "... ";

/// Run the interactive REPL against `interpreter`.
pub fn run_repl(interpreter: &str) -> CliResult<()> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| CliError::Repl(format!("failed to initialize editor: {e}")))?;
    let mut python = PythonSession::start(interpreter, &prologue())?;
    let mut session = Session::new();

    println!("Tora Language REPL");
    println!("Type 'exit' to quit");

    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };

        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if buffer.is_empty() {
                    match trimmed {
                        "" => continue,
                        "exit" | "quit" => break,
                        ".help" => {
                            print_help();
                            continue;
                        }
                        ".reset" => {
                            session.reset();
                            python = PythonSession::start(interpreter, &prologue())?;
                            println!("Session reset");
                            continue;
                        }
                        _ => {}
                    }
                } else {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                if !is_input_complete(&buffer) {
                    continue;
                }

                let _ = editor.add_history_entry(buffer.as_str());
                let shown = evaluate_or_restart(interpreter, &mut session, &mut python, &buffer)?;
                print!("{shown}");
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                if buffer.is_empty() {
                    println!("Press Ctrl-D or type 'exit' to quit");
                } else {
                    println!("^C");
                    buffer.clear();
                }
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!();
                break;
            }
            Err(err) => {
                return Err(CliError::Repl(format!("readline error: {err}")));
            }
        }
    }

    Ok(())
}

/// Compile and run one input, returning what the shell should print.
fn evaluate(session: &mut Session, python: &mut PythonSession, input: &str) -> CliResult<String> {
    let code = match session.compile_fragment(input) {
        Ok(code) => code,
        Err(diagnostic) => return Ok(format!("Error: {diagnostic}\n")),
    };
    debug!(%code, "executing fragment");

    let Execution { mut output, error } = python.execute(&code)?;
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    if let Some(message) = error {
        output.push_str(&format!("Runtime Error: {message}\n"));
    }
    Ok(output)
}

/// Like [`evaluate`], but a failed driver is replaced with a fresh one. The
/// session forgets its declarations so it stays in step with the new
/// interpreter.
fn evaluate_or_restart(
    interpreter: &str,
    session: &mut Session,
    python: &mut PythonSession,
    input: &str,
) -> CliResult<String> {
    match evaluate(session, python, input) {
        Ok(shown) => Ok(shown),
        Err(err) => {
            warn!(%err, "python driver failed, restarting");
            session.reset();
            *python = PythonSession::start(interpreter, &prologue())?;
            Ok(format!(
                "Error: {err}\nPython session restarted; earlier declarations were cleared\n"
            ))
        }
    }
}

fn print_help() {
    println!("REPL Commands:");
    println!("  .help     - Show this help message");
    println!("  .reset    - Forget every declaration");
    println!("  exit      - Exit the REPL");
    println!("  quit      - Exit the REPL");
}

/// Whether `input` has balanced braces, brackets and parentheses outside
/// string literals and comments.
fn is_input_complete(input: &str) -> bool {
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '/' if chars.peek() == Some(&'/') => {
                while chars.next_if(|&next| next != '\n').is_some() {}
            }
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth -= 1,
            _ => {}
        }
    }

    // Unterminated strings and stray closers are left for the lexer and
    // parser to report.
    depth <= 0 || in_string
}
