//! Running generated Python.
//!
//! Two modes exist. [`run_script`] hands a complete module to a fresh
//! interpreter and lets it write straight to the terminal. [`PythonSession`]
//! keeps one interpreter alive behind a small driver loop so that globals
//! survive between REPL inputs.
//!
//! Driver protocol, one request at a time:
//!
//! - request: the byte length of the code in ASCII, `\n`, then the code.
//! - response: the byte length of the captured output in ASCII, `\n`, the
//!   output, then one status line, either `ok` or `err <message>`.
//!
//! Output is captured per request, so it reaches the caller only once the
//! code has finished.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

const DRIVER: &str = r#"
import contextlib, io, sys
_globals = {"__name__": "__tora__"}
_stdin = sys.stdin.buffer
_stdout = sys.stdout.buffer
while True:
    header = _stdin.readline()
    if not header:
        break
    code = _stdin.read(int(header)).decode("utf-8")
    captured = io.StringIO()
    status = "ok"
    try:
        with contextlib.redirect_stdout(captured):
            exec(compile(code, "<tora>", "exec"), _globals)
    except Exception as exc:
        status = "err " + " ".join(str(exc).splitlines())
    output = captured.getvalue().encode("utf-8", "replace")
    _stdout.write(b"%d\n" % len(output) + output + status.encode("utf-8", "replace") + b"\n")
    _stdout.flush()
"#;

/// Run `code` as a script and wait for it to finish.
///
/// Output and tracebacks go directly to the inherited stdout/stderr.
pub fn run_script(interpreter: &str, code: &str) -> CliResult<()> {
    debug!(interpreter, bytes = code.len(), "running script");
    let mut child = spawn(interpreter, &["-"], Stdio::inherit())?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CliError::Driver("stdin not captured".to_string()))?;
        stdin.write_all(code.as_bytes())?;
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::ScriptFailed(status))
    }
}

/// Outcome of one [`PythonSession::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Everything the code wrote to stdout.
    pub output: String,
    /// Message of the exception that stopped the code, if any.
    pub error: Option<String>,
}

/// A long-lived interpreter with a persistent global namespace.
pub struct PythonSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl PythonSession {
    /// Start the driver and load the prologue into it.
    pub fn start(interpreter: &str, prologue: &str) -> CliResult<Self> {
        let mut child = spawn(interpreter, &["-u", "-c", DRIVER], Stdio::piped())?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| CliError::Driver("stdout not captured".to_string()))?;

        let mut session = PythonSession {
            child,
            stdin,
            stdout,
        };
        let loaded = session.execute(prologue)?;
        if let Some(error) = loaded.error {
            return Err(CliError::Driver(format!("prologue failed: {error}")));
        }
        debug!(interpreter, "python session ready");
        Ok(session)
    }

    /// Execute `code` in the session's global namespace.
    pub fn execute(&mut self, code: &str) -> CliResult<Execution> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CliError::Driver("session already closed".to_string()))?;
        stdin.write_all(&frame(code))?;
        stdin.flush()?;

        let mut header = String::new();
        if self.stdout.read_line(&mut header)? == 0 {
            return Err(CliError::Driver("driver exited".to_string()));
        }
        let length = parse_length(header.trim_end())?;

        let mut output = vec![0; length];
        self.stdout.read_exact(&mut output)?;

        let mut status = String::new();
        self.stdout.read_line(&mut status)?;
        let error = parse_status(status.trim_end())?;
        if let Some(message) = &error {
            debug!(%message, "runtime error");
        }

        Ok(Execution {
            output: String::from_utf8_lossy(&output).into_owned(),
            error,
        })
    }
}

impl Drop for PythonSession {
    fn drop(&mut self) {
        // Closing stdin ends the driver loop.
        drop(self.stdin.take());
        if let Err(err) = self.child.wait() {
            warn!(%err, "failed to reap python driver");
        }
    }
}

fn spawn(interpreter: &str, args: &[&str], stdout: Stdio) -> CliResult<Child> {
    Command::new(interpreter)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(stdout)
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| CliError::Spawn {
            interpreter: interpreter.to_string(),
            source,
        })
}

fn frame(code: &str) -> Vec<u8> {
    let mut bytes = format!("{}\n", code.len()).into_bytes();
    bytes.extend_from_slice(code.as_bytes());
    bytes
}

fn parse_length(line: &str) -> CliResult<usize> {
    line.parse()
        .map_err(|_| CliError::Driver(format!("unexpected length line {line:?}")))
}

fn parse_status(line: &str) -> CliResult<Option<String>> {
    match line {
        "ok" => Ok(None),
        _ => match line.strip_prefix("err ") {
            Some(message) => Ok(Some(message.to_string())),
            None => Err(CliError::Driver(format!("unexpected status line {line:?}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[test]
    fn frames_by_byte_length() {
        assert_eq!(frame("x = 1"), b"5\nx = 1".to_vec());
        assert_eq!(frame("s = \"é\""), "8\ns = \"é\"".as_bytes().to_vec());
    }

    #[test]
    fn parses_status_lines() {
        assert_eq!(parse_status("ok").expect("ok"), None);
        assert_eq!(
            parse_status("err division by zero").expect("err"),
            Some("division by zero".to_string())
        );
        assert!(matches!(parse_status("???"), Err(CliError::Driver(_))));
    }

    #[test]
    fn parses_length_lines() {
        assert_eq!(parse_length("12").expect("length"), 12);
        assert!(matches!(parse_length("b"), Err(CliError::Driver(_))));
    }

    #[test]
    fn missing_interpreter_is_a_spawn_error() {
        let err = run_script("/nonexistent/python3", "print(1)").unwrap_err();
        assert!(matches!(err, CliError::Spawn { .. }));
    }

    #[test]
    fn session_keeps_globals_between_calls() {
        if !python_available() {
            return;
        }
        let mut session = PythonSession::start("python3", "import math").expect("start");
        let first = session.execute("x = 41").expect("first");
        assert_eq!(first.output, "");
        let second = session.execute("print(x + 1)").expect("second");
        assert_eq!(second.output, "42\n");
        assert_eq!(second.error, None);
    }

    #[test]
    fn session_reports_runtime_errors_and_continues() {
        if !python_available() {
            return;
        }
        let mut session = PythonSession::start("python3", "").expect("start");
        let failed = session.execute("print('a', end='')\n1 / 0").expect("failed");
        assert_eq!(failed.output, "a");
        assert_eq!(failed.error.as_deref(), Some("division by zero"));
        let next = session.execute("print('b')").expect("next");
        assert_eq!(next.output, "b\n");
    }

    #[test]
    fn output_may_contain_nul_and_newlines() {
        if !python_available() {
            return;
        }
        let mut session = PythonSession::start("python3", "").expect("start");
        let first = session.execute("print(\"a\\x00b\")\nprint('ok')").expect("first");
        assert_eq!(first.output, "a\0b\nok\n");
        assert_eq!(first.error, None);
        let next = session.execute("print('after')").expect("next");
        assert_eq!(next.output, "after\n");
    }

    #[test]
    fn multi_line_exception_messages_stay_on_one_status_line() {
        if !python_available() {
            return;
        }
        let mut session = PythonSession::start("python3", "").expect("start");
        let failed = session
            .execute("raise ValueError('first\\nsecond')")
            .expect("failed");
        assert_eq!(failed.error.as_deref(), Some("first second"));
        let next = session.execute("print('still here')").expect("next");
        assert_eq!(next.output, "still here\n");
    }

    #[test]
    fn exited_driver_is_reported() {
        if !python_available() {
            return;
        }
        let mut session = PythonSession::start("python3", "").expect("start");
        let err = session.execute("raise SystemExit(0)").unwrap_err();
        assert!(matches!(err, CliError::Driver(_)));
    }

    #[test]
    fn script_failure_is_reported() {
        if !python_available() {
            return;
        }
        let err = run_script("python3", "raise SystemExit(3)").unwrap_err();
        assert!(matches!(err, CliError::ScriptFailed(status) if status.code() == Some(3)));
    }
}
