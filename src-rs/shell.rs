//! Bounded execution of helper programs (osascript, xdotool, wmctrl).

use std::io;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

const ONE_SHOT_TIMEOUT: Duration = Duration::from_millis(800);

/// Outcome of a helper-program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub ok: bool,
    pub attempts: u32,
    pub error_code: Option<String>,
    pub message: Option<String>,
}

impl Diagnostic {
    pub fn succeeded(attempts: u32) -> Self {
        Self {
            ok: true,
            attempts,
            error_code: None,
            message: None,
        }
    }

    pub fn failed(code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            attempts: 0,
            error_code: Some(code.to_string()),
            message: Some(message.into()),
        }
    }

    /// `code: message` for log lines.
    pub fn summary(&self) -> String {
        match (&self.error_code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "ok".to_string(),
        }
    }
}

#[derive(Debug)]
enum Failure {
    Spawn(io::Error),
    Wait(io::Error),
    TimedOut(Duration),
    Exit { code: i32, stderr: String },
}

impl Failure {
    fn code(&self) -> String {
        match self {
            Failure::Spawn(_) => "spawn_failed".to_string(),
            Failure::Wait(_) => "wait_failed".to_string(),
            Failure::TimedOut(_) => "timeout".to_string(),
            Failure::Exit { code, .. } => format!("exit_{code}"),
        }
    }

    fn describe(&self, program: &str) -> String {
        match self {
            Failure::Spawn(err) => format!("cannot start {program}: {err}"),
            Failure::Wait(err) => format!("lost track of {program}: {err}"),
            Failure::TimedOut(limit) => format!("{program} killed after {} ms", limit.as_millis()),
            Failure::Exit { stderr, .. } if !stderr.is_empty() => stderr.clone(),
            Failure::Exit { code, .. } => format!("{program} exited with status {code}"),
        }
    }
}

/// One bounded run; trimmed stdout on a zero exit status.
fn run_bounded(program: &str, args: &[&str], timeout: Duration) -> Result<String, Failure> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(Failure::Spawn)?;

    match child.wait_timeout(timeout) {
        Ok(Some(_)) => {}
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Failure::TimedOut(timeout));
        }
        Err(err) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Failure::Wait(err));
        }
    }

    let output = child.wait_with_output().map_err(Failure::Wait)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(Failure::Exit {
            code: output.status.code().unwrap_or(1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Runs `program args..` up to `attempts` times, pausing `delay` between
/// tries. Returns stdout of the first successful run.
pub fn run_with_retry(
    program: &str,
    args: &[&str],
    attempts: u32,
    timeout: Duration,
    delay: Duration,
) -> (Option<String>, Diagnostic) {
    let attempts = attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        if attempt > 1 {
            thread::sleep(delay);
        }
        match run_bounded(program, args, timeout) {
            Ok(stdout) => return (Some(stdout), Diagnostic::succeeded(attempt)),
            Err(failure) => {
                debug!("[shell] {program} attempt {attempt}/{attempts}: {failure:?}");
                last = Some(failure);
            }
        }
    }

    let diag = match last {
        Some(failure) => Diagnostic {
            attempts,
            ..Diagnostic::failed(&failure.code(), failure.describe(program))
        },
        None => Diagnostic::failed("not_run", format!("{program} was never started")),
    };
    (None, diag)
}

/// Single attempt with a short timeout; the common case for key and focus helpers.
pub fn run_once(program: &str, args: &[&str]) -> Diagnostic {
    run_with_retry(program, args, 1, ONE_SHOT_TIMEOUT, Duration::ZERO).1
}

/// AppleScript string literal body for `value`.
#[cfg(any(target_os = "macos", test))]
pub fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_spawn_failure() {
        let diag = run_once("edge-enter-definitely-missing-helper", &[]);
        assert!(!diag.ok);
        assert_eq!(diag.error_code.as_deref(), Some("spawn_failed"));
        assert!(diag
            .message
            .as_deref()
            .is_some_and(|m| m.starts_with("cannot start edge-enter-definitely-missing-helper")));
        assert_eq!(diag.attempts, 1);
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_of_successful_command() {
        let (stdout, diag) = run_with_retry(
            "sh",
            &["-c", "echo ready"],
            2,
            Duration::from_secs(5),
            Duration::ZERO,
        );
        assert_eq!(diag, Diagnostic::succeeded(1));
        assert_eq!(stdout.as_deref(), Some("ready"));
    }

    #[cfg(unix)]
    #[test]
    fn reports_nonzero_exit_after_all_attempts() {
        let (stdout, diag) = run_with_retry(
            "sh",
            &["-c", "echo nope >&2; exit 3"],
            2,
            Duration::from_secs(5),
            Duration::ZERO,
        );
        assert!(stdout.is_none());
        assert_eq!(diag.attempts, 2);
        assert_eq!(diag.error_code.as_deref(), Some("exit_3"));
        assert_eq!(diag.message.as_deref(), Some("nope"));
    }

    #[cfg(unix)]
    #[test]
    fn slow_helper_is_killed_at_the_timeout() {
        let diag = run_with_retry(
            "sh",
            &["-c", "sleep 5"],
            1,
            Duration::from_millis(100),
            Duration::ZERO,
        )
        .1;
        assert_eq!(diag.error_code.as_deref(), Some("timeout"));
        assert_eq!(diag.message.as_deref(), Some("sh killed after 100 ms"));
    }

    #[test]
    fn summary_prefers_code_and_message() {
        assert_eq!(Diagnostic::failed("x", "boom").summary(), "x: boom");
        assert_eq!(Diagnostic::succeeded(1).summary(), "ok");
    }

    #[test]
    fn escapes_applescript_literals() {
        assert_eq!(applescript_escape(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }
}
