#![allow(clippy::module_name_repetitions)]
//! Small utilities: shell quoting for remote command lines, script and text builders, process execution.

pub mod exec;
pub mod shell_script;
pub mod text_lines;

pub use exec::{ExecOutput, ExecRequest, ExecService};
pub use shell_script::ShellScript;
pub use text_lines::TextLines;

/// Reject strings containing newline, carriage return, or NUL before embedding into a remote command.
///
/// Keep error text stable (tests/UX depend on it).
pub fn reject_newlines(s: &str, what: &str) -> Result<(), String> {
    if s.contains('\n') || s.contains('\r') || s.contains('\0') {
        Err(format!("refusing to use {what}: contains newline"))
    } else {
        Ok(())
    }
}

/// Quote every word and join with spaces; the result is safe to hand to a POSIX shell.
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@%+,".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}
