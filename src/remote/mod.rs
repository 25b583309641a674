//! Remote host access: structured commands, parameterized scripts and directory sync.
//!
//! Every remote-acting stage talks to a [`Remote`]. The ssh implementation is the only place that
//! turns transport failures into `ConnectivityFailure`; callers only ever see exit codes.

use std::path::Path;

use crate::errors::DeployError;
use crate::log::LogSink;
use crate::util::{shell_join, ShellScript};

pub mod ssh;

#[cfg(test)]
pub(crate) mod fake;

pub use ssh::SshSession;

/// A program plus arguments; rendered with per-argument quoting, never by string concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    privileged: bool,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            privileged: false,
        }
    }

    /// Same command, run through `sudo -n` for non-root users.
    pub fn privileged(program: impl Into<String>) -> Self {
        Self {
            privileged: true,
            ..Self::new(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The quoted command line without any privilege prefix.
    pub fn render(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.clone());
        words.extend(self.args.iter().cloned());
        shell_join(&words)
    }

    /// The quoted command line as sent to the remote login shell.
    pub fn render_for(&self, use_sudo: bool) -> String {
        if self.privileged && use_sudo {
            format!("sudo -n {}", self.render())
        } else {
            self.render()
        }
    }
}

/// Script body fed to `sh -s` on stdin; values are passed as `$1..$n`.
#[derive(Debug, Clone)]
pub struct RemoteScript {
    pub label: &'static str,
    pub body: ShellScript,
    pub args: Vec<String>,
    pub privileged: bool,
}

impl RemoteScript {
    pub fn new(label: &'static str, body: ShellScript) -> Self {
        Self {
            label,
            body,
            args: Vec::new(),
            privileged: false,
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Remote command that reads the body from stdin: `sh -s -- <args>`.
    pub fn launcher(&self) -> RemoteCommand {
        let cmd = if self.privileged {
            RemoteCommand::privileged("sh")
        } else {
            RemoteCommand::new("sh")
        };
        cmd.args(["-s", "--"]).args(self.args.iter().cloned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl RemoteOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            code,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Trimmed stderr, falling back to stdout; used in error messages.
    pub fn detail(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

/// Command execution and file sync against one host.
pub trait Remote {
    /// `user@host`, for messages.
    fn describe(&self) -> String;

    /// Run a command; `Err` only when the host could not be reached.
    fn exec(&self, command: &RemoteCommand) -> Result<RemoteOutput, DeployError>;

    /// Run a script body with positional arguments.
    fn exec_script(&self, script: &RemoteScript) -> Result<RemoteOutput, DeployError>;

    /// Mirror `local_dir` into `remote_dir`, deleting remote files absent locally.
    fn sync_dir(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        excludes: &[&str],
    ) -> Result<(), DeployError>;
}

/// Convenience: does `command -v <binary>` succeed remotely?
pub fn has_binary(remote: &dyn Remote, binary: &str) -> Result<bool, DeployError> {
    let out = remote.exec(&RemoteCommand::new("command").args(["-v", binary]))?;
    Ok(out.success())
}

/// Run a command and copy its output into the run log under the rendered command line.
pub fn exec_logged(
    remote: &dyn Remote,
    log: &dyn LogSink,
    command: &RemoteCommand,
) -> Result<RemoteOutput, DeployError> {
    let out = remote.exec(command)?;
    let label = command.render();
    log.output(&label, &out.stdout);
    log.output(&label, &out.stderr);
    if !out.success() {
        tracing::debug!(command = %label, code = out.code, "remote command failed");
    }
    Ok(out)
}

/// Run a script and copy its output into the run log under the script label.
pub fn script_logged(
    remote: &dyn Remote,
    log: &dyn LogSink,
    script: &RemoteScript,
) -> Result<RemoteOutput, DeployError> {
    let out = remote.exec_script(script)?;
    log.output(script.label, &out.stdout);
    log.output(script.label, &out.stderr);
    if !out.success() {
        tracing::debug!(script = script.label, code = out.code, "remote script failed");
    }
    Ok(out)
}
