//! OpenSSH + rsync transport.
use std::path::{Path, PathBuf};
use std::time::Duration;

use which::which;

use crate::config::RemoteTarget;
use crate::errors::DeployError;
use crate::util::{shell_join, ExecOutput, ExecRequest, ExecService};

use super::{Remote, RemoteCommand, RemoteOutput, RemoteScript};

/// TCP connect timeout handed to ssh.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for the whole connectivity probe, connect and auth included.
pub const PROBE_TIMEOUT: Duration = CONNECT_TIMEOUT;

const PROBE_TOKEN: &str = "hoist-ok";

/// ssh exits with 255 when the connection itself failed.
const SSH_TRANSPORT_ERROR: i32 = 255;

/// One host behind a key-based identity; reused for every remote operation of a run.
#[derive(Debug, Clone)]
pub struct SshSession {
    target: RemoteTarget,
    ssh: PathBuf,
    exec: ExecService,
    use_sudo: bool,
}

impl SshSession {
    /// Resolve the local ssh binary and verify the host answers a trivial command.
    pub fn connect(target: &RemoteTarget) -> Result<Self, DeployError> {
        let ssh = which("ssh").map_err(|_| {
            DeployError::InputValidation("ssh is required but was not found in PATH".to_string())
        })?;
        let session = Self {
            target: target.clone(),
            ssh,
            exec: ExecService::unbounded(),
            use_sudo: !target.is_root(),
        };
        session.probe()?;
        Ok(session)
    }

    /// Fixed connection options: key auth only, no host key prompts, bounded connect.
    pub fn ssh_options(target: &RemoteTarget) -> Vec<String> {
        vec![
            "-i".to_string(),
            target.identity_file.display().to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", CONNECT_TIMEOUT.as_secs()),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ]
    }

    /// The `-e` value handed to rsync: the same ssh invocation as a quoted command line.
    pub fn rsync_shell(target: &RemoteTarget) -> String {
        let mut words = vec!["ssh".to_string()];
        words.extend(Self::ssh_options(target));
        shell_join(&words)
    }

    /// rsync argv mirroring `local_dir` into `remote_dir`: contents only, extraneous files deleted.
    pub fn rsync_args(
        target: &RemoteTarget,
        local_dir: &Path,
        remote_dir: &str,
        excludes: &[&str],
    ) -> Vec<String> {
        let mut source = local_dir.display().to_string();
        if !source.ends_with('/') {
            source.push('/');
        }
        let dest = format!(
            "{}:{}/",
            target.destination(),
            remote_dir.trim_end_matches('/')
        );

        let mut args = vec![
            "-az".to_string(),
            "--delete".to_string(),
            "-e".to_string(),
            Self::rsync_shell(target),
        ];
        args.extend(excludes.iter().map(|p| format!("--exclude={p}")));
        args.push(source);
        args.push(dest);
        args
    }

    fn request(&self, remote_line: String) -> ExecRequest {
        ExecRequest::new(&self.ssh)
            .args(Self::ssh_options(&self.target))
            .arg("--")
            .arg(self.target.destination())
            .arg(remote_line)
    }

    fn unreachable(&self, detail: impl Into<String>) -> DeployError {
        DeployError::ConnectivityFailure {
            target: self.target.destination(),
            detail: detail.into(),
        }
    }

    fn finish(&self, result: anyhow::Result<ExecOutput>) -> Result<RemoteOutput, DeployError> {
        let out = result.map_err(|e| self.unreachable(format!("{e:#}")))?;
        let code = out.code.unwrap_or(-1);
        if code == SSH_TRANSPORT_ERROR {
            return Err(self.unreachable(out.stderr.trim().to_string()));
        }
        Ok(RemoteOutput {
            stdout: out.stdout,
            stderr: out.stderr,
            code,
        })
    }

    fn probe(&self) -> Result<(), DeployError> {
        let line = RemoteCommand::new("echo").arg(PROBE_TOKEN).render();
        let out = self.finish(self.exec.run(self.request(line).timeout(PROBE_TIMEOUT)))?;
        if out.success() && out.stdout.trim() == PROBE_TOKEN {
            Ok(())
        } else {
            Err(self.unreachable(format!(
                "connectivity probe returned exit code {}: {}",
                out.code,
                out.detail()
            )))
        }
    }
}

impl Remote for SshSession {
    fn describe(&self) -> String {
        self.target.destination()
    }

    fn exec(&self, command: &RemoteCommand) -> Result<RemoteOutput, DeployError> {
        let line = command.render_for(self.use_sudo);
        tracing::debug!(host = %self.target.host, command = %line, "remote exec");
        self.finish(self.exec.run(self.request(line)))
    }

    fn exec_script(&self, script: &RemoteScript) -> Result<RemoteOutput, DeployError> {
        let body = script
            .body
            .build()
            .map_err(|e| DeployError::InputValidation(e.to_string()))?;
        let line = script.launcher().render_for(self.use_sudo);
        tracing::debug!(host = %self.target.host, script = script.label, "remote script");
        self.finish(self.exec.run(self.request(line).stdin(format!("{body}\n"))))
    }

    fn sync_dir(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        excludes: &[&str],
    ) -> Result<(), DeployError> {
        let sync_failure = |detail: String| DeployError::SyncFailure {
            remote_dir: remote_dir.to_string(),
            detail,
        };
        let rsync = which("rsync").map_err(|_| {
            DeployError::InputValidation("rsync is required but was not found in PATH".to_string())
        })?;

        let req = ExecRequest::new(rsync).args(Self::rsync_args(
            &self.target,
            local_dir,
            remote_dir,
            excludes,
        ));

        tracing::debug!(host = %self.target.host, remote_dir, "rsync");
        let out = self
            .exec
            .run(req)
            .map_err(|e| sync_failure(format!("{e:#}")))?;
        match out.code {
            Some(0) => Ok(()),
            Some(SSH_TRANSPORT_ERROR) => Err(self.unreachable(out.stderr.trim().to_string())),
            code => Err(sync_failure(format!(
                "rsync exited with {:?}: {}",
                code,
                out.stderr.trim()
            ))),
        }
    }
}
