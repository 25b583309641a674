//! Reverse a deployment: container, image, compose stack and proxy activation.
use crate::deploy::{detect_compose, remove_container};
use crate::errors::DeployError;
use crate::identity;
use crate::log::LogSink;
use crate::proxy::deactivation_script;
use crate::remote::{exec_logged, script_logged, Remote, RemoteCommand};

/// What cleanup removed; every step is best-effort.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub container_removed: bool,
    pub image_removed: bool,
    pub stack_removed: bool,
    pub proxy_reloaded: bool,
}

pub struct CleanupOperator<'a> {
    remote: &'a dyn Remote,
    log: &'a dyn LogSink,
}

impl<'a> CleanupOperator<'a> {
    pub fn new(remote: &'a dyn Remote, log: &'a dyn LogSink) -> Self {
        Self { remote, log }
    }

    /// Only an unreachable host is an error; missing resources are logged and skipped.
    pub fn cleanup(&self, name: &str) -> Result<CleanupSummary, DeployError> {
        self.run_steps(name).map_err(|e| match e {
            DeployError::ConnectivityFailure { target, detail } => {
                DeployError::CleanupFailure(format!("{target}: {detail}"))
            }
            other => other,
        })
    }

    fn run_steps(&self, name: &str) -> Result<CleanupSummary, DeployError> {
        let mut summary = CleanupSummary::default();

        summary.container_removed = self.tolerant(&remove_container(name), "container")?;

        let tag = identity::image_tag(name);
        summary.image_removed =
            self.tolerant(&RemoteCommand::privileged("docker").args(["rmi", tag.as_str()]), "image")?;

        if let Some(cli) = detect_compose(self.remote)? {
            summary.stack_removed = self.tolerant(
                &cli.command(["-p", name, "down", "--remove-orphans"]),
                "compose stack",
            )?;
        }

        let out = script_logged(self.remote, self.log, &deactivation_script(name))?;
        if out.success() {
            summary.proxy_reloaded = true;
            self.log
                .info(&format!("removed nginx site {}", identity::proxy_file(name)));
        } else {
            self.log.warn(&format!(
                "nginx site removal for {name} did not complete: {}",
                out.detail()
            ));
        }
        Ok(summary)
    }

    fn tolerant(&self, command: &RemoteCommand, what: &str) -> Result<bool, DeployError> {
        let out = exec_logged(self.remote, self.log, command)?;
        if out.success() {
            self.log.info(&format!("removed {what}: {}", command.render()));
        } else {
            self.log
                .info(&format!("{what} not removed ({}); skipping", out.detail()));
        }
        Ok(out.success())
    }
}
