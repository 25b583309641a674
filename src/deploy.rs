//! Container lifecycle on the remote host: replace whatever runs under the derived name.
use crate::errors::DeployError;
use crate::identity;
use crate::log::LogSink;
use crate::remote::{exec_logged, Remote, RemoteCommand, RemoteOutput};
use crate::repo::ManifestKind;

pub const RESTART_POLICY: &str = "unless-stopped";

/// How compose is invoked on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCli {
    /// `docker compose` (v2 plugin)
    Plugin,
    /// standalone `docker-compose`
    Standalone,
}

impl ComposeCli {
    pub fn describe(self) -> &'static str {
        match self {
            ComposeCli::Plugin => "docker compose",
            ComposeCli::Standalone => "docker-compose",
        }
    }

    pub fn command<I, S>(self, args: I) -> RemoteCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            ComposeCli::Plugin => RemoteCommand::privileged("docker").arg("compose").args(args),
            ComposeCli::Standalone => RemoteCommand::privileged("docker-compose").args(args),
        }
    }
}

/// Prefer the v2 plugin; fall back to the standalone binary.
pub fn detect_compose(remote: &dyn Remote) -> Result<Option<ComposeCli>, DeployError> {
    if remote
        .exec(&RemoteCommand::privileged("docker").args(["compose", "version"]))?
        .success()
    {
        return Ok(Some(ComposeCli::Plugin));
    }
    if remote
        .exec(&RemoteCommand::privileged("docker-compose").arg("--version"))?
        .success()
    {
        return Ok(Some(ComposeCli::Standalone));
    }
    Ok(None)
}

/// `docker stop <name>`, tolerant of absence.
pub fn stop_container(name: &str) -> RemoteCommand {
    RemoteCommand::privileged("docker").args(["stop", name])
}

/// `docker rm -f <name>`, tolerant of absence.
pub fn remove_container(name: &str) -> RemoteCommand {
    RemoteCommand::privileged("docker").args(["rm", "-f", name])
}

pub fn build_image(tag: &str, context_dir: &str) -> RemoteCommand {
    RemoteCommand::privileged("docker").args(["build", "-t", tag, context_dir])
}

/// Detached, restarting, published on loopback only; nginx is the public face.
pub fn run_container(name: &str, tag: &str, port: u16) -> RemoteCommand {
    RemoteCommand::privileged("docker").args([
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        name.to_string(),
        "--restart".to_string(),
        RESTART_POLICY.to_string(),
        "-p".to_string(),
        format!("127.0.0.1:{port}:{port}"),
        tag.to_string(),
    ])
}

pub struct ContainerDeployer<'a> {
    remote: &'a dyn Remote,
    log: &'a dyn LogSink,
}

impl<'a> ContainerDeployer<'a> {
    pub fn new(remote: &'a dyn Remote, log: &'a dyn LogSink) -> Self {
        Self { remote, log }
    }

    fn run(&self, command: &RemoteCommand) -> Result<RemoteOutput, DeployError> {
        exec_logged(self.remote, self.log, command)
    }

    fn require(&self, command: &RemoteCommand, what: &str) -> Result<RemoteOutput, DeployError> {
        let out = self.run(command)?;
        if !out.success() {
            return Err(DeployError::DeployFailure(format!(
                "{what} failed (exit {}): {}",
                out.code,
                out.detail()
            )));
        }
        Ok(out)
    }

    /// Stop and remove any previous container called `name`; absence is fine.
    fn remove_previous(&self, name: &str) -> Result<(), DeployError> {
        let stop = self.run(&stop_container(name))?;
        if stop.success() {
            self.log.info(&format!("stopped previous container {name}"));
        }
        self.run(&remove_container(name))?;
        Ok(())
    }

    pub fn deploy(
        &self,
        remote_dir: &str,
        name: &str,
        port: u16,
        manifest: &ManifestKind,
    ) -> Result<(), DeployError> {
        self.remove_previous(name)?;
        match manifest {
            ManifestKind::Compose { file } => self.deploy_compose(remote_dir, name, file),
            ManifestKind::SingleDockerfile => self.deploy_single(remote_dir, name, port),
        }
    }

    fn deploy_compose(&self, remote_dir: &str, name: &str, file: &str) -> Result<(), DeployError> {
        let cli = detect_compose(self.remote)?.ok_or_else(|| {
            DeployError::DeployFailure(
                "neither `docker compose` nor `docker-compose` is available on the host".to_string(),
            )
        })?;
        let manifest = format!("{}/{}", remote_dir.trim_end_matches('/'), file);
        let base = ["-p", name, "-f", manifest.as_str()];

        self.log
            .info(&format!("bringing down previous stack {name} ({})", cli.describe()));
        self.run(&cli.command(base.iter().copied().chain(["down", "--remove-orphans"])))?;

        self.log.info(&format!("starting stack {name}"));
        self.require(
            &cli.command(
                base.iter()
                    .copied()
                    .chain(["up", "-d", "--build", "--remove-orphans"]),
            ),
            "compose up",
        )?;
        Ok(())
    }

    fn deploy_single(&self, remote_dir: &str, name: &str, port: u16) -> Result<(), DeployError> {
        let tag = identity::image_tag(name);
        self.log.info(&format!("building image {tag}"));
        self.require(&build_image(&tag, remote_dir), "docker build")?;

        // The name may have been taken again while the build ran.
        self.run(&remove_container(name))?;

        self.log
            .info(&format!("starting {name} on 127.0.0.1:{port}"));
        self.require(&run_container(name, &tag, port), "docker run")?;
        Ok(())
    }
}
