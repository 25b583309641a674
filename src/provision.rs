//! Idempotent remote environment bootstrap: docker, compose, nginx, service state, app directory.
use crate::deploy::{detect_compose, ComposeCli};
use crate::errors::DeployError;
use crate::log::LogSink;
use crate::remote::{exec_logged, has_binary, script_logged, Remote, RemoteCommand, RemoteScript};
use crate::util::ShellScript;

/// Probe order matters: the first manager found wins.
pub const PACKAGE_MANAGER_PRIORITY: [PackageManager; 3] =
    [PackageManager::Apt, PackageManager::Yum, PackageManager::Dnf];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Yum,
    Dnf,
}

impl PackageManager {
    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Yum => "yum",
            PackageManager::Dnf => "dnf",
        }
    }

    fn install_script(self, package: &str) -> RemoteScript {
        let mut body = ShellScript::strict();
        match self {
            PackageManager::Apt => {
                body.push("export DEBIAN_FRONTEND=noninteractive")
                    .push("apt-get update -y")
                    .push("apt-get install -y \"$1\"");
            }
            PackageManager::Yum | PackageManager::Dnf => {
                body.push(format!("{} install -y \"$1\"", self.binary()));
            }
        }
        RemoteScript::new("package install", body)
            .privileged()
            .arg(package)
    }
}

/// Vendor repository bootstrap for apt hosts; installs engine, CLI, buildx and compose plugin.
pub fn docker_apt_bootstrap() -> RemoteScript {
    let mut body = ShellScript::strict();
    body.push("export DEBIAN_FRONTEND=noninteractive")
        .push("apt-get update -y")
        .push("apt-get install -y ca-certificates curl gnupg")
        .push("install -m 0755 -d /etc/apt/keyrings")
        .push(". /etc/os-release")
        .push("case \"${ID:-}\" in ubuntu|debian|raspbian) distro=\"$ID\" ;; *) distro=ubuntu ;; esac")
        .push("codename=\"${VERSION_CODENAME:-${UBUNTU_CODENAME:-}}\"")
        .push("curl -fsSL \"https://download.docker.com/linux/$distro/gpg\" -o /etc/apt/keyrings/docker.asc")
        .push("chmod a+r /etc/apt/keyrings/docker.asc")
        .push("echo \"deb [arch=$(dpkg --print-architecture) signed-by=/etc/apt/keyrings/docker.asc] https://download.docker.com/linux/$distro $codename stable\" > /etc/apt/sources.list.d/docker.list")
        .push("apt-get update -y")
        .push("apt-get install -y docker-ce docker-ce-cli containerd.io docker-buildx-plugin docker-compose-plugin");
    RemoteScript::new("docker apt bootstrap", body).privileged()
}

/// Enable and start a service with systemctl, falling back to `service`; no-op without either.
pub fn enable_service_script(service: &str) -> RemoteScript {
    let mut body = ShellScript::new();
    body.push("if command -v systemctl >/dev/null 2>&1")
        .push("then systemctl enable \"$1\" && systemctl start \"$1\"")
        .push("elif command -v service >/dev/null 2>&1")
        .push("then service \"$1\" start")
        .push("else echo \"no service manager found; leaving $1 as is\" >&2")
        .push("fi");
    RemoteScript::new("enable service", body)
        .privileged()
        .arg(service)
}

/// First package manager from the priority list that exists on the host.
pub fn detect_package_manager(remote: &dyn Remote) -> Result<Option<PackageManager>, DeployError> {
    for pm in PACKAGE_MANAGER_PRIORITY {
        if has_binary(remote, pm.binary())? {
            return Ok(Some(pm));
        }
    }
    Ok(None)
}

/// Install `package` unless `binary` is already on the host.
pub fn ensure_installed(
    remote: &dyn Remote,
    log: &dyn LogSink,
    pm: Option<PackageManager>,
    binary: &str,
    package: &str,
) -> Result<(), DeployError> {
    if has_binary(remote, binary)? {
        log.info(&format!("{binary} already present"));
        return Ok(());
    }
    let pm = pm.ok_or_else(|| DeployError::UnsupportedPlatform(binary.to_string()))?;
    log.info(&format!("installing {package} with {}", pm.binary()));
    let out = script_logged(remote, log, &pm.install_script(package))?;
    if !out.success() || !has_binary(remote, binary)? {
        return Err(DeployError::ProvisionFailure(format!(
            "installing {package} did not provide {binary}: {}",
            out.detail()
        )));
    }
    Ok(())
}

/// What provisioning found and which advisory steps failed.
#[derive(Debug, Default)]
pub struct ProvisionSummary {
    pub package_manager: Option<PackageManager>,
    pub compose: Option<ComposeCli>,
    pub advisories: Vec<String>,
}

pub struct EnvironmentProvisioner<'a> {
    remote: &'a dyn Remote,
    log: &'a dyn LogSink,
}

impl<'a> EnvironmentProvisioner<'a> {
    pub fn new(remote: &'a dyn Remote, log: &'a dyn LogSink) -> Self {
        Self { remote, log }
    }

    /// Log an advisory failure; connectivity errors still abort.
    fn advisory(
        &self,
        summary: &mut ProvisionSummary,
        step: &str,
        err: DeployError,
    ) -> Result<(), DeployError> {
        if err.is_connectivity() {
            return Err(err);
        }
        let msg = format!("{step}: {err}");
        self.log.warn(&msg);
        summary.advisories.push(msg);
        Ok(())
    }

    /// Run every step; only docker installation and the app directory are fatal.
    pub fn ensure(&self, app_dir: &str, owner: &str) -> Result<ProvisionSummary, DeployError> {
        let mut summary = ProvisionSummary::default();

        summary.package_manager = detect_package_manager(self.remote)?;
        match summary.package_manager {
            Some(pm) => self.log.info(&format!("package manager: {}", pm.binary())),
            None => self
                .log
                .warn("no supported package manager found (apt-get, yum, dnf)"),
        }

        self.ensure_docker(summary.package_manager)?;

        match self.ensure_compose(summary.package_manager) {
            Ok(cli) => summary.compose = Some(cli),
            Err(e) => self.advisory(&mut summary, "compose", e)?,
        }

        for (binary, package) in [("nginx", "nginx"), ("curl", "curl"), ("rsync", "rsync")] {
            if let Err(e) =
                ensure_installed(self.remote, self.log, summary.package_manager, binary, package)
            {
                self.advisory(&mut summary, binary, e)?;
            }
        }

        for service in ["docker", "nginx"] {
            let out = script_logged(self.remote, self.log, &enable_service_script(service))?;
            if !out.success() {
                let e = DeployError::ProvisionFailure(format!(
                    "could not enable/start {service}: {}",
                    out.detail()
                ));
                self.advisory(&mut summary, "service", e)?;
            }
        }

        self.ensure_app_dir(app_dir, owner)?;
        Ok(summary)
    }

    fn ensure_docker(&self, pm: Option<PackageManager>) -> Result<(), DeployError> {
        if has_binary(self.remote, "docker")? {
            self.log.info("docker already present");
            return Ok(());
        }
        match pm {
            Some(PackageManager::Apt) => {
                self.log.info("installing docker from the vendor apt repository");
                let out = script_logged(self.remote, self.log, &docker_apt_bootstrap())?;
                if !out.success() || !has_binary(self.remote, "docker")? {
                    return Err(DeployError::ProvisionFailure(format!(
                        "docker installation failed: {}",
                        out.detail()
                    )));
                }
                Ok(())
            }
            other => ensure_installed(self.remote, self.log, other, "docker", "docker"),
        }
    }

    fn ensure_compose(&self, pm: Option<PackageManager>) -> Result<ComposeCli, DeployError> {
        if let Some(cli) = detect_compose(self.remote)? {
            self.log.info(&format!("compose available as `{}`", cli.describe()));
            return Ok(cli);
        }
        let pm = pm.ok_or_else(|| DeployError::UnsupportedPlatform("docker compose".to_string()))?;
        self.log.info("installing the docker compose plugin");
        let out = script_logged(
            self.remote,
            self.log,
            &pm.install_script("docker-compose-plugin"),
        )?;
        match detect_compose(self.remote)? {
            Some(cli) => Ok(cli),
            None => Err(DeployError::ProvisionFailure(format!(
                "compose is still unavailable: {}",
                out.detail()
            ))),
        }
    }

    fn ensure_app_dir(&self, app_dir: &str, owner: &str) -> Result<(), DeployError> {
        let mkdir = exec_logged(
            self.remote,
            self.log,
            &RemoteCommand::privileged("mkdir").args(["-p", app_dir]),
        )?;
        if !mkdir.success() {
            return Err(DeployError::ProvisionFailure(format!(
                "could not create {app_dir}: {}",
                mkdir.detail()
            )));
        }
        let chown = exec_logged(
            self.remote,
            self.log,
            &RemoteCommand::privileged("chown")
                .arg("-R")
                .arg(format!("{owner}:"))
                .arg(app_dir),
        )?;
        if !chown.success() {
            return Err(DeployError::ProvisionFailure(format!(
                "could not hand {app_dir} to {owner}: {}",
                chown.detail()
            )));
        }
        self.log.info(&format!("{app_dir} ready for {owner}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{MemoryLog, Severity};
    use crate::remote::fake::FakeRemote;
    use crate::remote::RemoteOutput;

    fn missing() -> RemoteOutput {
        RemoteOutput::failed(1, "")
    }

    #[test]
    fn detects_first_manager_in_priority_order() {
        let remote = FakeRemote::new()
            .on("command -v apt-get", missing())
            .on("command -v yum", RemoteOutput::ok("/usr/bin/yum"));
        assert_eq!(detect_package_manager(&remote).unwrap(), Some(PackageManager::Yum));
        assert_eq!(
            remote.calls(),
            vec!["command -v apt-get".to_string(), "command -v yum".to_string()]
        );
    }

    #[test]
    fn no_manager_and_missing_binary_is_unsupported() {
        let remote = FakeRemote::new().on("command -v", missing());
        let log = MemoryLog::new();
        let err = ensure_installed(&remote, &log, None, "nginx", "nginx").unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedPlatform(_)));
    }

    #[test]
    fn present_binary_skips_install_even_without_manager() {
        let remote = FakeRemote::new();
        let log = MemoryLog::new();
        ensure_installed(&remote, &log, None, "nginx", "nginx").unwrap();
        assert!(!remote.called("script:"));
    }

    #[test]
    fn fully_provisioned_host_is_left_alone() {
        let remote = FakeRemote::new();
        let log = MemoryLog::new();
        let summary = EnvironmentProvisioner::new(&remote, &log)
            .ensure("/opt/demo", "deploy")
            .unwrap();
        assert_eq!(summary.package_manager, Some(PackageManager::Apt));
        assert_eq!(summary.compose, Some(ComposeCli::Plugin));
        assert!(summary.advisories.is_empty());
        assert!(!remote.called("script:docker apt bootstrap"));
        assert!(!remote.called("script:package install"));
        assert!(remote.called("mkdir -p /opt/demo"));
        assert!(remote.called("chown -R deploy: /opt/demo"));
    }

    #[test]
    fn apt_host_without_docker_runs_vendor_bootstrap() {
        let remote = FakeRemote::new()
            .on("command -v docker", missing())
            .on("script:docker apt bootstrap", RemoteOutput::failed(100, "E: unable to locate"));
        let log = MemoryLog::new();
        let err = EnvironmentProvisioner::new(&remote, &log)
            .ensure("/opt/demo", "deploy")
            .unwrap_err();
        assert!(matches!(err, DeployError::ProvisionFailure(_)), "{err}");
        assert_eq!(err.exit_code(), crate::errors::EXIT_PROVISION);
        assert!(!remote.called("mkdir"));
    }

    #[test]
    fn compose_and_service_failures_are_advisory() {
        let remote = FakeRemote::new()
            .on("docker compose version", missing())
            .on("docker-compose --version", missing())
            .on("script:enable service nginx", RemoteOutput::failed(1, "unit not found"));
        let log = MemoryLog::new();
        let summary = EnvironmentProvisioner::new(&remote, &log)
            .ensure("/opt/demo", "deploy")
            .unwrap();
        assert!(summary.compose.is_none());
        assert_eq!(summary.advisories.len(), 2, "{:?}", summary.advisories);
        assert!(log.count(Severity::Warn) >= 2);
        assert!(remote.called("script:package install docker-compose-plugin"));
        assert!(remote.called("chown -R deploy: /opt/demo"));
    }

    #[test]
    fn yum_host_installs_docker_package_directly() {
        let remote = FakeRemote::new()
            .on("command -v apt-get", missing())
            .on("command -v docker", missing());
        let log = MemoryLog::new();
        let err = EnvironmentProvisioner::new(&remote, &log)
            .ensure("/opt/demo", "deploy")
            .unwrap_err();
        // The fake keeps reporting docker as missing after the install attempt.
        assert!(matches!(err, DeployError::ProvisionFailure(_)));
        assert!(remote.called("script:package install docker"));
        assert!(!remote.called("script:docker apt bootstrap"));
    }

    #[test]
    fn unreachable_host_is_connectivity_failure() {
        let remote = FakeRemote::offline();
        let log = MemoryLog::new();
        let err = EnvironmentProvisioner::new(&remote, &log)
            .ensure("/opt/demo", "deploy")
            .unwrap_err();
        assert!(err.is_connectivity());
    }
}
