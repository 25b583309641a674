//! Post-deployment checks, from the runtime inward to the public port.
use std::time::Duration;

use serde::Serialize;

use crate::errors::DeployError;
use crate::log::LogSink;
use crate::remote::{exec_logged, Remote, RemoteCommand};
use crate::repo::ManifestKind;

pub const PUBLIC_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const LOOPBACK_URL: &str = "http://127.0.0.1:80/";

/// Outcome of a run's validation; serialized into the run log as one JSON line.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub name: String,
    pub runtime_healthy: bool,
    pub containers: Vec<String>,
    pub local_http_status: Option<u16>,
    pub public_url: String,
    pub public_http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_error: Option<String>,
}

impl ValidationReport {
    pub fn publicly_reachable(&self) -> bool {
        matches!(self.public_http_status, Some(code) if code < 500)
    }
}

/// HTTP GET from the machine running hoist; returns the status code.
pub trait PublicProbe {
    fn status(&self, url: &str) -> Result<u16, String>;
}

pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(PUBLIC_PROBE_TIMEOUT)
    }
}

impl PublicProbe for HttpProbe {
    fn status(&self, url: &str) -> Result<u16, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| e.to_string())?;
        tracing::debug!(url, "public probe");
        let resp = client.get(url).send().map_err(|e| e.to_string())?;
        Ok(resp.status().as_u16())
    }
}

/// `http://<host>:80/`, bracketing IPv6 literals.
pub fn public_url(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:80/")
    } else {
        format!("http://{host}:80/")
    }
}

/// Filter selecting the deployment's containers: the container name itself, or the compose project.
pub fn container_filter(name: &str, manifest: &ManifestKind) -> String {
    match manifest {
        ManifestKind::Compose { .. } => format!("label=com.docker.compose.project={name}"),
        ManifestKind::SingleDockerfile => format!("name=^{name}$"),
    }
}

/// `curl` through nginx on the host itself; prints only the status code (`000` when nothing answered).
pub fn loopback_probe() -> RemoteCommand {
    RemoteCommand::new("curl").args([
        "-s",
        "-o",
        "/dev/null",
        "-w",
        "%{http_code}",
        "--max-time",
        "10",
        LOOPBACK_URL,
    ])
}

/// 000 means no answer; 502-504 means nginx answered but the upstream did not.
fn loopback_ok(code: u16) -> bool {
    code != 0 && !(502..=504).contains(&code)
}

pub struct DeploymentValidator<'a> {
    remote: &'a dyn Remote,
    log: &'a dyn LogSink,
    probe: &'a dyn PublicProbe,
}

impl<'a> DeploymentValidator<'a> {
    pub fn new(remote: &'a dyn Remote, log: &'a dyn LogSink, probe: &'a dyn PublicProbe) -> Self {
        Self { remote, log, probe }
    }

    pub fn validate(
        &self,
        name: &str,
        manifest: &ManifestKind,
        public_host: &str,
    ) -> Result<ValidationReport, DeployError> {
        let mut report = ValidationReport {
            name: name.to_string(),
            public_url: public_url(public_host),
            ..ValidationReport::default()
        };

        self.check_runtime()?;
        report.runtime_healthy = true;

        report.containers = self.check_containers(name, manifest)?;

        report.local_http_status = Some(self.check_loopback()?);

        match self.probe.status(&report.public_url) {
            Ok(code) => report.public_http_status = Some(code),
            Err(e) => report.public_error = Some(e),
        }
        if let (true, Some(code)) = (report.publicly_reachable(), report.public_http_status) {
            self.log
                .info(&format!("{} answered {code}", report.public_url));
        } else {
            let why = match (&report.public_error, report.public_http_status) {
                (Some(e), _) => e.clone(),
                (None, Some(code)) => format!("status {code}"),
                (None, None) => "no response".to_string(),
            };
            self.log.warn(&format!(
                "{} is not reachable from here ({why}); check the host firewall or security group",
                report.public_url
            ));
        }
        Ok(report)
    }

    fn check_runtime(&self) -> Result<(), DeployError> {
        let out = exec_logged(
            self.remote,
            self.log,
            &RemoteCommand::privileged("docker").args(["info", "--format", "{{.ServerVersion}}"]),
        )?;
        if !out.success() {
            return Err(DeployError::RuntimeDown(out.detail()));
        }
        self.log
            .info(&format!("docker runtime healthy (server {})", out.stdout.trim()));
        Ok(())
    }

    fn check_containers(&self, name: &str, manifest: &ManifestKind) -> Result<Vec<String>, DeployError> {
        let filter = container_filter(name, manifest);
        let running = exec_logged(
            self.remote,
            self.log,
            &RemoteCommand::privileged("docker").args([
                "ps",
                "--filter",
                filter.as_str(),
                "--filter",
                "status=running",
                "--format",
                "{{.Names}}",
            ]),
        )?;
        let names: Vec<String> = running
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if running.success() && !names.is_empty() {
            self.log
                .info(&format!("running containers: {}", names.join(", ")));
            return Ok(names);
        }

        let all = exec_logged(
            self.remote,
            self.log,
            &RemoteCommand::privileged("docker").args([
                "ps",
                "-a",
                "--filter",
                filter.as_str(),
                "--format",
                "{{.Names}}: {{.Status}}",
            ]),
        )?;
        let status = all
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        Err(DeployError::ContainerNotActive {
            name: name.to_string(),
            status: if status.is_empty() {
                "no such container".to_string()
            } else {
                status
            },
        })
    }

    fn check_loopback(&self) -> Result<u16, DeployError> {
        let out = exec_logged(self.remote, self.log, &loopback_probe())?;
        let code: u16 = out.stdout.trim().parse().unwrap_or(0);
        if !loopback_ok(code) {
            return Err(DeployError::LocalHttpFailure(format!(
                "{LOOPBACK_URL} returned {:03} (curl exit {})",
                code, out.code
            )));
        }
        self.log
            .info(&format!("{LOOPBACK_URL} answered {code} on the host"));
        Ok(code)
    }
}
