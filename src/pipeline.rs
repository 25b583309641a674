//! Stage sequencing for deploy and cleanup runs.
//!
//! Each stage returns one `Result`; the orchestrator consults [`Stage::policy`] to decide whether a
//! failure ends the run or is logged as a warning. Connectivity failures always end the run.
use std::fmt;
use std::path::Path;

use crate::cleanup::{CleanupOperator, CleanupSummary};
use crate::config::{CleanupConfig, DeploymentConfig, RemoteTarget};
use crate::deploy::ContainerDeployer;
use crate::errors::DeployError;
use crate::identity::DerivedIdentity;
use crate::log::LogSink;
use crate::provision::EnvironmentProvisioner;
use crate::proxy::ReverseProxyConfigurator;
use crate::remote::Remote;
use crate::repo::{LocalRepository, RepoState};
use crate::source::{self, Redactor};
use crate::validate::{DeploymentValidator, PublicProbe, ValidationReport};

/// Paths never shipped to the host.
pub const SYNC_EXCLUDES: [&str; 1] = [".git"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clone,
    Connect,
    Provision,
    Sync,
    Deploy,
    Proxy,
    Validate,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Abort,
    WarnAndContinue,
}

impl Stage {
    pub fn policy(self) -> Policy {
        match self {
            Stage::Proxy => Policy::WarnAndContinue,
            Stage::Clone
            | Stage::Connect
            | Stage::Provision
            | Stage::Sync
            | Stage::Deploy
            | Stage::Validate
            | Stage::Cleanup => Policy::Abort,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Clone => "local repository",
            Stage::Connect => "remote connectivity",
            Stage::Provision => "remote environment",
            Stage::Sync => "file sync",
            Stage::Deploy => "container deployment",
            Stage::Proxy => "reverse proxy",
            Stage::Validate => "validation",
            Stage::Cleanup => "cleanup",
        })
    }
}

/// Everything a stage needs besides the remote handle.
pub struct RunContext<'a> {
    pub identity: DerivedIdentity,
    pub log: &'a dyn LogSink,
    pub redactor: Redactor,
}

impl<'a> RunContext<'a> {
    pub fn new(repo_url: &str, redactor: Redactor, log: &'a dyn LogSink) -> Result<Self, DeployError> {
        Ok(Self {
            identity: DerivedIdentity::from_url(repo_url)?,
            log,
            redactor,
        })
    }

    /// Run one stage; any failure ends the run.
    pub fn stage<T>(
        &self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, DeployError>,
    ) -> Result<T, DeployError> {
        self.log.info(&format!("==> {stage}"));
        f().map_err(|e| self.fail(stage, e))
    }

    /// Run a stage whose policy may tolerate failure; `Ok(None)` when it failed and the run goes on.
    /// Connectivity failures and stages with an abort policy still end the run.
    pub fn advisory_stage<T>(
        &self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, DeployError>,
    ) -> Result<Option<T>, DeployError> {
        self.log.info(&format!("==> {stage}"));
        match f() {
            Ok(v) => Ok(Some(v)),
            Err(e) if stage.policy() == Policy::WarnAndContinue && !e.is_connectivity() => {
                self.log
                    .warn(&format!("{stage} failed, continuing: {}", self.redactor.redact(&e.to_string())));
                Ok(None)
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    fn fail(&self, stage: Stage, e: DeployError) -> DeployError {
        self.log
            .error(&format!("{stage} failed: {}", self.redactor.redact(&e.to_string())));
        e
    }
}

/// Result of a successful deploy run.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub head: Option<String>,
    pub report: ValidationReport,
    pub proxy_configured: bool,
    pub warnings: Vec<String>,
}

/// Full deploy: local checkout, then `connect`, then every remote stage.
pub fn run_deploy<R, C>(
    config: &DeploymentConfig,
    workdir: &Path,
    log: &dyn LogSink,
    connect: C,
    probe: &dyn PublicProbe,
) -> Result<DeployOutcome, DeployError>
where
    R: Remote,
    C: FnOnce(&RemoteTarget) -> Result<R, DeployError>,
{
    let ctx = RunContext::new(&config.repo_url, Redactor::new(&config.credential), log)?;
    log.info(&format!(
        "deploying {} (branch {}) as {} to {}",
        config.repo_url,
        config.branch,
        ctx.identity.name,
        config.target.destination()
    ));

    let state = ctx.stage(Stage::Clone, || {
        let auth_url = source::resolve(&config.repo_url, &config.credential);
        LocalRepository::new(&ctx.redactor, log)?.sync_to_branch(
            &auth_url,
            &config.repo_url,
            &config.branch,
            workdir,
        )
    })?;
    log.info(&format!(
        "{} at {} ({})",
        state.dir.display(),
        state.head.as_deref().unwrap_or("unknown revision"),
        state.manifest.describe()
    ));

    let remote = ctx.stage(Stage::Connect, || connect(&config.target))?;
    log.info(&format!("connected to {}", remote.describe()));

    deploy_remote(&ctx, config, &remote, &state, probe)
}

/// The remote half of a deploy run, against an already verified connection.
pub fn deploy_remote(
    ctx: &RunContext<'_>,
    config: &DeploymentConfig,
    remote: &dyn Remote,
    state: &RepoState,
    probe: &dyn PublicProbe,
) -> Result<DeployOutcome, DeployError> {
    let log = ctx.log;
    let name = ctx.identity.name.as_str();
    let remote_dir = ctx.identity.remote_dir();
    let mut warnings = Vec::new();

    let provisioned = ctx.stage(Stage::Provision, || {
        EnvironmentProvisioner::new(remote, log).ensure(&remote_dir, &config.target.user)
    })?;
    warnings.extend(provisioned.advisories);

    ctx.stage(Stage::Sync, || {
        log.info(&format!(
            "syncing {} to {}:{remote_dir}",
            state.dir.display(),
            remote.describe()
        ));
        remote.sync_dir(&state.dir, &remote_dir, &SYNC_EXCLUDES)
    })?;

    ctx.stage(Stage::Deploy, || {
        ContainerDeployer::new(remote, log).deploy(&remote_dir, name, config.port, &state.manifest)
    })?;

    let proxy_configured = ctx
        .advisory_stage(Stage::Proxy, || {
            ReverseProxyConfigurator::new(remote, log).configure(name, config.port)
        })?
        .is_some();
    if !proxy_configured {
        warnings.push(format!("nginx was not configured for {name}"));
    }

    let report = ctx.stage(Stage::Validate, || {
        DeploymentValidator::new(remote, log, probe).validate(name, &state.manifest, &config.target.host)
    })?;
    match serde_json::to_string(&report) {
        Ok(json) => log.info(&format!("validation report {json}")),
        Err(e) => log.warn(&format!("could not serialize the validation report: {e}")),
    }
    if let Some(e) = &report.public_error {
        warnings.push(format!("{} unreachable: {e}", report.public_url));
    }

    Ok(DeployOutcome {
        head: state.head.clone(),
        report,
        proxy_configured,
        warnings,
    })
}

/// Cleanup run: connect, then remove everything named after the repository.
pub fn run_cleanup<R, C>(
    config: &CleanupConfig,
    log: &dyn LogSink,
    connect: C,
) -> Result<CleanupSummary, DeployError>
where
    R: Remote,
    C: FnOnce(&RemoteTarget) -> Result<R, DeployError>,
{
    let ctx = RunContext::new(&config.repo_url, Redactor::none(), log)?;
    log.info(&format!(
        "cleaning up {} on {}",
        ctx.identity.name,
        config.target.destination()
    ));
    ctx.stage(Stage::Cleanup, || {
        let remote = connect(&config.target).map_err(|e| match e {
            DeployError::ConnectivityFailure { target, detail } => {
                DeployError::CleanupFailure(format!("{target}: {detail}"))
            }
            other => other,
        })?;
        CleanupOperator::new(&remote, log).cleanup(&ctx.identity.name)
    })
}
