//! Error mapping guide:
//! - Every fatal condition of a run is one `DeployError` variant.
//! - Exit codes are grouped per stage: 10 input, 20 local repository, 30 connectivity,
//!   40 provisioning, 50 deployment, 60 validation.
//! - Messages never contain the repository credential; callers redact captured output first.
use std::io;

use thiserror::Error;

pub const EXIT_OK: u8 = 0;
pub const EXIT_INPUT: u8 = 10;
pub const EXIT_REPOSITORY: u8 = 20;
pub const EXIT_CONNECTIVITY: u8 = 30;
pub const EXIT_PROVISION: u8 = 40;
pub const EXIT_DEPLOY: u8 = 50;
pub const EXIT_VALIDATION: u8 = 60;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("could not clone {url} (branch {branch}): {detail}")]
    CloneFailure {
        url: String,
        branch: String,
        detail: String,
    },

    #[error("no docker-compose.yml, docker-compose.yaml or Dockerfile found in {0}")]
    MissingManifest(String),

    #[error("cannot reach {target}: {detail}")]
    ConnectivityFailure { target: String, detail: String },

    #[error("remote provisioning failed: {0}")]
    ProvisionFailure(String),

    #[error("no supported package manager (apt-get, yum, dnf) found to install {0}")]
    UnsupportedPlatform(String),

    #[error("file sync to {remote_dir} failed: {detail}")]
    SyncFailure { remote_dir: String, detail: String },

    #[error("container deployment failed: {0}")]
    DeployFailure(String),

    #[error("reverse proxy configuration failed: {0}")]
    ProxyFailure(String),

    #[error("docker runtime is not healthy on the remote host: {0}")]
    RuntimeDown(String),

    #[error("container {name} is not running (last status: {status})")]
    ContainerNotActive { name: String, status: String },

    #[error("loopback HTTP probe on the remote host failed: {0}")]
    LocalHttpFailure(String),

    #[error("cleanup could not reach the remote host: {0}")]
    CleanupFailure(String),

    #[error("local I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeployError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::InputValidation(_) => EXIT_INPUT,
            DeployError::CloneFailure { .. } | DeployError::MissingManifest(_) => EXIT_REPOSITORY,
            DeployError::ConnectivityFailure { .. } | DeployError::CleanupFailure(_) => {
                EXIT_CONNECTIVITY
            }
            DeployError::ProvisionFailure(_) | DeployError::UnsupportedPlatform(_) => {
                EXIT_PROVISION
            }
            DeployError::SyncFailure { .. }
            | DeployError::DeployFailure(_)
            | DeployError::ProxyFailure(_) => EXIT_DEPLOY,
            DeployError::RuntimeDown(_)
            | DeployError::ContainerNotActive { .. }
            | DeployError::LocalHttpFailure(_) => EXIT_VALIDATION,
            DeployError::Io(e) => exit_code_for_io_error(e),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, DeployError::ConnectivityFailure { .. })
    }
}

/// Map a local io::Error to a process exit code.
/// - NotFound usually means a missing local tool or key file: input error
/// - everything else happened while preparing the local checkout
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        EXIT_INPUT
    } else {
        EXIT_REPOSITORY
    }
}

pub fn exit_code_for_deploy_error(e: &DeployError) -> u8 {
    e.exit_code()
}

/// Render the one-line console message for a fatal error.
pub fn display_for_deploy_error(e: &DeployError) -> String {
    format!("hoist: {e}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_stage_grouping() {
        assert_eq!(DeployError::InputValidation("x".into()).exit_code(), 10);
        assert_eq!(DeployError::MissingManifest("/w".into()).exit_code(), 20);
        assert_eq!(
            DeployError::CloneFailure {
                url: "u".into(),
                branch: "main".into(),
                detail: "d".into()
            }
            .exit_code(),
            20
        );
        assert_eq!(
            DeployError::ConnectivityFailure {
                target: "a@b".into(),
                detail: "refused".into()
            }
            .exit_code(),
            30
        );
        assert_eq!(DeployError::ProvisionFailure("x".into()).exit_code(), 40);
        assert_eq!(DeployError::UnsupportedPlatform("docker".into()).exit_code(), 40);
        assert_eq!(DeployError::DeployFailure("x".into()).exit_code(), 50);
        assert_eq!(
            DeployError::SyncFailure {
                remote_dir: "/opt/a".into(),
                detail: "x".into()
            }
            .exit_code(),
            50
        );
        assert_eq!(DeployError::RuntimeDown("x".into()).exit_code(), 60);
        assert_eq!(DeployError::LocalHttpFailure("x".into()).exit_code(), 60);
    }

    #[test]
    fn io_not_found_is_input_error() {
        let e = io::Error::new(io::ErrorKind::NotFound, "git");
        assert_eq!(exit_code_for_io_error(&e), EXIT_INPUT);
        let e = io::Error::new(io::ErrorKind::PermissionDenied, "workdir");
        assert_eq!(exit_code_for_io_error(&e), EXIT_REPOSITORY);
    }

    #[test]
    fn display_is_prefixed() {
        let e = DeployError::ContainerNotActive {
            name: "demo".into(),
            status: "Exited (1) 3 seconds ago".into(),
        };
        assert_eq!(
            display_for_deploy_error(&e),
            "hoist: container demo is not running (last status: Exited (1) 3 seconds ago)"
        );
    }
}
