//! hoist: push a Dockerized repository to one Linux host, provision docker and nginx over ssh,
//! start the container behind a reverse proxy and validate the result.
//!
//! Stages run strictly in sequence (see [`pipeline`]). Every remote stage talks to a [`Remote`];
//! [`SshSession`] is the production implementation.

pub mod cleanup;
mod color;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod identity;
pub mod log;
pub mod pipeline;
pub mod provision;
pub mod proxy;
pub mod remote;
pub mod repo;
pub mod source;
mod telemetry;
pub mod ui;
pub mod util;
pub mod validate;

pub use color::*;
pub use config::{CleanupConfig, DeploymentConfig, RemoteTarget};
pub use errors::{display_for_deploy_error, exit_code_for_deploy_error, DeployError};
pub use identity::DerivedIdentity;
pub use log::{LogSink, MemoryLog, RunLog, Severity};
pub use pipeline::{run_cleanup, run_deploy, DeployOutcome};
pub use remote::{Remote, SshSession};
pub use telemetry::telemetry_init;
pub use validate::{HttpProbe, ValidationReport};
