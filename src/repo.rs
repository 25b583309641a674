//! Local working copy: clone or fast-forward to a branch, then detect the container manifest.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use which::which;

use crate::errors::DeployError;
use crate::log::LogSink;
use crate::source::Redactor;
use crate::util::{ExecOutput, ExecRequest, ExecService};

pub const COMPOSE_FILES: [&str; 2] = ["docker-compose.yml", "docker-compose.yaml"];
pub const DOCKERFILE: &str = "Dockerfile";

/// Git network operations get a generous bound; a hung fetch should not hang the run forever.
const GIT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestKind {
    /// Multi-service manifest; `file` is the name found at the repository root.
    Compose { file: String },
    SingleDockerfile,
}

impl ManifestKind {
    pub fn describe(&self) -> String {
        match self {
            ManifestKind::Compose { file } => format!("compose manifest ({file})"),
            ManifestKind::SingleDockerfile => "single Dockerfile".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepoState {
    pub dir: PathBuf,
    pub manifest: ManifestKind,
    pub head: Option<String>,
}

/// Compose wins when both a compose file and a Dockerfile are present.
pub fn inspect_manifest(dir: &Path) -> Result<ManifestKind, DeployError> {
    for f in COMPOSE_FILES {
        if dir.join(f).is_file() {
            return Ok(ManifestKind::Compose {
                file: f.to_string(),
            });
        }
    }
    if dir.join(DOCKERFILE).is_file() {
        return Ok(ManifestKind::SingleDockerfile);
    }
    Err(DeployError::MissingManifest(dir.display().to_string()))
}

/// Service names declared in a compose file; `None` when it cannot be read or parsed.
pub fn compose_services(path: &Path) -> Option<Vec<String>> {
    let text = fs::read_to_string(path).ok()?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).ok()?;
    let services = doc.get("services")?.as_mapping()?;
    Some(
        services
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect(),
    )
}

fn is_empty_dir(dir: &Path) -> Result<bool, DeployError> {
    if !dir.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(dir)?.next().is_none())
}

/// Remove the contents of `dir` but keep the directory itself.
fn clear_dir(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

pub struct LocalRepository<'a> {
    git: PathBuf,
    exec: ExecService,
    redactor: &'a Redactor,
    log: &'a dyn LogSink,
}

impl<'a> LocalRepository<'a> {
    pub fn new(redactor: &'a Redactor, log: &'a dyn LogSink) -> Result<Self, DeployError> {
        let git = which("git").map_err(|_| {
            DeployError::InputValidation("git is required but was not found in PATH".to_string())
        })?;
        Ok(Self {
            git,
            exec: ExecService::new(GIT_TIMEOUT),
            redactor,
            log,
        })
    }

    /// Run git (optionally `-C repo`), logging redacted output. `Err` only when git could not run.
    fn git(&self, repo: Option<&Path>, args: &[&str]) -> Result<ExecOutput, DeployError> {
        let mut req = ExecRequest::new(&self.git).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(r) = repo {
            req = req.arg("-C").arg(r);
        }
        let req = req.args(args.iter().copied());
        let label = format!("git {}", args.first().copied().unwrap_or_default());
        let out = self
            .exec
            .run(req)
            .map_err(|e| DeployError::Io(std::io::Error::other(self.redactor.redact(&format!("{e:#}")))))?;
        self.log.output(&label, &self.redactor.redact(&out.combined()));
        Ok(out)
    }

    fn clone_failure(&self, display_url: &str, branch: &str, out: &ExecOutput) -> DeployError {
        DeployError::CloneFailure {
            url: display_url.to_string(),
            branch: branch.to_string(),
            detail: self.redactor.redact(out.stderr.trim()),
        }
    }

    /// Bring `target_dir` to `branch` of `auth_url`. `display_url` is the credential-free form for logs.
    pub fn sync_to_branch(
        &self,
        auth_url: &str,
        display_url: &str,
        branch: &str,
        target_dir: &Path,
    ) -> Result<RepoState, DeployError> {
        if target_dir.join(".git").exists() {
            self.update_existing(auth_url, display_url, branch, target_dir)?;
        } else {
            self.clone_fresh(auth_url, display_url, branch, target_dir)?;
        }

        let manifest = inspect_manifest(target_dir)?;
        if let ManifestKind::Compose { ref file } = manifest {
            match compose_services(&target_dir.join(file)) {
                Some(services) if !services.is_empty() => self
                    .log
                    .info(&format!("compose services: {}", services.join(", "))),
                _ => self
                    .log
                    .warn(&format!("could not read the service list from {file}")),
            }
        }
        let head = self
            .git(Some(target_dir), &["rev-parse", "--short", "HEAD"])
            .ok()
            .filter(ExecOutput::success)
            .map(|o| o.stdout.trim().to_string());

        Ok(RepoState {
            dir: target_dir.to_path_buf(),
            manifest,
            head,
        })
    }

    fn clone_fresh(
        &self,
        auth_url: &str,
        display_url: &str,
        branch: &str,
        target_dir: &Path,
    ) -> Result<(), DeployError> {
        let existed = target_dir.exists();
        if existed && !is_empty_dir(target_dir)? {
            return Err(DeployError::CloneFailure {
                url: display_url.to_string(),
                branch: branch.to_string(),
                detail: format!(
                    "{} exists and is not a git checkout; move it away or set HOIST_WORKDIR",
                    target_dir.display()
                ),
            });
        }
        if let Some(parent) = target_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        let dest = target_dir.to_string_lossy().to_string();

        self.log
            .info(&format!("shallow clone of {display_url} (branch {branch})"));
        let shallow = self.git(
            None,
            &["clone", "--depth", "1", "--branch", branch, "--", auth_url, &dest],
        )?;
        if shallow.success() {
            return Ok(());
        }
        self.discard_partial(target_dir, existed);

        self.log
            .warn("shallow clone failed; retrying with a full clone");
        let full = self.git(None, &["clone", "--branch", branch, "--", auth_url, &dest])?;
        if full.success() {
            return Ok(());
        }
        self.discard_partial(target_dir, existed);
        Err(self.clone_failure(display_url, branch, &full))
    }

    /// Remove what a failed clone left behind. A directory that existed before the run is kept.
    fn discard_partial(&self, target_dir: &Path, existed: bool) {
        let res = if existed {
            clear_dir(target_dir)
        } else {
            fs::remove_dir_all(target_dir)
        };
        if let Err(e) = res {
            if e.kind() != std::io::ErrorKind::NotFound {
                self.log.warn(&format!(
                    "could not remove partial clone at {}: {e}",
                    target_dir.display()
                ));
            }
        }
    }

    fn update_existing(
        &self,
        auth_url: &str,
        display_url: &str,
        branch: &str,
        dir: &Path,
    ) -> Result<(), DeployError> {
        self.log.info(&format!(
            "updating existing checkout {} from {display_url} (branch {branch})",
            dir.display()
        ));
        let set_url = self.git(Some(dir), &["remote", "set-url", "origin", auth_url])?;
        if !set_url.success() {
            let add = self.git(Some(dir), &["remote", "add", "origin", auth_url])?;
            if !add.success() {
                return Err(self.clone_failure(display_url, branch, &add));
            }
        }

        let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
        let fetch = self.git(Some(dir), &["fetch", "origin", &refspec])?;
        if !fetch.success() {
            return Err(self.clone_failure(display_url, branch, &fetch));
        }

        let local_ref = format!("refs/heads/{branch}");
        let has_local = self
            .git(Some(dir), &["rev-parse", "--verify", "--quiet", &local_ref])?
            .success();
        let checkout = if has_local {
            self.git(Some(dir), &["checkout", branch])?
        } else {
            let upstream = format!("origin/{branch}");
            self.git(Some(dir), &["checkout", "-b", branch, "--track", &upstream])?
        };
        if !checkout.success() {
            return Err(self.clone_failure(display_url, branch, &checkout));
        }

        let pull = self.git(Some(dir), &["pull", "--ff-only", "origin", branch])?;
        if !pull.success() {
            self.log.warn(&format!(
                "fast-forward pull of {branch} failed; continuing with the current checkout"
            ));
        }
        Ok(())
    }
}
