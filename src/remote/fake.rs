use std::cell::RefCell;
use std::path::Path;

use crate::errors::DeployError;

use super::{Remote, RemoteCommand, RemoteOutput, RemoteScript};

/// In-memory remote: records every call and answers from prefix rules (first match wins).
#[derive(Default)]
pub(crate) struct FakeRemote {
    rules: Vec<(String, RemoteOutput)>,
    pub calls: RefCell<Vec<String>>,
    pub unreachable: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose rendered line starts with `prefix` (scripts match `script:<label>`).
    pub fn on(mut self, prefix: &str, output: RemoteOutput) -> Self {
        self.rules.push((prefix.to_string(), output));
        self
    }

    pub fn offline() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls.borrow().iter().position(|c| c.starts_with(prefix))
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.position(prefix).is_some()
    }

    fn answer(&self, line: String) -> Result<RemoteOutput, DeployError> {
        if self.unreachable {
            return Err(DeployError::ConnectivityFailure {
                target: self.describe(),
                detail: "connection refused".to_string(),
            });
        }
        let out = self
            .rules
            .iter()
            .find(|(p, _)| line.starts_with(p.as_str()))
            .map(|(_, o)| o.clone())
            .unwrap_or_default();
        self.calls.borrow_mut().push(line);
        Ok(out)
    }
}

impl Remote for FakeRemote {
    fn describe(&self) -> String {
        "tester@fake-host".to_string()
    }

    fn exec(&self, command: &RemoteCommand) -> Result<RemoteOutput, DeployError> {
        self.answer(command.render())
    }

    fn exec_script(&self, script: &RemoteScript) -> Result<RemoteOutput, DeployError> {
        let mut line = format!("script:{}", script.label);
        for a in &script.args {
            line.push(' ');
            line.push_str(a);
        }
        self.answer(line)
    }

    fn sync_dir(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        excludes: &[&str],
    ) -> Result<(), DeployError> {
        self.answer(format!(
            "sync {} {} exclude={}",
            local_dir.display(),
            remote_dir,
            excludes.join(",")
        ))
        .map(|_| ())
    }
}
