//! Credentialed repository URLs.
use url::Url;

/// Repository access token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// True for `git@host:owner/repo.git` and `ssh://...` forms, which authenticate with keys.
pub fn is_ssh_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("ssh://") || url.starts_with("git@")
}

/// Build the URL git should fetch from.
///
/// HTTPS URLs get the credential as user-info (percent-encoded where needed); every other form is
/// returned unchanged. The result must only be handed to git, never to a log sink.
pub fn resolve(url: &str, credential: &Credential) -> String {
    let trimmed = url.trim();
    if is_ssh_url(trimmed) || credential.is_empty() {
        return trimmed.to_string();
    }
    match Url::parse(trimmed) {
        Ok(mut parsed) if parsed.scheme() == "https" && parsed.has_host() => {
            if parsed.set_username(credential.expose()).is_err() {
                return trimmed.to_string();
            }
            parsed.to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Scrubs the credential (raw and percent-encoded) out of text headed for the log.
#[derive(Debug, Clone)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new(credential: &Credential) -> Self {
        let mut secrets = Vec::new();
        if !credential.is_empty() {
            secrets.push(credential.expose().to_string());
            if let Ok(mut probe) = Url::parse("https://host.invalid/") {
                if probe.set_username(credential.expose()).is_ok() {
                    let encoded = probe.username().to_string();
                    if encoded != credential.expose() {
                        secrets.push(encoded);
                    }
                }
            }
        }
        Self { secrets }
    }

    /// Redactor that leaves text untouched (cleanup mode has no credential).
    pub fn none() -> Self {
        Self {
            secrets: Vec::new(),
        }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for s in &self.secrets {
            out = out.replace(s.as_str(), "***");
        }
        out
    }
}
