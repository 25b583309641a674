//! Names derived from the repository URL.
use crate::errors::DeployError;

/// Repository name plus the sanitized name used for the remote directory, container, image and proxy file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedIdentity {
    pub repo_name: String,
    pub name: String,
}

impl DerivedIdentity {
    pub fn from_url(url: &str) -> Result<Self, DeployError> {
        let repo_name = repo_basename(url);
        let name = sanitize_name(&repo_name);
        if name.is_empty() {
            return Err(DeployError::InputValidation(format!(
                "cannot derive a deployment name from repository URL {url}"
            )));
        }
        Ok(Self { repo_name, name })
    }

    /// `/opt/<name>`
    pub fn remote_dir(&self) -> String {
        format!("/opt/{}", self.name)
    }

    pub fn image_tag(&self) -> String {
        image_tag(&self.name)
    }

    pub fn proxy_file(&self) -> String {
        proxy_file(&self.name)
    }
}

/// `<name>:latest`
pub fn image_tag(name: &str) -> String {
    format!("{name}:latest")
}

/// `<name>.conf`
pub fn proxy_file(name: &str) -> String {
    format!("{name}.conf")
}

/// Last path segment of a git URL (`/` or the scp-style `:` separator), `.git` stripped.
pub fn repo_basename(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

/// Keep `[A-Za-z0-9._-]`, map everything else to `-`, lowercase (docker image references
/// reject uppercase), and drop leading separators (docker names must start alphanumeric).
pub fn sanitize_name(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    mapped
        .trim_start_matches(|c| c == '.' || c == '_' || c == '-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basename_of_common_url_forms() {
        assert_eq!(repo_basename("https://example.com/o/r.git"), "r");
        assert_eq!(repo_basename("https://example.com/o/my-app/"), "my-app");
        assert_eq!(repo_basename("git@example.com:o/r.git"), "r");
        assert_eq!(repo_basename("git@example.com:solo.git"), "solo");
        assert_eq!(repo_basename("ssh://git@example.com:2222/o/svc.git"), "svc");
    }

    #[test]
    fn identity_names_remote_artifacts() {
        let id = DerivedIdentity::from_url("https://example.com/o/Web App.git").unwrap();
        assert_eq!(id.repo_name, "Web App");
        assert_eq!(id.name, "web-app");
        assert_eq!(id.remote_dir(), "/opt/web-app");
        assert_eq!(id.image_tag(), "web-app:latest");
        assert_eq!(id.proxy_file(), "web-app.conf");
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = DerivedIdentity::from_url("https://example.com/o/.git").unwrap_err();
        assert!(matches!(err, DeployError::InputValidation(_)));
    }

    #[test]
    fn shell_metacharacters_never_survive() {
        assert_eq!(sanitize_name("app;rm -rf $(id)"), "app-rm--rf---id-");
    }

    proptest! {
        #[test]
        fn derived_name_uses_only_safe_characters(url in ".{0,80}") {
            if let Ok(id) = DerivedIdentity::from_url(&url) {
                prop_assert!(id
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'));
                prop_assert!(!id.name.is_empty());
            }
        }

        #[test]
        fn derivation_is_deterministic(url in "[a-z]{1,8}://[a-z.]{1,12}/[A-Za-z0-9 _.@-]{1,20}") {
            let a = DerivedIdentity::from_url(&url);
            let b = DerivedIdentity::from_url(&url);
            match (a, b) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "derivation disagreed for {}", url),
            }
        }
    }
}
