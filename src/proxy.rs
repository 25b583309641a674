//! nginx site definition routing public port 80 to the container's loopback port.
use crate::errors::DeployError;
use crate::identity;
use crate::log::LogSink;
use crate::remote::{script_logged, Remote, RemoteScript};
use crate::util::{ShellScript, TextLines};

pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";
pub const CONF_D: &str = "/etc/nginx/conf.d";
pub const NGINX_LOG_DIR: &str = "/var/log/nginx";

/// Exit code the activation script uses when `nginx -t` rejects the configuration.
const SYNTAX_CHECK_FAILED: i32 = 3;

/// Render the site definition for `name` proxying to `127.0.0.1:<port>`.
pub fn render_site(name: &str, port: u16) -> Result<String, DeployError> {
    let mut t = TextLines::new();
    t.open("server")
        .push("listen 80;")
        .push("listen [::]:80;")
        .push("server_name _;")
        .push("")
        .push(format!("access_log {NGINX_LOG_DIR}/{name}_access.log;"))
        .push(format!("error_log {NGINX_LOG_DIR}/{name}_error.log;"))
        .push("")
        .open("location /")
        .push(format!("proxy_pass http://127.0.0.1:{port};"))
        .push("proxy_http_version 1.1;")
        .push("proxy_set_header Host $host;")
        .push("proxy_set_header X-Real-IP $remote_addr;")
        .push("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;")
        .push("proxy_set_header X-Forwarded-Proto $scheme;")
        .close()
        .close();
    t.build_lf()
        .map_err(|e| DeployError::ProxyFailure(e.to_string()))
}

/// Write the site, activate it, syntax-check, and reload only when the check passes.
///
/// `$1` is the deployment name, `$2` the rendered site definition. Hosts without
/// `sites-available` but with `conf.d` get `conf.d/<name>.conf` instead.
pub fn activation_script(name: &str, site: &str) -> RemoteScript {
    let mut body = ShellScript::strict();
    body.push(format!(
        "if [ -d {SITES_AVAILABLE} ] || [ ! -d {CONF_D} ]"
    ))
    .push(format!("then mkdir -p {SITES_AVAILABLE} {SITES_ENABLED}"))
    .push(format!("printf '%s' \"$2\" > \"{SITES_AVAILABLE}/$1.conf\""))
    .push(format!(
        "ln -sfn \"{SITES_AVAILABLE}/$1.conf\" \"{SITES_ENABLED}/$1.conf\""
    ))
    .push(format!("rm -f {SITES_ENABLED}/default"))
    .push(format!("else printf '%s' \"$2\" > \"{CONF_D}/$1.conf\""))
    .push("fi")
    .push(format!(
        "if ! nginx -t; then echo \"nginx configuration test failed; not reloading\" >&2; exit {SYNTAX_CHECK_FAILED}; fi"
    ))
    .extend(reload_fragments());
    RemoteScript::new("nginx site", body)
        .privileged()
        .arg(name)
        .arg(site)
}

/// Remove the activation for `$1`, re-check what remains and reload when it passes.
pub fn deactivation_script(name: &str) -> RemoteScript {
    let mut body = ShellScript::new();
    body.push(format!("rm -f \"{SITES_ENABLED}/$1.conf\" \"{CONF_D}/$1.conf\""))
        .push("command -v nginx >/dev/null 2>&1 || exit 0")
        .push(format!(
            "if ! nginx -t; then echo \"nginx configuration test failed; not reloading\" >&2; exit {SYNTAX_CHECK_FAILED}; fi"
        ))
        .extend(reload_fragments());
    RemoteScript::new("nginx site removal", body)
        .privileged()
        .arg(name)
}

fn reload_fragments() -> Vec<String> {
    vec![
        "if command -v systemctl >/dev/null 2>&1 && systemctl is-active --quiet nginx".to_string(),
        "then systemctl reload nginx".to_string(),
        "else nginx -s reload || nginx".to_string(),
        "fi".to_string(),
    ]
}

pub struct ReverseProxyConfigurator<'a> {
    remote: &'a dyn Remote,
    log: &'a dyn LogSink,
}

impl<'a> ReverseProxyConfigurator<'a> {
    pub fn new(remote: &'a dyn Remote, log: &'a dyn LogSink) -> Self {
        Self { remote, log }
    }

    pub fn configure(&self, name: &str, port: u16) -> Result<(), DeployError> {
        let site = render_site(name, port)?;
        self.log.info(&format!(
            "configuring nginx: port 80 -> 127.0.0.1:{port} ({})",
            identity::proxy_file(name)
        ));
        let out = script_logged(self.remote, self.log, &activation_script(name, &site))?;
        match out.code {
            0 => {
                self.log.info("nginx configuration valid and reloaded");
                Ok(())
            }
            SYNTAX_CHECK_FAILED => Err(DeployError::ProxyFailure(format!(
                "nginx -t rejected the configuration: {}",
                out.detail()
            ))),
            code => Err(DeployError::ProxyFailure(format!(
                "activation exited with {code}: {}",
                out.detail()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::remote::fake::FakeRemote;
    use crate::remote::RemoteOutput;

    #[test]
    fn site_routes_port_80_to_loopback() {
        let site = render_site("demo", 8080).unwrap();
        assert!(site.starts_with("server {\n    listen 80;\n"));
        assert!(site.contains("        proxy_pass http://127.0.0.1:8080;\n"));
        assert!(site.contains("proxy_set_header Host $host;"));
        assert!(site.contains("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"));
        assert!(site.contains("proxy_set_header X-Forwarded-Proto $scheme;"));
        assert!(site.contains("access_log /var/log/nginx/demo_access.log;"));
        assert!(site.contains("error_log /var/log/nginx/demo_error.log;"));
        assert!(site.ends_with("    }\n}\n"));
    }

    #[test]
    fn activation_passes_values_as_arguments() {
        let script = activation_script("demo", "server {}\n");
        assert_eq!(script.args, vec!["demo".to_string(), "server {}\n".to_string()]);
        let body = script.body.build().unwrap();
        assert!(!body.contains("demo"));
        assert!(body.contains("ln -sfn"));
        // reload must come after the syntax check
        assert!(body.find("nginx -t").unwrap() < body.find("systemctl reload nginx").unwrap());
    }

    #[test]
    fn configure_reports_syntax_failure() {
        let remote = FakeRemote::new().on(
            "script:nginx site",
            RemoteOutput::failed(3, "nginx: [emerg] unexpected \"}\""),
        );
        let log = MemoryLog::new();
        let err = ReverseProxyConfigurator::new(&remote, &log)
            .configure("demo", 8080)
            .unwrap_err();
        assert!(matches!(err, DeployError::ProxyFailure(_)));
        assert!(err.to_string().contains("rejected"));
    }

    #[test]
    fn configure_succeeds_on_clean_run() {
        let remote = FakeRemote::new();
        let log = MemoryLog::new();
        ReverseProxyConfigurator::new(&remote, &log)
            .configure("demo", 8080)
            .unwrap();
        assert!(remote.called("script:nginx site demo server {"));
        assert!(log.contains("reloaded"));
    }
}
