use std::process::ExitCode;
use std::time::SystemTime;

use clap::error::ErrorKind;
use clap::Parser;

use hoist::config::{log_dir, process_env, workdir_for};
use hoist::errors::{EXIT_INPUT, EXIT_OK};
use hoist::ui::TerminalPrompter;
use hoist::{
    display_for_deploy_error, exit_code_for_deploy_error, run_cleanup, run_deploy, CleanupConfig,
    DeployError, DeploymentConfig, DerivedIdentity, HttpProbe, LogSink, RunLog, SshSession,
};

mod cli;

use crate::cli::Cli;

fn deploy(log: &RunLog) -> Result<(), DeployError> {
    let cfg = DeploymentConfig::collect(&mut TerminalPrompter, &process_env)?;
    let identity = DerivedIdentity::from_url(&cfg.repo_url)?;
    let workdir = workdir_for(&identity.repo_name);
    let probe = HttpProbe::default();

    let outcome = run_deploy(&cfg, &workdir, log, SshSession::connect, &probe)?;

    let use_err = hoist::color_enabled_stderr();
    for w in &outcome.warnings {
        hoist::log_warn_stderr(use_err, &format!("warning: {w}"));
    }
    hoist::log_success_stderr(
        use_err,
        &format!(
            "hoist: {} deployed at {} ({})",
            identity.name,
            outcome.report.public_url,
            outcome.head.as_deref().unwrap_or("unknown revision")
        ),
    );
    Ok(())
}

fn cleanup(log: &RunLog) -> Result<(), DeployError> {
    let cfg = CleanupConfig::collect(&mut TerminalPrompter, &process_env)?;
    let identity = DerivedIdentity::from_url(&cfg.repo_url)?;
    let summary = run_cleanup(&cfg, log, SshSession::connect)?;
    log.info(&format!("cleanup summary: {summary:?}"));
    let use_err = hoist::color_enabled_stderr();
    hoist::log_success_stderr(
        use_err,
        &format!(
            "hoist: {} removed from {}",
            identity.name,
            cfg.target.destination()
        ),
    );
    Ok(())
}

fn main() -> ExitCode {
    // Load environment variables from .env if present (silently ignore if missing)
    let _ = dotenvy::dotenv();
    let _ = hoist::telemetry_init();

    let cli = match Cli::try_parse() {
        Ok(c) => c,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_INPUT,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if let Some(mode) = cli.color {
        hoist::set_color_mode(mode);
    }

    let dir = log_dir();
    let log = match RunLog::create(&dir, SystemTime::now()) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("hoist: cannot create run log in {}: {e}", dir.display());
            return ExitCode::from(EXIT_INPUT);
        }
    };

    let result = if cli.cleanup {
        cleanup(&log)
    } else {
        deploy(&log)
    };

    match result {
        Ok(()) => {
            log.info("run finished successfully");
            eprintln!("hoist: log written to {}", log.path().display());
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            let code = exit_code_for_deploy_error(&e);
            log.error(&format!("run aborted with exit code {code}"));
            hoist::log_error_stderr(hoist::color_enabled_stderr(), &display_for_deploy_error(&e));
            eprintln!("hoist: see {} for details", log.path().display());
            ExitCode::from(code)
        }
    }
}
