//! Optional diagnostic tracing to stderr.
//!
//! Off by default; `HOIST_TRACING_FMT=1` installs a fmt subscriber filtered by `RUST_LOG`
//! (default `warn`). The run log does not depend on this.
use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;

static INIT: OnceCell<()> = OnceCell::new();

fn tracing_enabled_env() -> bool {
    env::var("HOIST_TRACING_FMT").ok().as_deref() == Some("1")
}

/// Install the global subscriber once. Returns false when disabled or already installed.
pub fn telemetry_init() -> bool {
    if INIT.get().is_some() || !tracing_enabled_env() {
        return false;
    }

    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::new(filter);
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("hoist: tracing init skipped (global subscriber already set)");
        return false;
    }

    let _ = INIT.set(());
    true
}
