#![allow(clippy::module_name_repetitions)]
//! Console color policy and ANSI painting helpers.
//!
//! Precedence: `NO_COLOR`, then `--color` (`set_color_mode`), then `HOIST_COLOR=auto|always|never`,
//! then TTY detection on stderr. Only the console mirror is painted; the run log file never is.

use once_cell::sync::OnceCell;

pub const ANSI_PROMPT: &str = "\x1b[36;1m";
pub const ANSI_WARN: &str = "\x1b[33m";
pub const ANSI_ERROR: &str = "\x1b[31;1m";
pub const ANSI_SUCCESS: &str = "\x1b[32;1m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, clap::ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn resolve(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => is_tty,
        }
    }
}

static COLOR_MODE: OnceCell<ColorMode> = OnceCell::new();

/// First call wins; later calls are ignored.
pub fn set_color_mode(mode: ColorMode) {
    let _ = COLOR_MODE.set(mode);
}

fn parse_color_mode(s: &str) -> Option<ColorMode> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ColorMode::Auto),
        "always" | "on" | "true" | "yes" | "1" => Some(ColorMode::Always),
        "never" | "off" | "false" | "no" | "0" => Some(ColorMode::Never),
        _ => None,
    }
}

fn color_enabled_for(is_tty: bool) -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    COLOR_MODE
        .get()
        .copied()
        .or_else(|| {
            std::env::var("HOIST_COLOR")
                .ok()
                .and_then(|v| parse_color_mode(&v))
        })
        .unwrap_or(ColorMode::Auto)
        .resolve(is_tty)
}

pub fn color_enabled_stderr() -> bool {
    color_enabled_for(atty::is(atty::Stream::Stderr))
}

/// Wrap `s` in `code` when enabled; otherwise return it unchanged.
pub fn paint(enabled: bool, code: &str, s: &str) -> String {
    if enabled {
        format!("{code}{s}{ANSI_RESET}")
    } else {
        s.to_string()
    }
}

pub fn log_warn_stderr(use_color: bool, msg: &str) {
    eprintln!("{}", paint(use_color, ANSI_WARN, msg));
}

pub fn log_error_stderr(use_color: bool, msg: &str) {
    eprintln!("{}", paint(use_color, ANSI_ERROR, msg));
}

pub fn log_success_stderr(use_color: bool, msg: &str) {
    eprintln!("{}", paint(use_color, ANSI_SUCCESS, msg));
}
